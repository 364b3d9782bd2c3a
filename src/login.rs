use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordVerifier},
};
#[cfg(feature = "web")]
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(feature = "web")]
use crate::app::{ApiError, AppState};
use crate::error::{AttendanceError, Result};
use crate::sheet::A1Range;
use crate::store::TabularStore;

/// Default name of the credential sheet.
pub const DEFAULT_CREDENTIAL_SHEET: &str = "User";

/// Class-sheet slots following username and password (columns C–I).
pub const CLASS_SHEET_SLOTS: usize = 7;

/// One credential row: username, password, then up to seven class sheets.
///
/// Rows are maintained by an administrator directly in the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub class_sheets: Vec<String>,
}

impl Credential {
    /// Empty class-sheet slots are dropped; order is kept.
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        let username = cells.first()?.clone();
        let password = cells.get(1).cloned().unwrap_or_default();
        let class_sheets = cells
            .iter()
            .skip(2)
            .take(CLASS_SHEET_SLOTS)
            .filter(|sheet| !sheet.is_empty())
            .cloned()
            .collect();
        Some(Credential {
            username,
            password,
            class_sheets,
        })
    }
}

/// Credential data for login, as posted by the client.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserCredentials {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

/// An authenticated user and the class sheets they may operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedInUser {
    pub username: String,
    pub class_sheets: Vec<String>,
}

/// Validates logins against the credential sheet.
#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn TabularStore>,
    credential_sheet: String,
}

impl AuthGate {
    pub fn new(store: Arc<dyn TabularStore>, credential_sheet: &str) -> Self {
        AuthGate {
            store,
            credential_sheet: credential_sheet.to_string(),
        }
    }

    /// Columns A–I of the credential sheet.
    pub fn credential_range(&self) -> A1Range {
        A1Range::band(&self.credential_sheet, 1, 0, 1 + CLASS_SHEET_SLOTS)
    }

    /// Check `username`/`password` and return the user's class sheets.
    ///
    /// The first row whose username matches decides the outcome; unknown users
    /// and wrong passwords produce the same [`AttendanceError::InvalidCredentials`].
    pub async fn login(&self, username: &str, password: &str) -> Result<LoggedInUser> {
        if username.is_empty() || password.is_empty() {
            return Err(AttendanceError::MissingFields(
                "username, password".to_string(),
            ));
        }

        let rows = self.store.read_range(&self.credential_range()).await?;
        let credential = rows
            .iter()
            .filter_map(|cells| Credential::from_cells(cells))
            .find(|credential| credential.username == username);

        match credential {
            Some(credential) if verify_password(password, &credential.password) => {
                Ok(LoggedInUser {
                    username: credential.username,
                    class_sheets: credential.class_sheets,
                })
            }
            _ => Err(AttendanceError::InvalidCredentials),
        }
    }
}

/// Compare a supplied password with the stored value.
///
/// Stored values are plaintext and compared exactly, unless they are an
/// Argon2 PHC string, which is verified as a hash.
fn verify_password(password: &str, stored: &str) -> bool {
    if stored.starts_with("$argon2") {
        return match PasswordHash::new(stored) {
            Ok(hash) => Argon2::default()
                .verify_password(password.as_bytes(), &hash)
                .is_ok(),
            Err(e) => {
                log::warn!("unreadable password hash in credential sheet: {}", e);
                false
            }
        };
    }
    password == stored
}

/// Handle `POST /login`.
#[cfg(feature = "web")]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<UserCredentials>, JsonRejection>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let Json(credentials) = payload.map_err(|rejection| {
        log::debug!("unreadable login body: {}", rejection);
        ApiError::bad_request("Username and password are required")
    })?;
    let username = credentials.username.unwrap_or_default();
    let password = credentials.password.unwrap_or_default();
    log::info!("login attempt: {}", username);

    match state.auth.login(&username, &password).await {
        Ok(user) => {
            log::info!("login successful for: {}", user.username);
            Ok(Json(serde_json::json!({ "success": true, "user": user })))
        }
        Err(AttendanceError::MissingFields(_)) => {
            Err(ApiError::bad_request("Username and password are required"))
        }
        Err(AttendanceError::InvalidCredentials) => {
            log::info!("invalid login for: {}", username);
            Err(ApiError::unauthorized("Invalid username or password"))
        }
        Err(e) => Err(ApiError::internal("error during login", e)),
    }
}

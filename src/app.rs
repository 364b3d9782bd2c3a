use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::columns;
use crate::config::Config;
use crate::error::AttendanceError;
use crate::login::{self, AuthGate};
use crate::marking::{AttendanceWriter, Submission};
use crate::mailer::Notifier;
use crate::roster::RosterReader;
use crate::store::TabularStore;

/// Components shared by every request. Holds no mutable state; the
/// spreadsheet is the only source of truth.
pub struct AppState {
    pub auth: AuthGate,
    pub roster: RosterReader,
    pub writer: AttendanceWriter,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TabularStore>,
        notifier: Arc<dyn Notifier>,
        credential_sheet: &str,
        audit_sheet: &str,
    ) -> Self {
        AppState {
            auth: AuthGate::new(store.clone(), credential_sheet),
            roster: RosterReader::new(store.clone()),
            writer: AttendanceWriter::new(store, notifier, audit_sheet),
        }
    }
}

/// JSON error response: `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    /// Log `err` with `context` and answer with a generic 500.
    pub fn internal(context: &str, err: impl fmt::Display) -> Self {
        log::error!("{}: {}", context, err);
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal Server Error".to_string(),
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRequest {
    #[serde(default)]
    pub class_sheet: Option<String>,
    #[serde(default)]
    pub attendance: Option<Vec<Submission>>,
    #[serde(default)]
    pub user: Option<String>,
    /// Accepted but not consulted: the server decides which day it is.
    #[serde(default)]
    pub date: Option<String>,
}

impl MarkRequest {
    fn is_complete(&self) -> bool {
        let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.class_sheet)
            && present(&self.user)
            && present(&self.date)
            && self.attendance.as_ref().is_some_and(|list| !list.is_empty())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", post(login::handle_login))
        .route("/attendance/", get(missing_class_sheet))
        .route("/attendance/mark", post(mark_attendance))
        .route("/attendance/:class_sheet", get(get_class_data))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = config.build_store()?;
    let notifier = config.build_notifier()?;
    let state = Arc::new(AppState::new(
        store,
        notifier,
        &config.credential_sheet,
        &config.audit_sheet,
    ));

    let listener = TcpListener::bind(config.bind_addr()).await?;
    log::info!("server running on {}", config.bind_addr());
    axum::serve(listener, router(state)).await?;

    Ok(())
}

const MISSING_MARK_FIELDS: &str = "Missing required fields: classSheet, attendance, user, or date";

async fn missing_class_sheet() -> ApiError {
    ApiError::bad_request("ClassSheet is required")
}

async fn get_class_data(
    State(state): State<Arc<AppState>>,
    Path(class_sheet): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if class_sheet.trim().is_empty() {
        return Err(ApiError::bad_request("ClassSheet is required"));
    }

    let roster = state
        .roster
        .get_roster(&class_sheet)
        .await
        .map_err(|e| ApiError::internal("error fetching class data", e))?;
    let data: Vec<Vec<String>> = roster.iter().map(|row| row.to_cells()).collect();

    Ok(Json(serde_json::json!({ "success": true, "data": data })))
}

async fn mark_attendance(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MarkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = match payload {
        Ok(Json(request)) if request.is_complete() => request,
        Ok(_) => return Err(ApiError::bad_request(MISSING_MARK_FIELDS)),
        Err(rejection) => {
            log::debug!("unreadable attendance body: {}", rejection);
            return Err(ApiError::bad_request(MISSING_MARK_FIELDS));
        }
    };
    let class_sheet = request.class_sheet.unwrap_or_default();
    let user = request.user.unwrap_or_default();
    let submissions = request.attendance.unwrap_or_default();

    let date = columns::today();
    if request.date.as_deref() != Some(date.as_str()) {
        log::debug!(
            "client date {:?} ignored; recording attendance for {}",
            request.date,
            date
        );
    }

    match state
        .writer
        .mark_attendance(&class_sheet, &submissions, &user, &date)
        .await
    {
        // notification handles are dropped here: delivery continues detached
        Ok(outcome) => Ok(Json(serde_json::json!({
            "success": true,
            "message": "Attendance marked successfully!",
            "rowsAffected": outcome.cells_written,
        }))),
        Err(AttendanceError::MissingFields(fields)) => Err(ApiError::bad_request(format!(
            "Missing required fields: {}",
            fields
        ))),
        Err(e) => Err(ApiError::internal("error marking attendance", e)
            .with_message("Failed to mark attendance")),
    }
}

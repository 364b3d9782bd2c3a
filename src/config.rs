//! Server configuration from the command line and environment.
//!
//! Every flag has an environment fallback so the server can be configured
//! entirely through a `.env` file.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::login::DEFAULT_CREDENTIAL_SHEET;
use crate::mailer::{LogNotifier, Mailer, Notifier};
use crate::marking::DEFAULT_AUDIT_SHEET;
use crate::store::sheets::DEFAULT_SHEETS_ENDPOINT;
use crate::store::{MemoryStore, SheetsClient, TabularStore};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no store configured: set SPREADSHEET_ID and SHEETS_ACCESS_TOKEN, or STORE_FILE")]
    NoStore,

    #[error("cannot open local workbook: {0}")]
    Store(#[from] crate::error::StoreError),

    #[error("cannot set up mailer: {0}")]
    Mailer(#[from] crate::error::NotifyError),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "attendance-server", about = "School attendance service backed by a spreadsheet")]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Spreadsheet document holding the credential, class and audit sheets.
    #[arg(long, env = "SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    /// OAuth bearer token for the Sheets API.
    #[arg(long, env = "SHEETS_ACCESS_TOKEN", hide_env_values = true)]
    pub sheets_token: Option<String>,

    #[arg(long, env = "SHEETS_ENDPOINT", default_value = DEFAULT_SHEETS_ENDPOINT)]
    pub sheets_endpoint: String,

    /// Local gzip workbook used instead of Google Sheets.
    #[arg(long, env = "STORE_FILE")]
    pub store_file: Option<PathBuf>,

    #[arg(long, env = "CREDENTIAL_SHEET", default_value = DEFAULT_CREDENTIAL_SHEET)]
    pub credential_sheet: String,

    #[arg(long, env = "AUDIT_SHEET", default_value = DEFAULT_AUDIT_SHEET)]
    pub audit_sheet: String,

    #[arg(long, env = "EMAIL_USER")]
    pub email_user: Option<String>,

    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub email_password: Option<String>,

    #[arg(long, env = "SMTP_HOST", default_value = "smtp.gmail.com")]
    pub smtp_host: String,

    #[arg(long, env = "SMTP_PORT", default_value_t = 465)]
    pub smtp_port: u16,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Google Sheets when a document and token are configured, otherwise the
    /// local snapshot workbook.
    pub fn build_store(&self) -> Result<Arc<dyn TabularStore>, ConfigError> {
        match (&self.spreadsheet_id, &self.sheets_token, &self.store_file) {
            (Some(id), Some(token), _) => {
                log::info!("using spreadsheet {} at {}", id, self.sheets_endpoint);
                Ok(Arc::new(SheetsClient::new(&self.sheets_endpoint, id, token)))
            }
            (_, _, Some(path)) => Ok(Arc::new(MemoryStore::open(path)?)),
            _ => Err(ConfigError::NoStore),
        }
    }

    pub fn build_notifier(&self) -> Result<Arc<dyn Notifier>, ConfigError> {
        match (&self.email_user, &self.email_password) {
            (Some(user), Some(password)) => {
                log::info!("absence notices go out via {} as {}", self.smtp_host, user);
                Ok(Arc::new(Mailer::new(&self.smtp_host, self.smtp_port, user, password)?))
            }
            _ => {
                log::warn!("EMAIL_USER/EMAIL_PASSWORD not set; absence notices will only be logged");
                Ok(Arc::new(LogNotifier))
            }
        }
    }
}

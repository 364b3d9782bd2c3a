use thiserror::Error;

/// Failures talking to the tabular store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response (DNS, TLS, connection reset...)
    #[cfg(feature = "web")]
    #[error("store transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("store request failed ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("unknown sheet: {0}")]
    UnknownSheet(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot codec error: {0}")]
    Codec(String),
}

/// Request-level error taxonomy shared by the login, roster and marking flows.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("missing required fields: {0}")]
    MissingFields(String),

    /// Deliberately identical for unknown users and wrong passwords.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("roll number {0} not found")]
    RollNumberNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Notification failures. These never leave the dispatch task.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

pub type Result<T, E = AttendanceError> = std::result::Result<T, E>;

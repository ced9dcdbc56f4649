use serde_json::json;
use thiserror::Error;

/// Failures surfaced to callers of the gradebook.
///
/// Every variant has a stable wire code (see [`GradebookError::code`]); the
/// display text is sent to the client verbatim as the error message.
#[derive(Debug, Error)]
pub enum GradebookError {
    /// Missing, unknown, expired or revoked session token, or bad credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Unknown student or course id.
    #[error("{0}")]
    NotFound(String),

    /// Stage code outside E1/E2/E3.
    #[error("invalid stage: {0}")]
    InvalidStage(String),

    /// Score that is not a number in [0, 10].
    #[error("invalid score: {0}")]
    InvalidScore(String),

    /// Empty required text, malformed date, malformed params.
    #[error("{0}")]
    Validation(String),

    /// Duplicate (idType, identifier).
    #[error("{0}")]
    Conflict(String),

    #[error("select a workspace first")]
    NoWorkspace,

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GradebookError {
    pub fn code(&self) -> &'static str {
        match self {
            GradebookError::Unauthorized(_) => "unauthorized",
            GradebookError::NotFound(_) => "not_found",
            GradebookError::InvalidStage(_) => "invalid_stage",
            GradebookError::InvalidScore(_) => "invalid_score",
            GradebookError::Validation(_) => "bad_params",
            GradebookError::Conflict(_) => "conflict",
            GradebookError::NoWorkspace => "no_workspace",
            GradebookError::Db(_) => "db_error",
            GradebookError::Io(_) => "io_error",
        }
    }

    /// Error response envelope for request `id`.
    pub fn response(&self, id: &str) -> serde_json::Value {
        let details = match self {
            GradebookError::InvalidStage(stage) => Some(json!({ "stage": stage })),
            _ => None,
        };
        crate::ipc::err(id, self.code(), self.to_string(), details)
    }
}

pub type Result<T> = std::result::Result<T, GradebookError>;

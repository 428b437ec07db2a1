use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Server list unavailable: {0}")]
    FetchFailure(String),

    #[error("Invalid custom server URL: {0}")]
    InvalidCustomUrl(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Invalid selection state: {0}")]
    InvalidState(String),

    #[error("Selection superseded by a newer session")]
    Superseded,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the host should re-prompt the user instead of abandoning the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::InvalidCustomUrl(_) | AppError::UnknownRegion(_) | AppError::InvalidState(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

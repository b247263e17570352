use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("not allowed: {0}")]
    StateConflict(String),
    #[error("concurrent update: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    StateConflict,
    Conflict,
    NotFound,
    Store,
    Configuration,
    Io,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::StateConflict(_) => ErrorKind::StateConflict,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Store(_) => ErrorKind::Store,
            AppError::Configuration(_) => ErrorKind::Configuration,
            AppError::Io(_) => ErrorKind::Io,
        }
    }

    /// Rejections the caller caused, as opposed to failures of the backing store.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::StateConflict | ErrorKind::Conflict
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;

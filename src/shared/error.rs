use thiserror::Error;

use crate::system::window::shell::ShellError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O Error: {0}")]
    Io(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Shell Error: {0}")]
    Shell(#[from] ShellError),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Note not found: {0}")]
    NoteNotFound(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

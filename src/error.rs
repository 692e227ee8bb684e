//! Error types for querychat

use crate::session::ChatId;
use thiserror::Error;

/// The main error type for client-side operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// A chat id that is not in the collection
    #[error("Unknown chat: {0}")]
    UnknownChat(ChatId),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

//! Error taxonomy shared by every component.
//!
//! Components return these directly; only the batch orchestrator turns them
//! into recorded per-item failures.

use providers::ProviderError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad caller input: empty label set, missing file, unreadable image.
    #[error("invalid input: {0}")]
    Input(String),

    /// Embedding backend failure or a response that breaks the provider contract.
    #[error("model error: {0}")]
    Model(#[from] ProviderError),

    /// Vector store add/query failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn input(msg: impl Into<String>) -> Self {
        Error::Input(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Short category name used in logs and batch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Input(_) => "input",
            Error::Model(_) => "model",
            Error::Storage(_) => "storage",
            Error::Config(_) => "config",
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

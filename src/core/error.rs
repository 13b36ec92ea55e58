use crate::core::ItemId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Malformed descriptor for '{0}': {1}")]
    MalformedDescriptor(String, String),

    #[error("Item {0} not found")]
    ItemNotFound(ItemId),

    #[error("Invalid cell reference: {0}")]
    InvalidReference(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl CommandError {
    pub fn malformed(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::MalformedDescriptor(name.into(), reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for CommandError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CommandError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for CommandError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

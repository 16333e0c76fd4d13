//! Error types for TxVault

use thiserror::Error;
use std::io;

/// Result type alias for TxVault operations
pub type Result<T> = std::result::Result<T, TxVaultError>;

/// Errors that end an operation outside of the command protocol
#[derive(Error, Debug)]
pub enum TxVaultError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),
}

/// Failures raised by the store itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("ERR syntax error: Value should be enclosed in quotes")]
    InvalidValue,

    #[error("ERR value is not an integer")]
    NotAnInteger,

    #[error("ERR increment or decrement would overflow")]
    Overflow,
}

/// Recoverable command failures.
///
/// The `Display` output of each variant is the exact reply line sent back
/// to the client; the connection keeps running afterwards.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0}")]
    Usage(&'static str),

    #[error("ERR invalid increment")]
    InvalidIncrement,

    #[error("ERR No transaction in progress")]
    NoTransaction,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

//! Error types for the loyalty ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range input, detected before any store access
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate account creation
    #[error("loyalty account with customer ID '{0}' already exists")]
    AlreadyExists(String),

    /// Operation on a non-existent account
    #[error("loyalty account with customer ID '{0}' does not exist")]
    NotFound(String),

    /// Balance guard failure
    #[error("insufficient balance: current balance is {balance}, requested amount is {requested}")]
    InsufficientBalance {
        /// Balance at the time of the check
        balance: i64,
        /// Amount the caller asked for
        requested: i64,
    },

    /// Caller lacks the required role
    #[error("access denied: {0}")]
    Authorization(String),

    /// Value could not be encoded/decoded to/from the store's wire form
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying read/write/history failure
    #[error("Store error: {0}")]
    Store(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short stable label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::AlreadyExists(_) => "already_exists",
            Error::NotFound(_) => "not_found",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::Authorization(_) => "authorization",
            Error::Serialization(_) => "serialization",
            Error::Store(_) => "store",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Store(err.to_string())
    }
}

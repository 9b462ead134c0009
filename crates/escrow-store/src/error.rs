use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none, or the row belongs
    /// to another user.
    #[error("Record not found")]
    NotFound,

    /// Another account already uses this (normalized) email.
    #[error("Email already in use")]
    DuplicateEmail,

    /// A balance adjustment would take the wallet below zero.
    #[error("Insufficient wallet balance: balance {balance_cents}, delta {delta_cents}")]
    InsufficientFunds { balance_cents: i64, delta_cents: i64 },

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Collapse `QueryReturnedNoRows` into [`StoreError::NotFound`].
pub(crate) fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

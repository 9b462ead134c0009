use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Malformed session token")]
    Malformed,

    #[error("Invalid session signature")]
    BadSignature,

    #[error("Session token expired")]
    Expired,

    #[error("Invalid signing key")]
    InvalidKey,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("Amount is not a finite number")]
    NotFinite,

    #[error("Amount is out of range")]
    OutOfRange,
}

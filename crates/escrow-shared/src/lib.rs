//! # escrow-shared
//!
//! Pure helpers shared by the store and the HTTP server: display references,
//! cent/dollar conversion and formatting, and signed session tokens.

pub mod constants;
pub mod currency;
pub mod error;
pub mod ids;
pub mod session;

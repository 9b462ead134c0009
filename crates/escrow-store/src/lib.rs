//! # escrow-store
//!
//! Durable storage for the escrow dashboard, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every domain model.
//! Each mutating helper runs in its own `BEGIN IMMEDIATE` transaction so that
//! concurrent writers, in this process or another, serialize on the database
//! file rather than on in-memory locks.

pub mod database;
pub mod disputes;
pub mod escrows;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod sequences;
pub mod timeline;
pub mod users;
pub mod verification;
pub mod wallet;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
pub use sequences::SequenceDomain;

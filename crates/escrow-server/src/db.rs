//! Async access to the synchronous store.
//!
//! `rusqlite` is blocking, so every call is moved onto tokio's blocking pool.
//! The mutex only guards this process's connection; writers in other
//! processes are serialized by SQLite itself through `BEGIN IMMEDIATE`.
//!
//! A panic inside a closure poisons the mutex, but every store write runs in
//! a transaction that rolls back on drop, so the connection is still
//! consistent and later calls reuse it.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use escrow_store::Database;

use crate::error::ApiError;

#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open(path: &Path) -> Result<Self, ApiError> {
        Ok(Self::new(Database::open_at(path)?))
    }

    /// Run `f` against the database on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Database) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut db = inner.lock().unwrap_or_else(|poisoned| {
                tracing::warn!("Recovering database handle after a panicked task");
                PoisonError::into_inner(poisoned)
            });
            f(&mut db)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("database task failed: {e}")))?
    }
}

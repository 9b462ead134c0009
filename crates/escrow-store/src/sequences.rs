//! Durable per-domain counters.
//!
//! A row stores the next value to hand out. Allocation is a single
//! upsert-and-return statement, so the counter is advanced in the same write
//! that produces the value: a caller that never uses its number cannot cause
//! it to be handed out again.

use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::Result;

/// Counter domains used by the application, with their first values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceDomain {
    Escrow,
    Dispute,
    Timeline,
    Notification,
    User,
}

impl SequenceDomain {
    pub fn name(self) -> &'static str {
        match self {
            Self::Escrow => "escrow",
            Self::Dispute => "dispute",
            Self::Timeline => "timeline",
            Self::Notification => "notification",
            Self::User => "user",
        }
    }

    pub fn default_start(self) -> i64 {
        match self {
            Self::Escrow => 650,
            Self::User => 1000,
            Self::Dispute | Self::Timeline | Self::Notification => 1,
        }
    }
}

/// Allocate the next value for `domain` on an open connection or transaction.
///
/// Use this to nest allocation inside a larger transaction; the value is only
/// durable once that transaction commits.
pub(crate) fn next_value(conn: &Connection, domain: &str, default_start: i64) -> Result<i64> {
    let value = conn.query_row(
        "INSERT INTO sequences (id, current_value) VALUES (?1, ?2 + 1)
         ON CONFLICT(id) DO UPDATE SET current_value = current_value + 1
         RETURNING current_value - 1",
        params![domain, default_start],
        |row| row.get(0),
    )?;
    Ok(value)
}

pub(crate) fn next_in(conn: &Connection, domain: SequenceDomain) -> Result<i64> {
    next_value(conn, domain.name(), domain.default_start())
}

impl Database {
    /// Allocate the next value for an arbitrary domain in its own transaction.
    pub fn allocate_sequence(&mut self, domain: &str, default_start: i64) -> Result<i64> {
        let tx = self.immediate()?;
        let value = next_value(&tx, domain, default_start)?;
        tx.commit()?;

        tracing::debug!(domain, value, "sequence allocated");
        Ok(value)
    }

    pub fn allocate(&mut self, domain: SequenceDomain) -> Result<i64> {
        self.allocate_sequence(domain.name(), domain.default_start())
    }

    /// Stored "next value" for a domain, if the counter exists yet.
    pub fn peek_sequence(&self, domain: &str) -> Result<Option<i64>> {
        let value = self
            .conn()
            .query_row(
                "SELECT current_value FROM sequences WHERE id = ?1",
                params![domain],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

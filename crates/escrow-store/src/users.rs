//! Accounts and wallet balances.

use rusqlite::{params, Connection, OptionalExtension};

use escrow_shared::ids;

use crate::database::{db_now, parse_db_time, to_db_time, Database};
use crate::error::{not_found, Result, StoreError};
use crate::models::{NewUser, User};
use crate::sequences::{next_in, SequenceDomain};

const USER_COLUMNS: &str = "id, email, name, password_hash, wallet_balance_cents, \
                            email_verified, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new account under the next `usr_<n>` id.
    ///
    /// The uniqueness check, the id allocation and the insert share one
    /// transaction, so two signups racing on the same email cannot both win.
    pub fn create_user(&mut self, new: &NewUser) -> Result<User> {
        let tx = self.immediate()?;

        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![new.email],
            |row| row.get(0),
        )?;
        if taken {
            return Err(StoreError::DuplicateEmail);
        }

        let id = ids::user_id(next_in(&tx, SequenceDomain::User)?);
        let now = to_db_time(db_now());

        insert_user_row(&tx, &id, new, &now)?;

        let user = fetch_user(&tx, &id)?;
        tx.commit()?;

        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user(&self, id: &str) -> Result<User> {
        fetch_user(self.conn(), id)
    }

    /// Look up by an already-normalized email.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Wallet
    // ------------------------------------------------------------------

    /// Add `delta_cents` (negative to debit) to the user's balance.
    ///
    /// Fails with [`StoreError::InsufficientFunds`] and leaves the balance
    /// unchanged if the result would be negative.
    pub fn adjust_wallet_balance(&mut self, user_id: &str, delta_cents: i64) -> Result<User> {
        let tx = self.immediate()?;
        let user = adjust_balance_in(&tx, user_id, delta_cents)?;
        tx.commit()?;
        Ok(user)
    }
}

/// Read-modify-write of a wallet balance on an open transaction.
pub(crate) fn adjust_balance_in(conn: &Connection, user_id: &str, delta_cents: i64) -> Result<User> {
    let current = fetch_user(conn, user_id)?;

    let next = current
        .wallet_balance_cents
        .checked_add(delta_cents)
        .filter(|balance| *balance >= 0)
        .ok_or(StoreError::InsufficientFunds {
            balance_cents: current.wallet_balance_cents,
            delta_cents,
        })?;

    conn.execute(
        "UPDATE users SET wallet_balance_cents = ?1, updated_at = ?2 WHERE id = ?3",
        params![next, to_db_time(db_now()), user_id],
    )?;

    tracing::debug!(
        user_id,
        delta_cents,
        balance_cents = next,
        "wallet balance adjusted"
    );

    fetch_user(conn, user_id)
}

/// The UNIQUE index on `users.email` backs up the pre-check above.
fn insert_user_row(conn: &Connection, id: &str, new: &NewUser, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, name, password_hash, wallet_balance_cents,
                            email_verified, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?6)",
        params![id, new.email, new.name, new.password_hash, new.email_verified, now],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, Some(ref msg))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("users.email") =>
        {
            StoreError::DuplicateEmail
        }
        other => StoreError::Sqlite(other),
    })?;
    Ok(())
}

pub(crate) fn fetch_user(conn: &Connection, id: &str) -> Result<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        row_to_user,
    )
    .map_err(not_found)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        wallet_balance_cents: row.get(4)?,
        email_verified: row.get(5)?,
        created_at: parse_db_time(6, &created_str)?,
        updated_at: parse_db_time(7, &updated_str)?,
    })
}

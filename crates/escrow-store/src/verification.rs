//! Email verification token rows.
//!
//! Only code hashes are stored. Issuing a token retires every outstanding
//! token for the same user, and consuming one flips the account to verified
//! in the same transaction.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::{db_now, parse_db_time, to_db_time, Database};
use crate::error::{Result, StoreError};
use crate::models::{EmailVerificationToken, User};
use crate::users::fetch_user;

impl Database {
    /// Mark all unconsumed tokens of `user_id` consumed and insert a fresh one.
    pub fn replace_verification_token(
        &mut self,
        user_id: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<EmailVerificationToken> {
        let tx = self.immediate()?;
        let now = db_now();

        let retired = tx.execute(
            "UPDATE email_verification_tokens
             SET consumed_at = ?1
             WHERE user_id = ?2 AND consumed_at IS NULL",
            params![to_db_time(now), user_id],
        )?;

        let token = EmailVerificationToken {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            code_hash: code_hash.to_string(),
            expires_at: expires_at.trunc_subsecs(6),
            consumed_at: None,
            created_at: now,
        };

        tx.execute(
            "INSERT INTO email_verification_tokens
                 (id, user_id, code_hash, expires_at, consumed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![
                token.id.to_string(),
                token.user_id,
                token.code_hash,
                to_db_time(token.expires_at),
                to_db_time(token.created_at),
            ],
        )?;

        tx.commit()?;

        tracing::debug!(user_id, retired, "verification token issued");
        Ok(token)
    }

    /// Unconsumed tokens that have not expired at `now`, newest first.
    pub fn active_verification_tokens(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<EmailVerificationToken>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, code_hash, expires_at, consumed_at, created_at
             FROM email_verification_tokens
             WHERE user_id = ?1 AND consumed_at IS NULL AND expires_at > ?2
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![user_id, to_db_time(now)], row_to_token)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Consume a token and mark its user verified.
    ///
    /// The update only matches a token that is still unconsumed and
    /// unexpired, so of two concurrent confirmations at most one succeeds;
    /// the loser gets [`StoreError::NotFound`].
    pub fn consume_verification_token(&mut self, token_id: Uuid, user_id: &str) -> Result<User> {
        let tx = self.immediate()?;
        let now = to_db_time(db_now());

        let consumed = tx.execute(
            "UPDATE email_verification_tokens
             SET consumed_at = ?1
             WHERE id = ?2 AND user_id = ?3 AND consumed_at IS NULL AND expires_at > ?1",
            params![now, token_id.to_string(), user_id],
        )?;
        if consumed == 0 {
            return Err(StoreError::NotFound);
        }

        tx.execute(
            "UPDATE users SET email_verified = 1, updated_at = ?1 WHERE id = ?2",
            params![now, user_id],
        )?;

        let user = fetch_user(&tx, user_id)?;
        tx.commit()?;

        tracing::info!(user_id, "email verified");
        Ok(user)
    }
}

fn row_to_token(row: &rusqlite::Row<'_>) -> rusqlite::Result<EmailVerificationToken> {
    let id_str: String = row.get(0)?;
    let expires_str: String = row.get(3)?;
    let consumed_str: Option<String> = row.get(4)?;
    let created_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(EmailVerificationToken {
        id,
        user_id: row.get(1)?,
        code_hash: row.get(2)?,
        expires_at: parse_db_time(3, &expires_str)?,
        consumed_at: consumed_str
            .map(|s| parse_db_time(4, &s))
            .transpose()?,
        created_at: parse_db_time(5, &created_str)?,
    })
}

//! Escrow rows and their owner-scoped transitions.
//!
//! Lookups by reference always filter on the owner as well, so a reference
//! that exists but belongs to someone else is indistinguishable from one that
//! does not exist.

use rusqlite::{params, Connection};

use escrow_shared::ids;

use crate::database::{db_now, parse_db_time, to_db_time, Database};
use crate::error::{not_found, Result};
use crate::models::{Escrow, EscrowUpdate, NewEscrow, NewTimelineEvent, TimelineEvent};
use crate::sequences::{next_in, SequenceDomain};
use crate::timeline::insert_timeline_event;

const ESCROW_COLUMNS: &str = "id, reference, owner_id, title, counterpart, amount_cents, stage, \
                              due_description, status, counterparty_approved, category, \
                              description, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert an escrow under the next `PO-<n>` reference together with its
    /// "drafted" timeline event. Both sequence allocations and both rows
    /// commit or roll back as one.
    pub fn create_escrow(
        &mut self,
        new: &NewEscrow,
        drafted: &NewTimelineEvent,
    ) -> Result<(Escrow, TimelineEvent)> {
        let tx = self.immediate()?;

        let reference = ids::escrow_reference(next_in(&tx, SequenceDomain::Escrow)?);
        let now = to_db_time(db_now());

        tx.execute(
            "INSERT INTO escrows (reference, owner_id, title, counterpart, amount_cents, stage,
                                  due_description, status, counterparty_approved, category,
                                  description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                reference,
                new.owner_id,
                new.title,
                new.counterpart,
                new.amount_cents,
                new.stage,
                new.due_description,
                new.status,
                new.counterparty_approved,
                new.category,
                new.description,
                now,
            ],
        )?;

        let escrow = fetch_escrow(&tx, &new.owner_id, &reference)?;
        let event = insert_timeline_event(&tx, &new.owner_id, drafted)?;
        tx.commit()?;

        tracing::info!(
            reference = %escrow.reference,
            owner_id = %escrow.owner_id,
            amount_cents = escrow.amount_cents,
            "escrow created"
        );
        Ok((escrow, event))
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_escrow_for_owner(&self, owner_id: &str, reference: &str) -> Result<Escrow> {
        fetch_escrow(self.conn(), owner_id, reference)
    }

    /// All escrows of a user, by status label then most recently updated.
    pub fn list_escrows_for_owner(&self, owner_id: &str) -> Result<Vec<Escrow>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ESCROW_COLUMNS}
             FROM escrows
             WHERE owner_id = ?1
             ORDER BY status ASC, updated_at DESC, id DESC"
        ))?;

        let rows = stmt.query_map(params![owner_id], row_to_escrow)?;

        let mut escrows = Vec::new();
        for row in rows {
            escrows.push(row?);
        }
        Ok(escrows)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply a transition to an escrow the caller owns.
    ///
    /// `event` sees the updated row and may return a timeline entry, which is
    /// written in the same transaction as the update.
    pub fn update_escrow_for_owner<F>(
        &mut self,
        owner_id: &str,
        reference: &str,
        update: &EscrowUpdate,
        event: F,
    ) -> Result<Escrow>
    where
        F: FnOnce(&Escrow) -> Option<NewTimelineEvent>,
    {
        let tx = self.immediate()?;

        let current = fetch_escrow(&tx, owner_id, reference)?;

        tx.execute(
            "UPDATE escrows
             SET status = COALESCE(?1, status),
                 counterparty_approved = COALESCE(?2, counterparty_approved),
                 stage = COALESCE(?3, stage),
                 due_description = COALESCE(?4, due_description),
                 updated_at = ?5
             WHERE id = ?6",
            params![
                update.status,
                update.counterparty_approved,
                update.stage,
                update.due_description,
                to_db_time(db_now()),
                current.id,
            ],
        )?;

        let updated = fetch_escrow(&tx, owner_id, reference)?;
        if let Some(event) = event(&updated) {
            insert_timeline_event(&tx, owner_id, &event)?;
        }
        tx.commit()?;

        tracing::debug!(
            reference,
            status = %updated.status,
            counterparty_approved = updated.counterparty_approved,
            "escrow updated"
        );
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fetch_escrow(conn: &Connection, owner_id: &str, reference: &str) -> Result<Escrow> {
    conn.query_row(
        &format!("SELECT {ESCROW_COLUMNS} FROM escrows WHERE reference = ?1 AND owner_id = ?2"),
        params![reference, owner_id],
        row_to_escrow,
    )
    .map_err(not_found)
}

fn row_to_escrow(row: &rusqlite::Row<'_>) -> rusqlite::Result<Escrow> {
    let created_str: String = row.get(12)?;
    let updated_str: String = row.get(13)?;

    Ok(Escrow {
        id: row.get(0)?,
        reference: row.get(1)?,
        owner_id: row.get(2)?,
        title: row.get(3)?,
        counterpart: row.get(4)?,
        amount_cents: row.get(5)?,
        stage: row.get(6)?,
        due_description: row.get(7)?,
        status: row.get(8)?,
        counterparty_approved: row.get(9)?,
        category: row.get(10)?,
        description: row.get(11)?,
        created_at: parse_db_time(12, &created_str)?,
        updated_at: parse_db_time(13, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{EscrowStatus, NewUser};

    fn setup() -> (tempfile::TempDir, Database, String, String) {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_at(&dir.path().join("escrows.db")).unwrap();
        let mut user = |email: &str| {
            db.create_user(&NewUser {
                name: "Test".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                email_verified: true,
            })
            .unwrap()
            .id
        };
        let owner = user("owner@example.com");
        let other = user("other@example.com");
        (dir, db, owner, other)
    }

    fn draft(owner_id: &str, counterpart: &str, amount_cents: i64) -> NewEscrow {
        NewEscrow {
            owner_id: owner_id.to_string(),
            title: "Website build".to_string(),
            counterpart: counterpart.to_string(),
            amount_cents,
            stage: "Initial milestone".to_string(),
            due_description: "Awaiting approval".to_string(),
            status: EscrowStatus::Warning,
            counterparty_approved: false,
            category: None,
            description: Some("Phase one".to_string()),
        }
    }

    fn drafted_event(counterpart: &str) -> NewTimelineEvent {
        NewTimelineEvent {
            title: format!("{counterpart} escrow drafted"),
            meta: "Website build created".to_string(),
            time_label: "Just now".to_string(),
            status: "attention".to_string(),
        }
    }

    #[test]
    fn create_allocates_reference_and_timeline_together() {
        let (_dir, mut db, owner, _) = setup();

        let (escrow, event) = db
            .create_escrow(&draft(&owner, "Acme", 15_000), &drafted_event("Acme"))
            .unwrap();

        assert_eq!(escrow.reference, "PO-0650");
        assert_eq!(escrow.amount_cents, 15_000);
        assert_eq!(escrow.status, EscrowStatus::Warning);
        assert_eq!(escrow.description.as_deref(), Some("Phase one"));
        assert_eq!(event.id, "tl-1");
        assert_eq!(db.recent_timeline_events(&owner, 3).unwrap(), vec![event]);

        let (second, _) = db
            .create_escrow(&draft(&owner, "Globex", 100), &drafted_event("Globex"))
            .unwrap();
        assert_eq!(second.reference, "PO-0651");
    }

    #[test]
    fn failed_create_rolls_back_sequence() {
        let (_dir, mut db, owner, _) = setup();

        // amount_cents violates the CHECK constraint
        assert!(db
            .create_escrow(&draft(&owner, "Acme", 0), &drafted_event("Acme"))
            .is_err());

        assert_eq!(db.peek_sequence("escrow").unwrap(), None);
        assert!(db.recent_timeline_events(&owner, 3).unwrap().is_empty());
    }

    #[test]
    fn update_is_scoped_to_owner() {
        let (_dir, mut db, owner, other) = setup();
        let (escrow, _) = db
            .create_escrow(&draft(&owner, "Acme", 15_000), &drafted_event("Acme"))
            .unwrap();

        let release = EscrowUpdate {
            status: Some(EscrowStatus::Success),
            counterparty_approved: Some(true),
            ..Default::default()
        };

        let err = db
            .update_escrow_for_owner(&other, &escrow.reference, &release, |_| None)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert!(matches!(
            db.get_escrow_for_owner(&other, &escrow.reference),
            Err(StoreError::NotFound)
        ));

        let updated = db
            .update_escrow_for_owner(&owner, &escrow.reference, &release, |_| None)
            .unwrap();
        assert_eq!(updated.status, EscrowStatus::Success);
        assert!(updated.counterparty_approved);
        // untouched columns survive
        assert_eq!(updated.stage, "Initial milestone");
        assert!(updated.updated_at >= escrow.updated_at);
    }

    #[test]
    fn update_with_event_appends_timeline() {
        let (_dir, mut db, owner, _) = setup();
        let (escrow, _) = db
            .create_escrow(&draft(&owner, "Acme", 15_000), &drafted_event("Acme"))
            .unwrap();

        db.update_escrow_for_owner(&owner, &escrow.reference, &EscrowUpdate::default(), |e| {
            Some(NewTimelineEvent {
                title: format!("Release approved for {}", e.reference),
                meta: format!("{} milestone queued", e.counterpart),
                time_label: "Just now".to_string(),
                status: "released".to_string(),
            })
        })
        .unwrap();

        let events = db.recent_timeline_events(&owner, 3).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Release approved for PO-0650");
        assert_eq!(events[0].meta, "Acme milestone queued");
    }

    #[test]
    fn list_only_returns_own_escrows() {
        let (_dir, mut db, owner, other) = setup();
        db.create_escrow(&draft(&owner, "Acme", 100), &drafted_event("Acme"))
            .unwrap();
        db.create_escrow(&draft(&other, "Globex", 200), &drafted_event("Globex"))
            .unwrap();

        let mine = db.list_escrows_for_owner(&owner).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].counterpart, "Acme");
    }
}

use rusqlite::{params, Connection};

use escrow_shared::ids;

use crate::database::{db_now, parse_db_time, to_db_time, Database};
use crate::error::{not_found, Result};
use crate::models::{Dispute, DisputeStatus, DisputeUpdate, NewDispute};
use crate::sequences::{next_in, SequenceDomain};

const DISPUTE_COLUMNS: &str = "id, reference, owner_id, title, owner_team, amount_cents, \
                               updated_label, priority, status, workspace_launched, \
                               created_at, updated_at";

impl Database {
    /// Open a dispute under the next `DSP-<n>` reference.
    ///
    /// Disputes are raised out of band (seeding, back office); the dashboard
    /// only launches and resolves them.
    pub fn create_dispute(&mut self, new: &NewDispute) -> Result<Dispute> {
        let tx = self.immediate()?;

        let reference = ids::dispute_reference(next_in(&tx, SequenceDomain::Dispute)?);
        let now = to_db_time(db_now());

        tx.execute(
            "INSERT INTO disputes (reference, owner_id, title, owner_team, amount_cents,
                                   updated_label, priority, status, workspace_launched,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)",
            params![
                reference,
                new.owner_id,
                new.title,
                new.owner_team,
                new.amount_cents,
                new.updated_label,
                new.priority,
                DisputeStatus::Open,
                now,
            ],
        )?;

        let dispute = fetch_dispute(&tx, &new.owner_id, &reference)?;
        tx.commit()?;

        tracing::info!(reference = %dispute.reference, owner_id = %dispute.owner_id, "dispute opened");
        Ok(dispute)
    }

    pub fn get_dispute_for_owner(&self, owner_id: &str, reference: &str) -> Result<Dispute> {
        fetch_dispute(self.conn(), owner_id, reference)
    }

    pub fn list_open_disputes(&self, owner_id: &str) -> Result<Vec<Dispute>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {DISPUTE_COLUMNS}
             FROM disputes
             WHERE owner_id = ?1 AND status = ?2
             ORDER BY updated_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![owner_id, DisputeStatus::Open], row_to_dispute)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Apply a launch/resolve transition to a dispute the caller owns.
    pub fn update_dispute_for_owner(
        &mut self,
        owner_id: &str,
        reference: &str,
        update: &DisputeUpdate,
    ) -> Result<Dispute> {
        let tx = self.immediate()?;

        let current = fetch_dispute(&tx, owner_id, reference)?;

        tx.execute(
            "UPDATE disputes
             SET status = COALESCE(?1, status),
                 workspace_launched = COALESCE(?2, workspace_launched),
                 updated_label = COALESCE(?3, updated_label),
                 updated_at = ?4
             WHERE id = ?5",
            params![
                update.status,
                update.workspace_launched,
                update.updated_label,
                to_db_time(db_now()),
                current.id,
            ],
        )?;

        let updated = fetch_dispute(&tx, owner_id, reference)?;
        tx.commit()?;

        tracing::debug!(reference, status = %updated.status, "dispute updated");
        Ok(updated)
    }
}

fn fetch_dispute(conn: &Connection, owner_id: &str, reference: &str) -> Result<Dispute> {
    conn.query_row(
        &format!("SELECT {DISPUTE_COLUMNS} FROM disputes WHERE reference = ?1 AND owner_id = ?2"),
        params![reference, owner_id],
        row_to_dispute,
    )
    .map_err(not_found)
}

fn row_to_dispute(row: &rusqlite::Row<'_>) -> rusqlite::Result<Dispute> {
    let created_str: String = row.get(10)?;
    let updated_str: String = row.get(11)?;

    Ok(Dispute {
        id: row.get(0)?,
        reference: row.get(1)?,
        owner_id: row.get(2)?,
        title: row.get(3)?,
        owner_team: row.get(4)?,
        amount_cents: row.get(5)?,
        updated_label: row.get(6)?,
        priority: row.get(7)?,
        status: row.get(8)?,
        workspace_launched: row.get(9)?,
        created_at: parse_db_time(10, &created_str)?,
        updated_at: parse_db_time(11, &updated_str)?,
    })
}

use rusqlite::{params, Connection};

use escrow_shared::ids;

use crate::database::{db_now, parse_db_time, to_db_time, Database};
use crate::error::Result;
use crate::models::{NewTimelineEvent, TimelineEvent};
use crate::sequences::{next_in, SequenceDomain};

impl Database {
    pub fn add_timeline_event(
        &mut self,
        user_id: &str,
        event: &NewTimelineEvent,
    ) -> Result<TimelineEvent> {
        let tx = self.immediate()?;
        let recorded = insert_timeline_event(&tx, user_id, event)?;
        tx.commit()?;
        Ok(recorded)
    }

    /// Most recent events first.
    pub fn recent_timeline_events(&self, user_id: &str, limit: u32) -> Result<Vec<TimelineEvent>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, title, meta, time_label, status, created_at
             FROM timeline_events
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![user_id, limit], row_to_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

/// Append an event under the next `tl-<n>` id on an open transaction.
pub(crate) fn insert_timeline_event(
    conn: &Connection,
    user_id: &str,
    event: &NewTimelineEvent,
) -> Result<TimelineEvent> {
    let id = ids::timeline_id(next_in(conn, SequenceDomain::Timeline)?);
    let created_at = db_now();

    conn.execute(
        "INSERT INTO timeline_events (id, user_id, title, meta, time_label, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            user_id,
            event.title,
            event.meta,
            event.time_label,
            event.status,
            to_db_time(created_at),
        ],
    )?;

    Ok(TimelineEvent {
        id,
        user_id: user_id.to_string(),
        title: event.title.clone(),
        meta: event.meta.clone(),
        time_label: event.time_label.clone(),
        status: event.status.clone(),
        created_at,
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimelineEvent> {
    let created_str: String = row.get(6)?;

    Ok(TimelineEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        meta: row.get(3)?,
        time_label: row.get(4)?,
        status: row.get(5)?,
        created_at: parse_db_time(6, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;

    fn user(db: &mut Database, email: &str) -> String {
        db.create_user(&NewUser {
            name: "Owner".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            email_verified: true,
        })
        .unwrap()
        .id
    }

    fn event(title: &str) -> NewTimelineEvent {
        NewTimelineEvent {
            title: title.to_string(),
            meta: "Ops".to_string(),
            time_label: "Just now".to_string(),
            status: "info".to_string(),
        }
    }

    #[test]
    fn test_recent_events_newest_first_and_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_at(&dir.path().join("timeline.db")).unwrap();

        let owner = user(&mut db, "owner@example.com");
        let other = user(&mut db, "other@example.com");

        let first = db.add_timeline_event(&owner, &event("first")).unwrap();
        db.add_timeline_event(&owner, &event("second")).unwrap();
        db.add_timeline_event(&other, &event("other user")).unwrap();
        db.add_timeline_event(&owner, &event("third")).unwrap();

        assert_eq!(first.id, "tl-1");

        let recent = db.recent_timeline_events(&owner, 2).unwrap();
        let titles: Vec<&str> = recent.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["third", "second"]);
        assert_eq!(recent[0].id, "tl-4");
    }
}

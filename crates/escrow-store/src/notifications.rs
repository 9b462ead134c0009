use rusqlite::{params, Connection};

use escrow_shared::ids;

use crate::database::{db_now, parse_db_time, to_db_time, Database};
use crate::error::{Result, StoreError};
use crate::models::{NewNotification, Notification};
use crate::sequences::{next_in, SequenceDomain};

impl Database {
    pub fn insert_notification(&mut self, new: &NewNotification) -> Result<Notification> {
        let tx = self.immediate()?;
        let notification = insert_notification_in(&tx, new)?;
        tx.commit()?;
        Ok(notification)
    }

    /// Newest first.
    pub fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, label, detail, meta, tx_id, created_at
             FROM notifications
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_notification)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

/// Append a notification under the next `notif-<n>` id on an open transaction.
pub(crate) fn insert_notification_in(
    conn: &Connection,
    new: &NewNotification,
) -> Result<Notification> {
    let id = ids::notification_id(next_in(conn, SequenceDomain::Notification)?);
    let created_at = db_now();

    conn.execute(
        "INSERT INTO notifications (id, user_id, label, detail, meta, tx_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            new.user_id,
            new.label,
            new.detail,
            new.meta,
            new.tx_id,
            to_db_time(created_at),
        ],
    )?;

    Ok(Notification {
        id,
        user_id: new.user_id.clone(),
        label: new.label.clone(),
        detail: new.detail.clone(),
        meta: new.meta.clone(),
        tx_id: new.tx_id,
        created_at,
    })
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let created_str: String = row.get(6)?;

    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        label: row.get(2)?,
        detail: row.get(3)?,
        meta: row.get(4)?,
        tx_id: row.get(5)?,
        created_at: parse_db_time(6, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, TransactionType};

    #[test]
    fn test_notifications_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_at(&dir.path().join("notifications.db")).unwrap();
        let user = db
            .create_user(&NewUser {
                name: "Owner".to_string(),
                email: "owner@example.com".to_string(),
                password_hash: "hash".to_string(),
                email_verified: true,
            })
            .unwrap();
        let movement = db
            .record_wallet_movement(&user.id, 500, TransactionType::Topup, |user, tx| {
                NewNotification {
                    user_id: user.id.clone(),
                    label: "Wallet top-up".to_string(),
                    detail: "$5.00 added".to_string(),
                    meta: "Balance $5.00".to_string(),
                    tx_id: Some(tx.id),
                }
            })
            .unwrap();
        let tx_id = movement.transaction.id;

        for (label, tx_id) in [("Escrow funded", Some(tx_id)), ("Dispute opened", None)] {
            db.insert_notification(&NewNotification {
                user_id: user.id.clone(),
                label: label.to_string(),
                detail: "detail".to_string(),
                meta: "meta".to_string(),
                tx_id,
            })
            .unwrap();
        }

        let listed = db.list_notifications(&user.id).unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, "notif-03");
        assert_eq!(listed[0].tx_id, None);
        assert_eq!(listed[1].label, "Escrow funded");
        assert_eq!(listed[1].tx_id, Some(tx_id));
        assert_eq!(listed[2].label, "Wallet top-up");

        assert!(db.list_notifications("usr_1001").unwrap().is_empty());
    }
}

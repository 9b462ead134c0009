//! Wallet ledger: balance movements recorded with their transaction row.

use rusqlite::{params, Connection};

use crate::database::{db_now, parse_db_time, to_db_time, Database};
use crate::error::{Result, StoreError};
use crate::models::{NewNotification, TransactionType, User, WalletMovement, WalletTransaction};
use crate::notifications::insert_notification_in;
use crate::users::adjust_balance_in;

impl Database {
    /// Move money in or out of a wallet and append the ledger entry and a
    /// notification for it, all in one transaction.
    ///
    /// `amount_cents` is signed (credit positive, debit negative) and is
    /// stored as given. `notice` builds the notification from the updated
    /// account and the recorded transaction.
    pub fn record_wallet_movement<F>(
        &mut self,
        user_id: &str,
        amount_cents: i64,
        kind: TransactionType,
        notice: F,
    ) -> Result<WalletMovement>
    where
        F: FnOnce(&User, &WalletTransaction) -> NewNotification,
    {
        let tx = self.immediate()?;

        let user = adjust_balance_in(&tx, user_id, amount_cents)?;
        let transaction = insert_transaction(&tx, user_id, amount_cents, kind)?;
        let notification = insert_notification_in(&tx, &notice(&user, &transaction))?;

        tx.commit()?;

        tracing::info!(
            user_id,
            tx_id = transaction.id,
            kind = %kind,
            amount_cents,
            balance_cents = user.wallet_balance_cents,
            "wallet movement recorded"
        );

        Ok(WalletMovement {
            user,
            transaction,
            notification,
        })
    }

    /// Most recent ledger entries first.
    pub fn list_wallet_transactions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<WalletTransaction>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, amount_cents, type, created_at
             FROM wallet_transactions
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit], row_to_transaction)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn insert_transaction(
    conn: &Connection,
    user_id: &str,
    amount_cents: i64,
    kind: TransactionType,
) -> Result<WalletTransaction> {
    let created_at = db_now();

    conn.execute(
        "INSERT INTO wallet_transactions (user_id, amount_cents, type, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, amount_cents, kind, to_db_time(created_at)],
    )?;

    Ok(WalletTransaction {
        id: conn.last_insert_rowid(),
        user_id: user_id.to_string(),
        amount_cents,
        kind,
        created_at,
    })
}

fn row_to_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<WalletTransaction> {
    let created_str: String = row.get(4)?;

    Ok(WalletTransaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount_cents: row.get(2)?,
        kind: row.get(3)?,
        created_at: parse_db_time(4, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;

    fn setup() -> (tempfile::TempDir, Database, String) {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_at(&dir.path().join("wallet.db")).unwrap();
        let user = db
            .create_user(&NewUser {
                name: "Owner".to_string(),
                email: "owner@example.com".to_string(),
                password_hash: "hash".to_string(),
                email_verified: true,
            })
            .unwrap();
        (dir, db, user.id)
    }

    fn notice(user: &User, tx: &WalletTransaction) -> NewNotification {
        NewNotification {
            user_id: user.id.clone(),
            label: tx.kind.to_string(),
            detail: format!("{} cents", tx.amount_cents),
            meta: format!("balance {}", user.wallet_balance_cents),
            tx_id: Some(tx.id),
        }
    }

    #[test]
    fn movements_are_signed_and_linked() {
        let (_dir, mut db, user_id) = setup();

        let topup = db
            .record_wallet_movement(&user_id, 2_500, TransactionType::Topup, notice)
            .unwrap();
        assert_eq!(topup.user.wallet_balance_cents, 2_500);
        assert!(topup.transaction.is_credit());
        assert_eq!(topup.notification.id, "notif-01");
        assert_eq!(topup.notification.tx_id, Some(topup.transaction.id));

        let withdraw = db
            .record_wallet_movement(&user_id, -1_000, TransactionType::Withdraw, notice)
            .unwrap();
        assert_eq!(withdraw.user.wallet_balance_cents, 1_500);
        assert_eq!(withdraw.transaction.amount_cents, -1_000);
        assert!(!withdraw.transaction.is_credit());

        let ledger = db.list_wallet_transactions(&user_id, 10).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].kind, TransactionType::Withdraw);
        assert_eq!(ledger[1].kind, TransactionType::Topup);

        let notifications = db.list_notifications(&user_id).unwrap();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].id, "notif-02");
    }

    #[test]
    fn overdraft_writes_nothing() {
        let (_dir, mut db, user_id) = setup();
        db.record_wallet_movement(&user_id, 1_000, TransactionType::Topup, notice)
            .unwrap();

        let err = db
            .record_wallet_movement(&user_id, -1_001, TransactionType::Withdraw, notice)
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { .. }));

        assert_eq!(db.get_user(&user_id).unwrap().wallet_balance_cents, 1_000);
        assert_eq!(db.list_wallet_transactions(&user_id, 10).unwrap().len(), 1);
        assert_eq!(db.list_notifications(&user_id).unwrap().len(), 1);
    }
}

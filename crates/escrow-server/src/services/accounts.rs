//! Accounts, credentials and wallet balance movements.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::sync::OnceLock;

use argon2::Argon2;
use rand::rngs::OsRng;
use tracing::info;

use escrow_shared::currency::format_currency_from_cents;
use escrow_store::{
    NewNotification, NewUser, StoreError, TransactionType, User, WalletMovement, WalletTransaction,
};

use crate::db::SharedDatabase;
use crate::error::ApiError;

/// Trim and lowercase. Uniqueness is enforced on this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_credentials() -> ApiError {
    ApiError::Authentication("Invalid email or password.".to_string())
}

#[derive(Clone)]
pub struct Accounts {
    db: SharedDatabase,
}

impl Accounts {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Register a new account. The password is hashed off the async runtime
    /// and only the hash is persisted.
    pub async fn create_account(
        &self,
        name: &str,
        email: &str,
        password: &str,
        email_verified: bool,
    ) -> Result<User, ApiError> {
        let email = normalize_email(email);
        let name = name.trim().to_string();

        // Skip the expensive hash for an obvious duplicate. The insert checks
        // again inside its transaction.
        if self.find_by_email(&email).await?.is_some() {
            return Err(StoreError::DuplicateEmail.into());
        }

        let password_hash = hash_password(password.to_string()).await?;
        let user = self
            .db
            .run(move |db| {
                Ok(db.create_user(&NewUser {
                    name,
                    email,
                    password_hash,
                    email_verified,
                })?)
            })
            .await?;

        info!(user_id = %user.id, email_verified, "Account created");
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let email = normalize_email(email);
        self.db
            .run(move |db| Ok(db.find_user_by_email(&email)?))
            .await
    }

    pub async fn get(&self, user_id: &str) -> Result<User, ApiError> {
        let user_id = user_id.to_string();
        self.db
            .run(move |db| {
                db.get_user(&user_id)
                    .map_err(|e| ApiError::from_store(e, "User not found."))
            })
            .await
    }

    /// Look up by email and check the password. Unknown email and wrong
    /// password produce the same error after the same argon2 work.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let Some(user) = self.find_by_email(email).await? else {
            burn_verification(password.to_string()).await?;
            return Err(invalid_credentials());
        };
        verify_credential(&user, password).await?;
        Ok(user)
    }

    /// Apply a signed balance change and record it in the ledger with a
    /// notification, atomically. A debit past zero fails with
    /// [`ApiError::InsufficientFunds`] and changes nothing.
    pub async fn adjust_balance(
        &self,
        user_id: &str,
        delta_cents: i64,
        kind: TransactionType,
    ) -> Result<WalletMovement, ApiError> {
        let user_id = user_id.to_string();
        self.db
            .run(move |db| {
                Ok(db.record_wallet_movement(&user_id, delta_cents, kind, wallet_notice)?)
            })
            .await
    }
}

fn wallet_notice(user: &User, tx: &WalletTransaction) -> NewNotification {
    let amount = format_currency_from_cents(tx.amount_cents.abs());
    let (label, detail) = match tx.kind {
        TransactionType::Topup => ("Wallet top-up", format!("{amount} added to your wallet")),
        TransactionType::Withdraw => (
            "Wallet withdrawal",
            format!("{amount} withdrawn from your wallet"),
        ),
        TransactionType::Release => ("Escrow release", format!("{amount} released")),
    };

    NewNotification {
        user_id: user.id.clone(),
        label: label.to_string(),
        detail,
        meta: format!(
            "Balance {}",
            format_currency_from_cents(user.wallet_balance_cents)
        ),
        tx_id: Some(tx.id),
    }
}

/// Argon2id with a random salt, in PHC string form.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
}

/// PHC hash of a throwaway password, built once per process.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(b"no-such-account", &salt)
            .map(|hash| hash.to_string())
            .unwrap_or_default()
    })
}

/// Verify `password` against the dummy hash and discard the result.
async fn burn_verification(password: String) -> Result<(), ApiError> {
    tokio::task::spawn_blocking(move || {
        if let Ok(parsed) = PasswordHash::new(dummy_hash()) {
            let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
        }
    })
    .await
    .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))
}

/// Fails with the generic credential error on any mismatch, including a
/// stored hash that does not parse.
pub async fn verify_credential(user: &User, password: &str) -> Result<(), ApiError> {
    let stored = user.password_hash.clone();
    let password = password.to_string();
    let user_id = user.id.clone();

    let matches = tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&stored) else {
            tracing::warn!(user_id = %user_id, "Stored password hash is unreadable");
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?;

    if matches {
        Ok(())
    } else {
        Err(invalid_credentials())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_store::Database;

    fn accounts() -> (tempfile::TempDir, Accounts) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("accounts.db")).unwrap();
        (dir, Accounts::new(SharedDatabase::new(db)))
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let (_dir, accounts) = accounts();
        let user = accounts
            .create_account(" Ada ", "Ada@Example.com", "Str0ng!Passw0rd", true)
            .await
            .unwrap();

        assert_eq!(user.id, "usr_1000");
        assert_eq!(user.name, "Ada");
        assert_eq!(user.email, "ada@example.com");
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert!(!user.password_hash.contains("Str0ng!Passw0rd"));

        let found = accounts
            .authenticate("ADA@example.com", "Str0ng!Passw0rd")
            .await
            .unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn test_bad_credentials_are_indistinguishable() {
        let (_dir, accounts) = accounts();
        accounts
            .create_account("Ada", "ada@example.com", "Str0ng!Passw0rd", true)
            .await
            .unwrap();

        let wrong_password = accounts
            .authenticate("ada@example.com", "Wr0ng!Passw0rd")
            .await
            .unwrap_err();
        let unknown_email = accounts
            .authenticate("bob@example.com", "Str0ng!Passw0rd")
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, ApiError::Authentication(_)));
    }

    #[test]
    fn test_unknown_emails_verify_against_a_real_argon2_hash() {
        let parsed = PasswordHash::new(dummy_hash()).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        assert!(Argon2::default()
            .verify_password(b"Str0ng!Passw0rd", &parsed)
            .is_err());
        assert!(std::ptr::eq(dummy_hash(), dummy_hash()));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (_dir, accounts) = accounts();
        accounts
            .create_account("Ada", "ada@example.com", "Str0ng!Passw0rd", true)
            .await
            .unwrap();

        let err = accounts
            .create_account("Other Ada", " ADA@example.com", "Str0ng!Passw0rd", true)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_overdraft_is_rejected_and_balance_kept() {
        let (_dir, accounts) = accounts();
        let user = accounts
            .create_account("Ada", "ada@example.com", "Str0ng!Passw0rd", true)
            .await
            .unwrap();

        let topup = accounts
            .adjust_balance(&user.id, 10_000, TransactionType::Topup)
            .await
            .unwrap();
        assert_eq!(topup.user.wallet_balance_cents, 10_000);
        assert_eq!(topup.notification.detail, "$100.00 added to your wallet");
        assert_eq!(topup.notification.meta, "Balance $100.00");

        let err = accounts
            .adjust_balance(&user.id, -10_001, TransactionType::Withdraw)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InsufficientFunds));
        assert_eq!(
            accounts.get(&user.id).await.unwrap().wallet_balance_cents,
            10_000
        );

        let withdraw = accounts
            .adjust_balance(&user.id, -10_000, TransactionType::Withdraw)
            .await
            .unwrap();
        assert_eq!(withdraw.user.wallet_balance_cents, 0);
    }
}

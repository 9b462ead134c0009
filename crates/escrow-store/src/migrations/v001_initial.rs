//! v001 -- Initial schema creation.
//!
//! Creates the eight core tables: `users`, `sequences`, `escrows`,
//! `disputes`, `timeline_events`, `wallet_transactions`, `notifications`,
//! and `email_verification_tokens`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                   TEXT PRIMARY KEY NOT NULL,   -- usr_<sequence>
    email                TEXT NOT NULL UNIQUE,        -- trimmed + lowercased
    name                 TEXT NOT NULL,
    password_hash        TEXT NOT NULL,               -- PHC string (argon2id)
    wallet_balance_cents INTEGER NOT NULL DEFAULT 0 CHECK (wallet_balance_cents >= 0),
    email_verified       INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    created_at           TEXT NOT NULL,               -- RFC-3339, fixed width
    updated_at           TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Sequences (one row per counter domain)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sequences (
    id            TEXT PRIMARY KEY NOT NULL,          -- domain name
    current_value INTEGER NOT NULL                    -- next value to hand out
);

-- ----------------------------------------------------------------
-- Escrows
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS escrows (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    reference             TEXT NOT NULL UNIQUE,       -- PO-0651
    owner_id              TEXT NOT NULL,
    title                 TEXT NOT NULL,
    counterpart           TEXT NOT NULL,
    amount_cents          INTEGER NOT NULL CHECK (amount_cents > 0),
    stage                 TEXT NOT NULL,
    due_description       TEXT NOT NULL,
    status                TEXT NOT NULL CHECK (status IN ('success', 'warning')),
    counterparty_approved INTEGER NOT NULL DEFAULT 0,
    category              TEXT,
    description           TEXT,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_escrows_owner ON escrows(owner_id, updated_at DESC);

-- ----------------------------------------------------------------
-- Disputes
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS disputes (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    reference          TEXT NOT NULL UNIQUE,          -- DSP-0042
    owner_id           TEXT NOT NULL,
    title              TEXT NOT NULL,
    owner_team         TEXT NOT NULL,
    amount_cents       INTEGER NOT NULL,
    updated_label      TEXT NOT NULL,
    priority           TEXT NOT NULL CHECK (priority IN ('high', 'medium', 'low')),
    status             TEXT NOT NULL CHECK (status IN ('open', 'resolved')),
    workspace_launched INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_disputes_owner_status ON disputes(owner_id, status);

-- ----------------------------------------------------------------
-- Timeline events (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS timeline_events (
    id         TEXT PRIMARY KEY NOT NULL,             -- tl-<sequence>
    user_id    TEXT NOT NULL,
    title      TEXT NOT NULL,
    meta       TEXT NOT NULL,
    time_label TEXT NOT NULL,
    status     TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_timeline_user_ts ON timeline_events(user_id, created_at DESC);

-- ----------------------------------------------------------------
-- Wallet transactions (append-only, signed cents)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS wallet_transactions (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,                    -- credit > 0, debit < 0
    type         TEXT NOT NULL CHECK (type IN ('TOPUP', 'WITHDRAW', 'RELEASE')),
    created_at   TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_wallet_tx_user_ts ON wallet_transactions(user_id, created_at DESC);

-- ----------------------------------------------------------------
-- Notifications (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY NOT NULL,             -- notif-<sequence>
    user_id    TEXT NOT NULL,
    label      TEXT NOT NULL,
    detail     TEXT NOT NULL,
    meta       TEXT NOT NULL,
    tx_id      INTEGER,                               -- nullable FK -> wallet_transactions(id)
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (tx_id) REFERENCES wallet_transactions(id)
);

CREATE INDEX IF NOT EXISTS idx_notifications_user_ts ON notifications(user_id, created_at DESC);

-- ----------------------------------------------------------------
-- Email verification tokens
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS email_verification_tokens (
    id          TEXT PRIMARY KEY NOT NULL,            -- UUID v4
    user_id     TEXT NOT NULL,
    code_hash   TEXT NOT NULL,                        -- BLAKE3 hex of the code
    expires_at  TEXT NOT NULL,
    consumed_at TEXT,                                 -- NULL while outstanding
    created_at  TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_verification_user_open
    ON email_verification_tokens(user_id, consumed_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

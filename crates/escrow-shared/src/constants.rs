/// Application name
pub const APP_NAME: &str = "MyEscrow";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 4000;

/// Key derivation context (BLAKE3) for the session signing key
pub const KDF_CONTEXT_SESSION_KEY: &str = "myescrow-session-key-v1";

/// Domain separator prepended to every signed session payload
pub const SESSION_TOKEN_PREFIX: &[u8] = b"myescrow-session-v1";

/// Default bearer token lifetime in hours (7 days)
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 168;

/// Email verification code length bounds
pub const DEFAULT_VERIFICATION_CODE_DIGITS: u32 = 6;
pub const MIN_VERIFICATION_CODE_DIGITS: u32 = 4;
pub const MAX_VERIFICATION_CODE_DIGITS: u32 = 9;

/// Default email verification TTL in minutes
pub const DEFAULT_VERIFICATION_TTL_MINUTES: i64 = 15;

/// Overview limits
pub const OVERVIEW_ACTIVE_ESCROWS: usize = 5;
pub const OVERVIEW_TIMELINE_EVENTS: usize = 3;

/// Wallet transactions returned by the ledger listing
pub const WALLET_TRANSACTIONS_LIMIT: u32 = 10;

/// Largest single escrow or wallet amount accepted from a request ($1,000,000,000.00)
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

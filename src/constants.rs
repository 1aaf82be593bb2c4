/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "bp-id";

/// Lifetime of a session and of its cookie (24 hours)
pub const SESSION_TTL_HOURS: i64 = 24;

/// Random bytes used to look a session up in the store
pub const SESSION_SELECTOR_BYTES: usize = 16;

/// Secret random bytes proving possession of a session (256 bits)
pub const SESSION_VERIFIER_BYTES: usize = 32;

/// Minimum username length
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Default upper bound for a single upload request (32 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

// =============================================================================
// Error Messages
// =============================================================================

pub const ERR_INVALID_USERNAME: &str =
    "field 'username' must be at least 3 alphanumeric characters";

pub const ERR_PASSWORD_TOO_SHORT: &str = "field 'password' must be at least 8 characters";

pub const ERR_PASSWORD_LOWERCASE: &str = "field 'password' must contain a lowercase character";

pub const ERR_PASSWORD_UPPERCASE: &str = "field 'password' must contain an uppercase character";

pub const ERR_PASSWORD_NUMERIC: &str = "field 'password' must contain a numeric character";

pub const ERR_PASSWORD_SPECIAL: &str = "field 'password' must contain a special character";

pub const ERR_INVALID_CHAT_ID: &str = "invalid chat id format";

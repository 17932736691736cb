//! SQL DDL for the credential database (SQLite).

/// One row per account; `email` is the normalized identity.
///
/// Removal is a soft delete tracked outside this table (see `tombstones.json`),
/// so rows are never deleted here.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    email TEXT PRIMARY KEY NOT NULL,
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    expiry TEXT NOT NULL, -- RFC3339
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL -- RFC3339
);
"#;

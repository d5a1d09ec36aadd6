//! SQLite schema definition.

/// Complete database schema for the local case store.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Local Store
-- ============================================================================

-- One serialized case collection per storage key
CREATE TABLE IF NOT EXISTS local_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,                         -- JSON array of cases, tagged 64-bit ints
    checksum TEXT NOT NULL,                      -- SHA-256 of value, hex
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

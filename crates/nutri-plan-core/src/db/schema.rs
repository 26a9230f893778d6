//! SQLite schema definition.

/// Complete database schema for nutri-plan.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Accounts
-- ============================================================================

CREATE TABLE IF NOT EXISTS accounts (
    username TEXT PRIMARY KEY,                   -- case-sensitive, names the report file
    password TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('consultant', 'patient')),
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'archived')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_accounts_role_status ON accounts(role, status);

-- ============================================================================
-- Sessions
-- ============================================================================

CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    username TEXT REFERENCES accounts(username), -- NULL while anonymous
    notices TEXT NOT NULL DEFAULT '[]',          -- JSON array of Notice
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    last_seen TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_sessions_last_seen ON sessions(last_seen);

-- ============================================================================
-- Report Publications
-- ============================================================================

CREATE TABLE IF NOT EXISTS publications (
    username TEXT PRIMARY KEY REFERENCES accounts(username),
    digest TEXT NOT NULL,                        -- SHA-256 of the document
    schema_version INTEGER NOT NULL,
    published_at TEXT NOT NULL
);
"#;

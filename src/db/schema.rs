//! SQL DDL for the users table.

/// SQLite schema with:
/// - `id` INTEGER PRIMARY KEY AUTOINCREMENT
/// - `username` UNIQUE, the login handle
/// - `password` holding the encoded PBKDF2 hash
/// - optional `full_name` / `email` (unique when present)
/// - `created_at` / `last_login` as RFC3339 text
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    mobile TEXT NOT NULL,
    full_name TEXT NULL,
    email TEXT NULL UNIQUE,
    created_at TEXT NOT NULL, -- RFC3339
    last_login TEXT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_users_last_login ON users(last_login);
"#;

pub const SQLITE_DROP: &str = "DROP TABLE IF EXISTS users";

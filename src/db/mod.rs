//! Database module: the users table and its storage operations.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database
//! - `sqlite.rs`: `UserStorage`, the only code that talks SQL

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{DbUser, NewUser};
pub use schema::SQLITE_INIT;
pub use sqlite::{SqlitePool, UserStorage, connect};

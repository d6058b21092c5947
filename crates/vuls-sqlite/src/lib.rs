//! vuls-sqlite - Embedded dictionary backend
//!
//! Dictionaries stored in a local SQLite file are opened under an exclusive
//! advisory lock that is held for as long as the client lives, so two
//! servers can never share one file. [`check_lock`] probes that lock without
//! keeping it, to tell "another process owns this file" apart from "this
//! file cannot be opened".
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE entries (cve_id TEXT PRIMARY KEY, content TEXT NOT NULL);
//! ```
//!
//! `content` holds one JSON document per CVE.

mod dictionary;
mod lock;
pub mod testing;

pub use dictionary::{SqliteDictionary, SqliteOpenError, SCHEMA};
pub use lock::check_lock;

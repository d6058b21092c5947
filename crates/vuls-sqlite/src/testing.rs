//! Fixture helpers for building embedded dictionaries

use std::path::Path;

use rusqlite::{params, Connection};

use crate::dictionary::SCHEMA;

/// Create (or extend) a dictionary file at `path` with the given documents
pub fn write_dictionary(path: &Path, entries: &[(&str, serde_json::Value)]) -> rusqlite::Result<()> {
    let mut conn = Connection::open(path)?;
    conn.execute(SCHEMA, [])?;

    let tx = conn.transaction()?;
    {
        let mut stmt =
            tx.prepare("INSERT OR REPLACE INTO entries (cve_id, content) VALUES (?1, ?2)")?;
        for (cve_id, document) in entries {
            stmt.execute(params![cve_id, document.to_string()])?;
        }
    }
    tx.commit()
}

//! Build-time pragmas, grounded on `index/sqlite/pragma.go`.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// WAL journaling, normal synchronous, memory temp store, and a large
/// negative cache size (interpreted by SQLite as kibibytes, so this
/// requests ~256MB of page cache) — applied once per opened database
/// before a build.
pub fn apply_build_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "cache_size", -262144i64)?;
    Ok(())
}

/// Reads back a named pragma, rejecting any name that isn't
/// alphanumeric/underscore to avoid building unsafe SQL text (pragma
/// names cannot be bound as parameters).
pub fn query_pragma(conn: &Connection, name: &str) -> Result<String> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::invalid(format!("invalid pragma name: {name}")));
    }
    let sql = format!("PRAGMA {name}");
    let value: String = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(value)
}

//! The relational/FTS backend, grounded on
//! `original_source/internal/index/sqlite/{store.go,batch.go,replace_all.go,
//! pragma.go}` and the teacher's `database/schema.rs` FTS5 trigger shape.

pub mod pragma;

use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use rusqlite::{params, Connection, TransactionBehavior};

use crate::error::{Error, Result};
use crate::model::{normalize_coord, normalize_kind, File, FilePlan, SearchResult, SymbolItem, Workspace};
use crate::query::search::fts_query_form;
use crate::store::{BuildPragmaApplier, PragmaReader, Store};

const SCHEMA_SQL: &str = include_str!("schema.sql");

pub struct SqliteStore {
    conn: Mutex<Connection>,
    has_fts: AtomicBool,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5000i64)?;
        let _ = conn.pragma_update(None, "journal_mode", "WAL");

        for stmt in SCHEMA_SQL.split(';') {
            let trimmed = stmt.trim();
            if trimmed.is_empty() {
                continue;
            }
            conn.execute(trimmed, [])?;
        }

        let has_fts = try_create_fts(&conn).is_ok();

        Ok(SqliteStore {
            conn: Mutex::new(conn),
            has_fts: AtomicBool::new(has_fts),
        })
    }

    fn ensure_workspace_locked(conn: &Connection, id: &str, root: &str) -> Result<()> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::invalid("workspace id is required"));
        }
        let now = unix_now();
        conn.execute(
            "INSERT INTO workspaces (id, root, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
               root = CASE WHEN ?2 != '' THEN ?2 ELSE workspaces.root END",
            params![id, root, now],
        )?;
        conn.execute(
            "INSERT INTO meta (workspace_id, version, updated_at) VALUES (?1, 1, ?2)
             ON CONFLICT(workspace_id) DO NOTHING",
            params![id, now],
        )?;
        Ok(())
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn try_create_fts(conn: &Connection) -> Result<()> {
    let stmts = [
        "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
           text, title,
           path UNINDEXED,
           workspace_id UNINDEXED,
           content='chunks',
           content_rowid='id'
         )",
        "CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
           INSERT INTO chunks_fts(rowid, text, title, path, workspace_id)
           VALUES (new.id, new.text, new.title, new.path, new.workspace_id);
         END",
        "CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
           INSERT INTO chunks_fts(chunks_fts, rowid, text, title, path, workspace_id)
           VALUES('delete', old.id, old.text, old.title, old.path, old.workspace_id);
         END",
        "CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
           INSERT INTO chunks_fts(chunks_fts, rowid, text, title, path, workspace_id)
           VALUES('delete', old.id, old.text, old.title, old.path, old.workspace_id);
           INSERT INTO chunks_fts(rowid, text, title, path, workspace_id)
           VALUES (new.id, new.text, new.title, new.path, new.workspace_id);
         END",
    ];
    for s in stmts {
        conn.execute(s, [])?;
    }
    Ok(())
}

impl Store for SqliteStore {
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn has_fts(&self) -> bool {
        self.has_fts.load(Ordering::Relaxed)
    }

    fn fts_reason(&self) -> String {
        if self.has_fts() {
            "fts5".to_string()
        } else {
            "fts5 unavailable: falling back to substring match".to_string()
        }
    }

    fn ensure_workspace(&self, id: &str, root: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_workspace_locked(&conn, id, root)
    }

    fn get_version(&self, id: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_workspace_locked(&conn, id, "")?;
        let version: i64 = conn.query_row(
            "SELECT version FROM meta WHERE workspace_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    fn bump_version(&self, id: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_workspace_locked(&conn, id, "")?;
        let now = unix_now();
        let version: i64 = conn.query_row(
            "INSERT INTO meta(workspace_id, version, updated_at) VALUES(?1, 1, ?2)
             ON CONFLICT(workspace_id) DO UPDATE SET
               version = version + 1,
               updated_at = excluded.updated_at
             RETURNING version",
            params![id, now],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    fn get_workspace(&self, id: &str) -> Result<Workspace> {
        let conn = self.conn.lock().unwrap();
        let (root, created_at): (String, i64) = conn.query_row(
            "SELECT root, created_at FROM workspaces WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let version: i64 = conn
            .query_row(
                "SELECT version FROM meta WHERE workspace_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap_or(1);
        Ok(Workspace {
            id: id.to_string(),
            root,
            created_at,
            version,
        })
    }

    fn upsert_file(&self, workspace_id: &str, path: &str, size: i64, mtime: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_workspace_locked(&conn, workspace_id, "")?;
        conn.execute(
            "INSERT INTO files (workspace_id, path, size, mtime, hash) VALUES (?1, ?2, ?3, ?4, '')
             ON CONFLICT(workspace_id, path) DO UPDATE SET
               size = excluded.size, mtime = excluded.mtime",
            params![workspace_id, path, size, mtime],
        )?;
        Ok(())
    }

    fn get_file(&self, workspace_id: &str, path: &str) -> Result<File> {
        self.get_file_meta(workspace_id, path)?
            .ok_or_else(|| Error::NotFound(format!("file not found: {path}")))
    }

    fn get_file_meta(&self, workspace_id: &str, path: &str) -> Result<Option<File>> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT size, mtime, hash FROM files WHERE workspace_id = ?1 AND path = ?2",
            params![workspace_id, path],
            |row| {
                Ok(File {
                    workspace_id: workspace_id.to_string(),
                    path: path.to_string(),
                    size: row.get(0)?,
                    mtime: row.get(1)?,
                    hash: row.get(2)?,
                })
            },
        );
        match result {
            Ok(f) => Ok(Some(f)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_files_meta(&self, workspace_id: &str) -> Result<HashMap<String, File>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT path, size, mtime, hash FROM files WHERE workspace_id = ?1",
        )?;
        let rows = stmt.query_map(params![workspace_id], |row| {
            let path: String = row.get(0)?;
            Ok((
                path.clone(),
                File {
                    workspace_id: workspace_id.to_string(),
                    path,
                    size: row.get(1)?,
                    mtime: row.get(2)?,
                    hash: row.get(3)?,
                },
            ))
        })?;
        let mut out = HashMap::new();
        for r in rows {
            let (k, v) = r?;
            out.insert(k, v);
        }
        Ok(out)
    }

    fn delete_file(&self, workspace_id: &str, path: &str) -> Result<()> {
        self.replace_files_batch(
            workspace_id,
            &[FilePlan {
                path: path.to_string(),
                delete: true,
                ..Default::default()
            }],
        )
    }

    fn get_files_stats(&self, workspace_id: &str) -> Result<(i64, i64)> {
        let conn = self.conn.lock().unwrap();
        let (count, total): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(1), SUM(size) FROM files WHERE workspace_id = ?1",
            params![workspace_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((count, total.unwrap_or(0)))
    }

    fn replace_files_batch(&self, workspace_id: &str, plans: &[FilePlan]) -> Result<()> {
        if plans.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        Self::ensure_workspace_locked(&conn, workspace_id, "")?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for plan in plans {
            let path = plan.path.trim();
            if path.is_empty() {
                return Err(Error::invalid("path is required"));
            }

            tx.execute(
                "DELETE FROM chunks WHERE workspace_id = ?1 AND path = ?2",
                params![workspace_id, path],
            )?;
            tx.execute(
                "DELETE FROM symbols WHERE workspace_id = ?1 AND path = ?2",
                params![workspace_id, path],
            )?;
            tx.execute(
                "DELETE FROM comments WHERE workspace_id = ?1 AND path = ?2",
                params![workspace_id, path],
            )?;

            if plan.delete {
                tx.execute(
                    "DELETE FROM files WHERE workspace_id = ?1 AND path = ?2",
                    params![workspace_id, path],
                )?;
                continue;
            }

            tx.execute(
                "INSERT INTO files (workspace_id, path, size, mtime, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(workspace_id, path) DO UPDATE SET
                   size = excluded.size, mtime = excluded.mtime, hash = excluded.hash",
                params![workspace_id, path, plan.size, plan.mtime, plan.hash.trim()],
            )?;

            for c in &plan.chunks {
                let kind = normalize_kind(&c.kind, "chunk");
                tx.execute(
                    "INSERT INTO chunks(workspace_id, path, sl, el, kind, title, text)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![workspace_id, path, c.sl, c.el, kind, c.title, c.text],
                )?;
            }
            for s in &plan.syms {
                let kind = normalize_kind(&s.kind, "symbol");
                tx.execute(
                    "INSERT INTO symbols(workspace_id, path, kind, name, sl, sc, el, ec, container, lang, signature)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        workspace_id, path, kind, s.name, s.sl,
                        normalize_coord(s.sc), s.el, normalize_coord(s.ec),
                        s.container, s.lang, s.signature
                    ],
                )?;
            }
            for c in &plan.comms {
                let kind = normalize_kind(&c.kind, "comment");
                tx.execute(
                    "INSERT INTO comments(workspace_id, path, kind, sl, sc, el, ec, text, lang)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        workspace_id, path, kind, c.sl,
                        normalize_coord(c.sc), c.el, normalize_coord(c.ec),
                        c.text, c.lang
                    ],
                )?;
            }
        }

        let now = unix_now();
        tx.execute(
            "INSERT INTO meta(workspace_id, version, updated_at) VALUES(?1, 1, ?2)
             ON CONFLICT(workspace_id) DO UPDATE SET
               version = version + 1, updated_at = excluded.updated_at",
            params![workspace_id, now],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn search_chunks(
        &self,
        workspace_id: &str,
        keyword: &str,
        limit: usize,
        case_insensitive: bool,
    ) -> Result<SearchResult> {
        let conn = self.conn.lock().unwrap();
        let limit = limit.max(1) as i64;

        if self.has_fts() {
            let fts_q = fts_query_form(keyword);
            let mut stmt = conn.prepare(
                "SELECT c.workspace_id, c.path, c.sl, c.el, c.kind, c.title, c.text
                 FROM chunks_fts f
                 JOIN chunks c ON c.id = f.rowid
                 WHERE f.chunks_fts MATCH ?1 AND c.workspace_id = ?2
                 ORDER BY c.path, c.sl, c.el
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![fts_q, workspace_id, limit], row_to_chunk)?;
            let chunks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            return Ok(SearchResult {
                chunks,
                match_case_insensitive: true,
                backend: "sqlite".to_string(),
            });
        }

        let (sql, needle) = if case_insensitive {
            (
                "SELECT workspace_id, path, sl, el, kind, title, text FROM chunks
                 WHERE workspace_id = ?2 AND LOWER(text) LIKE '%' || LOWER(?1) || '%'
                 ORDER BY path, sl, el LIMIT ?3",
                keyword.to_string(),
            )
        } else {
            (
                "SELECT workspace_id, path, sl, el, kind, title, text FROM chunks
                 WHERE workspace_id = ?2 AND text LIKE '%' || ?1 || '%'
                 ORDER BY path, sl, el LIMIT ?3",
                keyword.to_string(),
            )
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![needle, workspace_id, limit], row_to_chunk)?;
        let chunks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(SearchResult {
            chunks,
            match_case_insensitive: case_insensitive,
            backend: "sqlite".to_string(),
        })
    }

    fn find_min_enclosing_symbols(
        &self,
        workspace_id: &str,
        path: &str,
        line: i64,
    ) -> Result<Vec<SymbolItem>> {
        if line <= 0 {
            return Err(Error::invalid("line must be >= 1"));
        }
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT kind, name, container, lang, signature, path, sl, sc, el, ec
             FROM symbols
             WHERE workspace_id = ?1 AND path = ?2 AND sl <= ?3 AND el >= ?3
             ORDER BY (el - sl) ASC, sl ASC, el ASC
             LIMIT 8",
        )?;
        let rows = stmt.query_map(params![workspace_id, path, line], |row| {
            Ok(SymbolItem {
                kind: row.get(0)?,
                name: row.get(1)?,
                container: row.get(2)?,
                lang: row.get(3)?,
                signature: row.get(4)?,
                path: row.get(5)?,
                range: crate::model::Range::new(row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn count_chunks(&self, workspace_id: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(1) FROM chunks WHERE workspace_id = ?1",
            params![workspace_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    fn count_files(&self, workspace_id: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(1) FROM files WHERE workspace_id = ?1",
            params![workspace_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<crate::model::Chunk> {
    Ok(crate::model::Chunk {
        workspace_id: row.get(0)?,
        path: row.get(1)?,
        sl: row.get(2)?,
        el: row.get(3)?,
        kind: row.get(4)?,
        title: row.get(5)?,
        text: row.get(6)?,
    })
}

impl BuildPragmaApplier for SqliteStore {
    fn apply_build_pragmas(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        pragma::apply_build_pragmas(&conn)
    }
}

impl PragmaReader for SqliteStore {
    fn query_pragma(&self, name: &str) -> Result<String> {
        let conn = self.conn.lock().unwrap();
        pragma::query_pragma(&conn, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".otidx").join("index.db");
        let store = SqliteStore::open(&path).unwrap();
        (dir, store)
    }

    #[test]
    fn ensure_workspace_updates_root_only_when_nonempty() {
        let (_d, store) = open_store();
        store.ensure_workspace("ws", "/a").unwrap();
        store.ensure_workspace("ws", "").unwrap();
        let ws = store.get_workspace("ws").unwrap();
        assert_eq!(ws.root, "/a");
        store.ensure_workspace("ws", "/b").unwrap();
        let ws = store.get_workspace("ws").unwrap();
        assert_eq!(ws.root, "/b");
    }

    #[test]
    fn bump_version_strictly_increases() {
        let (_d, store) = open_store();
        store.ensure_workspace("ws", "/a").unwrap();
        let v1 = store.get_version("ws").unwrap();
        let v2 = store.bump_version("ws").unwrap();
        assert!(v2 > v1);
    }

    #[test]
    fn replace_files_batch_is_atomic_replace() {
        let (_d, store) = open_store();
        store.ensure_workspace("ws", "/a").unwrap();
        let plan = FilePlan {
            path: "a.go".into(),
            size: 10,
            mtime: 1,
            hash: "h".into(),
            chunks: vec![crate::model::ChunkInput {
                sl: 1,
                el: 1,
                kind: "chunk".into(),
                title: String::new(),
                text: "hello".into(),
            }],
            ..Default::default()
        };
        store.replace_files_batch("ws", &[plan]).unwrap();
        assert_eq!(store.count_chunks("ws").unwrap(), 1);

        let delete_plan = FilePlan {
            path: "a.go".into(),
            delete: true,
            ..Default::default()
        };
        store.replace_files_batch("ws", &[delete_plan]).unwrap();
        assert_eq!(store.count_chunks("ws").unwrap(), 0);
    }
}

//! JSON-file-backed metadata store standing in for the original's bbolt
//! side-database, grounded on the `load`/`save` shape of
//! `matthewjberger-charter`'s `cache.rs` (no embedded KV crate appears
//! anywhere in the reference corpus, so this avoids fabricating one).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::File;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceMeta {
    pub id: String,
    pub root: String,
    pub created_at: i64,
    pub version: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FileMeta {
    size: i64,
    mtime: i64,
    hash: String,
    chunk_count: usize,
    symbol_count: usize,
    comment_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MetaData {
    workspaces: HashMap<String, WorkspaceMeta>,
    files: HashMap<String, HashMap<String, FileMeta>>,
}

pub struct MetaStore {
    path: PathBuf,
    data: Mutex<MetaData>,
}

impl MetaStore {
    pub fn open(path: &Path) -> Result<Self> {
        let data = if path.exists() {
            let bytes = std::fs::read(path)?;
            serde_json::from_slice(&bytes).unwrap_or_default()
        } else {
            MetaData::default()
        };
        Ok(MetaStore {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }

    fn flush(&self, data: &MetaData) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(data)
            .map_err(|e| crate::error::Error::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    pub fn ensure_workspace(&self, id: &str, root: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        let entry = data.workspaces.entry(id.to_string()).or_insert_with(|| WorkspaceMeta {
            id: id.to_string(),
            root: String::new(),
            created_at: unix_now(),
            version: 1,
        });
        if !root.is_empty() {
            entry.root = root.to_string();
        }
        data.files.entry(id.to_string()).or_default();
        self.flush(&data)
    }

    pub fn get_workspace(&self, id: &str) -> Result<Option<WorkspaceMeta>> {
        let data = self.data.lock().unwrap();
        Ok(data.workspaces.get(id).cloned())
    }

    pub fn get_version(&self, id: &str) -> Result<Option<i64>> {
        let data = self.data.lock().unwrap();
        Ok(data.workspaces.get(id).map(|w| w.version))
    }

    pub fn bump_version(&self, id: &str) -> Result<i64> {
        let mut data = self.data.lock().unwrap();
        let entry = data.workspaces.entry(id.to_string()).or_insert_with(|| WorkspaceMeta {
            id: id.to_string(),
            root: String::new(),
            created_at: unix_now(),
            version: 0,
        });
        entry.version += 1;
        let v = entry.version;
        self.flush(&data)?;
        Ok(v)
    }

    /// Returns the `(chunk_count, symbol_count, comment_count)` recorded for
    /// the previous write to `path`, used to bound document deletion before
    /// a replacement write.
    pub fn get_doc_counts(&self, workspace_id: &str, path: &str) -> Result<(usize, usize, usize)> {
        let data = self.data.lock().unwrap();
        Ok(data
            .files
            .get(workspace_id)
            .and_then(|m| m.get(path))
            .map(|fm| (fm.chunk_count, fm.symbol_count, fm.comment_count))
            .unwrap_or((0, 0, 0)))
    }

    pub fn get_file_meta(&self, workspace_id: &str, path: &str) -> Result<Option<File>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .files
            .get(workspace_id)
            .and_then(|m| m.get(path))
            .map(|fm| File {
                workspace_id: workspace_id.to_string(),
                path: path.to_string(),
                size: fm.size,
                mtime: fm.mtime,
                hash: fm.hash.clone(),
            }))
    }

    pub fn list_files_meta(&self, workspace_id: &str) -> Result<HashMap<String, File>> {
        let data = self.data.lock().unwrap();
        let mut out = HashMap::new();
        if let Some(m) = data.files.get(workspace_id) {
            for (path, fm) in m {
                out.insert(
                    path.clone(),
                    File {
                        workspace_id: workspace_id.to_string(),
                        path: path.clone(),
                        size: fm.size,
                        mtime: fm.mtime,
                        hash: fm.hash.clone(),
                    },
                );
            }
        }
        Ok(out)
    }

    pub fn get_files_stats(&self, workspace_id: &str) -> Result<(i64, i64)> {
        let data = self.data.lock().unwrap();
        let Some(m) = data.files.get(workspace_id) else {
            return Ok((0, 0));
        };
        let count = m.len() as i64;
        let total: i64 = m.values().map(|fm| fm.size).sum();
        Ok((count, total))
    }

    pub fn upsert_file(&self, workspace_id: &str, path: &str, size: i64, mtime: i64) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        let bucket = data.files.entry(workspace_id.to_string()).or_default();
        let entry = bucket.entry(path.to_string()).or_default();
        entry.size = size;
        entry.mtime = mtime;
        self.flush(&data)
    }

    pub fn put_file_counts(
        &self,
        workspace_id: &str,
        path: &str,
        size: i64,
        mtime: i64,
        hash: &str,
        chunk_count: usize,
        symbol_count: usize,
        comment_count: usize,
    ) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        let bucket = data.files.entry(workspace_id.to_string()).or_default();
        bucket.insert(
            path.to_string(),
            FileMeta {
                size,
                mtime,
                hash: hash.to_string(),
                chunk_count,
                symbol_count,
                comment_count,
            },
        );
        self.flush(&data)
    }

    pub fn remove_file(&self, workspace_id: &str, path: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        if let Some(bucket) = data.files.get_mut(workspace_id) {
            bucket.remove(path);
        }
        self.flush(&data)
    }
}

pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("otidx-meta.json");
        {
            let meta = MetaStore::open(&path).unwrap();
            meta.ensure_workspace("ws", "/root").unwrap();
            meta.bump_version("ws").unwrap();
        }
        let meta = MetaStore::open(&path).unwrap();
        let ws = meta.get_workspace("ws").unwrap().unwrap();
        assert_eq!(ws.root, "/root");
        assert_eq!(ws.version, 2);
    }
}

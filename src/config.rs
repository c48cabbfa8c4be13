//! Project-level configuration (§6.6 AMBIENT STACK), grounded on the
//! teacher's `toml`+`serde` convention for loading workspace settings.
//! `BuildOptions`/`QueryOptions`/`WatchOptions` already live beside the
//! subsystems they configure; this module aggregates them into one
//! `CoreConfig` that binaries can load from `<root>/.otidx/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::indexer::BuildOptions;
use crate::query::QueryOptions;
use crate::watcher::WatchOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Backend name (`sqlite`/`tantivy`, see `store::normalize_backend_name`).
    pub backend: String,
    /// Overrides the default `<root>/.otidx/<index-file>` path when set.
    pub db_path: Option<String>,
    pub build: BuildOptions,
    pub query: QueryOptions,
    pub watch: WatchOptions,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            backend: "sqlite".to_string(),
            db_path: None,
            build: BuildOptions::default(),
            query: QueryOptions::default(),
            watch: WatchOptions::default(),
        }
    }
}

impl CoreConfig {
    /// Loads `<root>/.otidx/config.toml` if present, falling back to
    /// `CoreConfig::default()` when the file doesn't exist. A present but
    /// malformed file is a hard error.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(".otidx").join("config.toml");
        match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)
                .map_err(|e| Error::invalid(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CoreConfig::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves the effective db path: the config's override if set
    /// (tilde-expanded the way the teacher expands workspace paths),
    /// otherwise the backend's conventional default under `root`.
    pub fn resolved_db_path(&self, root: &Path) -> PathBuf {
        match &self.db_path {
            Some(p) => PathBuf::from(shellexpand::tilde(p).into_owned()),
            None => crate::store::default_path(root, crate::store::normalize_backend_name(&self.backend)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let cfg = CoreConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.backend, "sqlite");
    }

    #[test]
    fn loads_overrides_from_toml() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".otidx")).unwrap();
        std::fs::write(
            dir.path().join(".otidx/config.toml"),
            "backend = \"tantivy\"\n[build]\nworkers = 4\n",
        )
        .unwrap();

        let cfg = CoreConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.backend, "tantivy");
        assert_eq!(cfg.build.workers, 4);
    }

    #[test]
    fn resolved_db_path_falls_back_to_backend_default() {
        let dir = tempdir().unwrap();
        let cfg = CoreConfig::default();
        assert_eq!(
            cfg.resolved_db_path(dir.path()),
            dir.path().join(".otidx").join("index.db")
        );
    }
}

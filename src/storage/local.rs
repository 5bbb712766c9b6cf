use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tracing::warn;
use uuid::Uuid;
use walkdir::WalkDir;

use super::{ObjectStore, StorageError};

/// Object store backed by a local directory tree.
///
/// Keys are `/`-separated relative paths under the root; `processed/2024/01/01/batch-x.json.gz`
/// becomes `<root>/processed/2024/01/01/batch-x.json.gz`.
///
/// Writes are staged in a hidden `.<name>.<id>.tmp` sibling and hard-linked into place once fully
/// synced, so a key never names a partially written file. Staging files are not listed.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Use `root` as the store directory, creating it if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(key);
        let plain = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(rel))
    }
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound {
                key: key.to_string(),
            },
            _ => StorageError::Io {
                key: key.to_string(),
                source,
            },
        })
    }

    fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let io_err = |source: io::Error| match source.kind() {
            io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
                key: key.to_string(),
            },
            _ => StorageError::Io {
                key: key.to_string(),
                source,
            },
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let staging = staging_path(&path);
        // hard_link refuses an existing target, which keeps puts overwrite-never.
        let committed = write_synced(&staging, &body).and_then(|()| fs::hard_link(&staging, &path));
        if let Err(e) = fs::remove_file(&staging) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(key, staging = %staging.display(), error = %e, "failed to remove staging file");
            }
        }
        committed.map_err(io_err)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // Only walk the deepest directory the prefix names.
        let start = match prefix.rfind('/') {
            Some(idx) => self.root.join(&prefix[..idx]),
            None => self.root.clone(),
        };
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&start) {
            let entry = entry.map_err(|e| StorageError::Io {
                key: prefix.to_string(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() || is_staging_name(entry.file_name()) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = rel
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}

fn is_staging_name(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .is_some_and(|n| n.starts_with('.') && n.ends_with(".tmp"))
}

fn write_synced(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut f = OpenOptions::new().write(true).create_new(true).open(path)?;
    f.write_all(body)?;
    f.sync_all()
}

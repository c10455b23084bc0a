//! The persistence contract: the only file-system interface the core
//! depends on. Writes are atomic (temp file + fsync + rename) with an
//! optional timestamped backup of whatever was there before.

use crate::error::{ManifestError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Options for `write_json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WriteOptions {
    /// Rename any existing file at the target path to
    /// `path.bak.<unix_epoch_seconds>` before replacing it.
    pub backup: bool,
}

/// A canonicalized root directory that every store operation's path must
/// lie within. Constructed once per `Context` and threaded down the
/// pipeline rather than read from process-wide state.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// `root` need not exist yet; it is canonicalized lazily against its
    /// closest existing ancestor so a fresh output directory can still be
    /// validated before `ensure_dir` creates it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let root_canonical = canonicalize_best_effort(&self.root);
        let candidate_canonical = canonicalize_best_effort(&candidate);

        if !candidate_canonical.starts_with(&root_canonical) {
            return Err(ManifestError::SecurityError {
                path: path.to_path_buf(),
            });
        }
        Ok(candidate)
    }

    pub fn ensure_dir(&self, path: impl AsRef<Path>) -> Result<()> {
        let resolved = self.resolve(path.as_ref())?;
        fs::create_dir_all(&resolved).map_err(|e| ManifestError::FileOperationError {
            path: resolved.clone(),
            reason: e.to_string(),
        })
    }

    pub fn read_text(&self, path: impl AsRef<Path>) -> Result<String> {
        let resolved = self.resolve(path.as_ref())?;
        fs::read_to_string(&resolved).map_err(|e| ManifestError::FileOperationError {
            path: resolved,
            reason: e.to_string(),
        })
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let text = self.read_text(path.as_ref())?;
        serde_json::from_str(&text).map_err(|e| ManifestError::FileOperationError {
            path: path.as_ref().to_path_buf(),
            reason: format!("invalid JSON: {e}"),
        })
    }

    /// Serialize with 2-space indentation and a stable field order
    /// (declaration order, which `serde_json` already preserves), write to
    /// `path.tmp`, fsync, then atomically rename onto `path`. Backs up the
    /// previous file first when `opts.backup` is set.
    pub fn write_json<T: Serialize>(
        &self,
        path: impl AsRef<Path>,
        value: &T,
        opts: WriteOptions,
    ) -> Result<()> {
        let resolved = self.resolve(path.as_ref())?;
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).map_err(|e| ManifestError::FileOperationError {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let rendered =
            serde_json::to_string_pretty(value).map_err(|e| ManifestError::FileOperationError {
                path: resolved.clone(),
                reason: format!("serialization failed: {e}"),
            })?;

        let tmp_path = PathBuf::from(format!("{}.tmp", resolved.display()));
        {
            let mut file = File::create(&tmp_path).map_err(|e| ManifestError::FileOperationError {
                path: tmp_path.clone(),
                reason: e.to_string(),
            })?;
            file.write_all(rendered.as_bytes())
                .map_err(|e| ManifestError::FileOperationError {
                    path: tmp_path.clone(),
                    reason: e.to_string(),
                })?;
            file.sync_all().map_err(|e| ManifestError::FileOperationError {
                path: tmp_path.clone(),
                reason: e.to_string(),
            })?;
        }

        if opts.backup && resolved.exists() {
            let epoch = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let backup_path = PathBuf::from(format!("{}.bak.{epoch}", resolved.display()));
            fs::rename(&resolved, &backup_path).map_err(|e| ManifestError::FileOperationError {
                path: backup_path,
                reason: e.to_string(),
            })?;
        }

        fs::rename(&tmp_path, &resolved).map_err(|e| ManifestError::FileOperationError {
            path: resolved.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

fn canonicalize_best_effort(path: &Path) -> PathBuf {
    if let Ok(c) = path.canonicalize() {
        return c;
    }
    // The path (or an ancestor of it) doesn't exist yet — canonicalize the
    // closest existing ancestor and re-append the remainder so symlink
    // escapes in the existing portion are still caught.
    let mut existing = path.to_path_buf();
    let mut remainder: Vec<std::ffi::OsString> = Vec::new();
    while !existing.exists() {
        match existing.file_name() {
            Some(name) => {
                remainder.push(name.to_os_string());
                existing = existing
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("/"));
            }
            None => break,
        }
    }
    let mut resolved = existing.canonicalize().unwrap_or(existing);
    for part in remainder.into_iter().rev() {
        resolved.push(part);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Dummy {
        value: u32,
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let value = Dummy { value: 42 };
        store
            .write_json("out.json", &value, WriteOptions::default())
            .unwrap();
        let read: Dummy = store.read_json("out.json").unwrap();
        assert_eq!(read, value);
    }

    #[test]
    fn backup_preserves_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store
            .write_json("out.json", &Dummy { value: 1 }, WriteOptions::default())
            .unwrap();
        store
            .write_json("out.json", &Dummy { value: 2 }, WriteOptions { backup: true })
            .unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert!(entries.iter().any(|n| n.starts_with("out.json.bak.")));

        let current: Dummy = store.read_json("out.json").unwrap();
        assert_eq!(current, Dummy { value: 2 });
    }

    #[test]
    fn path_escaping_the_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let err = store
            .write_json("../escape.json", &Dummy { value: 1 }, WriteOptions::default())
            .unwrap_err();
        assert!(matches!(err, ManifestError::SecurityError { .. }));
    }
}

//! File adapter: Implementation of ModelStore on the local filesystem.
//!
//! Each artifact is a single file. Writes go to a sibling temporary file that
//! is renamed over the target, so readers observe either the old or the new
//! artifact and never a partial one.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::RidgeModel;
use crate::ports::ModelStore;

use super::StorageError;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem model store.
///
/// Without a root, identities are used as paths verbatim. With a root,
/// identities must be relative paths that stay inside it.
#[derive(Debug, Clone, Default)]
pub struct FileModelStore {
    root: Option<PathBuf>,
}

impl FileModelStore {
    /// Store that treats identities as plain paths.
    #[must_use]
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Store that resolves identities under `root`.
    #[must_use]
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Resolve an identity to the artifact path.
    ///
    /// # Errors
    /// Returns `StorageError::InvalidIdentity` for empty identities, or for
    /// identities escaping the root.
    pub fn resolve(&self, identity: &str) -> Result<PathBuf, StorageError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(StorageError::InvalidIdentity(identity.to_string()));
        }

        let path = Path::new(identity);
        match &self.root {
            None => Ok(path.to_path_buf()),
            Some(root) => {
                let escapes = path
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
                if escapes {
                    return Err(StorageError::InvalidIdentity(identity.to_string()));
                }
                Ok(root.join(path))
            }
        }
    }

    fn temp_path(target: &Path) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = target
            .file_name()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        name.push(format!(".tmp-{}-{n}", std::process::id()));
        target.with_file_name(name)
    }
}

impl ModelStore for FileModelStore {
    type Error = StorageError;

    fn exists(&self, identity: &str) -> Result<bool, Self::Error> {
        Ok(self.resolve(identity)?.is_file())
    }

    fn load(&self, identity: &str) -> Result<Option<RidgeModel>, Self::Error> {
        let path = self.resolve(identity)?;
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let model = RidgeModel::from_bytes(&bytes)?;
        tracing::debug!("Read model artifact {:?} ({} bytes)", path, bytes.len());
        Ok(Some(model))
    }

    fn save(&self, identity: &str, model: &RidgeModel) -> Result<(), Self::Error> {
        let path = self.resolve(identity)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = Self::temp_path(&path);
        if let Err(e) = std::fs::write(&tmp, model.to_bytes()).and_then(|()| std::fs::rename(&tmp, &path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::info!("Saved model artifact to {:?}", path);
        Ok(())
    }

    fn delete(&self, identity: &str) -> Result<(), Self::Error> {
        let path = self.resolve(identity)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Deleted model artifact {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

//! Job-scoped blob storage.
//!
//! Every job owns one directory keyed by its namespace (project or
//! localization id) under a shared root. Namespaces never overlap, so no
//! locking is needed; abrupt job termination leaves nothing outside the
//! namespace, and purging the namespace recovers all of it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DubError, Result};

pub struct JobStorage {
    root: PathBuf,
    public_base: Option<String>,
}

impl JobStorage {
    /// Open (creating if needed) the storage namespace for one job.
    pub fn open(root: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let root = root.as_ref().join(namespace);
        fs::create_dir_all(&root)
            .map_err(|e| DubError::Storage(format!("Failed to create {}: {e}", root.display())))?;
        Ok(Self {
            root,
            public_base: None,
        })
    }

    /// Set the base URL used to build public links for stored blobs.
    pub fn with_public_base(mut self, base: impl Into<String>) -> Self {
        self.public_base = Some(base.into());
        self
    }

    /// Store raw bytes under a name within the namespace.
    pub fn put(&self, bytes: &[u8], name: &str) -> Result<PathBuf> {
        let path = self.root.join(name);
        fs::write(&path, bytes)
            .map_err(|e| DubError::Storage(format!("Failed to write {}: {e}", path.display())))?;
        debug!("Stored {} bytes as {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Path of an existing blob. Missing blobs are an error.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(DubError::Storage(format!(
                "File does not exist: {}",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Path a blob would have, whether or not it exists yet.
    pub fn path_unchecked(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }

    /// Delete a blob. A blob that is already gone is not an error.
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.root.join(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DubError::Storage(format!(
                "Failed to delete {}: {e}",
                path.display()
            ))),
        }
    }

    /// Public URL for a stored blob, if a public base is configured.
    pub fn public_link(&self, name: &str) -> Option<String> {
        let base = self.public_base.as_ref()?;
        let ns = self.root.file_name()?.to_str()?;
        Some(format!("{}/{}/{}", base.trim_end_matches('/'), ns, name))
    }

    /// Remove the whole namespace and everything in it.
    pub fn purge(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DubError::Storage(format!(
                "Failed to purge {}: {e}",
                self.root.display()
            ))),
        }
    }
}

/// Deletes a fixed set of blobs when dropped, success or failure.
///
/// The reassembler registers its per-fragment clips and the combined track
/// here so repeated failed attempts never accumulate orphaned blobs.
pub struct CleanupGuard<'a> {
    storage: &'a JobStorage,
    names: Vec<String>,
}

impl<'a> CleanupGuard<'a> {
    pub fn new(storage: &'a JobStorage) -> Self {
        Self {
            storage,
            names: Vec::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        for name in &self.names {
            if let Err(e) = self.storage.delete(name) {
                warn!("Cleanup failed for {name}: {e}");
            }
        }
    }
}

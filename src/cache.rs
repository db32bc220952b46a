//! Cache Directory (C5): a per-process scratch root plus one scoped,
//! disjoint subdirectory per `Archive` instance.
//!
//! Each directory is a `tempfile::TempDir`, so uniqueness and best-effort
//! removal-on-drop come from the crate rather than a hand-rolled tag scheme;
//! `cleanup()` additionally lets an `Archive` release its cache
//! deterministically at the end of a top-level operation, before process
//! exit, the way the source's explicit `Archive.cleanup()` does.

use crate::error::{RecbzError, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// The process-global scratch root. One instance lives for the lifetime of
/// a CLI invocation; every `Cache` is created underneath it so two
/// concurrently-running archives never share a subtree.
pub struct ScratchRoot {
    dir: TempDir,
}

impl ScratchRoot {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("recbzCACHE_")
            .tempdir()
            .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// One archive's private scratch directory.
pub struct Cache {
    dir: Mutex<Option<TempDir>>,
    path: PathBuf,
}

impl Cache {
    pub fn new(root: &ScratchRoot) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("archive_")
            .tempdir_in(root.path())
            .map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
        let path = dir.path().to_path_buf();
        Ok(Self {
            dir: Mutex::new(Some(dir)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the cache directory. Idempotent: a second call is a no-op.
    pub fn cleanup(&self) -> Result<()> {
        let mut guard = self
            .dir
            .lock()
            .map_err(|_| RecbzError::Other(anyhow::anyhow!("cache lock poisoned")))?;
        if let Some(dir) = guard.take() {
            dir.close().map_err(|e| RecbzError::Other(anyhow::anyhow!(e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_caches_are_disjoint() {
        let root = ScratchRoot::create().unwrap();
        let a = Cache::new(&root).unwrap();
        let b = Cache::new(&root).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(root.path()));
        assert!(b.path().starts_with(root.path()));
    }

    #[test]
    fn cleanup_is_idempotent() {
        let root = ScratchRoot::create().unwrap();
        let cache = Cache::new(&root).unwrap();
        let path = cache.path().to_path_buf();
        assert!(path.exists());
        cache.cleanup().unwrap();
        assert!(!path.exists());
        cache.cleanup().unwrap();
    }
}

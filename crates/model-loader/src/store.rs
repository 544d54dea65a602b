//! Artifact stores
//!
//! Read-only access to model bytes by path. The filesystem store plays the
//! role of an application's bundled asset directory; the in-memory store
//! serves embedders that ship models inside their binary, and tests.

use crate::LoadError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// URI scheme prefix accepted on artifact and image paths
pub const FILE_SCHEME: &str = "file://";

/// Strip a leading `file://` scheme, if present
pub fn strip_file_scheme(path: &str) -> &str {
    path.strip_prefix(FILE_SCHEME).unwrap_or(path)
}

/// Read-only source of model artifact bytes
pub trait ArtifactStore: Send + Sync {
    /// Read the complete artifact at `path`
    fn read(&self, path: &str) -> Result<Vec<u8>, LoadError>;
}

/// Artifact store backed by the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FsArtifactStore {
    /// Directory that relative paths resolve against
    root: Option<PathBuf>,
}

impl FsArtifactStore {
    /// Create a store resolving relative paths against the working directory
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Create a store resolving relative paths against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("Artifact store rooted at {}", root.display());
        Self { root: Some(root) }
    }

    /// Resolve a caller path to a filesystem path
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(strip_file_scheme(path));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn read(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        let resolved = self.resolve(path);
        debug!("Reading model artifact {}", resolved.display());

        if !resolved.is_file() {
            return Err(LoadError::NotFound(resolved.display().to_string()));
        }

        std::fs::read(&resolved)
            .map_err(|e| LoadError::NotFound(format!("{}: {}", resolved.display(), e)))
    }
}

/// In-memory artifact store
#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an artifact
    pub fn insert(&self, path: &str, bytes: impl Into<Arc<[u8]>>) -> Result<(), LoadError> {
        let mut artifacts = self.artifacts.lock().map_err(|e| {
            LoadError::NotFound(format!("Artifact store lock poisoned: {}", e))
        })?;
        artifacts.insert(strip_file_scheme(path).to_string(), bytes.into());
        Ok(())
    }

    /// Number of stored artifacts
    pub fn len(&self) -> usize {
        self.artifacts.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn read(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        let artifacts = self.artifacts.lock().map_err(|e| {
            LoadError::NotFound(format!("Artifact store lock poisoned: {}", e))
        })?;
        artifacts
            .get(strip_file_scheme(path))
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| LoadError::NotFound(path.to_string()))
    }
}

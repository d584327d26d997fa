//! Path-keyed cache for late-bound resources (lookup tables, shaders).

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{BackendError, VoutError, VoutResult};

/// Kind of resource held by a [`ResourceCache`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Lut,
    Shader,
}

impl ResourceKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Lut => "lookup table",
            Self::Shader => "custom shader",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful [`ResourceCache::load`] did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Empty path: the cached resource was released.
    Cleared,
    /// Same path as the cached resource: nothing was read.
    Unchanged,
    /// A new resource replaced the cached one.
    Loaded,
}

enum CacheState<R> {
    Empty,
    Loaded { path: PathBuf, resource: R },
}

pub(crate) struct ResourceCache<R> {
    kind: ResourceKind,
    state: CacheState<R>,
}

impl<R> ResourceCache<R> {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            state: CacheState::Empty,
        }
    }

    pub fn get(&self) -> Option<&R> {
        match &self.state {
            CacheState::Empty => None,
            CacheState::Loaded { resource, .. } => Some(resource),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.state {
            CacheState::Empty => None,
            CacheState::Loaded { path, .. } => Some(path),
        }
    }

    pub fn clear(&mut self) {
        if let CacheState::Loaded { path, .. } = &self.state {
            log::debug!("releasing {} {}", self.kind, path.display());
        }
        self.state = CacheState::Empty;
    }

    /// Loads the resource at `path` through `parse`.
    ///
    /// The cached resource is only replaced once the new one parsed
    /// successfully; any failure leaves the cache untouched.
    pub fn load<F>(&mut self, path: &str, parse: F) -> VoutResult<LoadOutcome>
    where
        F: FnOnce(&[u8]) -> Result<R, BackendError>,
    {
        if path.is_empty() {
            self.clear();
            return Ok(LoadOutcome::Cleared);
        }

        let path = PathBuf::from(path);
        if self.path() == Some(path.as_path()) {
            return Ok(LoadOutcome::Unchanged);
        }

        let bytes = std::fs::read(&path).map_err(|e| self.error(&path, e.to_string()))?;
        if bytes.is_empty() {
            return Err(self.error(&path, "file is empty"));
        }
        let resource = parse(&bytes).map_err(|e| self.error(&path, e.message))?;

        log::info!("loaded {} from {}", self.kind, path.display());
        self.state = CacheState::Loaded { path, resource };
        Ok(LoadOutcome::Loaded)
    }

    fn error(&self, path: &Path, message: impl Into<String>) -> VoutError {
        VoutError::ResourceLoad {
            kind: self.kind.name(),
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

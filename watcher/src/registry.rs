//! Bookkeeping between live watch handles and the directories they cover.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::source::WatchHandle;

/// Association between watch handles and watched directory paths.
///
/// Invariant: every handle currently valid in the notification source has
/// exactly one entry here. Entries are removed lazily, when the event loop
/// observes that a watch has become permanently invalid. The event loop is
/// the only mutator, so no locking is needed.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    dirs: HashMap<WatchHandle, PathBuf>,
}

impl WatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            dirs: HashMap::new(),
        }
    }

    /// Store a handle's directory, silently replacing any previous
    /// association (the source may hand out a fresh handle when the same
    /// directory is registered again).
    pub fn add(&mut self, handle: WatchHandle, dir: impl Into<PathBuf>) {
        self.dirs.insert(handle, dir.into());
    }

    /// Directory covered by `handle`, if the handle is known.
    pub fn lookup(&self, handle: WatchHandle) -> Option<&Path> {
        self.dirs.get(&handle).map(PathBuf::as_path)
    }

    /// Drop a handle the source reported permanently invalid.
    pub fn remove(&mut self, handle: WatchHandle) -> Option<PathBuf> {
        self.dirs.remove(&handle)
    }

    /// True when no watched directories remain.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Number of watched directories.
    pub fn len(&self) -> usize {
        self.dirs.len()
    }
}

//! Watch session configuration.

use std::path::PathBuf;

use crate::event::EventKind;

/// Immutable configuration for one watch session.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Root directory to watch. Must already exist; validating that is the
    /// caller's responsibility.
    pub root: PathBuf,

    /// Watch the whole subtree rather than just the root.
    pub recursive: bool,

    /// Event kinds to report.
    pub filter: EventFilter,
}

impl WatchConfig {
    /// Recursive watch of `root` for all event kinds.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
            filter: EventFilter::all(),
        }
    }

    /// Watch only the root directory itself, not its descendants.
    pub fn exclusive(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Restrict the reported event kinds.
    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Which entry-event kinds a session delivers.
///
/// Kinds outside the filter are dropped at the notification source, so a
/// session that does not watch creations also never extends its watch set
/// dynamically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    created: bool,
    deleted: bool,
    modified: bool,
}

impl EventFilter {
    /// Filter covering all three kinds.
    pub fn all() -> Self {
        Self {
            created: true,
            deleted: true,
            modified: true,
        }
    }

    /// Filter covering no kinds; enable them with the `with_*` builders.
    pub fn none() -> Self {
        Self {
            created: false,
            deleted: false,
            modified: false,
        }
    }

    /// Enable creation events.
    pub fn with_created(mut self) -> Self {
        self.created = true;
        self
    }

    /// Enable deletion events.
    pub fn with_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Enable modification events.
    pub fn with_modified(mut self) -> Self {
        self.modified = true;
        self
    }

    /// True when no kind is enabled. A session cannot run on an empty
    /// filter.
    pub fn is_empty(self) -> bool {
        !(self.created || self.deleted || self.modified)
    }

    /// True when events of `kind` should be delivered.
    pub fn allows(self, kind: EventKind) -> bool {
        match kind {
            EventKind::Created => self.created,
            EventKind::Deleted => self.deleted,
            EventKind::Modified => self.modified,
        }
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

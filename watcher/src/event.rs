//! Event types flowing from the notification source to the event loop.

use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::source::WatchHandle;

/// Kind of change reported for a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Entry was created.
    Created,

    /// Entry was deleted.
    Deleted,

    /// Entry was modified.
    Modified,
}

impl EventKind {
    /// Human label used in emitted event lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Deleted => "Deleted",
            Self::Modified => "Modified",
        }
    }

    /// Map a notify event kind onto the three reported kinds.
    ///
    /// Renames are reported the way the platform facility splits them: the
    /// old name as a deletion, the new name as a creation. Access events
    /// carry no content change and are dropped, as is anything notify
    /// cannot classify.
    pub fn from_notify(kind: notify::EventKind) -> Option<Self> {
        match kind {
            notify::EventKind::Create(_) => Some(Self::Created),
            notify::EventKind::Remove(_) => Some(Self::Deleted),
            notify::EventKind::Modify(modify_kind) => match modify_kind {
                notify::event::ModifyKind::Name(rename) => match rename {
                    notify::event::RenameMode::From => Some(Self::Deleted),
                    notify::event::RenameMode::To => Some(Self::Created),
                    _ => Some(Self::Modified),
                },
                _ => Some(Self::Modified),
            },
            notify::EventKind::Access(_) => None,
            _ => None,
        }
    }
}

/// A raw notification as delivered by the notification source.
///
/// `name` is the entry name relative to the watched directory the
/// enclosing batch belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// What happened to the entry.
    pub kind: EventKind,

    /// Entry name within the watched directory.
    pub name: PathBuf,
}

/// Pending notifications delivered in one drain of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    /// Entry events that arrived on one watched directory.
    ///
    /// The event list may be empty when the directory's own watch was
    /// invalidated with nothing else pending; the event loop discovers the
    /// invalidation through its re-arm check.
    Events {
        handle: WatchHandle,
        events: Vec<RawEvent>,
    },

    /// The backend dropped notifications because its queue filled up.
    Overflow,
}

/// An entry event resolved to an absolute path.
#[derive(Debug, Clone)]
pub struct ResolvedEvent {
    /// What happened to the entry.
    pub kind: EventKind,

    /// Absolute path of the affected entry.
    pub path: PathBuf,

    /// When the event was processed.
    pub timestamp: DateTime<Local>,
}

impl ResolvedEvent {
    /// Create a resolved event stamped with the current wall-clock time.
    pub fn new(kind: EventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Local::now(),
        }
    }

    /// Override the capture timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{
        AccessKind, CreateKind, DataChange, MetadataKind, ModifyKind, RemoveKind, RenameMode,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_labels() {
        assert_eq!(EventKind::Created.label(), "Created");
        assert_eq!(EventKind::Deleted.label(), "Deleted");
        assert_eq!(EventKind::Modified.label(), "Modified");
    }

    #[test]
    fn test_basic_kinds_map() {
        assert_eq!(
            EventKind::from_notify(notify::EventKind::Create(CreateKind::File)),
            Some(EventKind::Created)
        );
        assert_eq!(
            EventKind::from_notify(notify::EventKind::Remove(RemoveKind::Folder)),
            Some(EventKind::Deleted)
        );
        assert_eq!(
            EventKind::from_notify(notify::EventKind::Modify(ModifyKind::Data(
                DataChange::Content
            ))),
            Some(EventKind::Modified)
        );
    }

    #[test]
    fn test_metadata_change_is_a_modification() {
        assert_eq!(
            EventKind::from_notify(notify::EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::WriteTime
            ))),
            Some(EventKind::Modified)
        );
    }

    #[test]
    fn test_rename_halves_split() {
        assert_eq!(
            EventKind::from_notify(notify::EventKind::Modify(ModifyKind::Name(
                RenameMode::From
            ))),
            Some(EventKind::Deleted)
        );
        assert_eq!(
            EventKind::from_notify(notify::EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(EventKind::Created)
        );
    }

    #[test]
    fn test_access_is_dropped() {
        assert_eq!(
            EventKind::from_notify(notify::EventKind::Access(AccessKind::Read)),
            None
        );
    }
}

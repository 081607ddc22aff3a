//! Notification-source backend over the `notify` crate.
//!
//! Every watched directory gets its own non-recursive watch so the watch
//! set can grow at runtime and individual watches can be observed dying.
//! notify runs its callback on an internal thread; the callback translates
//! raw notifications into [`SourceMessage`]s and bridges them into the
//! event loop over an mpsc channel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, warn};

use crate::config::EventFilter;
use crate::error::Result;
use crate::event::{Batch, EventKind, RawEvent};

/// Opaque token identifying one watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

impl WatchHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Directory -> handle map shared with the notify callback for event
/// attribution.
type DirMap = Arc<RwLock<HashMap<PathBuf, WatchHandle>>>;

/// Messages crossing from the notify callback thread into the event loop.
#[derive(Debug)]
enum SourceMessage {
    /// Entry event inside a watched directory.
    Entry {
        handle: WatchHandle,
        kind: EventKind,
        name: PathBuf,
    },

    /// A watched directory itself was removed; its watch is dead.
    Invalidated { handle: WatchHandle },

    /// The backend dropped notifications.
    Overflow,
}

/// The notification source: registration plus a blocking drain of pending
/// notifications.
///
/// Dropping the source releases every outstanding watch registration.
pub struct NotifySource {
    watcher: RecommendedWatcher,
    dirs: DirMap,
    rx: mpsc::Receiver<SourceMessage>,
    next_handle: u64,
}

impl NotifySource {
    /// Create a source that delivers only the kinds `filter` allows.
    pub fn new(filter: EventFilter) -> Result<Self> {
        let dirs: DirMap = Arc::new(RwLock::new(HashMap::new()));
        let (tx, rx) = mpsc::channel(1000);

        let callback_dirs = dirs.clone();
        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => dispatch(&event, filter, &callback_dirs, &tx),
                Err(e) => {
                    error!("notify backend error: {e}");
                }
            },
        )?;

        Ok(Self {
            watcher,
            dirs,
            rx,
            next_handle: 0,
        })
    }

    /// Register a directory and return its handle.
    ///
    /// A fresh handle is allocated even when the directory is already
    /// watched; the previous attribution entry is overwritten.
    pub async fn register(&mut self, dir: &Path) -> Result<WatchHandle> {
        self.watcher.watch(dir, RecursiveMode::NonRecursive)?;

        let handle = WatchHandle::new(self.next_handle);
        self.next_handle += 1;
        self.dirs.write().await.insert(dir.to_path_buf(), handle);

        debug!("registered {} as {handle:?}", dir.display());
        Ok(handle)
    }

    /// Drop a directory's registration.
    ///
    /// Errors are ignored; the watch is usually already gone along with
    /// the directory itself.
    pub async fn forget(&mut self, handle: WatchHandle, dir: &Path) {
        let _ = self.watcher.unwatch(dir);

        let mut dirs = self.dirs.write().await;
        if dirs.get(dir) == Some(&handle) {
            dirs.remove(dir);
        }
    }

    /// Suspend until at least one notification is pending, then drain
    /// everything immediately available, grouped per watched directory.
    ///
    /// Returns `None` when no further notifications can ever arrive.
    pub async fn next_batches(&mut self) -> Option<Vec<Batch>> {
        let first = self.rx.recv().await?;

        let mut messages = vec![first];
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }

        Some(group(messages))
    }
}

/// Group drained messages into per-directory batches, preserving arrival
/// order. Consecutive entry events for the same handle share a batch.
fn group(messages: Vec<SourceMessage>) -> Vec<Batch> {
    let mut batches: Vec<Batch> = Vec::new();

    for message in messages {
        match message {
            SourceMessage::Entry { handle, kind, name } => {
                let raw = RawEvent { kind, name };
                if let Some(Batch::Events { handle: last, events }) = batches.last_mut() {
                    if *last == handle {
                        events.push(raw);
                        continue;
                    }
                }
                batches.push(Batch::Events {
                    handle,
                    events: vec![raw],
                });
            }
            SourceMessage::Invalidated { handle } => {
                if let Some(Batch::Events { handle: last, .. }) = batches.last_mut() {
                    // The existing batch already triggers the re-arm check.
                    if *last == handle {
                        continue;
                    }
                }
                batches.push(Batch::Events {
                    handle,
                    events: Vec::new(),
                });
            }
            SourceMessage::Overflow => batches.push(Batch::Overflow),
        }
    }

    batches
}

/// Translate one notify event on the callback thread.
fn dispatch(
    event: &notify::Event,
    filter: EventFilter,
    dirs: &DirMap,
    tx: &mpsc::Sender<SourceMessage>,
) {
    if event.need_rescan() {
        send(tx, SourceMessage::Overflow);
        return;
    }

    // A rename within the tree can arrive as one event carrying both
    // paths; split it so each side gets its own kind.
    if let notify::EventKind::Modify(notify::event::ModifyKind::Name(
        notify::event::RenameMode::Both,
    )) = event.kind
    {
        if let [from, to] = event.paths.as_slice() {
            dispatch_path(EventKind::Deleted, from, filter, dirs, tx);
            dispatch_path(EventKind::Created, to, filter, dirs, tx);
            return;
        }
    }

    let Some(kind) = EventKind::from_notify(event.kind) else {
        return;
    };
    for path in &event.paths {
        dispatch_path(kind, path, filter, dirs, tx);
    }
}

/// Attribute one event path to a watched directory.
fn dispatch_path(
    kind: EventKind,
    path: &Path,
    filter: EventFilter,
    dirs: &DirMap,
    tx: &mpsc::Sender<SourceMessage>,
) {
    if filter.allows(kind) {
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            let handle = dirs.blocking_read().get(parent).copied();
            if let Some(handle) = handle {
                send(
                    tx,
                    SourceMessage::Entry {
                        handle,
                        kind,
                        name: PathBuf::from(name),
                    },
                );
            }
        }
    }

    // A deleted path that is itself a watched directory takes its watch
    // down with it. The attribution entry goes immediately, so duplicate
    // delete notifications cannot double-invalidate. Invalidation is not
    // filter-gated: a watch dies whether or not deletions are reported.
    if kind == EventKind::Deleted {
        if let Some(handle) = dirs.blocking_write().remove(path) {
            send(tx, SourceMessage::Invalidated { handle });
        }
    }
}

fn send(tx: &mpsc::Sender<SourceMessage>, message: SourceMessage) {
    if let Err(e) = tx.blocking_send(message) {
        warn!("dropping notification: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn entry(handle: u64, kind: EventKind, name: &str) -> SourceMessage {
        SourceMessage::Entry {
            handle: WatchHandle::new(handle),
            kind,
            name: PathBuf::from(name),
        }
    }

    #[test]
    fn test_group_merges_consecutive_same_handle() {
        let batches = group(vec![
            entry(1, EventKind::Created, "a"),
            entry(1, EventKind::Modified, "a"),
            entry(2, EventKind::Deleted, "b"),
            entry(1, EventKind::Modified, "a"),
        ]);

        assert_eq!(batches.len(), 3);
        match &batches[0] {
            Batch::Events { handle, events } => {
                assert_eq!(*handle, WatchHandle::new(1));
                assert_eq!(events.len(), 2);
            }
            other => panic!("unexpected batch: {other:?}"),
        }
    }

    #[test]
    fn test_group_invalidation_becomes_empty_batch() {
        let batches = group(vec![SourceMessage::Invalidated {
            handle: WatchHandle::new(3),
        }]);

        assert_eq!(
            batches,
            vec![Batch::Events {
                handle: WatchHandle::new(3),
                events: Vec::new(),
            }]
        );
    }

    #[test]
    fn test_group_invalidation_folds_into_pending_batch() {
        let batches = group(vec![
            entry(3, EventKind::Deleted, "f"),
            SourceMessage::Invalidated {
                handle: WatchHandle::new(3),
            },
        ]);

        // One batch: the pending events already trigger the re-arm check.
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn test_group_overflow_is_its_own_batch() {
        let batches = group(vec![
            entry(1, EventKind::Created, "a"),
            SourceMessage::Overflow,
            entry(1, EventKind::Created, "b"),
        ]);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1], Batch::Overflow);
    }

    #[tokio::test]
    async fn test_register_allocates_fresh_handles() {
        let temp_dir = TempDir::new().unwrap();
        let mut source = NotifySource::new(EventFilter::all()).unwrap();

        let first = source.register(temp_dir.path()).await.unwrap();
        let second = source.register(temp_dir.path()).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(
            source.dirs.read().await.get(temp_dir.path()),
            Some(&second)
        );
    }

    #[tokio::test]
    async fn test_forget_removes_attribution() {
        let temp_dir = TempDir::new().unwrap();
        let mut source = NotifySource::new(EventFilter::all()).unwrap();

        let handle = source.register(temp_dir.path()).await.unwrap();
        source.forget(handle, temp_dir.path()).await;

        assert!(source.dirs.read().await.is_empty());
    }
}

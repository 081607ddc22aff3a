//! Watch session: tree registration and the event loop.

use std::fs;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::WatchConfig;
use crate::error::{Result, WatchError};
use crate::event::{Batch, EventKind, RawEvent, ResolvedEvent};
use crate::registry::WatchRegistry;
use crate::reporter::{EventReporter, Sink};
use crate::source::{NotifySource, WatchHandle};

/// A directory-tree watch session.
///
/// Owns the notification source, the watch registry, and the reporter.
/// [`TreeWatcher::run`] drives the whole session on one task until the
/// caller cancels it or every watched directory has become inaccessible.
pub struct TreeWatcher {
    config: WatchConfig,
    source: NotifySource,
    registry: WatchRegistry,
    reporter: EventReporter,
    cancel: CancellationToken,
}

impl TreeWatcher {
    /// Create a session over `config`, writing event lines to `out` and
    /// diagnostics to `err`.
    pub fn new(config: WatchConfig, out: Sink, err: Sink) -> Result<Self> {
        if config.filter.is_empty() {
            return Err(WatchError::Config("no event kinds selected".to_string()));
        }

        let source = NotifySource::new(config.filter)?;
        let reporter = EventReporter::new(&config.root, out, err);

        Ok(Self {
            config,
            source,
            registry: WatchRegistry::new(),
            reporter,
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops the session when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the session to completion.
    ///
    /// Returns `Ok(())` on cancellation and on natural termination (no
    /// directories left to watch); only setup failures are errors.
    pub async fn run(mut self) -> Result<()> {
        self.initial_registration().await?;
        self.reporter.started();

        let cancel = self.cancel.clone();
        loop {
            let batches = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("watch session cancelled");
                    return Ok(());
                }
                batches = self.source.next_batches() => match batches {
                    Some(batches) => batches,
                    None => return Ok(()),
                },
            };

            for batch in batches {
                self.handle_batch(batch).await;
            }

            if self.registry.is_empty() {
                info!("no directories left to watch");
                return Ok(());
            }
        }
    }

    /// Register the root (fatal on failure) and, in recursive mode, every
    /// directory below it (best effort).
    async fn initial_registration(&mut self) -> Result<()> {
        let root = self.config.root.clone();

        if self.config.recursive {
            self.reporter.scanning();
            self.register_root(&root).await?;
            self.register_subtree(&root).await;
            self.reporter.all_registered();
        } else {
            self.register_root(&root).await?;
        }

        Ok(())
    }

    /// Initial root registration; failure here aborts the session.
    async fn register_root(&mut self, root: &Path) -> Result<()> {
        match self.source.register(root).await {
            Ok(handle) => {
                self.registry.add(handle, root);
                self.reporter.registered(root);
                Ok(())
            }
            Err(WatchError::Notify(source)) => Err(WatchError::RootRegistration {
                path: root.to_path_buf(),
                source,
            }),
            Err(e) => Err(e),
        }
    }

    /// Register one directory, record it, and report the outcome.
    async fn register(&mut self, dir: &Path) -> Result<()> {
        let handle = self.source.register(dir).await?;
        self.registry.add(handle, dir);
        self.reporter.registered(dir);
        Ok(())
    }

    /// Pre-order, best-effort registration of every directory strictly
    /// below `start`. A directory that fails to register or cannot be
    /// visited is reported and skipped; the rest of the tree is still
    /// attempted. Symbolic links are not followed.
    async fn register_subtree(&mut self, start: &Path) {
        let walker = WalkDir::new(start).min_depth(1).follow_links(false);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.reporter.error(&format!("failed to register directory: {e}"));
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if let Err(e) = self.register(entry.path()).await {
                self.reporter.error(&format!(
                    "failed to register directory {}: {e}",
                    entry.path().display()
                ));
            }
        }
    }

    /// Bring a subtree that appeared mid-run into the watch set.
    async fn extend_tree(&mut self, start: &Path) {
        if let Err(e) = self.register(start).await {
            // The directory may already be gone again; the session must
            // keep running either way.
            self.reporter.error(&format!(
                "failed to register directory {}: {e}",
                start.display()
            ));
            return;
        }
        self.register_subtree(start).await;
    }

    async fn handle_batch(&mut self, batch: Batch) {
        match batch {
            Batch::Overflow => self.reporter.error("event overflow encountered"),
            Batch::Events { handle, events } => self.process_batch(handle, events).await,
        }
    }

    /// Handle one directory's pending notifications, then re-check that
    /// the directory is still watchable.
    async fn process_batch(&mut self, handle: WatchHandle, events: Vec<RawEvent>) {
        let Some(dir) = self.registry.lookup(handle) else {
            self.reporter.error("watch handle not recognized");
            return;
        };
        let dir = dir.to_path_buf();

        for event in events {
            let path = dir.join(&event.name);
            self.reporter.event(&ResolvedEvent::new(event.kind, &path));

            if self.config.recursive
                && event.kind == EventKind::Created
                && fs::symlink_metadata(&path).is_ok_and(|m| m.is_dir())
            {
                self.extend_tree(&path).await;
            }
        }

        // Re-arm: a directory that vanished can never signal again.
        if fs::symlink_metadata(&dir).is_err() {
            self.source.forget(handle, &dir).await;
            self.registry.remove(handle);
            debug!("watch on {} invalidated", dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventFilter;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        fn sink(&self) -> Sink {
            Box::new(self.clone())
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn watcher(config: WatchConfig) -> (TreeWatcher, SharedBuf, SharedBuf) {
        let out = SharedBuf::default();
        let err = SharedBuf::default();
        let watcher = TreeWatcher::new(config, out.sink(), err.sink()).unwrap();
        (watcher, out, err)
    }

    #[test]
    fn test_empty_filter_is_rejected() {
        let config = WatchConfig::new("/tmp/w").with_filter(EventFilter::none());
        let result = TreeWatcher::new(
            config,
            Box::new(std::io::sink()),
            Box::new(std::io::sink()),
        );

        assert!(matches!(result, Err(WatchError::Config(_))));
    }

    #[tokio::test]
    async fn test_recursive_registration_covers_every_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("a/b")).unwrap();
        std::fs::create_dir(root.join("c")).unwrap();
        std::fs::write(root.join("a/file.txt"), b"x").unwrap();

        let (mut watcher, out, err) = watcher(WatchConfig::new(root));
        watcher.initial_registration().await.unwrap();

        // root, a, a/b, c — files do not get watches.
        assert_eq!(watcher.registry.len(), 4);

        let output = out.contents();
        assert!(output.contains(&format!("[Scanning '{}' ...]", root.display())));
        assert!(output.contains("[Registered: .]"));
        assert!(output.contains("[Registered: a]"));
        assert!(output.contains("[Registered: a/b]"));
        assert!(output.contains("[Registered: c]"));
        assert!(output.contains("[All directories registered successfully]"));
        assert_eq!(err.contents(), "");
    }

    #[tokio::test]
    async fn test_exclusive_registration_covers_only_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir(root.join("sub")).unwrap();

        let (mut watcher, out, _err) = watcher(WatchConfig::new(root).exclusive());
        watcher.initial_registration().await.unwrap();

        assert_eq!(watcher.registry.len(), 1);
        let output = out.contents();
        assert!(output.contains("[Registered: .]"));
        assert!(!output.contains("[Registered: sub]"));
        assert!(!output.contains("[Scanning"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_directory_is_not_registered() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir(root.join("real")).unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();

        let (mut watcher, out, _err) = watcher(WatchConfig::new(root));
        watcher.initial_registration().await.unwrap();

        assert_eq!(watcher.registry.len(), 2);
        assert!(!out.contents().contains("[Registered: link]"));
    }

    #[tokio::test]
    async fn test_overflow_reports_error_without_event_line() {
        let temp_dir = TempDir::new().unwrap();
        let (mut watcher, out, err) = watcher(WatchConfig::new(temp_dir.path()));
        watcher.initial_registration().await.unwrap();
        let registered = out.contents();

        watcher.handle_batch(Batch::Overflow).await;

        assert_eq!(out.contents(), registered);
        assert_eq!(err.contents(), "Error: event overflow encountered\n");
    }

    #[tokio::test]
    async fn test_unrecognized_handle_skips_batch() {
        let temp_dir = TempDir::new().unwrap();
        let (mut watcher, out, err) = watcher(WatchConfig::new(temp_dir.path()));
        watcher.initial_registration().await.unwrap();
        let registered = out.contents();

        watcher
            .handle_batch(Batch::Events {
                handle: WatchHandle::new(9999),
                events: vec![RawEvent {
                    kind: EventKind::Created,
                    name: PathBuf::from("ghost.txt"),
                }],
            })
            .await;

        assert_eq!(out.contents(), registered);
        assert!(err.contents().contains("watch handle not recognized"));
    }
}

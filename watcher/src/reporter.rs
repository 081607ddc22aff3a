//! Event formatting, temporal deduplication, and sink ownership.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Timelike;
use tracing::debug;

use crate::event::{EventKind, ResolvedEvent};

/// Write half of a session: an append-only text stream.
pub type Sink = Box<dyn Write + Send>;

/// The most recently emitted event, kept at whole-second precision.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LastEvent {
    kind: EventKind,
    path: PathBuf,
    second_of_day: u32,
}

/// Renders events as output lines, collapsing same-second duplicates.
///
/// Notification primitives routinely fire several notifications for what a
/// user perceives as one change (a single write can signal two
/// modifications within the same instant). An event matching the previous
/// one in kind, path, and wall-clock second is suppressed.
pub struct EventReporter {
    root: PathBuf,
    out: Sink,
    err: Sink,
    /// `None` until the first emitted event, so nothing can match it.
    last: Option<LastEvent>,
}

impl EventReporter {
    /// Create a reporter that renders paths relative to `root`.
    pub fn new(root: impl Into<PathBuf>, out: Sink, err: Sink) -> Self {
        Self {
            root: root.into(),
            out,
            err,
            last: None,
        }
    }

    /// Report an entry event.
    ///
    /// The dedup window is one wall-clock second wide and compares
    /// time-of-day only; the cache is untouched when an event is
    /// suppressed.
    pub fn event(&mut self, event: &ResolvedEvent) {
        let second_of_day = event.timestamp.time().num_seconds_from_midnight();

        if let Some(last) = &self.last {
            if last.second_of_day == second_of_day
                && last.kind == event.kind
                && last.path == event.path
            {
                debug!("suppressed duplicate {:?} for {}", event.kind, event.path.display());
                return;
            }
        }

        let line = format!(
            "{}: {:>8}: {}",
            event.timestamp.format("%H:%M:%S"),
            event.kind.label(),
            self.relative(&event.path).display(),
        );
        self.out_line(&line);

        self.last = Some(LastEvent {
            kind: event.kind,
            path: event.path.clone(),
            second_of_day,
        });
    }

    /// One line per successfully registered directory; the session root
    /// renders as ".".
    pub fn registered(&mut self, dir: &Path) {
        let line = if dir == self.root {
            "[Registered: .]".to_string()
        } else {
            format!("[Registered: {}]", self.relative(dir).display())
        };
        self.out_line(&line);
    }

    /// Progress line before a recursive scan.
    pub fn scanning(&mut self) {
        let line = format!("[Scanning '{}' ...]", self.root.display());
        self.out_line(&line);
    }

    /// Progress line after a recursive scan.
    pub fn all_registered(&mut self) {
        self.out_line("[All directories registered successfully]");
    }

    /// Banner emitted when the event loop starts listening.
    pub fn started(&mut self) {
        self.out_line("\n[ --- Watch service started --- ]\n");
    }

    /// Diagnostic line on the error sink.
    pub fn error(&mut self, message: &str) {
        let _ = writeln!(self.err, "Error: {message}");
        let _ = self.err.flush();
    }

    /// Write and flush immediately so cross-sink ordering matches
    /// processing order.
    fn out_line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

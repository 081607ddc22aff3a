//! # treewatch-watcher
//!
//! Watch-tree management for the `treewatch` CLI. This crate maintains the
//! set of watched directories, extends it at runtime when new
//! subdirectories appear, drains raw notifications from the platform
//! notification facility, and collapses same-second duplicates before
//! emitting event lines.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       TreeWatcher                          │
//! ├────────────────────────────────────────────────────────────┤
//! │  WatchConfig ──► NotifySource ──► Batch ──► EventReporter  │
//! │       │               │                          │         │
//! │       ▼               ▼                          ▼         │
//! │  EventFilter     WatchRegistry              output sinks   │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod registry;
pub mod reporter;
pub mod source;
pub mod watcher;

pub use config::{EventFilter, WatchConfig};
pub use error::{Result, WatchError};
pub use event::{Batch, EventKind, RawEvent, ResolvedEvent};
pub use registry::WatchRegistry;
pub use reporter::{EventReporter, Sink};
pub use source::{NotifySource, WatchHandle};
pub use watcher::TreeWatcher;

//! Thin CLI shell around `treewatch-watcher`.
//!
//! All state and edge-case handling live in the library; this binary only
//! parses arguments, selects sinks, and wires Ctrl-C to cancellation.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use treewatch_watcher::{EventFilter, Sink, TreeWatcher, WatchConfig};

/// Watch a directory tree and report file-system changes.
#[derive(Debug, Parser)]
#[command(name = "treewatch", version, about)]
struct Cli {
    /// Root directory to watch (defaults to the current directory)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Watch only the root, not its descendants
    #[arg(short = 'x', long)]
    exclusive: bool,

    /// Event kinds to watch: c (create), d (delete), m (modify)
    #[arg(short, long, value_delimiter = ',')]
    events: Option<Vec<String>>,

    /// Write event lines to this file and discard error lines
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Sink that swallows everything, used when errors are redirected away.
struct NullSink;

impl Write for NullSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn parse_filter(events: &[String]) -> Result<EventFilter> {
    let mut filter = EventFilter::none();
    for event in events {
        filter = match event.as_str() {
            "c" => filter.with_created(),
            "d" => filter.with_deleted(),
            "m" => filter.with_modified(),
            other => bail!("{other} (invalid event)"),
        };
    }
    if filter.is_empty() {
        bail!("no events selected");
    }
    Ok(filter)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let root = match cli.path {
        Some(path) => path,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    if root.symlink_metadata().is_err() {
        bail!("{} (cannot find the path specified)", root.display());
    }

    let filter = match cli.events {
        Some(events) => parse_filter(&events)?,
        None => EventFilter::all(),
    };

    let (out, err): (Sink, Sink) = match cli.output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("cannot open output file {}", path.display()))?;
            (Box::new(file), Box::new(NullSink))
        }
        None => (Box::new(io::stdout()), Box::new(io::stderr())),
    };

    let mut config = WatchConfig::new(root).with_filter(filter);
    if cli.exclusive {
        config = config.exclusive();
    }

    println!("[Press Ctrl-C for the service to stop]");

    let watcher = TreeWatcher::new(config, out, err)?;
    let cancel = watcher.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    watcher.run().await?;
    Ok(())
}

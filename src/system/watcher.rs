//! # Source Watcher
//!
//! Filesystem watches over the project's source pack directories, merged
//! with the termination signal into one event stream. The watch loop
//! suspends on [`SourceWatcher::wait`] between pipeline runs; there is no
//! debouncing, rapid successive changes may each trigger a run.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::{Receiver, channel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchSignal {
    SourceChanged,
    Terminated,
}

pub struct SourceWatcher {
    // Dropping the watcher tears down the OS watches, so it lives here.
    _watcher: RecommendedWatcher,
    rx: Receiver<WatchSignal>,
}

impl SourceWatcher {
    /// Registers watches on every existing source directory and hooks the
    /// termination signal into the same channel. Missing sources are
    /// skipped; staging already warns about them on every run.
    pub fn new<P: AsRef<Path>>(sources: &[P]) -> Result<Self> {
        let (tx, rx) = channel();

        let tx_fs = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    let _ = tx_fs.send(WatchSignal::SourceChanged);
                }
            }
        })
        .context("Could not initialize the filesystem watcher.")?;

        for source in sources {
            let source = source.as_ref();
            if !source.is_dir() {
                continue;
            }
            watcher
                .watch(source, RecursiveMode::Recursive)
                .with_context(|| format!("Could not watch '{}'.", source.display()))?;
        }

        ctrlc::set_handler(move || {
            let _ = tx.send(WatchSignal::Terminated);
        })
        .context("Could not register the termination signal handler.")?;

        Ok(Self { _watcher: watcher, rx })
    }

    /// Blocks until the next signal. Change events that queued up while a
    /// pipeline run was in flight are drained into one signal; a pending
    /// termination always wins over a pending change.
    pub fn wait(&self) -> WatchSignal {
        let mut signal = match self.rx.recv() {
            Ok(signal) => signal,
            // All senders gone; treat as termination.
            Err(_) => return WatchSignal::Terminated,
        };
        while let Ok(next) = self.rx.try_recv() {
            if next == WatchSignal::Terminated {
                signal = WatchSignal::Terminated;
            }
        }
        signal
    }
}

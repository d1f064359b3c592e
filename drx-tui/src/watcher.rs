//! Watching the open file for changes made by other programs

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// What happened to the watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    Changed,
    Removed,
}

/// Watches a single document file. Events are debounced: a burst of writes
/// is reported once, after the file has been quiet for the debounce period.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<FileEvent>,
    watched_path: PathBuf,
    pending: Option<(FileEvent, Instant)>,
}

impl FileWatcher {
    pub fn new(path: &Path) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let watched_path = path.to_path_buf();
        let target = watched_path.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let Ok(event) = res else {
                return;
            };
            if !event.paths.iter().any(|p| p == &target) {
                return;
            }
            let kind = match event.kind {
                EventKind::Modify(_) | EventKind::Create(_) => FileEvent::Changed,
                EventKind::Remove(_) => FileEvent::Removed,
                _ => return,
            };
            let _ = tx.send(kind);
        })
        .context("Failed to create file watcher")?;

        // The parent directory catches editors that save by atomic rename
        let watch_root = path.parent().unwrap_or(path);
        watcher
            .watch(watch_root, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch: {}", watch_root.display()))?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            watched_path,
            pending: None,
        })
    }

    /// Drain pending notifications and return the latest one once nothing new
    /// has arrived for `debounce_ms`
    pub fn poll(&mut self, debounce_ms: u64) -> Option<FileEvent> {
        while let Ok(event) = self.receiver.try_recv() {
            self.pending = Some((event, Instant::now()));
        }

        match self.pending {
            Some((event, at)) if at.elapsed() >= Duration::from_millis(debounce_ms) => {
                self.pending = None;
                Some(event)
            }
            _ => None,
        }
    }

    /// Whether a notification is waiting out its debounce period
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.watched_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;
    use tempfile::NamedTempFile;

    #[test]
    fn test_debounce_holds_back_fresh_events() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "# Initial")?;
        file.flush()?;

        let mut watcher = FileWatcher::new(file.path())?;
        writeln!(file, "More text")?;
        file.flush()?;
        thread::sleep(Duration::from_millis(50));

        // Whatever arrived is still inside the debounce window
        assert_eq!(watcher.poll(10_000), None);
        Ok(())
    }

    #[test]
    #[ignore] // File system events can be unreliable in test environments
    fn test_change_is_reported_once() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        let mut watcher = FileWatcher::new(file.path())?;

        for i in 0..3 {
            writeln!(file, "Change {}", i)?;
            file.flush()?;
        }
        thread::sleep(Duration::from_millis(500));

        assert_eq!(watcher.poll(100), Some(FileEvent::Changed));
        assert_eq!(watcher.poll(100), None);
        Ok(())
    }

    #[test]
    fn test_watcher_path() -> Result<()> {
        let file = NamedTempFile::new()?;
        let watcher = FileWatcher::new(file.path())?;
        assert_eq!(watcher.path(), file.path());
        assert!(!watcher.has_pending());
        Ok(())
    }
}

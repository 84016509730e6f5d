//! Directory monitor for live source roots.
//!
//! Changes made on disk while the editor runs are buffered here and applied
//! to a [`Vfs`](crate::Vfs) with [`Vfs::apply_changes`](crate::Vfs::apply_changes)
//! from the owning thread. Uses FSEvents on macOS, inotify on Linux.

use std::path::{Path, PathBuf};

/// Change observed below a monitored root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// File created or modified
    FileChanged { path: PathBuf },
    /// Directory created
    DirCreated { path: PathBuf },
    /// File or directory removed
    Removed { path: PathBuf },
}

impl MonitorEvent {
    pub fn path(&self) -> &Path {
        match self {
            MonitorEvent::FileChanged { path }
            | MonitorEvent::DirCreated { path }
            | MonitorEvent::Removed { path } => path,
        }
    }
}

#[cfg(feature = "notify")]
pub use watcher::DirectoryMonitor;

#[cfg(feature = "notify")]
mod watcher {
    use std::path::{Path, PathBuf};
    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;

    use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
    use tracing::info;

    use jasset_config::{log_monitor_debug, log_monitor_warn};
    use jasset_config::path::to_vfs_relative;

    use super::MonitorEvent;
    use crate::ignore::IgnoreMatcher;

    /// Recursive watcher over one source root
    pub struct DirectoryMonitor {
        root: PathBuf,
        ignore: IgnoreMatcher,
        _watcher: RecommendedWatcher,
        event_rx: Receiver<Result<Event, notify::Error>>,
    }

    impl DirectoryMonitor {
        /// Start watching `root` recursively.
        pub fn new(
            root: impl Into<PathBuf>,
            ignore: IgnoreMatcher,
            poll_interval: Duration,
        ) -> notify::Result<Self> {
            let root = root.into();
            let (tx, rx) = mpsc::channel();

            let watcher_config = Config::default()
                .with_poll_interval(poll_interval)
                .with_compare_contents(false);

            let mut watcher = RecommendedWatcher::new(
                move |res| {
                    let _ = tx.send(res);
                },
                watcher_config,
            )?;
            watcher.watch(&root, RecursiveMode::Recursive)?;

            info!(path = %root.display(), "Directory monitor started");

            Ok(Self {
                root,
                ignore,
                _watcher: watcher,
                event_rx: rx,
            })
        }

        pub fn root(&self) -> &Path {
            &self.root
        }

        fn should_ignore(&self, path: &Path) -> bool {
            match to_vfs_relative(path, &self.root) {
                Some(relative) => self.ignore.should_ignore(Path::new(&relative)),
                None => true,
            }
        }

        fn to_monitor_events(&self, event: Event, out: &mut Vec<MonitorEvent>) {
            for path in event.paths {
                if self.should_ignore(&path) {
                    continue;
                }
                let change = match event.kind {
                    EventKind::Create(_) if path.is_dir() => MonitorEvent::DirCreated { path },
                    EventKind::Create(_) | EventKind::Modify(_) => {
                        // Renames surface as Modify on both ends
                        if path.exists() {
                            if path.is_dir() {
                                MonitorEvent::DirCreated { path }
                            } else {
                                MonitorEvent::FileChanged { path }
                            }
                        } else {
                            MonitorEvent::Removed { path }
                        }
                    }
                    EventKind::Remove(_) => MonitorEvent::Removed { path },
                    _ => continue,
                };
                // Collapse bursts of writes to the same file
                if out.last() != Some(&change) {
                    out.push(change);
                }
            }
        }

        /// Drain buffered events (non-blocking).
        pub fn poll(&self) -> Vec<MonitorEvent> {
            let mut events = Vec::new();
            while let Ok(result) = self.event_rx.try_recv() {
                match result {
                    Ok(event) => {
                        log_monitor_debug!(
                            "FS event received",
                            paths = event.paths.len()
                        );
                        self.to_monitor_events(event, &mut events);
                    }
                    Err(e) => {
                        log_monitor_warn!("Watch error", error = e.to_string().as_str());
                    }
                }
            }
            events
        }
    }
}

#[cfg(all(test, feature = "notify"))]
mod tests {
    use super::*;
    use crate::ignore::IgnoreMatcher;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn poll_until(monitor: &DirectoryMonitor, pred: impl Fn(&[MonitorEvent]) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            seen.extend(monitor.poll());
            if pred(&seen) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        false
    }

    #[test]
    fn test_event_path() {
        let event = MonitorEvent::Removed {
            path: PathBuf::from("/a/b"),
        };
        assert_eq!(event.path(), Path::new("/a/b"));
    }

    #[test]
    fn test_detects_new_file() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let monitor =
            DirectoryMonitor::new(&root, IgnoreMatcher::default(), Duration::from_millis(100))
                .unwrap();

        let file = root.join("fresh.txt");
        std::fs::write(&file, b"hi").unwrap();

        assert!(poll_until(&monitor, |events| {
            events
                .iter()
                .any(|e| matches!(e, MonitorEvent::FileChanged { path } if path.ends_with("fresh.txt")))
        }));
    }
}

//! Configuration file watcher for live validation.
//!
//! Every change to the watched file is re-validated and the outcome is
//! reported on a channel. Configurations already handed out stay untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::ConfigLoader;
use crate::config::schema::GatewayConfig;

/// Result of re-validating the watched file.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// The file loaded cleanly.
    Valid(Arc<GatewayConfig>),
    /// The file failed to load; carries the error message.
    Invalid(String),
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    loader: ConfigLoader,
    update_tx: mpsc::UnboundedSender<WatchEvent>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for validation results.
    pub fn new(path: &Path, loader: ConfigLoader) -> (Self, mpsc::UnboundedReceiver<WatchEvent>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                loader,
                update_tx,
            },
            update_rx,
        )
    }

    /// Validate the file once and report the result on the channel.
    pub fn check_now(&self) {
        let _ = self.update_tx.send(evaluate(&self.loader, &self.path));
    }

    /// Start watching the file on the notify background thread.
    ///
    /// The parent directory is watched so that editors replacing the file by
    /// rename keep producing events. The returned watcher must be kept alive
    /// for events to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let loader = self.loader.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if concerns(&event, &path) {
                        tracing::info!(path = %path.display(), "Config file change detected, revalidating");
                        let _ = tx.send(evaluate(&loader, &path));
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(watch_dir(&self.path), RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Directory holding `path`; a bare file name lives in the working directory.
fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Whether a directory event touches the watched file.
fn concerns(event: &Event, path: &Path) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some() && p.file_name() == path.file_name())
}

fn evaluate(loader: &ConfigLoader, path: &Path) -> WatchEvent {
    match loader.load(path) {
        Ok(config) => WatchEvent::Valid(Arc::new(config)),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Configuration is invalid");
            WatchEvent::Invalid(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind, RenameMode};
    use std::io::Write;

    #[test]
    fn test_watch_dir() {
        assert_eq!(watch_dir(Path::new("/etc/dewpoint.js")), Path::new("/etc"));
        assert_eq!(watch_dir(Path::new("dewpoint.js")), Path::new("."));
    }

    #[test]
    fn test_events_filtered_by_file_name() {
        let path = Path::new("/etc/dewpoint.js");

        let renamed_over = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("/etc/dewpoint.js"));
        assert!(concerns(&renamed_over, path));

        let recreated = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/etc/dewpoint.js"));
        assert!(concerns(&recreated, path));

        let editor_swap = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/etc/.dewpoint.js.swp"));
        assert!(!concerns(&editor_swap, path));

        let removed = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/etc/dewpoint.js"));
        assert!(!concerns(&removed, path));
    }

    #[tokio::test]
    async fn test_check_now_reports_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ \"dewpoint\": ").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(file.path(), ConfigLoader::new());
        watcher.check_now();

        match rx.recv().await {
            Some(WatchEvent::Invalid(message)) => assert!(message.contains("parse error")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let (watcher, mut rx) = ConfigWatcher::new(&dir.path().join("absent.js"), ConfigLoader::new());
        watcher.check_now();

        assert!(matches!(rx.recv().await, Some(WatchEvent::Invalid(_))));
    }
}

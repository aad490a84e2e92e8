use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};

use crate::configuration::types::WatchSettings;
use crate::error_handling::types::WatchError;
use crate::session_management::reconciler::Reconciler;
use crate::session_management::session::SessionTable;
use crate::session_management::LifecycleEvent;
use crate::status_parser::parse;

/// Drops notifications fired within `window` of the last accepted one.
///
/// Callers pass the time the notification fired, not the time it is handled,
/// since a duplicate can sit in the queue through a whole pass.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    pub fn accept(&mut self, fired: Instant) -> bool {
        match self.last_accepted {
            Some(last) if fired.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last_accepted = Some(fired);
                true
            }
        }
    }
}

pub struct StatusWatcher {
    path: PathBuf,
    settings: WatchSettings,
    reconciler: Reconciler,
}

impl StatusWatcher {
    pub fn new<P: AsRef<Path>>(path: P, settings: WatchSettings, reconciler: Reconciler) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            settings,
            reconciler,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Watches the status file until `shutdown` flips to `true`.
    ///
    /// One pass runs right away to establish the first table. Any read, parse
    /// or reconciliation failure ends the loop with an error.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), WatchError> {
        let (tx, mut rx) = mpsc::channel::<Instant>(1);
        // Dropping the notifier stops its thread, so it lives as long as the loop.
        let _notifier = start_notifier(&self.path, tx)?;
        info!("Watching {}", self.path.display());

        self.pass().await?;
        self.follow(&mut rx, &mut shutdown).await
    }

    /// Runs a pass for every accepted notification time read from `rx`.
    async fn follow(
        &mut self,
        rx: &mut mpsc::Receiver<Instant>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), WatchError> {
        let mut debouncer = Debouncer::new(self.settings.debounce);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Status watcher stopping");
                        return Ok(());
                    }
                }
                notification = rx.recv() => {
                    let Some(fired) = notification else {
                        error!("Notifier for {} went away", self.path.display());
                        return Err(WatchError::ChannelClosed);
                    };
                    if !debouncer.accept(fired) {
                        debug!("Duplicate notification ignored");
                        continue;
                    }
                    tokio::time::sleep(self.settings.settle_delay).await;
                    self.pass().await?;
                }
            }
        }
    }

    /// Reads the status file and reconciles it against the owned table.
    pub async fn pass(&mut self) -> Result<Vec<LifecycleEvent>, WatchError> {
        let table = self.load_table().await?;
        let events = self.reconciler.reconcile(table).await.map_err(|e| {
            error!("Reconciliation pass failed: {}", e);
            WatchError::from(e)
        })?;
        debug!(
            "Pass done: {} events, {} live sessions",
            events.len(),
            self.reconciler.sessions().len()
        );
        Ok(events)
    }

    /// A torn write gets one more settle delay before parsing is fatal.
    async fn load_table(&self) -> Result<SessionTable, WatchError> {
        match self.read_table().await {
            Err(WatchError::Parse(e)) => {
                warn!("Status file not parseable ({}), reading again", e);
                tokio::time::sleep(self.settings.settle_delay).await;
                self.read_table().await.map_err(|e| {
                    error!("Status file still unusable: {}", e);
                    e
                })
            }
            other => other,
        }
    }

    async fn read_table(&self) -> Result<SessionTable, WatchError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            error!("Failed to read {}: {}", self.path.display(), e);
            WatchError::ReadFailed(e)
        })?;
        Ok(parse(&raw)?)
    }
}

/// Forwards the firing time of every non-access event on `path` into `tx`. A
/// full channel means a pass is already pending, so extra events are dropped.
fn start_notifier(
    path: &Path,
    tx: mpsc::Sender<Instant>,
) -> Result<RecommendedWatcher, WatchError> {
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Access(_)) {
                    let _ = tx.try_send(Instant::now());
                }
            }
            Err(err) => error!("Status file notifier error: {}", err),
        },
        notify::Config::default(),
    )?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::types::ParseError;
    use crate::test_support::{BackendCall, MemoryStore, RecordingBackend};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn status_file(clients: &[(&str, &str)]) -> String {
        let mut out = String::from(
            "OpenVPN CLIENT LIST\n\
             Updated,Thu Feb 11 06:45:56 2021\n\
             Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since\n",
        );
        for (identity, since) in clients {
            out.push_str(&format!("{},198.51.100.2:40000,100,200,{}\n", identity, since));
        }
        out.push_str("ROUTING TABLE\nVirtual Address,Common Name,Real Address,Last Ref\n");
        for (identity, _) in clients {
            out.push_str(&format!(
                "10.8.0.2,{},198.51.100.2:40000,Thu Feb 11 06:46:00 2021\n",
                identity
            ));
        }
        out.push_str("GLOBAL STATS\nMax bcast/mcast queue length,0\nEND\n");
        out
    }

    fn fast_settings() -> WatchSettings {
        WatchSettings {
            debounce: Duration::from_millis(10),
            settle_delay: Duration::from_millis(20),
        }
    }

    fn watcher_for(path: &Path, backend: Arc<RecordingBackend>) -> StatusWatcher {
        let reconciler = Reconciler::new(backend, Arc::new(MemoryStore::default()));
        StatusWatcher::new(path, fast_settings(), reconciler)
    }

    fn counting_watcher(path: &Path, store: Arc<MemoryStore>) -> StatusWatcher {
        let settings = WatchSettings {
            debounce: Duration::from_millis(100),
            settle_delay: Duration::from_millis(150),
        };
        let reconciler = Reconciler::new(Arc::new(RecordingBackend::default()), store);
        StatusWatcher::new(path, settings, reconciler)
    }

    /// Feeds two firing times to the loop, the second one while the first
    /// pass is still settling, and returns how many passes were saved.
    async fn passes_for(path: &Path, second_after: Duration) -> usize {
        let store = Arc::new(MemoryStore::default());
        let mut watcher = counting_watcher(path, store.clone());
        let (tx, mut rx) = mpsc::channel::<Instant>(1);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let fired = Instant::now();
        tx.send(fired).await.unwrap();
        let handle = tokio::spawn(async move { watcher.follow(&mut rx, &mut stop_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(fired + second_after).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        stop_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        store.saves()
    }

    async fn wait_for_calls(backend: &RecordingBackend, count: usize) {
        for _ in 0..200 {
            if backend.calls().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("backend saw {:?}", backend.calls());
    }

    #[test]
    fn test_debouncer_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        assert!(debouncer.accept(start));
        assert!(!debouncer.accept(start + Duration::from_millis(40)));
        assert!(!debouncer.accept(start + Duration::from_millis(99)));
        assert!(debouncer.accept(start + Duration::from_millis(100)));
        assert!(!debouncer.accept(start + Duration::from_millis(150)));
    }

    #[tokio::test]
    async fn test_duplicate_queued_during_pass_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.log");
        std::fs::write(&path, status_file(&[("3", "Thu Feb 11 06:40:00 2021")])).unwrap();

        assert_eq!(passes_for(&path, Duration::from_millis(5)).await, 1);
    }

    #[tokio::test]
    async fn test_notification_after_window_runs_again() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.log");
        std::fs::write(&path, status_file(&[("3", "Thu Feb 11 06:40:00 2021")])).unwrap();

        assert_eq!(passes_for(&path, Duration::from_millis(120)).await, 2);
    }

    #[tokio::test]
    async fn test_pass_reconciles_file_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.log");
        std::fs::write(&path, status_file(&[("3", "Thu Feb 11 06:40:00 2021")])).unwrap();

        let backend = Arc::new(RecordingBackend::default());
        let mut watcher = watcher_for(&path, backend.clone());

        let events = watcher.pass().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(backend.calls(), vec![BackendCall::Connected("3".into())]);
        assert_eq!(
            watcher.reconciler().sessions().get("3").unwrap().virtual_address,
            "10.8.0.2"
        );
    }

    #[tokio::test]
    async fn test_unparseable_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.log");
        std::fs::write(&path, "half written\n").unwrap();

        let mut watcher = watcher_for(&path, Arc::new(RecordingBackend::default()));
        assert!(matches!(
            watcher.pass().await,
            Err(WatchError::Parse(ParseError::TooFewLines(_)))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut watcher = watcher_for(&dir.path().join("gone.log"), Arc::new(RecordingBackend::default()));
        assert!(matches!(watcher.pass().await, Err(WatchError::ReadFailed(_))));
    }

    #[tokio::test]
    async fn test_backend_failure_ends_pass() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.log");
        std::fs::write(&path, status_file(&[("3", "Thu Feb 11 06:40:00 2021")])).unwrap();

        let backend = Arc::new(RecordingBackend::default());
        backend.fail_everything();
        let mut watcher = watcher_for(&path, backend);

        assert!(matches!(watcher.pass().await, Err(WatchError::Reconcile(_))));
        assert!(watcher.reconciler().sessions().is_empty());
    }

    #[tokio::test]
    async fn test_run_follows_file_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.log");
        std::fs::write(&path, status_file(&[("3", "Thu Feb 11 06:40:00 2021")])).unwrap();

        let backend = Arc::new(RecordingBackend::default());
        let watcher = watcher_for(&path, backend.clone());
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(watcher.run(stop_rx));

        wait_for_calls(&backend, 1).await;
        std::fs::write(&path, status_file(&[("4", "Thu Feb 11 06:44:00 2021")])).unwrap();
        wait_for_calls(&backend, 3).await;

        stop_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(
            backend.calls()[..3],
            [
                BackendCall::Connected("3".into()),
                BackendCall::Disconnected("3".into(), backend.disconnected()[0].connected_since),
                BackendCall::Connected("4".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_fails_on_bad_initial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.log");
        std::fs::write(&path, "garbage\n".repeat(12)).unwrap();

        let watcher = watcher_for(&path, Arc::new(RecordingBackend::default()));
        let (_stop_tx, stop_rx) = watch::channel(false);
        assert!(matches!(
            watcher.run(stop_rx).await,
            Err(WatchError::Parse(ParseError::MissingClientListHeader))
        ));
    }
}

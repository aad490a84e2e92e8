use std::future::Future;
use std::sync::Arc;

use log::{error, info};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::configuration::config::Config;
use crate::error_handling::types::*;
use crate::rpc_client::backend::{BackendApi, DirectoryBackend};
use crate::rpc_client::client::{build_http_client, RpcClient};
use crate::rpc_client::directory::DirectoryClient;
use crate::session_management::crash_recovery::CrashRecovery;
use crate::session_management::reconciler::Reconciler;
use crate::storage::recovery_file::RecoveryFileStorage;
use crate::storage::storage_trait::RecoveryStore;
use crate::watcher::status_watcher::StatusWatcher;
use crate::web_interface::web_server::AuthRelay;

/// Which of the supervised futures finished first.
enum Finished {
    Signal,
    Watcher(Result<(), ControllerError>),
    Relay(Result<(), ControllerError>),
}

pub struct Controller {
    config: Config,
    backend: Arc<dyn BackendApi>,
    store: Arc<dyn RecoveryStore>,
}

impl Controller {
    /// Validates `config` and builds the production backend client and
    /// recovery store from it.
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate().map_err(|e| {
            error!("Invalid configuration: {}", e);
            ControllerError::from(e)
        })?;

        let http = build_http_client(config.request_timeout())
            .map_err(|e| ControllerError::InitializationFailed(e.to_string()))?;
        let directory = DirectoryClient::new(http.clone(), &config.directory_settings());
        let backend = Arc::new(DirectoryBackend::new(
            directory,
            RpcClient::new(http),
            config.backend_role.clone(),
            config.node_id,
        ));
        let store = Arc::new(RecoveryFileStorage::new(&config.recovery_file));

        info!("Controller ready for node {}", config.node_id);
        Ok(Self::with_parts(config, backend, store))
    }

    pub fn with_parts(
        config: Config,
        backend: Arc<dyn BackendApi>,
        store: Arc<dyn RecoveryStore>,
    ) -> Self {
        Self {
            config,
            backend,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Recovers, then runs the watcher and the relay until `shutdown`
    /// resolves or either of them stops. Returns the first failure.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), ControllerError> {
        let report = CrashRecovery::new(self.backend.clone(), self.store.clone())
            .recover()
            .await
            .map_err(|e| {
                error!("Crash recovery failed: {}", e);
                ControllerError::RecoveryError(e)
            })?;
        info!("Recovery complete, {} stale connections closed", report.total());

        let (stop_tx, stop_rx) = watch::channel(false);

        let watcher = StatusWatcher::new(
            &self.config.status_file,
            self.config.watch_settings(),
            Reconciler::new(self.backend.clone(), self.store.clone()),
        );
        let mut watcher_task = tokio::spawn(watcher.run(stop_rx.clone()));

        let relay_settings = self.config.relay_settings();
        let mut relay_task = if relay_settings.enabled {
            let relay = AuthRelay::new(self.backend.clone(), relay_settings);
            let mut relay_stop = stop_rx.clone();
            Some(tokio::spawn(relay.run(async move {
                let _ = relay_stop.wait_for(|stop| *stop).await;
            })))
        } else {
            info!("Authentication relay disabled");
            None
        };

        tokio::pin!(shutdown);
        let finished = tokio::select! {
            _ = &mut shutdown => Finished::Signal,
            res = &mut watcher_task => Finished::Watcher(joined(res)),
            res = wait_optional(&mut relay_task) => Finished::Relay(joined(res)),
        };

        let _ = stop_tx.send(true);

        let (watcher_result, relay_result) = match finished {
            Finished::Signal => {
                info!("Shutting down");
                (joined(watcher_task.await), join_optional(relay_task).await)
            }
            Finished::Watcher(res) => {
                info!("Status watcher ended, stopping relay");
                (res, join_optional(relay_task).await)
            }
            Finished::Relay(res) => {
                info!("Relay ended, stopping status watcher");
                (joined(watcher_task.await), res)
            }
        };

        for result in [&watcher_result, &relay_result] {
            if let Err(e) = result {
                error!("{}", e);
            }
        }
        watcher_result.and(relay_result)
    }
}

fn joined<E>(res: Result<Result<(), E>, JoinError>) -> Result<(), ControllerError>
where
    ControllerError: From<E>,
{
    match res {
        Ok(inner) => inner.map_err(ControllerError::from),
        Err(e) => Err(ControllerError::TaskFailed(e.to_string())),
    }
}

async fn wait_optional<T>(task: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match task.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn join_optional(
    task: Option<JoinHandle<Result<(), RelayError>>>,
) -> Result<(), ControllerError> {
    match task {
        Some(handle) => joined(handle.await),
        None => Ok(()),
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc_client::types::RemoteConnection;
    use crate::test_support::{BackendCall, MemoryStore, RecordingBackend};
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    const STATUS: &str = "OpenVPN CLIENT LIST\n\
        Updated,Thu Feb 11 06:45:56 2021\n\
        Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since\n\
        21,198.51.100.2:40000,100,200,Thu Feb 11 06:40:00 2021\n\
        ROUTING TABLE\n\
        Virtual Address,Common Name,Real Address,Last Ref\n\
        10.8.0.2,21,198.51.100.2:40000,Thu Feb 11 06:45:00 2021\n\
        GLOBAL STATS\n\
        Max bcast/mcast queue length,0\n\
        END\n";

    fn config_for(dir: &Path, status: &str) -> Config {
        let status_file = dir.join("status.log");
        std::fs::write(&status_file, status).unwrap();
        Config {
            status_file,
            recovery_file: dir.join("recovery.json"),
            node_id: 2,
            internal_api_endpoint: "127.0.0.1:9".into(),
            internal_api_secure: false,
            internal_api_path_prefix: String::new(),
            internal_api_token: "token".into(),
            backend_role: "ff-backend".into(),
            relay_bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            relay_port: 0,
            relay_disabled: true,
            debounce_ms: 10,
            settle_delay_ms: 10,
            request_timeout_secs: 1,
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let mut config = config_for(dir.path(), STATUS);
        config.node_id = 0;
        assert!(matches!(
            Controller::new(config),
            Err(ControllerError::ConfigurationError(ConfigError::InvalidNodeId(_)))
        ));
    }

    #[tokio::test]
    async fn test_new_builds_from_valid_config() {
        let dir = TempDir::new().unwrap();
        let controller = Controller::new(config_for(dir.path(), STATUS)).unwrap();
        assert_eq!(controller.config().node_id, 2);
    }

    #[tokio::test]
    async fn test_recovery_runs_before_first_pass() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::with_remote(vec![RemoteConnection {
            user_id: "9".into(),
            data_received: 1,
            data_sent: 2,
            connect_date: 50,
        }]));
        let store = Arc::new(MemoryStore::default());
        let controller =
            Controller::with_parts(config_for(dir.path(), STATUS), backend.clone(), store.clone());

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(controller.run(async move {
            let _ = stop_rx.await;
        }));

        for _ in 0..200 {
            if store.saved().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::NodeConnections,
                BackendCall::Disconnected("9".into(), 50),
                BackendCall::Connected("21".into()),
            ]
        );
        assert!(store.saved().unwrap().contains("21"));
    }

    #[tokio::test]
    async fn test_shutdown_signal_waits_for_a_signal() {
        let mut signal = tokio_test::task::spawn(shutdown_signal());
        tokio_test::assert_pending!(signal.poll());
    }

    #[tokio::test]
    async fn test_recovery_failure_stops_startup() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        backend.fail_everything();
        let controller = Controller::with_parts(
            config_for(dir.path(), STATUS),
            backend,
            Arc::new(MemoryStore::default()),
        );

        let result = controller.run(std::future::pending()).await;
        assert!(matches!(result, Err(ControllerError::RecoveryError(_))));
    }

    #[tokio::test]
    async fn test_watcher_failure_ends_run() {
        let dir = TempDir::new().unwrap();
        let mut config = config_for(dir.path(), "truncated\n");
        config.relay_disabled = false;
        let controller = Controller::with_parts(
            config,
            Arc::new(RecordingBackend::default()),
            Arc::new(MemoryStore::default()),
        );

        let result = controller.run(std::future::pending()).await;
        assert!(matches!(result, Err(ControllerError::WatchError(WatchError::Parse(_)))));
    }
}

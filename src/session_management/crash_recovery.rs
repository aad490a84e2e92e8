use std::sync::Arc;

use log::{info, warn};

use crate::error_handling::types::ReconcileError;
use crate::rpc_client::backend::BackendApi;
use crate::storage::storage_trait::RecoveryStore;

/// Outcome of a crash recovery run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Connections closed with counters from the recovery snapshot.
    pub restored: usize,
    /// Connections closed with a stand-in built from the backend's own record.
    pub synthesized: usize,
}

impl RecoveryReport {
    pub fn total(&self) -> usize {
        self.restored + self.synthesized
    }
}

/// Closes every connection the backend still considers live on this node.
///
/// Runs once at startup, before the watcher. Whatever the agent saw before it
/// stopped is gone, so each remote connection is disconnected: with the last
/// known counters when the recovery snapshot has the identity, otherwise with
/// the backend's own figures and a disconnect time shortly after connect.
pub struct CrashRecovery {
    backend: Arc<dyn BackendApi>,
    store: Arc<dyn RecoveryStore>,
}

impl CrashRecovery {
    pub fn new(backend: Arc<dyn BackendApi>, store: Arc<dyn RecoveryStore>) -> Self {
        Self { backend, store }
    }

    pub async fn recover(&self) -> Result<RecoveryReport, ReconcileError> {
        let remote = self.backend.node_connections().await?;

        // Read even when nothing is open, so an unreadable snapshot fails startup.
        let snapshot = match self.store.load().await? {
            Some(table) => table,
            None => {
                warn!("No recovery snapshot, {} connections use backend data", remote.len());
                Default::default()
            }
        };

        if remote.is_empty() {
            info!("No connections left open on the backend");
            return Ok(RecoveryReport::default());
        }

        let mut report = RecoveryReport::default();
        for connection in &remote {
            match snapshot.get(&connection.user_id) {
                Some(session) => {
                    self.backend.mark_disconnected(session).await?;
                    report.restored += 1;
                }
                None => {
                    let session = connection.synthesize_session();
                    self.backend.mark_disconnected(&session).await?;
                    report.synthesized += 1;
                }
            }
        }

        info!(
            "Crash recovery closed {} connections ({} from snapshot, {} synthesized)",
            report.total(),
            report.restored,
            report.synthesized
        );
        Ok(report)
    }
}

use std::sync::Arc;

use log::{debug, error, info};

use crate::error_handling::types::ReconcileError;
use crate::rpc_client::backend::BackendApi;
use crate::session_management::session::SessionTable;
use crate::session_management::LifecycleEvent;
use crate::storage::storage_trait::RecoveryStore;

/// Computes the lifecycle events that turn `previous` into `current`.
///
/// Events come out in three phases: disconnects of identities that vanished,
/// connects of new identities, then for identities present in both either a
/// reconnect (disconnect of the old instance followed by connect of the new
/// one) or an update. Within a phase identities are in ascending order.
pub fn diff(previous: &SessionTable, current: &SessionTable) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();

    for session in previous {
        if !current.contains(&session.identity) {
            events.push(LifecycleEvent::Disconnected(session.clone()));
        }
    }

    for session in current {
        if !previous.contains(&session.identity) {
            events.push(LifecycleEvent::Connected(session.clone()));
        }
    }

    for old in previous {
        let Some(new) = current.get(&old.identity) else {
            continue;
        };
        // The status file keeps ended sessions around for minutes, so a quick
        // reconnect only shows up as a later connected_since. The old record
        // must be closed before the new one is opened.
        if new.connected_since > old.connected_since {
            events.push(LifecycleEvent::Disconnected(old.clone()));
            events.push(LifecycleEvent::Connected(new.clone()));
        } else {
            events.push(LifecycleEvent::Updated(old.clone()));
        }
    }

    events
}

/// Owner of the session table the node currently believes in.
///
/// Each call to [`reconcile`](Reconciler::reconcile) is one pass: the new table
/// is diffed against the owned one, every event is forwarded to the backend in
/// order, and only when all of that succeeded is the new table swapped in and
/// written to the recovery store. Taking `&mut self` keeps passes serialized.
pub struct Reconciler {
    sessions: SessionTable,
    backend: Arc<dyn BackendApi>,
    store: Arc<dyn RecoveryStore>,
}

impl Reconciler {
    /// Starts from an empty table: after crash recovery the backend holds no
    /// live connection for this node, so everything in the first snapshot is new.
    pub fn new(backend: Arc<dyn BackendApi>, store: Arc<dyn RecoveryStore>) -> Self {
        Self {
            sessions: SessionTable::new(),
            backend,
            store,
        }
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Runs one reconciliation pass against `current`.
    ///
    /// On error the owned table and the recovery snapshot are left untouched.
    pub async fn reconcile(
        &mut self,
        current: SessionTable,
    ) -> Result<Vec<LifecycleEvent>, ReconcileError> {
        let events = diff(&self.sessions, &current);
        debug!(
            "Reconciling {} -> {} sessions, {} events",
            self.sessions.len(),
            current.len(),
            events.len()
        );

        for event in &events {
            self.dispatch(event).await.map_err(|e| {
                error!(
                    "Pass aborted at {:?} for {}: {}",
                    event_name(event),
                    event.session().identity,
                    e
                );
                e
            })?;
        }

        self.store.save(&current).await?;
        self.sessions = current;
        Ok(events)
    }

    async fn dispatch(&self, event: &LifecycleEvent) -> Result<(), ReconcileError> {
        match event {
            LifecycleEvent::Connected(session) => {
                info!("Client connected {}", session.identity);
                self.backend.mark_connected(session).await?;
            }
            LifecycleEvent::Disconnected(session) => {
                info!("Client disconnected {}", session.identity);
                self.backend.mark_disconnected(session).await?;
            }
            LifecycleEvent::Updated(session) => {
                debug!("Client updated {}", session.identity);
            }
        }
        Ok(())
    }
}

fn event_name(event: &LifecycleEvent) -> &'static str {
    match event {
        LifecycleEvent::Connected(_) => "connect",
        LifecycleEvent::Disconnected(_) => "disconnect",
        LifecycleEvent::Updated(_) => "update",
    }
}

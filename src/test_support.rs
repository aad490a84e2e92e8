//! In-memory stand-ins for the backend and the recovery store.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error_handling::types::{RpcError, StorageError};
use crate::rpc_client::backend::BackendApi;
use crate::rpc_client::types::{AuthenticationResult, RemoteConnection};
use crate::session_management::session::{Session, SessionTable};
use crate::storage::storage_trait::RecoveryStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Connected(String),
    /// Identity and `connected_since` of the instance being closed.
    Disconnected(String, i64),
    NodeConnections,
    Authenticate(String),
}

#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<BackendCall>>,
    disconnected: Mutex<Vec<Session>>,
    remote: Mutex<Vec<RemoteConnection>>,
    permitted: Mutex<Vec<(String, String)>>,
    failing_identity: Mutex<Option<String>>,
    fail_all: Mutex<bool>,
}

impl RecordingBackend {
    pub fn with_remote(remote: Vec<RemoteConnection>) -> Self {
        let backend = Self::default();
        *backend.remote.lock().unwrap() = remote;
        backend
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn disconnected(&self) -> Vec<Session> {
        self.disconnected.lock().unwrap().clone()
    }

    pub fn permit(&self, username: &str, password: &str) {
        self.permitted
            .lock()
            .unwrap()
            .push((username.to_string(), password.to_string()));
    }

    /// Every call about `identity` fails from now on.
    pub fn fail_on_identity(&self, identity: &str) {
        *self.failing_identity.lock().unwrap() = Some(identity.to_string());
    }

    pub fn fail_everything(&self) {
        *self.fail_all.lock().unwrap() = true;
    }

    fn check(&self, identity: Option<&str>) -> Result<(), RpcError> {
        if *self.fail_all.lock().unwrap() {
            return Err(RpcError::Status("503 Service Unavailable".into()));
        }
        let failing = self.failing_identity.lock().unwrap();
        match (failing.as_deref(), identity) {
            (Some(f), Some(i)) if f == i => Err(RpcError::Status("500 Internal Server Error".into())),
            _ => Ok(()),
        }
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BackendApi for RecordingBackend {
    async fn node_connections(&self) -> Result<Vec<RemoteConnection>, RpcError> {
        self.check(None)?;
        self.record(BackendCall::NodeConnections);
        Ok(self.remote.lock().unwrap().clone())
    }

    async fn mark_connected(&self, session: &Session) -> Result<(), RpcError> {
        self.check(Some(&session.identity))?;
        self.record(BackendCall::Connected(session.identity.clone()));
        Ok(())
    }

    async fn mark_disconnected(&self, session: &Session) -> Result<(), RpcError> {
        self.check(Some(&session.identity))?;
        self.record(BackendCall::Disconnected(
            session.identity.clone(),
            session.connected_since,
        ));
        self.disconnected.lock().unwrap().push(session.clone());
        Ok(())
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationResult, RpcError> {
        self.check(None)?;
        self.record(BackendCall::Authenticate(username.to_string()));
        let permit_connection = self
            .permitted
            .lock()
            .unwrap()
            .iter()
            .any(|(u, p)| u == username && p == password);
        Ok(AuthenticationResult {
            permit_connection,
            reason: None,
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<SessionTable>>,
    saves: Mutex<usize>,
    fail_saves: Mutex<bool>,
    corrupt: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_snapshot(table: SessionTable) -> Self {
        let store = Self::default();
        *store.snapshot.lock().unwrap() = Some(table);
        store
    }

    pub fn saved(&self) -> Option<SessionTable> {
        self.snapshot.lock().unwrap().clone()
    }

    /// Successful saves so far.
    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    pub fn fail_saves(&self) {
        *self.fail_saves.lock().unwrap() = true;
    }

    pub fn corrupt(&self) {
        *self.corrupt.lock().unwrap() = true;
    }
}

#[async_trait]
impl RecoveryStore for MemoryStore {
    async fn load(&self) -> Result<Option<SessionTable>, StorageError> {
        if *self.corrupt.lock().unwrap() {
            let err = serde_json::from_str::<SessionTable>("{").unwrap_err();
            return Err(StorageError::Corrupt(err));
        }
        Ok(self.saved())
    }

    async fn save(&self, table: &SessionTable) -> Result<(), StorageError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(StorageError::WriteFailed(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )));
        }
        *self.snapshot.lock().unwrap() = Some(table.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

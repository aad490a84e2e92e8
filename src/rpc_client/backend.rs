//! Commands the agent sends to the backend role.
//!
//! [`BackendApi`] is the seam between the session engine and the network: the
//! reconciler, the crash recovery coordinator and the authentication relay only
//! see this trait.

use async_trait::async_trait;
use log::{debug, info};

use crate::error_handling::types::RpcError;
use crate::rpc_client::client::RpcClient;
use crate::rpc_client::directory::DirectoryClient;
use crate::rpc_client::types::{
    AuthenticationResult, MarkConnected, MarkDisconnected, NodeAuthentication,
    NodeConnectionsQuery, RemoteConnection, RpcResponse,
};
use crate::session_management::session::Session;

pub const GET_NODE_CONNECTIONS: &str = "get-node-connections";
pub const MARK_CONNECTED: &str = "mark-connected";
pub const MARK_DISCONNECTED: &str = "mark-disconnected";
pub const NODE_AUTHENTICATION: &str = "node-authentication";

#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Connections the backend believes are live on this node.
    async fn node_connections(&self) -> Result<Vec<RemoteConnection>, RpcError>;

    async fn mark_connected(&self, session: &Session) -> Result<(), RpcError>;

    /// Closes the accounting record of `session`, using its counters and
    /// `last_ref` as the disconnect time.
    async fn mark_disconnected(&self, session: &Session) -> Result<(), RpcError>;

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationResult, RpcError>;
}

/// [`BackendApi`] over the directory: every command resolves a fresh endpoint
/// for the backend role and invokes the command there.
pub struct DirectoryBackend {
    directory: DirectoryClient,
    rpc: RpcClient,
    role: String,
    node_id: u32,
}

impl DirectoryBackend {
    pub fn new(directory: DirectoryClient, rpc: RpcClient, role: String, node_id: u32) -> Self {
        Self {
            directory,
            rpc,
            role,
            node_id,
        }
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    async fn send<P>(&self, command: &str, payload: &P) -> Result<RpcResponse, RpcError>
    where
        P: serde::Serialize + Sync + ?Sized,
    {
        let endpoint = self.directory.resolve(&self.role).await?;
        debug!(
            "{} routed to {} endpoint {}:{}",
            command, self.role, endpoint.endpoint, endpoint.port
        );
        self.rpc.invoke(&endpoint, command, payload).await
    }
}

#[async_trait]
impl BackendApi for DirectoryBackend {
    async fn node_connections(&self) -> Result<Vec<RemoteConnection>, RpcError> {
        let query = NodeConnectionsQuery { node: self.node_id };
        self.send(GET_NODE_CONNECTIONS, &query).await?.into_typed()
    }

    async fn mark_connected(&self, session: &Session) -> Result<(), RpcError> {
        let payload = MarkConnected::from_session(session, self.node_id)?;
        self.send(MARK_CONNECTED, &payload).await?;
        info!("Backend marked {} connected", session.identity);
        Ok(())
    }

    async fn mark_disconnected(&self, session: &Session) -> Result<(), RpcError> {
        let payload = MarkDisconnected::from_session(session, self.node_id)?;
        self.send(MARK_DISCONNECTED, &payload).await?;
        info!("Backend marked {} disconnected", session.identity);
        Ok(())
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationResult, RpcError> {
        let payload = NodeAuthentication {
            node: self.node_id,
            username: username.to_string(),
            password: password.to_string(),
        };
        self.send(NODE_AUTHENTICATION, &payload).await?.into_typed()
    }
}

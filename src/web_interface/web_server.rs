use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use warp::Filter;

use super::routes::authenticate_route;
use crate::configuration::types::RelaySettings;
use crate::error_handling::types::RelayError;
use crate::rpc_client::backend::BackendApi;

/// HTTP server answering the VPN daemon's credential checks
pub struct AuthRelay {
    backend: Arc<dyn BackendApi>,
    settings: RelaySettings,
}

impl AuthRelay {
    /// Create a new AuthRelay instance
    pub fn new(backend: Arc<dyn BackendApi>, settings: RelaySettings) -> Self {
        Self { backend, settings }
    }

    /// Binds the listener. The returned future serves requests until `shutdown`
    /// resolves.
    pub fn bind(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(SocketAddr, impl Future<Output = ()>), RelayError> {
        let routes = authenticate_route(self.backend.clone()).with(warp::log("vpn_node_agent::relay"));
        let requested = self.settings.socket_addr();

        let (addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(requested, shutdown)
            .map_err(|e| {
                error!("Relay could not bind {}: {}", requested, e);
                RelayError::BindFailed(format!("{}: {}", requested, e))
            })?;

        info!("Authentication relay listening on {}", addr);
        Ok((addr, server))
    }

    /// Serves until `shutdown` resolves.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RelayError> {
        let (_, server) = self.bind(shutdown)?;
        server.await;
        info!("Authentication relay stopped");
        Ok(())
    }
}

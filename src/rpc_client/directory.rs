use log::{debug, error, info};
use rand::seq::SliceRandom;
use reqwest::header::CONTENT_TYPE;

use crate::configuration::types::DirectorySettings;
use crate::error_handling::types::RpcError;
use crate::rpc_client::client::content_type_essence;
use crate::rpc_client::types::Endpoint;

const LIST_PATH: &str = "ffrpc/list";
const TOKEN_HEADER: &str = "token";

/// Looks up RPC endpoints by role in the internal API directory.
///
/// Nothing is cached: each [`resolve`](DirectoryClient::resolve) performs a
/// fresh lookup, which is acceptable at the agent's call volume.
#[derive(Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl DirectoryClient {
    pub fn new(http: reqwest::Client, settings: &DirectorySettings) -> Self {
        let base_url = settings.base_url();
        info!("Directory lookups go to {}", base_url);
        Self {
            http,
            base_url,
            token: settings.token.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists every endpoint currently registered under `role`.
    pub async fn list(&self, role: &str) -> Result<Vec<Endpoint>, RpcError> {
        let url = format!("{}{}", self.base_url, LIST_PATH);
        let response = self
            .http
            .get(&url)
            .query(&[("type", role)])
            .header(TOKEN_HEADER, self.token.as_str())
            .send()
            .await
            .map_err(|e| {
                error!("Directory lookup for {} failed: {}", role, e);
                RpcError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("Directory lookup for {} returned {}", role, status);
            return Err(RpcError::Status(status.to_string()));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| content_type_essence(v) == "application/json")
            .unwrap_or(false);
        if !is_json {
            return Err(RpcError::UnexpectedResponse(format!(
                "directory lookup for {} did not return JSON",
                role
            )));
        }

        let endpoints: Vec<Endpoint> = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;
        debug!("Directory lists {} endpoints for {}", endpoints.len(), role);
        Ok(endpoints)
    }

    /// Picks one endpoint registered under `role`, uniformly at random.
    pub async fn resolve(&self, role: &str) -> Result<Endpoint, RpcError> {
        let endpoints = self.list(role).await?;
        choose_endpoint(&endpoints, role)
    }
}

/// Uniform random choice among `endpoints`.
pub fn choose_endpoint(endpoints: &[Endpoint], role: &str) -> Result<Endpoint, RpcError> {
    endpoints
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| RpcError::NoEndpoints(role.to_string()))
}

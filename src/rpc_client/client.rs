use std::collections::HashMap;
use std::time::Duration;

use log::{debug, error};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;

use crate::error_handling::types::RpcError;
use crate::rpc_client::types::{Endpoint, RpcResponse};

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Builds the HTTP client shared by directory lookups and command calls.
///
/// The timeout is what eventually fails a pass when a backend hangs.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, RpcError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(RpcError::Transport)
}

/// Strips parameters such as `; charset=utf-8` from a content type.
pub fn content_type_essence(value: &str) -> &str {
    value.split(';').next().unwrap_or(value).trim()
}

/// Decodes a response body according to its declared content type.
///
/// JSON is preferred, then form encoded key/value pairs, then raw text. A body
/// declared as JSON that does not parse is an error rather than text.
pub fn decode_body(content_type: Option<&str>, body: String) -> Result<RpcResponse, RpcError> {
    match content_type.map(content_type_essence) {
        Some(CONTENT_TYPE_JSON) => serde_json::from_str(&body)
            .map(RpcResponse::Json)
            .map_err(|e| RpcError::Decode(e.to_string())),
        Some(CONTENT_TYPE_FORM) => {
            let pairs: HashMap<String, String> = url::form_urlencoded::parse(body.as_bytes())
                .into_owned()
                .collect();
            Ok(RpcResponse::Form(pairs))
        }
        _ => Ok(RpcResponse::Text(body)),
    }
}

/// Issues named commands to RPC endpoints found in the directory.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
}

impl RpcClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Sends `command` with a JSON `payload` to `endpoint`.
    ///
    /// A non-success status is returned as [`RpcError::Status`] carrying the
    /// status text.
    pub async fn invoke<P>(
        &self,
        endpoint: &Endpoint,
        command: &str,
        payload: &P,
    ) -> Result<RpcResponse, RpcError>
    where
        P: Serialize + ?Sized,
    {
        let url = endpoint.command_url(command);
        debug!("Invoking {} on {}", command, url);

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, endpoint.auth_token.as_str())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!("Command {} to {} failed: {}", command, url, e);
                RpcError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("Command {} to {} returned {}", command, url, status);
            return Err(RpcError::Status(status.to_string()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;
        decode_body(content_type.as_deref(), body)
    }
}

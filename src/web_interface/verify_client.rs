//! Client side of the relay, used by the VPN daemon's `auth-user-pass-verify`
//! hook through the `auth-verify` binary.

use std::path::Path;

use serde::Serialize;

use crate::error_handling::types::RpcError;

pub const DEFAULT_RELAY_URL: &str = "http://localhost:4351/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialsFile {
    pub username: String,
    pub password: String,
}

/// Reads the daemon's credentials file: username on the first line, password
/// on the second. Missing lines read as empty strings.
pub async fn read_credentials(path: &Path) -> std::io::Result<CredentialsFile> {
    let content = tokio::fs::read_to_string(path).await?;
    let mut lines = content.lines().map(str::trim);
    Ok(CredentialsFile {
        username: lines.next().unwrap_or_default().to_string(),
        password: lines.next().unwrap_or_default().to_string(),
    })
}

/// Posts `credentials` to the relay. Only a 200 counts as permitted.
pub async fn verify(
    http: &reqwest::Client,
    relay_url: &str,
    credentials: &CredentialsFile,
) -> Result<bool, RpcError> {
    let response = http.post(relay_url).json(credentials).send().await?;
    Ok(response.status() == reqwest::StatusCode::OK)
}

use std::collections::HashMap;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error_handling::types::RpcError;
use crate::session_management::session::Session;

/// One RPC server registered in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(rename = "type")]
    pub role: String,
    pub auth_token: String,
    pub endpoint: String,
    #[serde(deserialize_with = "lenient_u16")]
    pub port: u16,
}

impl Endpoint {
    pub fn command_url(&self, command: &str) -> String {
        format!("http://{}:{}/{}", self.endpoint, self.port, command)
    }
}

/// Decoded body of a command response.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcResponse {
    Json(serde_json::Value),
    Form(HashMap<String, String>),
    Text(String),
}

impl RpcResponse {
    /// Deserializes a structured (JSON or form encoded) response into `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, RpcError> {
        let value = match self {
            RpcResponse::Json(value) => value,
            RpcResponse::Form(map) => serde_json::to_value(map)
                .map_err(|e| RpcError::Decode(e.to_string()))?,
            RpcResponse::Text(text) => return Err(RpcError::UnexpectedResponse(text)),
        };
        serde_json::from_value(value).map_err(|e| RpcError::Decode(e.to_string()))
    }
}

/// A connection the backend believes is live on this node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteConnection {
    #[serde(deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub data_received: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub data_sent: u64,
    #[serde(deserialize_with = "lenient_i64")]
    pub connect_date: i64,
}

/// Offset applied to `connect_date` when inventing a disconnect time for a
/// connection the agent has no local record of.
pub const SYNTHESIZED_LAST_REF_OFFSET: i64 = 60;

impl RemoteConnection {
    /// Builds a stand-in session from the backend's own record.
    pub fn synthesize_session(&self) -> Session {
        Session {
            identity: self.user_id.clone(),
            real_address: String::new(),
            virtual_address: String::new(),
            bytes_received: self.data_received,
            bytes_sent: self.data_sent,
            connected_since: self.connect_date,
            last_ref: Some(self.connect_date + SYNTHESIZED_LAST_REF_OFFSET),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeConnectionsQuery {
    pub node: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkConnected {
    pub user: u64,
    pub node: u32,
    pub local_ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkDisconnected {
    pub user: u64,
    pub node: u32,
    pub local_ip: String,
    pub data_received: u64,
    pub data_sent: u64,
    /// Left out when the routing table never listed the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnect_date: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeAuthentication {
    pub node: u32,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResult {
    #[serde(deserialize_with = "lenient_bool")]
    pub permit_connection: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Session identities are backend user ids.
pub fn user_id(session: &Session) -> Result<u64, RpcError> {
    session
        .identity
        .trim()
        .parse::<u64>()
        .map_err(|_| RpcError::InvalidIdentity(session.identity.clone()))
}

impl MarkConnected {
    pub fn from_session(session: &Session, node: u32) -> Result<Self, RpcError> {
        Ok(Self {
            user: user_id(session)?,
            node,
            local_ip: session.virtual_address.clone(),
        })
    }
}

impl MarkDisconnected {
    pub fn from_session(session: &Session, node: u32) -> Result<Self, RpcError> {
        Ok(Self {
            user: user_id(session)?,
            node,
            local_ip: session.virtual_address.clone(),
            data_received: session.bytes_received,
            data_sent: session.bytes_sent,
            disconnect_date: session.last_ref,
        })
    }
}

// The backend is not consistent about quoting numbers, and form encoded
// responses carry everything as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn as_text(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Text(s) => s.trim().to_string(),
        }
    }
}

fn lenient_parse<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
{
    let scalar = Scalar::deserialize(deserializer)?;
    let text = match scalar {
        Scalar::Float(n) if n.fract() == 0.0 => (n as i64).to_string(),
        other => other.as_text(),
    };
    text.parse::<T>()
        .map_err(|_| de::Error::custom(format!("invalid number: {}", text)))
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    lenient_parse(deserializer)
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    lenient_parse(deserializer)
}

fn lenient_u16<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    lenient_parse(deserializer)
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Scalar::deserialize(deserializer)?.as_text())
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Bool(b) => Ok(b),
        Scalar::Unsigned(n) => Ok(n != 0),
        Scalar::Signed(n) => Ok(n != 0),
        Scalar::Float(n) => Ok(n != 0.0),
        Scalar::Text(s) => Ok(matches!(s.trim(), "true" | "1")),
    }
}

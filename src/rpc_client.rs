//! Load balanced RPC client for the backend.
//!
//! ```text
//! ┌──────────────┐  role   ┌──────────────────┐  endpoint  ┌─────────────┐
//! │ BackendApi   │────────▶│ DirectoryClient  │───────────▶│ RpcClient   │──▶ backend
//! │ (commands)   │         │ (fresh lookup)   │            │ (invoke)    │
//! └──────────────┘         └──────────────────┘            └─────────────┘
//! ```
//!
//! - `directory`: resolves a role to one registered endpoint, chosen at random.
//! - `client`: posts a named command and decodes the reply by content type.
//! - `backend`: the typed commands the agent issues.
//! - `types`: wire types shared by the above.

pub mod backend;
pub mod client;
pub mod directory;
pub mod types;

pub use backend::{BackendApi, DirectoryBackend};
pub use client::RpcClient;
pub use directory::DirectoryClient;
pub use types::{Endpoint, RemoteConnection, RpcResponse};

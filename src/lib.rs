pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod rpc_client;
pub mod session_management;
pub mod status_parser;
pub mod storage;
pub mod watcher;
pub mod web_interface;

pub use session_management::{LifecycleEvent, Session, SessionTable};

#[cfg(test)]
pub(crate) mod test_support;

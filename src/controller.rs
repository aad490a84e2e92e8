//! Process-level orchestration.
//!
//! The controller wires the configuration into the backend client and the
//! recovery store, runs crash recovery and then supervises the status watcher
//! and the authentication relay until a signal arrives or one of them stops.

pub mod controller_handler;

pub use controller_handler::{shutdown_signal, Controller};

//! Error types shared across the agent.
//!
//! Every layer has its own enum; the outer layers wrap the inner ones so a
//! failure reaching `main` still carries the original cause.

pub mod types;

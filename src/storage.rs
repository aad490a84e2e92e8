//! Storage subsystem
//!
//! This module provides the durable recovery snapshot: the session table the
//! agent believed in after its last successful reconciliation pass.
//!
//! Components:
//! - `storage_trait`: the RecoveryStore trait defining a uniform API.
//! - `recovery_file`: JSON file implementation used in production.

pub mod recovery_file;
pub mod storage_trait;

pub use recovery_file::RecoveryFileStorage;
pub use storage_trait::RecoveryStore;

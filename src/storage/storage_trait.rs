//! Storage Trait
//!
//! This module defines the `RecoveryStore` trait, the interface through which the
//! reconciler persists its session table and the crash recovery path reads it
//! back.
//!
//! Implementors of this trait are responsible for:
//! - Replacing the stored table wholesale on every save
//! - Reporting "nothing stored yet" as `Ok(None)` rather than an error

use async_trait::async_trait;

use crate::error_handling::types::StorageError;
use crate::session_management::session::SessionTable;

/// The `RecoveryStore` trait defines the interface for recovery snapshot backends.
///
/// There is a single writer (the reconciler); the crash recovery coordinator
/// reads once at startup.
#[async_trait]
pub trait RecoveryStore: Send + Sync {
    /// Loads the last saved table, or `None` when nothing was ever saved.
    async fn load(&self) -> Result<Option<SessionTable>, StorageError>;

    /// Overwrites the stored table with `table`.
    ///
    /// - `table` - The full session table of the last successful pass.
    async fn save(&self, table: &SessionTable) -> Result<(), StorageError>;
}

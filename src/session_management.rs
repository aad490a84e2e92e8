//! Session management core module.
//!
//! This module holds the session model and the two components that keep the
//! backend's ledger in step with what this node observes:
//! - `reconciler`: diffs consecutive snapshots into lifecycle events and
//!   forwards them to the backend.
//! - `crash_recovery`: repairs the backend's view once at startup, after an
//!   unclean shutdown may have lost events.

/// Submodule for repairing backend state at startup.
pub mod crash_recovery;
/// Submodule for the snapshot diff and event dispatch.
pub mod reconciler;
/// Submodule for session data structures.
pub mod session;

pub use crash_recovery::{CrashRecovery, RecoveryReport};
pub use reconciler::Reconciler;
pub use session::{Session, SessionTable};

/// A transition of one identity between two snapshots.
///
/// Variants:
/// - `Connected`: a new connection instance, carrying the current session.
/// - `Disconnected`: a connection instance ended, carrying its last known state.
/// - `Updated`: the same instance is still live, carrying the previous session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connected(Session),
    Disconnected(Session),
    Updated(Session),
}

impl LifecycleEvent {
    pub fn session(&self) -> &Session {
        match self {
            LifecycleEvent::Connected(s)
            | LifecycleEvent::Disconnected(s)
            | LifecycleEvent::Updated(s) => s,
        }
    }
}

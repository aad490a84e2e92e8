//! Status file watcher.
//!
//! Turns change notifications on the status file into serialized
//! parse-and-reconcile passes. The notifier thread only forwards into a
//! single-slot channel; one async loop owns the [`Reconciler`] and runs every
//! pass, so two passes never overlap.
//!
//! [`Reconciler`]: crate::session_management::reconciler::Reconciler

pub mod status_watcher;

pub use status_watcher::{Debouncer, StatusWatcher};

//! Status file parsing.
//!
//! The VPN daemon periodically rewrites a sectioned, comma separated status
//! file. [`status_file::parse`] turns one complete copy of it into a
//! [`SessionTable`](crate::session_management::SessionTable).

pub mod status_file;

pub use status_file::parse;

//! Version records and their persistence
//!
//! # Modules
//!
//! - [`record`]: `VersionRecord` value type, download references and ordering
//! - [`store`]: Reading and atomically writing the installed version record
//! - [`error`]: Error types for version parsing and record storage

pub mod error;
pub mod record;
pub mod store;

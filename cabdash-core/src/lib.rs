//! cabdash core - shared error, logging and configuration layer
//!
//! Everything here is independent of the session model so that the session
//! client and the command-line driver agree on one error type and one config file.

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tracing;

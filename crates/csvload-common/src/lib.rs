//! csvload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging setup for the csvload workspace.
//!
//! # Overview
//!
//! - **Error Handling**: `CommonError` and the `Result` alias
//! - **Logging**: `tracing` subscriber configuration shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use csvload_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};

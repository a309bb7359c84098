//! csvload Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads every CSV file of a directory into a PostgreSQL schema, one table
//! per file, and records a per-table checkpoint so unchanged files are not
//! loaded again.
//!
//! # Modules
//!
//! - [`config`]: credentials, source directory and policy, resolved once
//! - [`discovery`]: source file listing and modification times
//! - [`frame`]: CSV reading and column type inference
//! - [`checkpoint`]: freshness policy and the `checkpoints` table
//! - [`writer`]: full-replace table writes
//! - [`pipeline`]: the ingestion loop tying it together
//!
//! # Example
//!
//! ```no_run
//! use csvload::{config::LoaderConfig, db, pipeline::Ingestor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LoaderConfig::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!
//!     let ingestor = Ingestor::new(pool, config);
//!     ingestor.prepare().await?;
//!     let summary = ingestor.run().await?;
//!     println!("loaded {} tables", summary.loaded);
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod config;
pub mod db;
pub mod discovery;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod writer;

pub use error::{IngestError, Result};

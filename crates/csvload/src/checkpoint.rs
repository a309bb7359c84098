//! Per-table checkpoints
//!
//! A checkpoint records the modification time of the source file that was
//! last loaded into a table. The loop compares it with the current file's
//! modification time to decide whether the table has to be replaced.
//!
//! ```text
//! <schema>.checkpoints
//!   table_name       TEXT PRIMARY KEY
//!   last_checkpoint  TIMESTAMP NOT NULL
//! ```

use crate::db::qualified;
use crate::error::Result;
use chrono::NaiveDateTime;
use csvload_common::CommonError;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;

/// Name of the checkpoint relation inside the destination schema
pub const CHECKPOINT_TABLE: &str = "checkpoints";

/// Which side of the checkpoint a file's modification time must fall on
/// for the file to be reloaded
///
/// `OlderThanCheckpoint` is the historical behavior of this loader: a file
/// is reloaded only when its modification time is strictly earlier than
/// the stored checkpoint. It looks inverted, since a freshly edited file is
/// newer and therefore skipped, but it stays the default until the intent
/// is confirmed. `NewerThanCheckpoint` is the "load only changed files"
/// reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreshnessPolicy {
    #[default]
    OlderThanCheckpoint,
    NewerThanCheckpoint,
}

impl FreshnessPolicy {
    /// Whether a file modified at `modified_at` is due against `checkpoint`
    pub fn is_due(self, modified_at: NaiveDateTime, checkpoint: NaiveDateTime) -> bool {
        match self {
            FreshnessPolicy::OlderThanCheckpoint => modified_at < checkpoint,
            FreshnessPolicy::NewerThanCheckpoint => modified_at > checkpoint,
        }
    }
}

impl std::str::FromStr for FreshnessPolicy {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "older-than-checkpoint" | "older" => Ok(FreshnessPolicy::OlderThanCheckpoint),
            "newer-than-checkpoint" | "newer" => Ok(FreshnessPolicy::NewerThanCheckpoint),
            _ => Err(CommonError::parse(format!(
                "Invalid freshness policy '{}': expected 'older-than-checkpoint' or 'newer-than-checkpoint'",
                s
            ))),
        }
    }
}

impl std::fmt::Display for FreshnessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FreshnessPolicy::OlderThanCheckpoint => write!(f, "older-than-checkpoint"),
            FreshnessPolicy::NewerThanCheckpoint => write!(f, "newer-than-checkpoint"),
        }
    }
}

/// Outcome of comparing a file against its checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDecision {
    /// No checkpoint row exists yet
    FirstLoad,
    /// Checkpoint exists and the policy says the file is due
    Stale { checkpoint: NaiveDateTime },
    /// Checkpoint exists and the file is not due
    UpToDate { checkpoint: NaiveDateTime },
}

/// Decide whether a file must be (re)loaded
pub fn decide(
    policy: FreshnessPolicy,
    modified_at: NaiveDateTime,
    checkpoint: Option<NaiveDateTime>,
) -> LoadDecision {
    match checkpoint {
        None => LoadDecision::FirstLoad,
        Some(checkpoint) if policy.is_due(modified_at, checkpoint) => {
            LoadDecision::Stale { checkpoint }
        },
        Some(checkpoint) => LoadDecision::UpToDate { checkpoint },
    }
}

/// Reads and writes checkpoint rows
///
/// Every call runs against the pool directly, so each lookup or upsert
/// acquires its own connection and returns it when done.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    pool: PgPool,
    schema: String,
}

impl CheckpointStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    fn table(&self) -> String {
        qualified(&self.schema, CHECKPOINT_TABLE)
    }

    /// Create the schema and checkpoint table when they do not exist
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            crate::db::quote_ident(&self.schema)
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                table_name TEXT PRIMARY KEY,
                last_checkpoint TIMESTAMP NOT NULL
            )
            "#,
            self.table()
        ))
        .execute(&self.pool)
        .await?;

        debug!(schema = %self.schema, "Checkpoint table ready");
        Ok(())
    }

    /// Last checkpoint recorded for `table_name`
    ///
    /// An absent row is `Ok(None)`; any database failure is an error.
    pub async fn lookup(&self, table_name: &str) -> Result<Option<NaiveDateTime>> {
        let checkpoint = sqlx::query_scalar::<_, NaiveDateTime>(&format!(
            "SELECT last_checkpoint FROM {} WHERE table_name = $1",
            self.table()
        ))
        .bind(table_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(checkpoint)
    }

    /// Insert or advance the checkpoint for `table_name`
    pub async fn upsert(&self, table_name: &str, checkpoint: NaiveDateTime) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (table_name, last_checkpoint)
            VALUES ($1, $2)
            ON CONFLICT (table_name)
            DO UPDATE SET last_checkpoint = EXCLUDED.last_checkpoint
            "#,
            self.table()
        ))
        .bind(table_name)
        .bind(checkpoint)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

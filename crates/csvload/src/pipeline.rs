//! Checkpoint-gated ingestion loop
//!
//! For every file in the source directory:
//!
//! 1. look up the table's checkpoint
//! 2. decide, through the configured [`FreshnessPolicy`], whether it is due
//! 3. if so, read the file, stamp it, replace the table, advance the checkpoint
//!
//! Files are processed one after the other. Lookup, load and checkpoint write
//! are separate database operations; a crash between the load and the
//! checkpoint write means the file is loaded again on the next run.
//!
//! [`FreshnessPolicy`]: crate::checkpoint::FreshnessPolicy

use crate::checkpoint::{decide, CheckpointStore, LoadDecision};
use crate::config::LoaderConfig;
use crate::discovery::{discover, SourceFile};
use crate::error::Result;
use crate::frame::CsvFrame;
use crate::writer::TableWriter;
use chrono::{Local, NaiveDateTime};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

/// Source of the ingestion timestamp stamped on loaded rows
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Loaded {
        table_name: String,
        rows: u64,
        checkpoint: NaiveDateTime,
    },
    Skipped {
        table_name: String,
        checkpoint: NaiveDateTime,
    },
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub loaded: usize,
    pub skipped: usize,
    pub rows_written: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Loaded { rows, .. } => {
                self.loaded += 1;
                self.rows_written += rows;
            },
            FileOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Runs the ingestion loop against one database
pub struct Ingestor {
    config: LoaderConfig,
    checkpoints: CheckpointStore,
    writer: TableWriter,
    clock: Clock,
}

impl Ingestor {
    pub fn new(pool: PgPool, config: LoaderConfig) -> Self {
        let schema = config.database.schema.clone();
        Self {
            checkpoints: CheckpointStore::new(pool.clone(), schema.clone()),
            writer: TableWriter::new(pool, schema),
            config,
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Replace the wall clock used for ingestion timestamps
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Create the schema and checkpoint table if needed
    pub async fn prepare(&self) -> Result<()> {
        self.checkpoints.ensure_table().await
    }

    /// Process every file in the source directory
    ///
    /// Stops at the first error; files already processed keep their new
    /// tables and checkpoints.
    pub async fn run(&self) -> Result<RunSummary> {
        let files = discover(&self.config.source)?;
        let mut summary = RunSummary {
            discovered: files.len(),
            ..Default::default()
        };

        info!(
            dir = %self.config.source.dir.display(),
            files = files.len(),
            policy = %self.config.freshness,
            "Starting ingestion run"
        );

        for file in &files {
            let span = info_span!("file", table = %file.table_name);
            let outcome = self.process(file).instrument(span).await?;
            summary.record(&outcome);
        }

        info!(
            discovered = summary.discovered,
            loaded = summary.loaded,
            skipped = summary.skipped,
            rows = summary.rows_written,
            "Ingestion run complete"
        );

        Ok(summary)
    }

    /// Check one file against its checkpoint and load it when due
    pub async fn process(&self, file: &SourceFile) -> Result<FileOutcome> {
        let ingestion_timestamp = (self.clock)();
        let existing = self.checkpoints.lookup(&file.table_name).await?;

        match decide(self.config.freshness, file.modified_at, existing) {
            LoadDecision::FirstLoad => {
                info!(table = %file.table_name, "No checkpoint found, loading for the first time");
            },
            LoadDecision::Stale { checkpoint } => {
                info!(
                    table = %file.table_name,
                    %checkpoint,
                    modified_at = %file.modified_at,
                    "Checkpoint exists and file is due, reloading"
                );
            },
            LoadDecision::UpToDate { checkpoint } => {
                info!(
                    table = %file.table_name,
                    %checkpoint,
                    modified_at = %file.modified_at,
                    "File not due against checkpoint, skipping"
                );
                return Ok(FileOutcome::Skipped {
                    table_name: file.table_name.clone(),
                    checkpoint,
                });
            },
        }

        info!(
            path = %file.path.display(),
            %ingestion_timestamp,
            "Loading file"
        );

        let frame = CsvFrame::read(&file.path)?;

        if let Some(expected) = self.config.expected_column.as_deref() {
            if !frame.has_column(expected) {
                warn!(table = %file.table_name, column = %expected, "Expected column missing");
            }
        }

        let frame = frame.with_ingestion_timestamp(ingestion_timestamp);
        let rows = self.writer.replace(&file.table_name, &frame).await?;

        info!(
            table = %file.table_name,
            schema = %self.config.database.schema,
            rows,
            "Table loaded"
        );

        self.checkpoints
            .upsert(&file.table_name, file.modified_at)
            .await?;

        info!(table = %file.table_name, checkpoint = %file.modified_at, "Checkpoint updated");

        Ok(FileOutcome::Loaded {
            table_name: file.table_name.clone(),
            rows,
            checkpoint: file.modified_at,
        })
    }
}

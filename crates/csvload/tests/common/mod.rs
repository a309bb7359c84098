//! Common test utilities for csvload integration tests using testcontainers
//!
//! Each test gets its own PostgreSQL container and its own source directory.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestPostgres, SourceDir};
//!
//! #[tokio::test]
//! async fn test_with_postgres() {
//!     let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
//!     let source = SourceDir::new();
//!     let config = pg.loader_config(source.path(), "healthcare");
//! }
//! ```

#![allow(dead_code)]

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csvload::checkpoint::FreshnessPolicy;
use csvload::config::{DatabaseConfig, LoaderConfig, SourceConfig};
use csvload::discovery::SourceFile;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

/// PostgreSQL image tag used by every test
pub const POSTGRES_TAG: &str = "16-alpine";

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL test container wrapper
pub struct TestPostgres {
    container: ContainerAsync<Postgres>,
    pool: PgPool,
    host: String,
    port: u16,
}

impl TestPostgres {
    /// Start a new PostgreSQL container and connect through the loader's own pool setup
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag(POSTGRES_TAG)
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?
            .to_string();
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        debug!(%host, port, "PostgreSQL container ready");

        let pool = csvload::db::create_pool(&database_config(&host, port, "healthcare"))
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            container,
            pool,
            host,
            port,
        })
    }

    /// Get a reference to the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a clone of the database pool
    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }

    /// Loader configuration pointing at this container
    pub fn loader_config(&self, source_dir: &Path, schema: &str) -> LoaderConfig {
        LoaderConfig {
            database: database_config(&self.host, self.port, schema),
            source: SourceConfig {
                dir: source_dir.to_path_buf(),
                reserved_prefix: "README".to_string(),
            },
            freshness: FreshnessPolicy::OlderThanCheckpoint,
            expected_column: Some("created_at".to_string()),
        }
    }

    /// Row count of `schema.table`
    pub async fn count_rows(&self, schema: &str, table: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {}",
            csvload::db::qualified(schema, table)
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Whether `schema.table` exists
    pub async fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
            "#,
        )
        .bind(schema)
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Distinct ingestion timestamps stored in `schema.table`
    pub async fn ingestion_timestamps(&self, schema: &str, table: &str) -> Result<Vec<NaiveDateTime>> {
        let stamps = sqlx::query_scalar::<_, NaiveDateTime>(&format!(
            "SELECT DISTINCT ingestion_timestamp FROM {} ORDER BY 1",
            csvload::db::qualified(schema, table)
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(stamps)
    }
}

fn database_config(host: &str, port: u16, schema: &str) -> DatabaseConfig {
    DatabaseConfig {
        host: host.to_string(),
        port,
        database: "postgres".to_string(),
        schema: schema.to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_connections: 2,
        connect_timeout_secs: 30,
    }
}

// ============================================================================
// Source Directory
// ============================================================================

/// Temporary directory holding CSV fixtures
pub struct SourceDir {
    dir: TempDir,
}

impl SourceDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `name` and return its source record
    pub fn write(&self, name: &str, contents: &str) -> SourceFile {
        let path: PathBuf = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write fixture");
        SourceFile::from_path(&path).expect("Failed to stat fixture")
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const PATIENTS_CSV: &str = "\
id,name,birth_date,created_at
1,Ada Lovelace,1815-12-10,2024-01-01 09:00:00
2,Grace Hopper,1906-12-09,2024-01-02 10:30:00
3,Alan Turing,1912-06-23,2024-01-03 11:45:00
";

pub const DOCTORS_CSV: &str = "\
id,name,specialty,active
10,Dr. House,Diagnostics,true
11,Dr. Grey,Surgery,false
";

/// Initialize tracing for tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,csvload=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

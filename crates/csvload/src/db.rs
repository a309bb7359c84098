//! Database connection and SQL helpers

use crate::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

/// Database operation errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// Could not open the initial connection
    #[error("Failed to connect to {host}:{port}/{database}: {source}")]
    Connect {
        host: String,
        port: u16,
        database: String,
        #[source]
        source: sqlx::Error,
    },

    /// SQL query error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Create the connection pool
///
/// The first connection is opened eagerly so that bad credentials or an
/// unreachable host fail here, before any file is looked at.
pub async fn create_pool(config: &DatabaseConfig) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(config.connect_options())
        .await
        .map_err(|source| DbError::Connect {
            host: config.host.clone(),
            port: config.port,
            database: config.database.clone(),
            source,
        })?;

    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        schema = %config.schema,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Quote an identifier for interpolation into SQL
///
/// Embedded double quotes are doubled, so any file or column name is safe
/// to use as a table or column name.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Schema-qualified, quoted relation name
pub fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

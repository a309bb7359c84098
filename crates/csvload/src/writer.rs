//! Full-replace table writer
//!
//! A load drops the destination table, recreates it from the frame's
//! inferred column types and inserts every row, all inside one
//! transaction. The previous contents are discarded; nothing is appended.

use crate::checkpoint::CHECKPOINT_TABLE;
use crate::db::{qualified, quote_ident};
use crate::error::{IngestError, Result};
use crate::frame::{Column, ColumnType, CsvFrame, Value};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

/// PostgreSQL accepts at most this many bind parameters per statement
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Longest identifier PostgreSQL stores without truncating it
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Default number of rows per INSERT statement
pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 1_000;

/// Writes frames into tables of one schema
#[derive(Debug, Clone)]
pub struct TableWriter {
    pool: PgPool,
    schema: String,
    chunk_size: usize,
}

impl TableWriter {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self::with_chunk_size(pool, schema, DEFAULT_INSERT_CHUNK_SIZE)
    }

    fn with_chunk_size(pool: PgPool, schema: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            pool,
            schema: schema.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Replace `table_name` with the contents of `frame`
    ///
    /// Returns the number of rows written.
    pub async fn replace(&self, table_name: &str, frame: &CsvFrame) -> Result<u64> {
        validate_table_name(table_name)?;
        for column in frame.columns() {
            validate_identifier(&column.name)?;
        }

        let relation = qualified(&self.schema, table_name);
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", relation))
            .execute(&mut *tx)
            .await?;

        sqlx::query(&create_table_sql(&relation, frame.columns()))
            .execute(&mut *tx)
            .await?;

        let rows_per_statement = rows_per_statement(self.chunk_size, frame.columns().len());
        let mut written = 0;

        for chunk in frame.rows().chunks(rows_per_statement) {
            written += insert_chunk(&mut tx, &relation, frame.columns(), chunk).await?;
        }

        tx.commit().await?;

        debug!(table = %relation, rows = written, "Table replaced");
        Ok(written)
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.len() > MAX_IDENTIFIER_BYTES {
        return Err(IngestError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

fn validate_table_name(table_name: &str) -> Result<()> {
    validate_identifier(table_name)?;

    if table_name == CHECKPOINT_TABLE {
        return Err(IngestError::ReservedTable(table_name.to_string()));
    }

    Ok(())
}

/// Rows per INSERT so that `rows * columns` stays within the bind limit
pub fn rows_per_statement(chunk_size: usize, column_count: usize) -> usize {
    let max_rows = MAX_BIND_PARAMS / column_count.max(1);
    chunk_size.min(max_rows).max(1)
}

/// `CREATE TABLE` statement for the given columns
pub fn create_table_sql(relation: &str, columns: &[Column]) -> String {
    let definitions = columns
        .iter()
        .map(|column| format!("{} {}", quote_ident(&column.name), column.ty.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE {} ({})", relation, definitions)
}

async fn insert_chunk(
    tx: &mut Transaction<'_, Postgres>,
    relation: &str,
    columns: &[Column],
    rows: &[Vec<Value>],
) -> Result<u64> {
    let column_list = columns
        .iter()
        .map(|column| quote_ident(&column.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("INSERT INTO {} ({}) ", relation, column_list));

    query_builder.push_values(rows, |mut b, row| {
        for (column, value) in columns.iter().zip(row) {
            match value {
                Value::BigInt(v) => {
                    b.push_bind(*v);
                },
                Value::Double(v) => {
                    b.push_bind(*v);
                },
                Value::Boolean(v) => {
                    b.push_bind(*v);
                },
                Value::Text(v) => {
                    b.push_bind(v.as_str());
                },
                Value::Timestamp(v) => {
                    b.push_bind(*v);
                },
                Value::Null => match column.ty {
                    ColumnType::BigInt => {
                        b.push_bind(None::<i64>);
                    },
                    ColumnType::Double => {
                        b.push_bind(None::<f64>);
                    },
                    ColumnType::Boolean => {
                        b.push_bind(None::<bool>);
                    },
                    ColumnType::Text => {
                        b.push_bind(None::<String>);
                    },
                    ColumnType::Timestamp => {
                        b.push_bind(None::<chrono::NaiveDateTime>);
                    },
                },
            }
        }
    });

    let result = query_builder.build().execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

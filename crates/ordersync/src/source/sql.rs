//! Offset-paginated PostgreSQL source
//!
//! The configured query is wrapped in a sub-select ordered by the business
//! key, so every window `[offset, offset + limit)` is deterministic between
//! calls.

use super::RecordSource;
use crate::error::{Result, SyncError};
use crate::record::{Record, SqlRecord};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::debug;

/// Default number of pooled connections; the pipeline uses one at a time
pub const DEFAULT_MAX_CONNECTIONS: u32 = 2;

const CONNECT_TIMEOUT_SECS: u64 = 30;

pub struct SqlSource {
    pool: PgPool,
    paged_query: String,
}

impl SqlSource {
    /// `key_field` must be a plain identifier (letters, digits, underscores)
    pub fn new(pool: PgPool, base_query: &str, key_field: &str) -> Self {
        Self {
            pool,
            paged_query: paged_query(base_query, key_field),
        }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        base_query: &str,
        key_field: &str,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .connect(database_url)
            .await?;

        Ok(Self::new(pool, base_query, key_field))
    }

    pub fn query(&self) -> &str {
        &self.paged_query
    }
}

#[async_trait]
impl RecordSource for SqlSource {
    async fn fetch(&mut self, offset: u64, limit: u64) -> Result<Vec<Record>> {
        debug!(offset, limit, "Fetching source window");

        let rows = sqlx::query(&self.paged_query)
            .bind(to_i64(limit)?)
            .bind(to_i64(offset)?)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .zip(offset..)
            .map(|(row, position)| {
                row_to_record(row).map(|record| Record::from(record.with_row(position)))
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(SyncError::from)
    }
}

/// Wrap `base_query` with the ordering clause and a `LIMIT $1 OFFSET $2` window
///
/// The key is emitted unquoted, so PostgreSQL folds it to lower case exactly
/// as it folded the column name when the table was created.
pub fn paged_query(base_query: &str, key_field: &str) -> String {
    let base = base_query.trim().trim_end_matches(';').trim_end();
    format!("SELECT * FROM ({base}) AS sync_source ORDER BY {key_field} ASC LIMIT $1 OFFSET $2")
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| SyncError::config(format!("pagination value {value} out of range")))
}

fn row_to_record(row: &PgRow) -> std::result::Result<SqlRecord, sqlx::Error> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            postgres_value_to_json(row, idx, column.type_info().name())
                .map(|value| (column.name().to_string(), value))
        })
        .collect()
}

/// Convert a PostgreSQL value to JSON by its type name
fn postgres_value_to_json(
    row: &PgRow,
    idx: usize,
    type_name: &str,
) -> std::result::Result<Value, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get(idx)?),
        "INT2" => Value::from(row.try_get::<i16, _>(idx)?),
        "INT4" => Value::from(row.try_get::<i32, _>(idx)?),
        "INT8" => Value::from(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => serde_json::json!(row.try_get::<f32, _>(idx)?),
        "FLOAT8" => serde_json::json!(row.try_get::<f64, _>(idx)?),
        "NUMERIC" => {
            let v: sqlx::types::BigDecimal = row.try_get(idx)?;
            let text = v.to_string();
            text.parse::<serde_json::Number>()
                .map(Value::Number)
                .unwrap_or(Value::String(text))
        },
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => Value::String(row.try_get(idx)?),
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(idx)?.to_string()),
        "TIMESTAMPTZ" => {
            let v: chrono::DateTime<chrono::Utc> = row.try_get(idx)?;
            Value::String(v.to_rfc3339())
        },
        "TIMESTAMP" => {
            let v: chrono::NaiveDateTime = row.try_get(idx)?;
            Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        },
        "DATE" => Value::String(row.try_get::<chrono::NaiveDate, _>(idx)?.to_string()),
        "JSON" | "JSONB" => row.try_get(idx)?,
        _ => {
            // Fallback: try to get as string
            let v: String = row
                .try_get(idx)
                .unwrap_or_else(|_| format!("<{}>", type_name));
            Value::String(v)
        },
    };

    Ok(value)
}

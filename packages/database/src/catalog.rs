//! Schema catalog lookups.
//!
//! `information_schema` exposes names as `sql_identifier`, a domain the raw
//! row decoder doesn't map, so every name is cast to `text`.

use moosicbox_json_utils::database::ToValue as _;
use park_assets_models::{ColumnDef, ColumnKind};
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// Returns the names of all tables in `schema`, ordered by name.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_tables(db: &dyn Database, schema: &str) -> Result<Vec<String>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT table_name::text AS table_name
             FROM information_schema.tables
             WHERE table_schema = $1
             ORDER BY table_name",
            &[DatabaseValue::String(schema.to_string())],
        )
        .await?;

    rows.iter()
        .map(|row| {
            row.to_value("table_name").map_err(|e| DbError::Conversion {
                message: format!("Failed to parse table name: {e}"),
            })
        })
        .collect()
}

/// Returns the columns of `schema.table` in ordinal order.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn table_columns(
    db: &dyn Database,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnDef>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT column_name::text AS column_name, data_type::text AS data_type
             FROM information_schema.columns
             WHERE table_schema = $1 AND table_name = $2
             ORDER BY ordinal_position",
            &[
                DatabaseValue::String(schema.to_string()),
                DatabaseValue::String(table.to_string()),
            ],
        )
        .await?;

    rows.iter()
        .map(|row| {
            let name: String = row.to_value("column_name").map_err(|e| DbError::Conversion {
                message: format!("Failed to parse column name of {table}: {e}"),
            })?;
            let data_type: String = row.to_value("data_type").unwrap_or_default();
            Ok(ColumnDef::new(name, ColumnKind::from_pg_type(&data_type)))
        })
        .collect()
}

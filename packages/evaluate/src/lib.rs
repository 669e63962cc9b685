#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Out-of-boundary evaluation of park asset tables.
//!
//! Every asset table of the schema (minus a denylist of non-point and
//! metadata tables) is asked for the rows whose geometry does not intersect
//! the reference boundary. The per-table results are concatenated into one
//! [`ViolationTable`], near-boundary noise is discarded, and the remaining
//! rows are ranked worst first.
//!
//! Tables are queried one at a time. A failure on any table aborts the
//! whole evaluation; no partial table is ever returned.

pub mod geojson_dir;
pub mod postgis;
pub mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use park_assets_boundary::BoundaryGeometry;
use park_assets_models::{ColumnDef, ViolationRecord, ViolationTable, round_to};
use serde::Deserialize;
use thiserror::Error;

use crate::progress::TableProgress;

/// Decimal places kept for every real-valued cell.
pub const ROUNDING_PLACES: i32 = 3;

/// Errors that can occur while evaluating asset tables.
#[derive(Debug, Error)]
pub enum EvaluateError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] park_assets_database::DbError),

    /// An offline asset file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An offline asset file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Evaluation settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EvaluateOptions {
    /// Schema holding the asset tables.
    pub schema: String,
    /// Geometry column shared by the asset tables.
    pub geometry_column: String,
    /// Tables never evaluated (metadata and linear-feature tables).
    pub excluded_tables: Vec<String>,
    /// Columns removed from the final table.
    pub dropped_columns: Vec<String>,
    /// Records at or below this distance from the boundary, in meters, are
    /// treated as edge noise and discarded.
    pub noise_threshold_m: f64,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            schema: "assets".to_string(),
            geometry_column: "wkb_geometry".to_string(),
            excluded_tables: vec![
                "qgis_projects".to_string(),
                "trails".to_string(),
                "roads".to_string(),
            ],
            dropped_columns: vec![
                "wkb_geometry".to_string(),
                "ogc_fid".to_string(),
                "campsite_number".to_string(),
            ],
            noise_threshold_m: 50.0,
        }
    }
}

/// One table's out-of-boundary rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TableViolations {
    /// Table name.
    pub table: String,
    /// Attribute columns of the table, in table order.
    pub columns: Vec<ColumnDef>,
    /// Rows whose geometry does not intersect the boundary.
    pub records: Vec<ViolationRecord>,
}

/// A collection of asset tables that can be checked against a boundary.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Names of every table in the source, in a stable order.
    async fn list_tables(&self) -> Result<Vec<String>, EvaluateError>;

    /// Rows of `table` whose geometry does not intersect `boundary`.
    async fn outside_boundary(
        &self,
        table: &str,
        boundary: &BoundaryGeometry,
    ) -> Result<TableViolations, EvaluateError>;
}

/// Applies the exclusion denylist, preserving catalog order.
#[must_use]
pub fn candidate_tables(tables: Vec<String>, excluded: &[String]) -> Vec<String> {
    tables
        .into_iter()
        .filter(|table| !excluded.contains(table))
        .collect()
}

/// Evaluates every candidate table of `source` against `boundary`.
///
/// # Errors
///
/// Returns [`EvaluateError`] from the first table that fails.
pub async fn evaluate(
    source: &dyn AssetSource,
    boundary: &BoundaryGeometry,
    options: &EvaluateOptions,
    progress: &Arc<dyn TableProgress>,
) -> Result<ViolationTable, EvaluateError> {
    let tables = candidate_tables(source.list_tables().await?, &options.excluded_tables);
    log::info!("Evaluating {} asset table(s)", tables.len());

    progress.start(tables.len() as u64);

    let mut combined = ViolationTable::new();
    for table in &tables {
        log::info!("...processing table: {table}");
        progress.table_started(table);

        let contribution = source.outside_boundary(table, boundary).await?;
        log::debug!(
            "{table}: {} row(s) outside the boundary",
            contribution.records.len()
        );

        progress.table_finished(table, contribution.records.len());
        combined.append(&contribution.columns, contribution.records);
    }

    let finalized = finalize(combined, options);
    progress.finish(finalized.len());

    Ok(finalized)
}

/// Filters noise, ranks, strips internal columns and rounds.
#[must_use]
pub fn finalize(mut table: ViolationTable, options: &EvaluateOptions) -> ViolationTable {
    let before = table.len();
    table
        .records
        .retain(|record| record.distance_m > options.noise_threshold_m);

    let discarded = before - table.len();
    if discarded > 0 {
        log::info!(
            "Discarded {discarded} record(s) within {} m of the boundary",
            options.noise_threshold_m
        );
    }

    table
        .records
        .sort_by(|a, b| b.distance_m.total_cmp(&a.distance_m));

    table.drop_columns(&options.dropped_columns);

    for record in &mut table.records {
        record.attributes = std::mem::take(&mut record.attributes)
            .into_iter()
            .map(|(name, value)| (name, value.rounded(ROUNDING_PLACES)))
            .collect();
        record.longitude = round_to(record.longitude, ROUNDING_PLACES);
        record.latitude = round_to(record.latitude, ROUNDING_PLACES);
        record.distance_m = round_to(record.distance_m, ROUNDING_PLACES);
    }

    table
}

//! End-to-end quality check run.
//!
//! Boundary file first, so a bad boundary fails before any database work.
//! The gateway is held only for reprojection and evaluation and is closed
//! before the report is built, on success and on error alike.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use park_assets_boundary::{BoundaryError, BoundaryGeometry, SourceBoundary, load_boundary_file};
use park_assets_cli_utils::{IndicatifProgress, MultiProgress};
use park_assets_database::DbError;
use park_assets_database::db::Gateway;
use park_assets_database::reproject::PostgisReprojector;
use park_assets_evaluate::geojson_dir::GeoJsonAssetSource;
use park_assets_evaluate::postgis::PostgisAssetSource;
use park_assets_evaluate::progress::TableProgress;
use park_assets_evaluate::{AssetSource, EvaluateError, candidate_tables, evaluate};
use park_assets_models::ViolationTable;
use park_assets_report::{ReportError, build_report};
use thiserror::Error;

use crate::config::QualityCheckConfig;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loading or normalizing the boundary failed.
    #[error("Boundary error: {0}")]
    Boundary(#[from] BoundaryError),

    /// Connecting to the database failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Evaluating the asset tables failed.
    #[error("Evaluation error: {0}")]
    Evaluate(#[from] EvaluateError),

    /// Building or writing the report failed.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Where asset tables are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMode {
    /// The `PostGIS` database named by the environment.
    Postgres,
    /// A directory of `<table>.geojson` files in EPSG:4326.
    Offline(PathBuf),
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of records in the report.
    pub violations: usize,
    /// Path of the written report.
    pub output_path: PathBuf,
    /// Whether the report was emailed.
    pub emailed: bool,
}

/// Runs the full check and writes the report.
///
/// # Errors
///
/// * If the boundary cannot be loaded or reprojected
/// * If the database is unreachable or any table query fails
/// * If the report cannot be written
///
/// Email failures are logged and do not fail the run.
pub async fn run(
    config: &QualityCheckConfig,
    mode: &SourceMode,
    multi: &MultiProgress,
    generated_on: NaiveDate,
) -> Result<RunSummary, PipelineError> {
    log::info!("Reading boundary {}...", config.boundary_path.display());
    let source_boundary = load_boundary_file(&config.boundary_path)?;

    let progress = IndicatifProgress::tables_bar(multi, "Evaluating asset tables");

    let (boundary, table) = match mode {
        SourceMode::Postgres => {
            log::info!("Connecting to the asset database...");
            let gateway = Gateway::connect_from_env().await?;
            let result = evaluate_postgres(&gateway, source_boundary, config, &progress).await;
            gateway.close();
            result?
        }
        SourceMode::Offline(dir) => {
            log::info!("Reading asset tables from {}", dir.display());
            let boundary = source_boundary.into_wgs84(None).await?;
            let source = GeoJsonAssetSource::new(dir);
            let table = evaluate(&source, &boundary, &config.evaluate, &progress).await?;
            (boundary, table)
        }
    };

    log::info!("Building HTML report...");
    let report = build_report(&boundary, &table, &config.report, generated_on)?;
    report.save(&config.output_path)?;

    let emailed = if config.email.enabled {
        match park_assets_notify::send_report(&config.email, &report, generated_on).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to email report: {e}");
                false
            }
        }
    } else {
        false
    };

    Ok(RunSummary {
        violations: table.len(),
        output_path: config.output_path.clone(),
        emailed,
    })
}

async fn evaluate_postgres(
    gateway: &Gateway,
    source_boundary: SourceBoundary,
    config: &QualityCheckConfig,
    progress: &Arc<dyn TableProgress>,
) -> Result<(BoundaryGeometry, ViolationTable), PipelineError> {
    let db = gateway.database();
    let reprojector = PostgisReprojector::new(db);
    let boundary = source_boundary.into_wgs84(Some(&reprojector)).await?;

    log::info!("Evaluating assets outside the boundary...");
    let source = PostgisAssetSource::new(db, &config.evaluate);
    let table = evaluate(&source, &boundary, &config.evaluate, progress).await?;

    Ok((boundary, table))
}

/// Lists the tables a check would evaluate.
///
/// # Errors
///
/// * If the source cannot be listed
pub async fn list_candidate_tables(
    config: &QualityCheckConfig,
    mode: &SourceMode,
) -> Result<Vec<String>, PipelineError> {
    let excluded = &config.evaluate.excluded_tables;
    match mode {
        SourceMode::Postgres => {
            let gateway = Gateway::connect_from_env().await?;
            let tables = PostgisAssetSource::new(gateway.database(), &config.evaluate)
                .list_tables()
                .await;
            gateway.close();
            Ok(candidate_tables(tables?, excluded))
        }
        SourceMode::Offline(dir) => {
            let tables = GeoJsonAssetSource::new(dir).list_tables().await?;
            Ok(candidate_tables(tables, excluded))
        }
    }
}

/// Formats a run duration as whole minutes and seconds.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs_f64().round();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = total as u64;
    format!(
        "Processing completed in {} minutes and {} seconds",
        total / 60,
        total % 60
    )
}

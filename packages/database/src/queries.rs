//! Out-of-boundary asset query.
//!
//! One statement per asset table. The boundary travels as a hex WKB text
//! parameter and is rebuilt with `ST_GeomFromWKB` so no geometry literal is
//! ever spliced into the SQL. Table and column names come from the catalog
//! and are quoted.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use moosicbox_json_utils::database::ToValue as _;
use park_assets_models::{AttributeValue, ColumnDef, ColumnKind, ViolationRecord};
use switchy_database::{Database, DatabaseValue, Row};

use crate::{DbError, quote_ident};

const LONGITUDE_ALIAS: &str = "qc_longitude";
const LATITUDE_ALIAS: &str = "qc_latitude";
const DISTANCE_ALIAS: &str = "qc_distance_m";

/// Parameters of an out-of-boundary query against one asset table.
#[derive(Debug, Clone, Copy)]
pub struct OutsideBoundaryQuery<'a> {
    /// Schema holding the asset tables.
    pub schema: &'a str,
    /// Asset table name.
    pub table: &'a str,
    /// Geometry column of the table.
    pub geometry_column: &'a str,
    /// Attribute columns to select.
    pub columns: &'a [ColumnDef],
    /// Boundary in EPSG:4326 as hex-encoded WKB.
    pub boundary_wkb_hex: &'a str,
}

/// Builds the SQL for [`query_outside_boundary`].
///
/// Distances are geodesic (`geography`) and in meters. Coordinates come from
/// `ST_PointOnSurface` so they match `ST_X`/`ST_Y` for point assets. Rows are
/// ordered worst first with coordinates as a tiebreaker, which keeps
/// repeated runs identical.
#[must_use]
pub fn outside_boundary_sql(
    schema: &str,
    table: &str,
    geometry_column: &str,
    columns: &[ColumnDef],
) -> String {
    let mut select = String::new();
    let mut output = String::new();
    for column in columns {
        let name = quote_ident(&column.name);
        let cast = match column.kind {
            ColumnKind::Integer => "bigint",
            ColumnKind::Real => "double precision",
            ColumnKind::Text => "text",
        };
        let _ = write!(select, "a.{name}::{cast} AS {name},\n                ");
        let _ = write!(output, "assets.{name},\n            ");
    }

    format!(
        "WITH boundary AS (
            SELECT ST_SetSRID(ST_GeomFromWKB(decode($1, 'hex')), 4326) AS geom
        ),
        assets AS (
            SELECT
                {select}ST_Transform(a.{geometry}, 4326) AS qc_geom
            FROM {schema}.{table} a
        )
        SELECT
            {output}ST_X(ST_PointOnSurface(assets.qc_geom)) AS {LONGITUDE_ALIAS},
            ST_Y(ST_PointOnSurface(assets.qc_geom)) AS {LATITUDE_ALIAS},
            ST_Distance(assets.qc_geom::geography, boundary.geom::geography) AS {DISTANCE_ALIAS}
        FROM assets, boundary
        WHERE NOT ST_Intersects(assets.qc_geom, boundary.geom)
        ORDER BY {DISTANCE_ALIAS} DESC, {LONGITUDE_ALIAS}, {LATITUDE_ALIAS}",
        geometry = quote_ident(geometry_column),
        schema = quote_ident(schema),
        table = quote_ident(table),
    )
}

/// Returns every row of the table whose geometry does not intersect the
/// boundary, with its coordinates and distance from the boundary.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be converted.
pub async fn query_outside_boundary(
    db: &dyn Database,
    query: &OutsideBoundaryQuery<'_>,
) -> Result<Vec<ViolationRecord>, DbError> {
    let sql = outside_boundary_sql(
        query.schema,
        query.table,
        query.geometry_column,
        query.columns,
    );

    let rows = db
        .query_raw_params(
            &sql,
            &[DatabaseValue::String(query.boundary_wkb_hex.to_string())],
        )
        .await?;

    rows.iter()
        .map(|row| row_to_record(row, query.table, query.columns))
        .collect()
}

fn row_to_record(
    row: &Row,
    table: &str,
    columns: &[ColumnDef],
) -> Result<ViolationRecord, DbError> {
    let mut attributes = BTreeMap::new();

    for column in columns {
        let name = column.name.as_str();
        let value = match column.kind {
            ColumnKind::Integer => row
                .to_value::<Option<i64>>(name)
                .unwrap_or(None)
                .map_or(AttributeValue::Null, AttributeValue::Integer),
            ColumnKind::Real => row
                .to_value::<Option<f64>>(name)
                .unwrap_or(None)
                .map_or(AttributeValue::Null, AttributeValue::Real),
            ColumnKind::Text => row
                .to_value::<Option<String>>(name)
                .unwrap_or(None)
                .map_or(AttributeValue::Null, AttributeValue::Text),
        };
        attributes.insert(column.name.clone(), value);
    }

    let number = |alias: &str| -> Result<f64, DbError> {
        row.to_value(alias).map_err(|e| DbError::Conversion {
            message: format!("Failed to parse {alias} for {table}: {e}"),
        })
    };

    Ok(ViolationRecord {
        source_table: table.to_string(),
        attributes,
        longitude: number(LONGITUDE_ALIAS)?,
        latitude: number(LATITUDE_ALIAS)?,
        distance_m: number(DISTANCE_ALIAS)?,
    })
}

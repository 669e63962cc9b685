//! Boundary reprojection through `PostGIS`.

use async_trait::async_trait;
use geo::MultiPolygon;
use moosicbox_json_utils::database::ToValue as _;
use park_assets_boundary::{BoundaryError, Reproject, parse_geometry_json};
use switchy_database::{Database, DatabaseValue};

/// [`Reproject`] implementation backed by `ST_Transform`.
pub struct PostgisReprojector<'a> {
    db: &'a dyn Database,
}

impl<'a> PostgisReprojector<'a> {
    /// Creates a reprojector using the given connection.
    #[must_use]
    pub const fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Reproject for PostgisReprojector<'_> {
    async fn reproject_to_wgs84(
        &self,
        wkb: &[u8],
        srid: u32,
    ) -> Result<MultiPolygon<f64>, BoundaryError> {
        let srid = i32::try_from(srid).map_err(|_| BoundaryError::Crs {
            message: format!("SRID out of range: {srid}"),
        })?;

        let rows = self
            .db
            .query_raw_params(
                "SELECT ST_AsGeoJSON(
                     ST_Transform(ST_SetSRID(ST_GeomFromWKB(decode($1, 'hex')), $2), 4326)
                 ) AS geojson",
                &[
                    DatabaseValue::String(hex::encode(wkb)),
                    DatabaseValue::Int32(srid),
                ],
            )
            .await
            .map_err(|e| BoundaryError::Reproject {
                message: e.to_string(),
            })?;

        let geojson: String = rows
            .first()
            .ok_or_else(|| BoundaryError::Reproject {
                message: "ST_Transform returned no rows".to_string(),
            })?
            .to_value("geojson")
            .map_err(|e| BoundaryError::Reproject {
                message: format!("Failed to read reprojected geometry: {e}"),
            })?;

        parse_geometry_json(&geojson)
    }
}

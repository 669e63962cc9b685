#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reference boundary loading.
//!
//! Reads an administrative boundary from a `GeoJSON` file, unions all of
//! its polygonal features into one [`MultiPolygon`], and normalizes it to
//! EPSG:4326. Reprojection of boundaries delivered in a projected CRS is
//! delegated to a [`Reproject`] implementation (the `PostGIS` gateway in
//! production), since the boundary is only ever used alongside the
//! database anyway.

pub mod crs;
pub mod wkb;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use geo::{BooleanOps, Geometry, MultiPolygon, Polygon};
use geojson::GeoJson;
use thiserror::Error;

pub use crs::WGS84_SRID;

/// Errors that can occur while loading a boundary.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The boundary file could not be read.
    #[error("Failed to read boundary file {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The boundary file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The declared coordinate reference system is not understood.
    #[error("CRS error: {message}")]
    Crs {
        /// Description of what went wrong.
        message: String,
    },

    /// The file contains no polygonal geometry.
    #[error("Boundary contains no polygon features")]
    Empty,

    /// Reprojecting to EPSG:4326 failed.
    #[error("Reprojection error: {message}")]
    Reproject {
        /// Description of what went wrong.
        message: String,
    },
}

/// Transforms a geometry from an arbitrary SRID to EPSG:4326.
#[async_trait]
pub trait Reproject: Send + Sync {
    /// Reprojects the WKB-encoded geometry from `srid` to EPSG:4326.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Reproject`] if the transformation fails.
    async fn reproject_to_wgs84(
        &self,
        wkb: &[u8],
        srid: u32,
    ) -> Result<MultiPolygon<f64>, BoundaryError>;
}

/// A boundary as read from disk, still in its source CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBoundary {
    /// Union of every polygonal feature in the file.
    pub geometry: MultiPolygon<f64>,
    /// EPSG code of the coordinates in `geometry`.
    pub srid: u32,
    /// Number of polygonal input features that were unioned.
    pub feature_count: usize,
}

impl SourceBoundary {
    /// Returns `true` if the geometry is already in EPSG:4326.
    #[must_use]
    pub const fn is_wgs84(&self) -> bool {
        self.srid == WGS84_SRID
    }

    /// Normalizes the boundary to EPSG:4326.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Crs`] if the boundary needs reprojection but
    /// no reprojector is available, or whatever the reprojector returns.
    pub async fn into_wgs84(
        self,
        reprojector: Option<&dyn Reproject>,
    ) -> Result<BoundaryGeometry, BoundaryError> {
        if self.is_wgs84() {
            return Ok(BoundaryGeometry::new(self.geometry));
        }

        let Some(reprojector) = reprojector else {
            return Err(BoundaryError::Crs {
                message: format!(
                    "boundary is in EPSG:{} and no reprojector is available",
                    self.srid
                ),
            });
        };

        log::info!("Reprojecting boundary from EPSG:{} to EPSG:4326", self.srid);
        let wkb = wkb::multipolygon_to_wkb(&self.geometry);
        let geometry = reprojector.reproject_to_wgs84(&wkb, self.srid).await?;

        Ok(BoundaryGeometry::new(geometry))
    }
}

/// The reference boundary in EPSG:4326. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryGeometry {
    polygon: MultiPolygon<f64>,
}

impl BoundaryGeometry {
    /// Wraps an EPSG:4326 geometry.
    #[must_use]
    pub const fn new(polygon: MultiPolygon<f64>) -> Self {
        Self { polygon }
    }

    /// The boundary geometry.
    #[must_use]
    pub const fn polygon(&self) -> &MultiPolygon<f64> {
        &self.polygon
    }

    /// WKB encoding of the boundary.
    #[must_use]
    pub fn wkb(&self) -> Vec<u8> {
        wkb::multipolygon_to_wkb(&self.polygon)
    }

    /// Hex-encoded WKB, suitable as a text query parameter.
    #[must_use]
    pub fn wkb_hex(&self) -> String {
        hex::encode(self.wkb())
    }
}

/// Reads and parses a boundary `GeoJSON` file.
///
/// # Errors
///
/// Returns [`BoundaryError`] if the file is missing, unparsable, declares an
/// unknown CRS, or contains no polygons.
pub fn load_boundary_file(path: &Path) -> Result<SourceBoundary, BoundaryError> {
    let text = std::fs::read_to_string(path).map_err(|source| BoundaryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let boundary = parse_boundary(&text)?;
    log::info!(
        "Loaded boundary from {} ({} polygon(s), EPSG:{})",
        path.display(),
        boundary.feature_count,
        boundary.srid
    );

    Ok(boundary)
}

/// Parses boundary `GeoJSON` text (a `FeatureCollection`, a `Feature` or a
/// bare geometry) and unions its polygons.
///
/// # Errors
///
/// Returns [`BoundaryError`] if the text is not `GeoJSON`, declares an
/// unknown CRS, or contains no polygons.
pub fn parse_boundary(text: &str) -> Result<SourceBoundary, BoundaryError> {
    let geojson: GeoJson = text.parse()?;

    let (srid, geometries) = match geojson {
        GeoJson::FeatureCollection(collection) => (
            crs::srid_from_members(collection.foreign_members.as_ref())?,
            collection
                .features
                .into_iter()
                .filter_map(|feature| feature.geometry)
                .collect::<Vec<_>>(),
        ),
        GeoJson::Feature(feature) => (
            crs::srid_from_members(feature.foreign_members.as_ref())?,
            feature.geometry.into_iter().collect(),
        ),
        GeoJson::Geometry(geometry) => (
            crs::srid_from_members(geometry.foreign_members.as_ref())?,
            vec![geometry],
        ),
    };

    let mut polygons = Vec::new();
    for geometry in geometries {
        let geometry: Geometry<f64> = geometry.try_into()?;
        collect_polygons(geometry, &mut polygons);
    }

    if polygons.is_empty() {
        return Err(BoundaryError::Empty);
    }

    let feature_count = polygons.len();

    Ok(SourceBoundary {
        geometry: union_polygons(polygons),
        srid,
        feature_count,
    })
}

/// Parses a `GeoJSON` geometry string into a [`MultiPolygon`].
///
/// # Errors
///
/// Returns [`BoundaryError`] if the text is not a polygonal `GeoJSON`
/// geometry.
pub fn parse_geometry_json(text: &str) -> Result<MultiPolygon<f64>, BoundaryError> {
    let geometry: geojson::Geometry = text.parse()?;
    let mut polygons = Vec::new();
    collect_polygons(geometry.try_into()?, &mut polygons);

    if polygons.is_empty() {
        return Err(BoundaryError::Empty);
    }

    Ok(MultiPolygon::new(polygons))
}

/// Unions all polygons into a single geometry.
#[must_use]
pub fn union_polygons(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut polygons = polygons.into_iter();

    let Some(first) = polygons.next() else {
        return MultiPolygon::new(Vec::new());
    };

    polygons.fold(MultiPolygon::new(vec![first]), |merged, polygon| {
        merged.union(&polygon)
    })
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => out.push(polygon),
        Geometry::MultiPolygon(multi) => out.extend(multi.0),
        Geometry::Rect(rect) => out.push(rect.to_polygon()),
        Geometry::Triangle(triangle) => out.push(triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for inner in collection.0 {
                collect_polygons(inner, out);
            }
        }
        other => log::warn!("Skipping non-polygon boundary geometry: {other:?}"),
    }
}

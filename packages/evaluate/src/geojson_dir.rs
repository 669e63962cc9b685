//! [`AssetSource`] backed by a directory of `GeoJSON` files.
//!
//! Each `<table>.geojson` file stands in for one asset table, already in
//! EPSG:4326. Used for offline checks of exported layers and as a fixture
//! source in tests. Distances are geodesic, measured between the nearest
//! points of the asset and the boundary. The reported coordinates are the
//! asset's interior point.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use geo::{
    Closest, ClosestPoint, CoordsIter, Distance, Geodesic, Geometry, InteriorPoint, Intersects,
    MultiPolygon, Point,
};
use geojson::{FeatureCollection, GeoJson, JsonValue};
use park_assets_boundary::BoundaryGeometry;
use park_assets_models::{
    AttributeValue, ColumnDef, ColumnKind, ViolationRecord, is_computed_column,
};

use crate::{AssetSource, EvaluateError, TableViolations};

const EXTENSION: &str = "geojson";

/// Reads asset tables from `<dir>/<table>.geojson` files.
pub struct GeoJsonAssetSource {
    dir: PathBuf,
}

impl GeoJsonAssetSource {
    /// Creates a source over `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.{EXTENSION}"))
    }
}

#[async_trait]
impl AssetSource for GeoJsonAssetSource {
    async fn list_tables(&self) -> Result<Vec<String>, EvaluateError> {
        let io_err = |source| EvaluateError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut tables = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                tables.push(stem.to_string());
            }
        }

        tables.sort();
        Ok(tables)
    }

    async fn outside_boundary(
        &self,
        table: &str,
        boundary: &BoundaryGeometry,
    ) -> Result<TableViolations, EvaluateError> {
        let collection = read_collection(&self.table_path(table))?;
        let columns = infer_columns(table, &collection);

        let mut records = Vec::new();
        for feature in collection.features {
            let Some(geometry) = feature.geometry else {
                continue;
            };
            let geometry: Geometry<f64> = geometry.try_into()?;

            if geometry.intersects(boundary.polygon()) {
                continue;
            }

            let Some(point) = geometry.interior_point() else {
                log::warn!("{table}: skipping feature with empty geometry");
                continue;
            };

            let Some(distance_m) = distance_to_boundary_m(&geometry, boundary.polygon()) else {
                log::warn!("{table}: could not measure distance for feature at {point:?}");
                continue;
            };

            let attributes = columns
                .iter()
                .map(|column| {
                    let value = feature
                        .properties
                        .as_ref()
                        .and_then(|p| p.get(&column.name))
                        .map_or(AttributeValue::Null, json_to_attribute);
                    (column.name.clone(), value)
                })
                .collect();

            records.push(ViolationRecord {
                source_table: table.to_string(),
                attributes,
                longitude: point.x(),
                latitude: point.y(),
                distance_m,
            });
        }

        Ok(TableViolations {
            table: table.to_string(),
            columns,
            records,
        })
    }
}

fn read_collection(path: &Path) -> Result<FeatureCollection, EvaluateError> {
    let text = std::fs::read_to_string(path).map_err(|source| EvaluateError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        GeoJson::Feature(feature) => Ok(FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        }),
        GeoJson::Geometry(_) => Err(EvaluateError::Conversion {
            message: format!("{} holds a bare geometry, expected features", path.display()),
        }),
    }
}

/// Union of the property keys of every feature, first-seen order. The kind
/// of a column is taken from its first non-null value. Keys named like a
/// computed column are skipped.
fn infer_columns(table: &str, collection: &FeatureCollection) -> Vec<ColumnDef> {
    let mut columns: Vec<ColumnDef> = Vec::new();
    let mut resolved: Vec<bool> = Vec::new();
    let mut skipped: Vec<&str> = Vec::new();

    for properties in collection.features.iter().filter_map(|f| f.properties.as_ref()) {
        for (name, value) in properties {
            if is_computed_column(name) {
                if !skipped.contains(&name.as_str()) {
                    log::warn!("{table}: skipping property '{name}', it is computed by the check");
                    skipped.push(name);
                }
                continue;
            }
            let kind = json_kind(value);
            match columns.iter().position(|c| &c.name == name) {
                Some(index) => {
                    if let (false, Some(kind)) = (resolved[index], kind) {
                        columns[index].kind = kind;
                        resolved[index] = true;
                    }
                }
                None => {
                    columns.push(ColumnDef::new(name.clone(), kind.unwrap_or(ColumnKind::Text)));
                    resolved.push(kind.is_some());
                }
            }
        }
    }

    columns
}

fn json_kind(value: &JsonValue) -> Option<ColumnKind> {
    match value {
        JsonValue::Null => None,
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => Some(ColumnKind::Integer),
        JsonValue::Number(_) => Some(ColumnKind::Real),
        _ => Some(ColumnKind::Text),
    }
}

fn json_to_attribute(value: &JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Number(n) => n.as_i64().map_or_else(
            || n.as_f64().map_or(AttributeValue::Null, AttributeValue::Real),
            AttributeValue::Integer,
        ),
        JsonValue::String(s) => AttributeValue::Text(s.clone()),
        other => AttributeValue::Text(other.to_string()),
    }
}

/// Geodesic distance in meters between the nearest points of `geometry`
/// and `boundary`.
///
/// One end of the nearest pair is always a vertex of either shape, so every
/// vertex of each is measured against the other and the minimum is kept.
fn distance_to_boundary_m(geometry: &Geometry<f64>, boundary: &MultiPolygon<f64>) -> Option<f64> {
    let from_asset = geometry
        .coords_iter()
        .map(|c| distance_to_nearest_m(Point::from(c), boundary));
    let from_boundary = boundary
        .coords_iter()
        .map(|c| distance_to_nearest_m(Point::from(c), geometry));

    from_asset
        .chain(from_boundary)
        .flatten()
        .min_by(f64::total_cmp)
}

fn distance_to_nearest_m(point: Point<f64>, target: &impl ClosestPoint<f64>) -> Option<f64> {
    match target.closest_point(&point) {
        Closest::Intersection(_) => Some(0.0),
        Closest::SinglePoint(nearest) => Some(Geodesic.distance(point, nearest)),
        Closest::Indeterminate => None,
    }
}

#[cfg(test)]
mod tests {
    use geo::{line_string, polygon};

    use super::*;
    use crate::progress::null_progress;
    use crate::{EvaluateOptions, evaluate};

    const BENCHES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "properties": {"gisid": "B-IN", "asset_category": "Benches", "ogc_fid": 1},
             "geometry": {"type": "Point", "coordinates": [0.5, 0.5]}},
            {"type": "Feature",
             "properties": {"gisid": "B-OUT", "asset_category": "Benches", "ogc_fid": 2},
             "geometry": {"type": "Point", "coordinates": [2.0, 2.0]}},
            {"type": "Feature",
             "properties": {"gisid": "B-EDGE", "asset_category": "Benches", "ogc_fid": 3},
             "geometry": {"type": "Point", "coordinates": [1.0003, 0.5]}}
        ]
    }"#;

    const TRAILS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"gisid": "TR-1"},
             "geometry": {"type": "Point", "coordinates": [10.0, 10.0]}}
        ]
    }"#;

    const PATHS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"gisid": "P-1"},
             "geometry": {"type": "LineString", "coordinates": [[1.0001, 0.5], [2.0, 0.5]]}}
        ]
    }"#;

    const EMPTY_SIGNS: &str = r#"{"type": "FeatureCollection", "features": []}"#;

    fn unit_square() -> BoundaryGeometry {
        BoundaryGeometry::new(MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]]))
    }

    fn fixture_dir(name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("park_assets_evaluate_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        for (file, contents) in files {
            std::fs::write(dir.join(file), contents).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn lists_geojson_files_sorted() {
        let dir = fixture_dir(
            "list",
            &[
                ("trails.geojson", TRAILS),
                ("benches.geojson", BENCHES),
                ("README.txt", "not a table"),
            ],
        );
        let tables = GeoJsonAssetSource::new(&dir).list_tables().await.unwrap();
        assert_eq!(tables, vec!["benches", "trails"]);
    }

    #[tokio::test]
    async fn unit_square_reports_only_the_outside_point() {
        let dir = fixture_dir(
            "unit_square",
            &[
                ("benches.geojson", BENCHES),
                ("signs.geojson", EMPTY_SIGNS),
                ("trails.geojson", TRAILS),
            ],
        );

        let table = evaluate(
            &GeoJsonAssetSource::new(&dir),
            &unit_square(),
            &EvaluateOptions::default(),
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(table.len(), 1);
        let record = &table.records[0];
        assert_eq!(record.display_value("gisid"), "B-OUT");
        assert_eq!(record.source_table, "benches");
        assert!((record.longitude - 2.0).abs() < f64::EPSILON);
        assert!((record.latitude - 2.0).abs() < f64::EPSILON);
        // (2, 2) is ~157 km from the (1, 1) corner
        assert!(record.distance_m > 150_000.0 && record.distance_m < 160_000.0);
        assert!(table.columns.iter().all(|c| c.name != "ogc_fid"));
    }

    #[tokio::test]
    async fn near_edge_points_are_measured_but_filtered() {
        let dir = fixture_dir("edge", &[("benches.geojson", BENCHES)]);
        let raw = GeoJsonAssetSource::new(&dir)
            .outside_boundary("benches", &unit_square())
            .await
            .unwrap();

        let edge = raw
            .records
            .iter()
            .find(|r| r.display_value("gisid") == "B-EDGE")
            .unwrap();
        assert!(edge.distance_m > 0.0 && edge.distance_m < 50.0);
        assert!(raw.records.iter().all(|r| r.display_value("gisid") != "B-IN"));
    }

    #[tokio::test]
    async fn missing_table_file_is_io_error() {
        let dir = fixture_dir("missing", &[]);
        let result = GeoJsonAssetSource::new(&dir)
            .outside_boundary("benches", &unit_square())
            .await;
        assert!(matches!(result, Err(EvaluateError::Io { .. })));
    }

    #[test]
    fn infers_column_kinds_from_first_non_null() {
        let collection: FeatureCollection = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"a": null, "b": 1, "c": "x"}, "geometry": null},
                {"type": "Feature", "properties": {"a": 2.5, "d": true}, "geometry": null}
            ]
        }"#
        .parse()
        .unwrap();

        let columns = infer_columns("benches", &collection);
        let kinds: Vec<(&str, ColumnKind)> =
            columns.iter().map(|c| (c.name.as_str(), c.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("a", ColumnKind::Real),
                ("b", ColumnKind::Integer),
                ("c", ColumnKind::Text),
                ("d", ColumnKind::Text),
            ]
        );
    }

    #[test]
    fn converts_json_values() {
        assert_eq!(
            json_to_attribute(&serde_json::json!(3)),
            AttributeValue::Integer(3)
        );
        assert_eq!(
            json_to_attribute(&serde_json::json!(3.5)),
            AttributeValue::Real(3.5)
        );
        assert_eq!(
            json_to_attribute(&serde_json::json!(true)),
            AttributeValue::Text("true".to_string())
        );
        assert_eq!(json_to_attribute(&JsonValue::Null), AttributeValue::Null);
    }

    #[tokio::test]
    async fn lines_are_measured_from_their_nearest_vertex() {
        let dir = fixture_dir("paths", &[("paths.geojson", PATHS)]);
        let raw = GeoJsonAssetSource::new(&dir)
            .outside_boundary("paths", &unit_square())
            .await
            .unwrap();

        // near end is 0.0001 degrees east of the x = 1 edge, about 11 m
        assert_eq!(raw.records.len(), 1);
        let distance_m = raw.records[0].distance_m;
        assert!(distance_m > 5.0 && distance_m < 20.0, "{distance_m}");

        let table = evaluate(
            &GeoJsonAssetSource::new(&dir),
            &unit_square(),
            &EvaluateOptions::default(),
            &null_progress(),
        )
        .await
        .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn measures_nearest_boundary_vertex_to_asset_edge() {
        // both ends are ~1 degree away; the middle passes ~0.0014 degrees
        // from the (1, 1) corner
        let segment = Geometry::LineString(geo::line_string![
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 2.002),
        ]);
        let distance_m = distance_to_boundary_m(&segment, unit_square().polygon()).unwrap();
        assert!(distance_m > 140.0 && distance_m < 175.0, "{distance_m}");
    }

    #[tokio::test]
    async fn properties_named_like_computed_columns_are_skipped() {
        let dir = fixture_dir(
            "computed_names",
            &[(
                "benches.geojson",
                r#"{
                    "type": "FeatureCollection",
                    "features": [
                        {"type": "Feature",
                         "properties": {"gisid": "B-1", "longitude": 99, "distance_m": "far"},
                         "geometry": {"type": "Point", "coordinates": [2.0, 2.0]}}
                    ]
                }"#,
            )],
        );

        let table = evaluate(
            &GeoJsonAssetSource::new(&dir),
            &unit_square(),
            &EvaluateOptions::default(),
            &null_progress(),
        )
        .await
        .unwrap();

        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["gisid"]);

        let display = table.display_columns();
        let mut unique = display.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), display.len());

        let record = &table.records[0];
        assert_eq!(record.display_value("longitude"), "2");
        assert!(record.attribute("longitude").is_null());
    }
}

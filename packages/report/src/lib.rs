#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive HTML report of out-of-boundary assets.
//!
//! The report is a single self-contained page: a Leaflet map with the park
//! boundary outline and one toggleable marker layer per asset category, a
//! legend, and a scrollable table whose identifier cells zoom the map to the
//! matching marker. When there is nothing to report the page carries only a
//! short notice and no map.

pub mod html;
pub mod palette;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use park_assets_boundary::BoundaryGeometry;
use park_assets_models::{ViolationTable, category_of};
use serde::{Deserialize, Serialize};

use crate::html::{
    LEAFLET_VERSION, MAP_SCRIPT, STYLE, escape_html, legend_html, popup_html, script_safe_json,
    table_html,
};
use crate::palette::{CategoryColor, DEFAULT_PALETTE, assign_colors};

/// Errors from building or writing a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Writing the report file failed.
    #[error("Failed to write report {path}: {source}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Serializing embedded map data failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Presentation settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// Page title.
    pub title: String,
    /// Initial map center as `[latitude, longitude]`.
    pub center: [f64; 2],
    /// Initial zoom level.
    pub zoom: u8,
    /// Zoom level used when jumping to a record from the table.
    pub zoom_to_level: u8,
    /// Colors assigned to categories in first-seen order.
    pub palette: Vec<String>,
    /// Column whose value names a record's category.
    pub category_column: String,
    /// Column whose value identifies a record in labels and zoom links.
    pub id_column: String,
    /// Category for records without a `category_column` value.
    pub uncategorized_label: String,
    /// Overlay name of the boundary outline.
    pub boundary_name: String,
    /// Display names for table headers and popups, in declaration order.
    /// Columns without an entry show their own name.
    pub column_labels: Vec<ColumnLabel>,
}

/// Display name of one column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnLabel {
    /// Column name in the violation table.
    pub column: String,
    /// Name shown to readers.
    pub label: String,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            title: "Outside-Boundary Asset Coordinates".to_string(),
            center: [50.897_439, -121.868_009],
            zoom: 5,
            zoom_to_level: 12,
            palette: DEFAULT_PALETTE.iter().map(ToString::to_string).collect(),
            category_column: "asset_category".to_string(),
            id_column: "gisid".to_string(),
            uncategorized_label: "Uncategorized".to_string(),
            boundary_name: "Park Boundary".to_string(),
            column_labels: Vec::new(),
        }
    }
}

/// A rendered report.
#[derive(Debug, Clone)]
pub struct Report {
    html: String,
    layers: Vec<CategoryColor>,
    marker_count: usize,
}

impl Report {
    /// The full HTML document.
    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Category layers in display order. Empty for a no-violations report.
    #[must_use]
    pub fn layers(&self) -> &[CategoryColor] {
        &self.layers
    }

    /// Number of plotted records.
    #[must_use]
    pub const fn marker_count(&self) -> usize {
        self.marker_count
    }

    /// Whether the report has no map because nothing was found.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.marker_count == 0
    }

    /// File name used when the report is sent as an attachment.
    #[must_use]
    pub fn attachment_name(date: NaiveDate) -> String {
        format!("Outside_Boundary_Assets_{}.html", date.format("%Y%m%d"))
    }

    /// Writes the document to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// * If the directory or file cannot be written
    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let io_err = |source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, &self.html).map_err(io_err)?;

        log::info!("Report saved to {}", path.display());
        Ok(())
    }
}

#[derive(Serialize)]
struct MapData<'a> {
    center: [f64; 2],
    zoom: u8,
    #[serde(rename = "zoomToLevel")]
    zoom_to_level: u8,
    #[serde(rename = "boundaryName")]
    boundary_name: &'a str,
    boundary: geojson::Geometry,
    layers: Vec<LayerData<'a>>,
    markers: Vec<MarkerData>,
}

#[derive(Serialize)]
struct LayerData<'a> {
    name: &'a str,
    color: &'a str,
}

#[derive(Serialize)]
struct MarkerData {
    layer: String,
    color: String,
    lat: f64,
    lon: f64,
    id: String,
    label: String,
    popup: String,
}

/// Renders `table` over `boundary`.
///
/// # Errors
///
/// * If the map data cannot be serialized
pub fn build_report(
    boundary: &BoundaryGeometry,
    table: &ViolationTable,
    options: &ReportOptions,
    generated_on: NaiveDate,
) -> Result<Report, ReportError> {
    let date = generated_on.format("%B %d, %Y").to_string();

    if table.is_empty() {
        log::info!("No out-of-boundary assets; writing notice-only report");
        return Ok(Report {
            html: empty_document(&options.title, &date),
            layers: Vec::new(),
            marker_count: 0,
        });
    }

    let categories = table.categories(&options.category_column, &options.uncategorized_label);
    let layers = assign_colors(&categories, &options.palette);

    let markers = table
        .records
        .iter()
        .map(|record| {
            let layer = category_of(record, &options.category_column, &options.uncategorized_label);
            let color = layers
                .iter()
                .find(|l| l.category == layer)
                .map_or_else(|| DEFAULT_PALETTE[0].to_string(), |l| l.color.clone());
            let id = record.display_value(&options.id_column);
            MarkerData {
                label: escape_html(&id),
                popup: popup_html(table, record, &options.column_labels),
                layer,
                color,
                lat: record.latitude,
                lon: record.longitude,
                id,
            }
        })
        .collect::<Vec<_>>();

    let data = MapData {
        center: options.center,
        zoom: options.zoom,
        zoom_to_level: options.zoom_to_level,
        boundary_name: &options.boundary_name,
        boundary: geojson::Geometry::new(geojson::Value::from(boundary.polygon())),
        layers: layers
            .iter()
            .map(|l| LayerData {
                name: &l.category,
                color: &l.color,
            })
            .collect(),
        markers,
    };
    let json = script_safe_json(&serde_json::to_string(&data)?);

    log::debug!(
        "Rendering {} markers in {} layers",
        data.markers.len(),
        layers.len()
    );

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8"/>
<meta name="viewport" content="width=device-width, initial-scale=1.0"/>
<title>{title}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.css"/>
<script src="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.js"></script>
<style>{STYLE}</style>
</head>
<body>
<h3 class="title">{title}</h3>
<p class="subtitle">Generated on {date}</p>
<div id="map"></div>
{legend}
<div class="table-scroll">
{table}
</div>
<script>
const REPORT = {json};
{MAP_SCRIPT}
</script>
</body>
</html>
"#,
        title = escape_html(&options.title),
        legend = legend_html(&layers),
        table = table_html(table, &options.id_column, &options.column_labels),
    );

    Ok(Report {
        html,
        layers,
        marker_count: table.len(),
    })
}

fn empty_document(title: &str, date: &str) -> String {
    let title = escape_html(title);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8"/>
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<h3 class="title">{title}</h3>
<p class="message">No out-of-boundary coordinates detected (as of {date}).</p>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use geo::{MultiPolygon, polygon};
    use park_assets_models::{AttributeValue, ColumnDef, ColumnKind, ViolationRecord};

    use super::*;

    fn boundary() -> BoundaryGeometry {
        BoundaryGeometry::new(MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]]))
    }

    fn record(gisid: &str, category: &str, distance_m: f64) -> ViolationRecord {
        let mut attributes = BTreeMap::new();
        attributes.insert("gisid".to_string(), AttributeValue::Text(gisid.to_string()));
        attributes.insert(
            "asset_category".to_string(),
            AttributeValue::Text(category.to_string()),
        );
        ViolationRecord {
            source_table: "assets".to_string(),
            attributes,
            longitude: 2.0,
            latitude: 2.0,
            distance_m,
        }
    }

    fn table(records: Vec<ViolationRecord>) -> ViolationTable {
        let mut table = ViolationTable::new();
        table.append(
            &[
                ColumnDef::new("gisid", ColumnKind::Text),
                ColumnDef::new("asset_category", ColumnKind::Text),
            ],
            records,
        );
        table
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    #[test]
    fn empty_table_has_notice_and_no_map() {
        let report = build_report(
            &boundary(),
            &ViolationTable::new(),
            &ReportOptions::default(),
            date(),
        )
        .unwrap();

        assert!(report.is_empty());
        assert!(report.layers().is_empty());
        assert!(
            report
                .html()
                .contains("No out-of-boundary coordinates detected (as of March 07, 2024).")
        );
        assert!(!report.html().contains("id=\"map\""));
        assert!(!report.html().contains("leaflet"));
    }

    #[test]
    fn one_layer_per_category_with_distinct_colors() {
        let report = build_report(
            &boundary(),
            &table(vec![
                record("T-1", "Trails", 900.0),
                record("B-1", "Buildings", 400.0),
                record("T-2", "Trails", 100.0),
            ]),
            &ReportOptions::default(),
            date(),
        )
        .unwrap();

        let layers = report.layers();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].category, "Trails");
        assert_eq!(layers[1].category, "Buildings");
        assert_ne!(layers[0].color, layers[1].color);
        assert_eq!(report.marker_count(), 3);

        let html = report.html();
        assert!(html.contains("<div id=\"map\"></div>"));
        assert!(html.contains("Generated on March 07, 2024"));
        assert!(html.contains("data-gid=\"T-2\""));
        assert!(html.contains("function zoomTo(gid)"));
        assert!(html.contains("const coords = {};"));
        assert!(html.contains("\"boundaryName\":\"Park Boundary\""));
    }

    #[test]
    fn missing_category_falls_back_to_uncategorized() {
        let mut r = record("X-1", "", 75.0);
        r.attributes.remove("asset_category");
        let report = build_report(
            &boundary(),
            &table(vec![r]),
            &ReportOptions::default(),
            date(),
        )
        .unwrap();
        assert_eq!(report.layers()[0].category, "Uncategorized");
    }

    #[test]
    fn embedded_data_cannot_close_script() {
        let report = build_report(
            &boundary(),
            &table(vec![record("</script><b>", "Trails", 75.0)]),
            &ReportOptions::default(),
            date(),
        )
        .unwrap();
        let html = report.html();
        // leaflet.js include plus the inline map script
        assert_eq!(html.matches("</script>").count(), 2);
        assert!(html.contains("data-gid=\"&lt;/script&gt;&lt;b&gt;\""));
        assert!(html.contains(r#""id":"\u003c/script\u003e\u003cb\u003e""#));
    }

    #[test]
    fn embedded_data_cannot_open_comments() {
        let report = build_report(
            &boundary(),
            &table(vec![record("B-1", "<!--<script>", 75.0)]),
            &ReportOptions::default(),
            date(),
        )
        .unwrap();
        let html = report.html();
        assert!(!html.contains("<!--"));
        assert_eq!(html.matches("<script").count(), 2);
        assert!(html.contains(r#""name":"\u003c!--\u003cscript\u003e""#));
    }

    #[test]
    fn attachment_name_uses_compact_date() {
        assert_eq!(
            Report::attachment_name(date()),
            "Outside_Boundary_Assets_20240307.html"
        );
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = std::env::temp_dir().join("park_assets_report_save");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("nested").join("report.html");

        let report = build_report(
            &boundary(),
            &ViolationTable::new(),
            &ReportOptions::default(),
            date(),
        )
        .unwrap();
        report.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, report.html());
    }
}

//! HTML fragments of the report.

use std::fmt::Write as _;

use park_assets_models::{ViolationRecord, ViolationTable};

use crate::ColumnLabel;
use crate::palette::CategoryColor;

/// Leaflet release loaded by the report page.
pub const LEAFLET_VERSION: &str = "1.9.4";

/// Escapes text for use in HTML element content and quoted attributes.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Makes serialized JSON safe to embed in a `<script>` element.
///
/// `<`, `>` and `&` only occur inside JSON strings, where the `\uXXXX`
/// escapes decode to the same text.
#[must_use]
pub fn script_safe_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            _ => out.push(c),
        }
    }
    out
}

/// Display name of `column`: its configured label, or the column name.
#[must_use]
pub fn label_for<'a>(labels: &'a [ColumnLabel], column: &'a str) -> &'a str {
    labels
        .iter()
        .find(|l| l.column == column)
        .map_or(column, |l| l.label.as_str())
}

/// Popup body listing every display column of a record.
#[must_use]
pub fn popup_html(
    table: &ViolationTable,
    record: &ViolationRecord,
    labels: &[ColumnLabel],
) -> String {
    let mut out = String::new();
    for column in table.display_columns() {
        let _ = write!(
            out,
            "<b>{}</b>: {}<br/>",
            escape_html(label_for(labels, column)),
            escape_html(&record.display_value(column))
        );
    }
    out
}

/// Fixed-position legend with one swatch per category.
#[must_use]
pub fn legend_html(colors: &[CategoryColor]) -> String {
    let mut out = String::from(
        "<div class=\"legend\">\n    <b class=\"legend-title\">Legend</b><br/>\n",
    );
    for entry in colors {
        let _ = writeln!(
            out,
            "    <div class=\"legend-entry\"><div class=\"legend-swatch\" style=\"background-color:{};\"></div><span>{}</span></div>",
            escape_html(&entry.color),
            escape_html(&entry.category)
        );
    }
    out.push_str("</div>");
    out
}

/// Data table of all records. Cells of `id_column` link to the record's
/// marker on the map.
#[must_use]
pub fn table_html(table: &ViolationTable, id_column: &str, labels: &[ColumnLabel]) -> String {
    let columns = table.display_columns();

    let mut out = String::from("<table class=\"table table-striped\">\n  <thead>\n    <tr>");
    for column in &columns {
        let _ = write!(out, "<th>{}</th>", escape_html(label_for(labels, column)));
    }
    out.push_str("</tr>\n  </thead>\n  <tbody>\n");

    for record in &table.records {
        out.push_str("    <tr>");
        for column in &columns {
            let value = escape_html(&record.display_value(column));
            if *column == id_column && !value.is_empty() {
                let _ = write!(
                    out,
                    "<td><a href=\"#map\" class=\"zoom-link\" data-gid=\"{value}\">{value}</a></td>"
                );
            } else {
                let _ = write!(out, "<td>{value}</td>");
            }
        }
        out.push_str("</tr>\n");
    }

    out.push_str("  </tbody>\n</table>");
    out
}

/// Client-side map construction. Reads the `REPORT` object emitted before
/// it and exposes `zoomTo(gid)`.
pub const MAP_SCRIPT: &str = r"
const map = L.map('map', { center: REPORT.center, zoom: REPORT.zoom });

const streets = L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
    attribution: '&copy; OpenStreetMap contributors',
    maxZoom: 19,
}).addTo(map);
const satellite = L.tileLayer('https://{s}.google.com/vt/lyrs=s&x={x}&y={y}&z={z}', {
    attribution: 'Google Satellite',
    maxZoom: 20,
    subdomains: ['mt0', 'mt1', 'mt2', 'mt3'],
});

const overlays = {};
overlays[REPORT.boundaryName] = L.geoJSON(REPORT.boundary, {
    style: { color: 'grey', weight: 2, fill: false },
}).addTo(map);

const groups = {};
for (const layer of REPORT.layers) {
    groups[layer.name] = L.featureGroup().addTo(map);
    overlays[layer.name] = groups[layer.name];
}

const coords = {};
for (const m of REPORT.markers) {
    const latlng = [m.lat, m.lon];
    L.circleMarker(latlng, {
        radius: 4,
        color: m.color,
        fill: true,
        fillOpacity: 0.7,
    }).bindPopup(m.popup, { maxWidth: 300 }).addTo(groups[m.layer]);
    L.marker(latlng, {
        icon: L.divIcon({
            className: 'marker-label',
            iconSize: [150, 36],
            iconAnchor: [0, 0],
            html: '<div>' + m.label + '</div>',
        }),
    }).addTo(groups[m.layer]);
    if (m.id) {
        coords[m.id] = latlng;
    }
}

L.control.layers({ 'OpenStreetMap': streets, 'Google Satellite': satellite }, overlays, {
    collapsed: false,
}).addTo(map);

function zoomTo(gid) {
    const latlng = coords[gid];
    if (latlng) {
        map.setView(latlng, REPORT.zoomToLevel);
    }
}

document.querySelectorAll('.zoom-link').forEach((link) => {
    link.addEventListener('click', (event) => {
        event.preventDefault();
        zoomTo(link.dataset.gid);
        document.getElementById('map').scrollIntoView();
    });
});
";

/// Page styles.
pub const STYLE: &str = r"
html, body { margin: 0; padding: 0; font-family: Arial, sans-serif; }
#map { width: 100%; height: 60vh; }
.title { text-align: center; font-size: 25px; font-weight: bold; }
.subtitle { text-align: center; font-size: 15px; margin-top: -10px; }
.message { text-align: center; font-size: 16px; margin-top: 20px; }
.table-scroll { max-height: 250px; overflow-y: auto; width: 95%; margin: 10px auto; }
.table-scroll table { border-collapse: collapse; width: 100%; font-size: 12px; }
.table-scroll th, .table-scroll td { padding: 4px 8px; text-align: left; }
.table-striped tbody tr:nth-child(odd) { background-color: #f2f2f2; }
.zoom-link { color: blue; text-decoration: underline; }
.legend {
    position: fixed; bottom: 50px; right: 30px; z-index: 1000;
    background-color: rgba(255, 255, 255, 0.9); padding: 10px;
    border-radius: 5px; border: 1px solid grey;
    box-shadow: 0 2px 5px rgba(0, 0, 0, 0.2); font-size: 12px;
}
.legend-title { font-size: 14px; }
.legend-entry { display: flex; align-items: center; margin: 5px 0; }
.legend-swatch {
    width: 15px; height: 15px; border: 1px solid #333;
    margin-right: 8px; border-radius: 50%;
}
.marker-label div {
    font-size: 12px; color: black;
    text-shadow: -1px -1px 0 white, 1px -1px 0 white, -1px 1px 0 white, 1px 1px 0 white;
}
";

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use park_assets_models::{AttributeValue, ColumnDef, ColumnKind};

    use super::*;

    fn table() -> ViolationTable {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "gisid".to_string(),
            AttributeValue::Text("<B&1>".to_string()),
        );
        let mut table = ViolationTable::new();
        table.append(
            &[ColumnDef::new("gisid", ColumnKind::Text)],
            vec![ViolationRecord {
                source_table: "benches".to_string(),
                attributes,
                longitude: -130.5,
                latitude: 60.25,
                distance_m: 1234.5,
            }],
        );
        table
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom's & co</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom&#39;s &amp; co&lt;/a&gt;"
        );
    }

    #[test]
    fn neutralizes_script_terminators() {
        assert_eq!(
            script_safe_json(r#""</script>""#),
            r#""\u003c/script\u003e""#
        );
    }

    #[test]
    fn neutralizes_comment_openers() {
        let escaped = script_safe_json(r#"{"name":"<!--<script>","note":"A&B"}"#);
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('>'));
        assert!(!escaped.contains('&'));

        let decoded: serde_json::Value = serde_json::from_str(&escaped).unwrap();
        assert_eq!(decoded["name"], "<!--<script>");
        assert_eq!(decoded["note"], "A&B");
    }

    #[test]
    fn table_links_identifiers() {
        let html = table_html(&table(), "gisid", &[]);
        assert!(html.contains("<th>source_table</th><th>gisid</th>"));
        assert!(html.contains("data-gid=\"&lt;B&amp;1&gt;\""));
        assert!(html.contains("<td>1234.5</td>"));
    }

    #[test]
    fn popup_lists_every_column() {
        let t = table();
        let popup = popup_html(&t, &t.records[0], &[]);
        assert!(popup.starts_with("<b>source_table</b>: benches<br/>"));
        assert!(popup.contains("<b>gisid</b>: &lt;B&amp;1&gt;<br/>"));
        assert!(popup.contains("<b>distance_m</b>: 1234.5<br/>"));
    }

    #[test]
    fn configured_labels_rename_headers() {
        let labels = vec![ColumnLabel {
            column: "distance_m".to_string(),
            label: "Distance (m)".to_string(),
        }];
        let html = table_html(&table(), "gisid", &labels);
        assert!(html.contains("<th>Distance (m)</th>"));
        assert!(html.contains("<th>gisid</th>"));
        assert_eq!(label_for(&labels, "latitude"), "latitude");
    }

    #[test]
    fn legend_has_one_entry_per_category() {
        let html = legend_html(&[
            CategoryColor {
                category: "Trails".to_string(),
                color: "red".to_string(),
            },
            CategoryColor {
                category: "Buildings".to_string(),
                color: "blue".to_string(),
            },
        ]);
        assert_eq!(html.matches("legend-entry").count(), 2);
        assert!(html.contains("background-color:blue;"));
    }
}

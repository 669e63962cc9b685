#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Row and table types for the park assets boundary check.
//!
//! A [`ViolationRecord`] is one asset geometry found outside the reference
//! boundary. Records from every asset table are collected into a single
//! [`ViolationTable`] whose column set is the ordered union of the
//! contributing tables' attribute columns, so rows from tables with
//! different schemas still share one stable layout.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Column holding the name of the asset table a record came from.
pub const SOURCE_TABLE_COLUMN: &str = "source_table";
/// Column holding the EPSG:4326 longitude of the asset.
pub const LONGITUDE_COLUMN: &str = "longitude";
/// Column holding the EPSG:4326 latitude of the asset.
pub const LATITUDE_COLUMN: &str = "latitude";
/// Column holding the geodesic distance to the boundary, in meters.
pub const DISTANCE_COLUMN: &str = "distance_m";

/// Columns filled in by the evaluator rather than read from asset tables.
pub const COMPUTED_COLUMNS: [&str; 4] = [
    SOURCE_TABLE_COLUMN,
    LONGITUDE_COLUMN,
    LATITUDE_COLUMN,
    DISTANCE_COLUMN,
];

/// Whether `name` collides with a column the evaluator computes.
///
/// Asset attributes with these names are dropped on read so every display
/// column is unique.
#[must_use]
pub fn is_computed_column(name: &str) -> bool {
    COMPUTED_COLUMNS.contains(&name)
}

static NULL_VALUE: AttributeValue = AttributeValue::Null;

/// Storage class of an attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Whole numbers (`smallint`, `integer`, `bigint`).
    Integer,
    /// Floating point and arbitrary precision numbers.
    Real,
    /// Everything else, read back as text.
    Text,
}

impl ColumnKind {
    /// Maps a Postgres `information_schema.columns.data_type` value.
    #[must_use]
    pub fn from_pg_type(data_type: &str) -> Self {
        match data_type.trim().to_ascii_lowercase().as_str() {
            "smallint" | "integer" | "bigint" => Self::Integer,
            "real" | "double precision" | "numeric" | "decimal" => Self::Real,
            _ => Self::Text,
        }
    }
}

/// An attribute column of an asset table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name as stored in the database.
    pub name: String,
    /// How values of this column are read and rendered.
    pub kind: ColumnKind,
}

impl ColumnDef {
    /// Creates a new column definition.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A single attribute cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Missing value, or a column the record's table does not have.
    Null,
    /// Whole number.
    Integer(i64),
    /// Floating point number.
    Real(f64),
    /// Free text.
    Text(String),
}

impl AttributeValue {
    /// Returns `true` for [`AttributeValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Rounds [`AttributeValue::Real`] values to `places` decimals. Other
    /// variants are returned unchanged.
    #[must_use]
    pub fn rounded(self, places: i32) -> Self {
        match self {
            Self::Real(value) => Self::Real(round_to(value, places)),
            other => other,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Rounds `value` half away from zero to `places` decimals.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// One asset geometry that does not intersect the reference boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Asset table the row was read from.
    pub source_table: String,
    /// Attribute values keyed by column name.
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Geodesic distance from the boundary, in meters.
    pub distance_m: f64,
}

impl ViolationRecord {
    /// Returns the attribute stored under `column`, or
    /// [`AttributeValue::Null`] if the record has no such attribute.
    #[must_use]
    pub fn attribute(&self, column: &str) -> &AttributeValue {
        self.attributes.get(column).unwrap_or(&NULL_VALUE)
    }

    /// Renders any display column (attribute or computed) as text.
    #[must_use]
    pub fn display_value(&self, column: &str) -> String {
        match column {
            SOURCE_TABLE_COLUMN => self.source_table.clone(),
            LONGITUDE_COLUMN => self.longitude.to_string(),
            LATITUDE_COLUMN => self.latitude.to_string(),
            DISTANCE_COLUMN => self.distance_m.to_string(),
            _ => self.attribute(column).to_string(),
        }
    }
}

/// All out-of-boundary records of one run, worst violations first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationTable {
    /// Ordered union of the attribute columns of every contributing table.
    pub columns: Vec<ColumnDef>,
    /// Violation rows.
    pub records: Vec<ViolationRecord>,
}

impl ViolationTable {
    /// Creates an empty table with no columns.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Appends one table's contribution. Columns not seen before are added
    /// to the end of the column list, even when `records` is empty.
    pub fn append(&mut self, columns: &[ColumnDef], records: Vec<ViolationRecord>) {
        for column in columns {
            if !self.columns.iter().any(|c| c.name == column.name) {
                self.columns.push(column.clone());
            }
        }
        self.records.extend(records);
    }

    /// Removes the named columns from the schema and from every record.
    pub fn drop_columns(&mut self, names: &[String]) {
        self.columns.retain(|c| !names.contains(&c.name));
        for record in &mut self.records {
            record.attributes.retain(|name, _| !names.contains(name));
        }
    }

    /// Column names in display order: source table, attributes, then the
    /// computed coordinate and distance columns.
    #[must_use]
    pub fn display_columns(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.columns.len() + 4);
        names.push(SOURCE_TABLE_COLUMN);
        names.extend(self.columns.iter().map(|c| c.name.as_str()));
        names.extend([LONGITUDE_COLUMN, LATITUDE_COLUMN, DISTANCE_COLUMN]);
        names
    }

    /// Distinct non-empty values of `column`, in first-seen order. Records
    /// without a value are grouped under `fallback`.
    #[must_use]
    pub fn categories(&self, column: &str, fallback: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for record in &self.records {
            let category = category_of(record, column, fallback);
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen
    }
}

/// Category label of a record, or `fallback` when the value is missing.
#[must_use]
pub fn category_of(record: &ViolationRecord, column: &str, fallback: &str) -> String {
    let value = record.display_value(column);
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

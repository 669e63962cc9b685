//! Coordinate reference system detection for `GeoJSON` boundary files.
//!
//! RFC 7946 dropped the `crs` member and fixed the frame to WGS84, but
//! files exported by desktop GIS tools still carry the 2008-era named CRS
//! object, e.g. `{"type": "name", "properties": {"name":
//! "urn:ogc:def:crs:EPSG::3005"}}`.

use geojson::JsonObject;
use serde_json::Value;

use crate::BoundaryError;

/// SRID of WGS84 longitude/latitude.
pub const WGS84_SRID: u32 = 4326;

/// Parses a CRS name into an EPSG code.
///
/// Accepts `EPSG:3005`, `urn:ogc:def:crs:EPSG::3005`,
/// `urn:ogc:def:crs:EPSG:6.6:3005`, `http://www.opengis.net/def/crs/EPSG/0/3005`
/// and the `CRS84` aliases for WGS84.
#[must_use]
pub fn parse_crs_name(name: &str) -> Option<u32> {
    let upper = name.trim().to_ascii_uppercase();

    if upper.ends_with("CRS84") || upper.ends_with("CRS:84") {
        return Some(WGS84_SRID);
    }

    if !upper.contains("EPSG") {
        return None;
    }

    upper
        .rsplit([':', '/'])
        .next()
        .and_then(|code| code.parse().ok())
}

/// Reads the SRID declared by a `GeoJSON` object's foreign members.
///
/// Objects without a `crs` member are WGS84.
///
/// # Errors
///
/// Returns [`BoundaryError::Crs`] if a `crs` member is present but cannot
/// be interpreted.
pub fn srid_from_members(members: Option<&JsonObject>) -> Result<u32, BoundaryError> {
    let Some(crs) = members.and_then(|m| m.get("crs")) else {
        return Ok(WGS84_SRID);
    };

    let properties = crs.get("properties");

    let srid = match crs.get("type").and_then(Value::as_str) {
        Some("name") => properties
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .and_then(parse_crs_name),
        Some("EPSG") => properties
            .and_then(|p| p.get("code"))
            .and_then(Value::as_u64)
            .and_then(|code| u32::try_from(code).ok()),
        _ => None,
    };

    srid.ok_or_else(|| BoundaryError::Crs {
        message: format!("unrecognized crs member: {crs}"),
    })
}

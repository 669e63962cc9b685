//! ISO well-known binary encoding for polygonal boundaries.
//!
//! Only the geometry types a boundary can take are written. Output is
//! little endian (byte order marker `1`), 2D.

use geo::{LineString, MultiPolygon, Polygon};

const LITTLE_ENDIAN: u8 = 1;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOLYGON: u32 = 6;

/// Encodes a [`MultiPolygon`] as WKB.
#[must_use]
pub fn multipolygon_to_wkb(multi_polygon: &MultiPolygon<f64>) -> Vec<u8> {
    let mut buf = Vec::new();
    write_header(&mut buf, WKB_MULTIPOLYGON);
    write_count(&mut buf, multi_polygon.0.len());

    for polygon in &multi_polygon.0 {
        write_polygon(&mut buf, polygon);
    }

    buf
}

fn write_polygon(buf: &mut Vec<u8>, polygon: &Polygon<f64>) {
    write_header(buf, WKB_POLYGON);
    write_count(buf, 1 + polygon.interiors().len());
    write_ring(buf, polygon.exterior());
    for ring in polygon.interiors() {
        write_ring(buf, ring);
    }
}

fn write_ring(buf: &mut Vec<u8>, ring: &LineString<f64>) {
    write_count(buf, ring.0.len());
    for coord in &ring.0 {
        buf.extend_from_slice(&coord.x.to_le_bytes());
        buf.extend_from_slice(&coord.y.to_le_bytes());
    }
}

fn write_header(buf: &mut Vec<u8>, geometry_type: u32) {
    buf.push(LITTLE_ENDIAN);
    buf.extend_from_slice(&geometry_type.to_le_bytes());
}

#[allow(clippy::cast_possible_truncation)]
fn write_count(buf: &mut Vec<u8>, count: usize) {
    buf.extend_from_slice(&(count as u32).to_le_bytes());
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn unit_square() -> Polygon<f64> {
        polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]
    }

    #[test]
    fn encodes_unit_square() {
        let wkb = multipolygon_to_wkb(&MultiPolygon::new(vec![unit_square()]));

        // header + count, polygon header + ring count, 5 points
        assert_eq!(wkb.len(), 9 + 9 + 4 + 5 * 16);
        assert_eq!(wkb[0], LITTLE_ENDIAN);
        assert_eq!(u32::from_le_bytes([wkb[1], wkb[2], wkb[3], wkb[4]]), 6);
        assert_eq!(u32::from_le_bytes([wkb[5], wkb[6], wkb[7], wkb[8]]), 1);
        assert_eq!(u32::from_le_bytes([wkb[10], wkb[11], wkb[12], wkb[13]]), 3);

        let second_x = f64::from_le_bytes(wkb[38..46].try_into().unwrap());
        assert!((second_x - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn encodes_interior_rings() {
        let with_hole = Polygon::new(
            unit_square().exterior().clone(),
            vec![LineString::from(vec![
                (0.25, 0.25),
                (0.75, 0.25),
                (0.75, 0.75),
                (0.25, 0.25),
            ])],
        );
        let wkb = multipolygon_to_wkb(&MultiPolygon::new(vec![with_hole]));
        assert_eq!(u32::from_le_bytes([wkb[14], wkb[15], wkb[16], wkb[17]]), 2);
    }
}

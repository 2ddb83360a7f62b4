//! Point collection serializer (`"0,0 10,5 20,0"`)
//!
//! Payload: `[varint count]` followed by `x`, `y` for each point as compact doubles.

use super::numeric::{parse_number, read_double, write_double};
use super::{CustomBinarySerializer, SerializedValue};
use crate::error::Result;
use crate::types::ValueTypeId;
use crate::varint;
use std::fmt;
use std::io::{Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Parse whitespace- or comma-separated coordinate pairs
pub fn parse_points(text: &str) -> Option<Vec<Point>> {
    let numbers = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(parse_number)
        .collect::<Option<Vec<f64>>>()?;

    if numbers.len() % 2 != 0 {
        return None;
    }
    Some(numbers.chunks_exact(2).map(|pair| Point::new(pair[0], pair[1])).collect())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PointCollectionSerializer;

impl PointCollectionSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl CustomBinarySerializer for PointCollectionSerializer {
    fn name(&self) -> &'static str {
        "PointCollectionSerializer"
    }

    fn value_type(&self) -> ValueTypeId {
        ValueTypeId::PointCollection
    }

    fn convert_string_to_custom_binary(&self, sink: &mut dyn Write, text: &str) -> Result<bool> {
        let points = match parse_points(text) {
            Some(points) => points,
            None => return Ok(false),
        };

        let mut payload = Vec::new();
        varint::encode(&mut payload, points.len() as u32)?;
        for point in &points {
            write_double(&mut payload, point.x)?;
            write_double(&mut payload, point.y)?;
        }
        sink.write_all(&payload)?;
        Ok(true)
    }

    fn convert_custom_binary_to_object(&self, source: &mut dyn Read) -> Result<SerializedValue> {
        let count = varint::decode_count(source, "point collection")?;
        let mut points = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let x = read_double(source)?;
            let y = read_double(source)?;
            points.push(Point::new(x, y));
        }
        Ok(SerializedValue::Points(points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_points() {
        let points = parse_points("0,0 10,5\n20.5, -3").unwrap();
        assert_eq!(points, vec![Point::new(0.0, 0.0), Point::new(10.0, 5.0), Point::new(20.5, -3.0)]);
        assert_eq!(parse_points("").unwrap(), vec![]);
        assert!(parse_points("1,2 3").is_none());
        assert!(parse_points("1,x").is_none());
    }

    #[test]
    fn test_compact_payload() {
        let mut bytes = Vec::new();
        assert!(PointCollectionSerializer::new()
            .convert_string_to_custom_binary(&mut bytes, "0,0 1,1")
            .unwrap());
        // count, then four one-byte doubles
        assert_eq!(bytes, vec![0x02, 0x01, 0x01, 0x02, 0x02]);
    }

    #[test]
    fn test_decode_stops_after_payload() {
        let serializer = PointCollectionSerializer::new();
        let mut bytes = Vec::new();
        serializer.convert_string_to_custom_binary(&mut bytes, "1.5,2 300,-4").unwrap();
        let len = bytes.len() as u64;
        bytes.push(0xFF);

        let mut cursor = Cursor::new(bytes);
        let value = serializer.convert_custom_binary_to_object(&mut cursor).unwrap();
        assert_eq!(value, SerializedValue::Points(vec![Point::new(1.5, 2.0), Point::new(300.0, -4.0)]));
        assert_eq!(cursor.position(), len);
    }

    #[test]
    fn test_odd_coordinate_count_is_ineligible() {
        let mut bytes = Vec::new();
        assert!(!PointCollectionSerializer::new()
            .convert_string_to_custom_binary(&mut bytes, "1 2 3")
            .unwrap());
        assert!(bytes.is_empty());
    }
}

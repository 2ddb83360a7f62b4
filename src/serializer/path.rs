//! Path geometry serializer for the path mini-language (`M 0,0 L 10,10 Z`)
//!
//! Relative commands and shorthand forms (`H`, `V`, `S`, `T`) are resolved to
//! absolute coordinates at compile time, so the reader only ever sees six
//! opcodes.
//!
//! Payload layout:
//!
//! ```text
//! [fill rule u8][varint command count]
//! per command: [opcode u8][compact doubles...]
//! ```

use super::numeric::{read_double, write_double};
use super::point_collection::Point;
use super::{CustomBinarySerializer, SerializedValue};
use crate::error::{CompilerError, Result};
use crate::types::ValueTypeId;
use crate::varint;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FillRule {
    #[default]
    EvenOdd = 0x00,
    Nonzero = 0x01,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadraticTo {
        control: Point,
        end: Point,
    },
    CubicTo {
        control1: Point,
        control2: Point,
        end: Point,
    },
    ArcTo {
        end: Point,
        radius_x: f64,
        radius_y: f64,
        rotation: f64,
        is_large_arc: bool,
        sweep_clockwise: bool,
    },
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Opcode {
    MoveTo = 0x01,
    LineTo = 0x02,
    QuadraticTo = 0x03,
    CubicTo = 0x04,
    ArcTo = 0x05,
    Close = 0x06,
}

impl Opcode {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::MoveTo),
            0x02 => Some(Self::LineTo),
            0x03 => Some(Self::QuadraticTo),
            0x04 => Some(Self::CubicTo),
            0x05 => Some(Self::ArcTo),
            0x06 => Some(Self::Close),
            _ => None,
        }
    }
}

const ARC_LARGE: u8 = 1 << 0;
const ARC_SWEEP: u8 = 1 << 1;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathGeometry {
    pub fill_rule: FillRule,
    pub commands: Vec<PathCommand>,
}

impl PathGeometry {
    /// Parse path markup. `None` when the text is not valid path syntax.
    pub fn parse(text: &str) -> Option<Self> {
        PathParser::new(text).parse()
    }

    /// Number of figures, counted by `MoveTo` commands
    pub fn figure_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, PathCommand::MoveTo(_)))
            .count()
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.fill_rule as u8)?;
        varint::encode(writer, self.commands.len() as u32)?;

        for command in &self.commands {
            match *command {
                PathCommand::MoveTo(p) => {
                    writer.write_u8(Opcode::MoveTo as u8)?;
                    write_point(writer, p)?;
                }
                PathCommand::LineTo(p) => {
                    writer.write_u8(Opcode::LineTo as u8)?;
                    write_point(writer, p)?;
                }
                PathCommand::QuadraticTo { control, end } => {
                    writer.write_u8(Opcode::QuadraticTo as u8)?;
                    write_point(writer, control)?;
                    write_point(writer, end)?;
                }
                PathCommand::CubicTo { control1, control2, end } => {
                    writer.write_u8(Opcode::CubicTo as u8)?;
                    write_point(writer, control1)?;
                    write_point(writer, control2)?;
                    write_point(writer, end)?;
                }
                PathCommand::ArcTo { end, radius_x, radius_y, rotation, is_large_arc, sweep_clockwise } => {
                    writer.write_u8(Opcode::ArcTo as u8)?;
                    write_point(writer, end)?;
                    write_double(writer, radius_x)?;
                    write_double(writer, radius_y)?;
                    write_double(writer, rotation)?;
                    let mut flags = 0u8;
                    if is_large_arc {
                        flags |= ARC_LARGE;
                    }
                    if sweep_clockwise {
                        flags |= ARC_SWEEP;
                    }
                    writer.write_u8(flags)?;
                }
                PathCommand::Close => writer.write_u8(Opcode::Close as u8)?,
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let fill_tag = reader.read_u8()?;
        let fill_rule = match fill_tag {
            0x00 => FillRule::EvenOdd,
            0x01 => FillRule::Nonzero,
            other => {
                return Err(CompilerError::UnknownDiscriminator {
                    what: "fill rule",
                    value: other,
                })
            }
        };

        let count = varint::decode_count(reader, "path command")?;
        // Every command takes at least one byte; cap the preallocation anyway
        let mut commands = Vec::with_capacity(count.min(1024));

        for _ in 0..count {
            let tag = reader.read_u8()?;
            let opcode = Opcode::from_u8(tag).ok_or(CompilerError::UnknownDiscriminator {
                what: "path command",
                value: tag,
            })?;

            let command = match opcode {
                Opcode::MoveTo => PathCommand::MoveTo(read_point(reader)?),
                Opcode::LineTo => PathCommand::LineTo(read_point(reader)?),
                Opcode::QuadraticTo => PathCommand::QuadraticTo {
                    control: read_point(reader)?,
                    end: read_point(reader)?,
                },
                Opcode::CubicTo => PathCommand::CubicTo {
                    control1: read_point(reader)?,
                    control2: read_point(reader)?,
                    end: read_point(reader)?,
                },
                Opcode::ArcTo => {
                    let end = read_point(reader)?;
                    let radius_x = read_double(reader)?;
                    let radius_y = read_double(reader)?;
                    let rotation = read_double(reader)?;
                    let flags = reader.read_u8()?;
                    PathCommand::ArcTo {
                        end,
                        radius_x,
                        radius_y,
                        rotation,
                        is_large_arc: flags & ARC_LARGE != 0,
                        sweep_clockwise: flags & ARC_SWEEP != 0,
                    }
                }
                Opcode::Close => PathCommand::Close,
            };
            commands.push(command);
        }

        Ok(Self { fill_rule, commands })
    }
}

fn write_point<W: Write + ?Sized>(writer: &mut W, point: Point) -> Result<()> {
    write_double(writer, point.x)?;
    write_double(writer, point.y)
}

fn read_point<R: Read + ?Sized>(reader: &mut R) -> Result<Point> {
    let x = read_double(reader)?;
    let y = read_double(reader)?;
    Ok(Point::new(x, y))
}

struct PathParser<'a> {
    bytes: &'a [u8],
    pos: usize,
    current: Point,
    figure_start: Point,
    /// Control point of the previous curve, for `S` and `T` reflection
    last_control: Option<(u8, Point)>,
}

impl<'a> PathParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
            current: Point::default(),
            figure_start: Point::default(),
            last_control: None,
        }
    }

    fn skip_separators(&mut self) {
        while let Some(&c) = self.bytes.get(self.pos) {
            if c.is_ascii_whitespace() || c == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_separators();
        self.pos >= self.bytes.len()
    }

    fn has_number(&mut self) -> bool {
        self.skip_separators();
        matches!(self.bytes.get(self.pos), Some(c) if c.is_ascii_digit() || matches!(c, b'-' | b'+' | b'.'))
    }

    fn read_number(&mut self) -> Option<f64> {
        self.skip_separators();
        let start = self.pos;

        if matches!(self.bytes.get(self.pos), Some(b'-') | Some(b'+')) {
            self.pos += 1;
        }
        let mut digits = self.eat_digits();
        if self.bytes.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            digits += self.eat_digits();
        }
        if digits == 0 {
            self.pos = start;
            return None;
        }
        if matches!(self.bytes.get(self.pos), Some(b'e') | Some(b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.bytes.get(self.pos), Some(b'-') | Some(b'+')) {
                self.pos += 1;
            }
            if self.eat_digits() == 0 {
                self.pos = mark;
            }
        }

        std::str::from_utf8(&self.bytes[start..self.pos]).ok()?.parse().ok()
    }

    fn eat_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.bytes.get(self.pos), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn read_flag(&mut self) -> Option<bool> {
        self.skip_separators();
        let flag = match self.bytes.get(self.pos)? {
            b'0' => false,
            b'1' => true,
            _ => return None,
        };
        self.pos += 1;
        Some(flag)
    }

    fn read_point(&mut self, relative: bool) -> Option<Point> {
        let x = self.read_number()?;
        let y = self.read_number()?;
        Some(if relative {
            Point::new(self.current.x + x, self.current.y + y)
        } else {
            Point::new(x, y)
        })
    }

    fn reflected_control(&self, kind: u8) -> Point {
        match self.last_control {
            Some((last_kind, control)) if last_kind == kind => {
                Point::new(2.0 * self.current.x - control.x, 2.0 * self.current.y - control.y)
            }
            _ => self.current,
        }
    }

    fn parse(mut self) -> Option<PathGeometry> {
        let mut geometry = PathGeometry::default();

        if !self.at_end() && matches!(self.bytes[self.pos], b'F' | b'f') {
            self.pos += 1;
            geometry.fill_rule = match self.bytes.get(self.pos)? {
                b'0' => FillRule::EvenOdd,
                b'1' => FillRule::Nonzero,
                _ => return None,
            };
            self.pos += 1;
        }

        let mut first = true;
        while !self.at_end() {
            let letter = self.bytes[self.pos];
            if !letter.is_ascii_alphabetic() {
                return None;
            }
            self.pos += 1;

            let command = letter.to_ascii_uppercase();
            let relative = letter.is_ascii_lowercase();

            // A figure must open with a move
            if first && command != b'M' {
                return None;
            }
            first = false;

            self.parse_command(command, relative, &mut geometry.commands)?;
        }

        Some(geometry)
    }

    fn parse_command(&mut self, command: u8, relative: bool, out: &mut Vec<PathCommand>) -> Option<()> {
        match command {
            b'Z' => {
                out.push(PathCommand::Close);
                self.current = self.figure_start;
                self.last_control = None;
                return Some(());
            }
            b'M' => {
                let point = self.read_point(relative)?;
                out.push(PathCommand::MoveTo(point));
                self.current = point;
                self.figure_start = point;
                self.last_control = None;
                // Extra coordinate pairs after a move are implicit lines
                while self.has_number() {
                    let point = self.read_point(relative)?;
                    out.push(PathCommand::LineTo(point));
                    self.current = point;
                }
                return Some(());
            }
            _ => {}
        }

        loop {
            match command {
                b'L' => {
                    let point = self.read_point(relative)?;
                    out.push(PathCommand::LineTo(point));
                    self.current = point;
                    self.last_control = None;
                }
                b'H' => {
                    let x = self.read_number()?;
                    let x = if relative { self.current.x + x } else { x };
                    let point = Point::new(x, self.current.y);
                    out.push(PathCommand::LineTo(point));
                    self.current = point;
                    self.last_control = None;
                }
                b'V' => {
                    let y = self.read_number()?;
                    let y = if relative { self.current.y + y } else { y };
                    let point = Point::new(self.current.x, y);
                    out.push(PathCommand::LineTo(point));
                    self.current = point;
                    self.last_control = None;
                }
                b'C' | b'S' => {
                    let control1 = if command == b'C' {
                        self.read_point(relative)?
                    } else {
                        self.reflected_control(b'C')
                    };
                    let control2 = self.read_point(relative)?;
                    let end = self.read_point(relative)?;
                    out.push(PathCommand::CubicTo { control1, control2, end });
                    self.current = end;
                    self.last_control = Some((b'C', control2));
                }
                b'Q' | b'T' => {
                    let control = if command == b'Q' {
                        self.read_point(relative)?
                    } else {
                        self.reflected_control(b'Q')
                    };
                    let end = self.read_point(relative)?;
                    out.push(PathCommand::QuadraticTo { control, end });
                    self.current = end;
                    self.last_control = Some((b'Q', control));
                }
                b'A' => {
                    let radius_x = self.read_number()?;
                    let radius_y = self.read_number()?;
                    let rotation = self.read_number()?;
                    let is_large_arc = self.read_flag()?;
                    let sweep_clockwise = self.read_flag()?;
                    let end = self.read_point(relative)?;
                    out.push(PathCommand::ArcTo {
                        end,
                        radius_x,
                        radius_y,
                        rotation,
                        is_large_arc,
                        sweep_clockwise,
                    });
                    self.current = end;
                    self.last_control = None;
                }
                _ => return None,
            }

            if !self.has_number() {
                return Some(());
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PathGeometrySerializer;

impl PathGeometrySerializer {
    pub fn new() -> Self {
        Self
    }
}

impl CustomBinarySerializer for PathGeometrySerializer {
    fn name(&self) -> &'static str {
        "PathGeometrySerializer"
    }

    fn value_type(&self) -> ValueTypeId {
        ValueTypeId::PathGeometry
    }

    fn convert_string_to_custom_binary(&self, sink: &mut dyn Write, text: &str) -> Result<bool> {
        let geometry = match PathGeometry::parse(text) {
            Some(geometry) => geometry,
            None => return Ok(false),
        };

        let mut payload = Vec::new();
        geometry.write_to(&mut payload)?;
        sink.write_all(&payload)?;
        Ok(true)
    }

    fn convert_custom_binary_to_object(&self, source: &mut dyn Read) -> Result<SerializedValue> {
        Ok(SerializedValue::Geometry(PathGeometry::read_from(source)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_absolute_commands() {
        let geometry = PathGeometry::parse("M 0,0 L 10,10 H 20 V 5 Z").unwrap();
        assert_eq!(geometry.fill_rule, FillRule::EvenOdd);
        assert_eq!(
            geometry.commands,
            vec![
                PathCommand::MoveTo(p(0.0, 0.0)),
                PathCommand::LineTo(p(10.0, 10.0)),
                PathCommand::LineTo(p(20.0, 10.0)),
                PathCommand::LineTo(p(20.0, 5.0)),
                PathCommand::Close,
            ]
        );
    }

    #[test]
    fn test_relative_and_implicit_commands() {
        let geometry = PathGeometry::parse("F1 m10,10 5,0 l0,5 -5,0z").unwrap();
        assert_eq!(geometry.fill_rule, FillRule::Nonzero);
        assert_eq!(
            geometry.commands,
            vec![
                PathCommand::MoveTo(p(10.0, 10.0)),
                PathCommand::LineTo(p(15.0, 10.0)),
                PathCommand::LineTo(p(15.0, 15.0)),
                PathCommand::LineTo(p(10.0, 15.0)),
                PathCommand::Close,
            ]
        );
    }

    #[test]
    fn test_compact_number_syntax() {
        let geometry = PathGeometry::parse("M0-5L.5.5l1e1,-2E0").unwrap();
        assert_eq!(
            geometry.commands,
            vec![
                PathCommand::MoveTo(p(0.0, -5.0)),
                PathCommand::LineTo(p(0.5, 0.5)),
                PathCommand::LineTo(p(10.5, -1.5)),
            ]
        );
    }

    #[test]
    fn test_smooth_curves_reflect_control_points() {
        let geometry = PathGeometry::parse("M0,0 C0,10 10,10 10,0 S20,-10 20,0").unwrap();
        match geometry.commands[2] {
            PathCommand::CubicTo { control1, .. } => assert_eq!(control1, p(10.0, -10.0)),
            other => panic!("Unexpected command {:?}", other),
        }

        let geometry = PathGeometry::parse("M0,0 T10,0").unwrap();
        match geometry.commands[1] {
            PathCommand::QuadraticTo { control, .. } => assert_eq!(control, p(0.0, 0.0)),
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_arc_flags() {
        let geometry = PathGeometry::parse("M0,0 A5,5 0 1 0 10,0").unwrap();
        assert_eq!(
            geometry.commands[1],
            PathCommand::ArcTo {
                end: p(10.0, 0.0),
                radius_x: 5.0,
                radius_y: 5.0,
                rotation: 0.0,
                is_large_arc: true,
                sweep_clockwise: false,
            }
        );
    }

    #[test]
    fn test_invalid_paths_are_ineligible() {
        for text in ["L 10,10", "M 0", "M 0,0 X 1,1", "F2 M0,0", "M0,0 A5,5 0 2 0 1,1"] {
            let mut sink = Vec::new();
            let eligible = PathGeometrySerializer::new()
                .convert_string_to_custom_binary(&mut sink, text)
                .unwrap();
            assert!(!eligible, "'{}' should be ineligible", text);
            assert!(sink.is_empty());
        }
    }

    #[test]
    fn test_serializer_reads_exactly_its_payload() {
        let serializer = PathGeometrySerializer::new();
        let mut bytes = Vec::new();
        assert!(serializer
            .convert_string_to_custom_binary(&mut bytes, "M 0,0 Q 5,10 10,0 A 2.5,2.5 45 0 1 20,0 Z")
            .unwrap());
        let payload_len = bytes.len() as u64;
        bytes.push(0xEE);

        let mut cursor = Cursor::new(bytes);
        match serializer.convert_custom_binary_to_object(&mut cursor).unwrap() {
            SerializedValue::Geometry(geometry) => {
                assert_eq!(geometry.commands.len(), 4);
                assert_eq!(geometry.figure_count(), 1);
            }
            other => panic!("Unexpected value {:?}", other),
        }
        assert_eq!(cursor.position(), payload_len);
    }

    #[test]
    fn test_unknown_opcode() {
        let mut cursor = Cursor::new(vec![0x00, 0x01, 0x42]);
        assert!(matches!(
            PathGeometry::read_from(&mut cursor),
            Err(CompilerError::UnknownDiscriminator { what: "path command", value: 0x42 })
        ));
    }
}

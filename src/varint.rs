//! Variable-length integer codec used to frame every length-prefixed field
//!
//! Each byte carries 7 bits of magnitude, least significant group first. The
//! high bit of a byte is set when another byte follows. A `u32` never needs
//! more than [`MAX_VARINT_LEN`] bytes.

use crate::error::{CompilerError, Result};
use crate::types::MAX_COLLECTION_COUNT;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Longest encoding the decoder accepts
pub const MAX_VARINT_LEN: usize = 5;

const CONTINUATION_BIT: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7F;

/// Write `value` and return the number of bytes written
pub fn encode<W: Write + ?Sized>(writer: &mut W, value: u32) -> Result<usize> {
    let mut remaining = value;
    let mut written = 0;

    while remaining >= CONTINUATION_BIT as u32 {
        writer.write_u8((remaining as u8 & PAYLOAD_MASK) | CONTINUATION_BIT)?;
        remaining >>= 7;
        written += 1;
    }
    writer.write_u8(remaining as u8)?;

    Ok(written + 1)
}

/// Encode into a fresh buffer
pub fn encode_to_vec(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(size_of(value as u64));
    // Writing into a Vec cannot fail
    let _ = encode(&mut out, value);
    out
}

/// Byte count `encode` would produce for `value`.
///
/// Saturates at [`MAX_VARINT_LEN`]: magnitudes above 28 bits all report 5,
/// including values that would not fit a 5-byte encoding at all.
pub fn size_of(value: u64) -> usize {
    if value & !0x7F == 0 {
        1
    } else if value & !0x3FFF == 0 {
        2
    } else if value & !0x1F_FFFF == 0 {
        3
    } else if value & !0x0FFF_FFFF == 0 {
        4
    } else {
        MAX_VARINT_LEN
    }
}

/// Read one value. Fails with `MalformedVarInt` when no terminating byte is
/// found within `MAX_VARINT_LEN` bytes; EOF before termination is an IO error.
pub fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let mut value: u64 = 0;

    for index in 0..MAX_VARINT_LEN {
        let byte = reader.read_u8()?;
        value |= ((byte & PAYLOAD_MASK) as u64) << (7 * index);

        if byte & CONTINUATION_BIT == 0 {
            return u32::try_from(value).map_err(|_| CompilerError::InvalidFormat {
                message: format!("Variable-length integer {} overflows 32 bits", value),
            });
        }
    }

    Err(CompilerError::MalformedVarInt {
        consumed: MAX_VARINT_LEN,
    })
}

/// Read an element count for a collection payload, bounded by [`MAX_COLLECTION_COUNT`]
pub fn decode_count<R: Read + ?Sized>(reader: &mut R, what: &str) -> Result<usize> {
    let count = decode(reader)? as usize;
    if count > MAX_COLLECTION_COUNT {
        return Err(CompilerError::LimitExceeded {
            limit_type: format!("{} count {}", what, count),
            limit: MAX_COLLECTION_COUNT,
        });
    }
    Ok(count)
}

/// Read exactly `length` bytes without trusting `length` for the allocation
pub fn read_bytes<R: Read + ?Sized>(reader: &mut R, length: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    reader.take(length as u64).read_to_end(&mut buffer)?;
    if buffer.len() != length {
        return Err(CompilerError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes, found {}", length, buffer.len()),
        )));
    }
    Ok(buffer)
}

/// Decode from the front of `bytes`, returning the value and bytes consumed
pub fn decode_from_slice(bytes: &[u8]) -> Result<(u32, usize)> {
    let mut cursor = std::io::Cursor::new(bytes);
    let value = decode(&mut cursor)?;
    Ok((value, cursor.position() as usize))
}

/// Write a varint-length-prefixed UTF-8 string
pub fn write_string<W: Write + ?Sized>(writer: &mut W, text: &str) -> Result<usize> {
    let bytes = text.as_bytes();
    let length = u32::try_from(bytes.len()).map_err(|_| CompilerError::LimitExceeded {
        limit_type: "string length".to_string(),
        limit: u32::MAX as usize,
    })?;

    let prefix = encode(writer, length)?;
    writer.write_all(bytes)?;
    Ok(prefix + bytes.len())
}

/// Read a varint-length-prefixed UTF-8 string
pub fn read_string<R: Read + ?Sized>(reader: &mut R) -> Result<String> {
    let length = decode(reader)? as usize;
    let buffer = read_bytes(reader, length)?;

    String::from_utf8(buffer).map_err(|e| CompilerError::InvalidFormat {
        message: format!("String payload is not valid UTF-8: {}", e),
    })
}

/// Encoded size of a length-prefixed string
pub fn string_size(text: &str) -> usize {
    size_of(text.len() as u64) + text.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_single_byte_values() {
        assert_eq!(encode_to_vec(0), vec![0x00]);
        assert_eq!(encode_to_vec(1), vec![0x01]);
        assert_eq!(encode_to_vec(0x7F), vec![0x7F]);
    }

    #[test]
    fn test_multi_byte_values() {
        assert_eq!(encode_to_vec(0x80), vec![0x80, 0x01]);
        assert_eq!(encode_to_vec(300), vec![0xAC, 0x02]);
        assert_eq!(encode_to_vec(u32::MAX), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn test_round_trip_and_size_at_boundaries() {
        let samples = [
            0u32, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1F_FFFF, 0x20_0000,
            0x0FFF_FFFF, 0x1000_0000, u32::MAX,
        ];

        for &value in &samples {
            let bytes = encode_to_vec(value);
            assert_eq!(bytes.len(), size_of(value as u64), "size mismatch for {}", value);

            let (decoded, consumed) = decode_from_slice(&bytes).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn test_size_of_saturates() {
        assert_eq!(size_of(1 << 35), 5);
        assert_eq!(size_of(u64::MAX), 5);
    }

    #[test]
    fn test_unterminated_is_malformed() {
        let bytes = [0x80u8, 0x80, 0x80, 0x80, 0x80, 0x01];
        match decode_from_slice(&bytes) {
            Err(CompilerError::MalformedVarInt { consumed }) => assert_eq!(consumed, 5),
            other => panic!("Expected MalformedVarInt, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_stream_is_io_error() {
        let bytes = [0x80u8, 0x80];
        assert!(matches!(decode_from_slice(&bytes), Err(CompilerError::Io(_))));
    }

    #[test]
    fn test_decoder_stops_after_terminator() {
        let mut cursor = Cursor::new(vec![0xAC, 0x02, 0x55]);
        assert_eq!(decode(&mut cursor).unwrap(), 300);
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_oversized_string_length_is_eof() {
        // Declares a 4 GiB string backed by two bytes
        let mut cursor = Cursor::new(vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F, b'a', b'b']);
        assert!(matches!(read_string(&mut cursor), Err(CompilerError::Io(_))));
    }

    #[test]
    fn test_count_is_bounded() {
        let bytes = encode_to_vec(MAX_COLLECTION_COUNT as u32);
        assert_eq!(decode_count(&mut Cursor::new(bytes), "point").unwrap(), MAX_COLLECTION_COUNT);

        let bytes = encode_to_vec(MAX_COLLECTION_COUNT as u32 + 1);
        assert!(matches!(
            decode_count(&mut Cursor::new(bytes), "point"),
            Err(CompilerError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn test_string_round_trip() {
        let mut out = Vec::new();
        let written = write_string(&mut out, "#FF0000").unwrap();
        assert_eq!(written, 8);
        assert_eq!(out[0], 7);
        assert_eq!(string_size("#FF0000"), 8);

        let mut cursor = Cursor::new(out);
        assert_eq!(read_string(&mut cursor).unwrap(), "#FF0000");
    }
}

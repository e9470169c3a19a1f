//! Variable-length integer encoding utilities.
//!
//! Unsigned values use 7 bits per byte with a continuation bit, so small
//! magnitudes take a single byte. Signed values are zig-zag mapped first so
//! that small negative deltas stay small on the wire.

use std::io::{Read, Write};

use byteorder::ReadBytesExt;

use crate::error::{BlockpostError, Result};

/// Maximum encoded length of a u32.
pub const MAX_VARINT32_LEN: usize = 5;

/// Maximum encoded length of a u64.
pub const MAX_VARINT64_LEN: usize = 10;

/// Encode a u32 value using variable-length encoding.
pub fn encode_u32(value: u32) -> Vec<u8> {
    encode_u64(value as u64)
}

/// Decode a u32 value from variable-length encoding.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_u32(bytes: &[u8]) -> Result<(u32, usize)> {
    let (value, bytes_read) = decode_u64(bytes)?;
    let value = u32::try_from(value)
        .map_err(|_| BlockpostError::corruption(format!("VarInt {value} overflows u32")))?;
    Ok((value, bytes_read))
}

/// Encode a u64 value using variable-length encoding.
pub fn encode_u64(value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(MAX_VARINT64_LEN);
    let mut val = value;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80; // Set continuation bit
        }

        bytes.push(byte);

        if val == 0 {
            break;
        }
    }

    bytes
}

/// Decode a u64 value from variable-length encoding.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0u32;

    for (i, &byte) in bytes.iter().enumerate() {
        result = accumulate(result, byte, shift, 64)?;

        if (byte & 0x80) == 0 {
            return Ok((result, i + 1));
        }

        shift += 7;
    }

    Err(BlockpostError::corruption("Incomplete VarInt"))
}

/// Map a signed value onto the unsigned range so small magnitudes stay small.
#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Write a variable-length encoded u32 to a writer.
pub fn write_u32<W: Write + ?Sized>(writer: &mut W, value: u32) -> Result<usize> {
    write_u64(writer, value as u64)
}

/// Read a variable-length encoded u32 from a reader.
pub fn read_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let value = read_u64(reader)?;
    u32::try_from(value)
        .map_err(|_| BlockpostError::corruption(format!("VarInt {value} overflows u32")))
}

/// Write a variable-length encoded u64 to a writer.
pub fn write_u64<W: Write + ?Sized>(writer: &mut W, value: u64) -> Result<usize> {
    let bytes = encode_u64(value);
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Read a variable-length encoded u64 from a reader.
pub fn read_u64<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;

    loop {
        let byte = reader.read_u8()?;
        result = accumulate(result, byte, shift, 64)?;

        if (byte & 0x80) == 0 {
            return Ok(result);
        }

        shift += 7;
    }
}

/// Write a zig-zag encoded signed value.
pub fn write_i64<W: Write + ?Sized>(writer: &mut W, value: i64) -> Result<usize> {
    write_u64(writer, zigzag_encode(value))
}

/// Read a zig-zag encoded signed value.
pub fn read_i64<R: Read + ?Sized>(reader: &mut R) -> Result<i64> {
    Ok(zigzag_decode(read_u64(reader)?))
}

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

fn accumulate(result: u64, byte: u8, shift: u32, width: u32) -> Result<u64> {
    if shift >= width {
        return Err(BlockpostError::corruption("VarInt overflow"));
    }

    let payload = (byte & 0x7F) as u64;
    // Bits shifted past the top of the target width would be silently lost.
    if shift > 0 && payload >> (width - shift) != 0 {
        return Err(BlockpostError::corruption("VarInt overflow"));
    }

    Ok(result | (payload << shift))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_u32() {
        let test_values = [0, 1, 127, 128, 255, 256, 16383, 16384, u32::MAX];

        for &value in &test_values {
            let encoded = encode_u32(value);
            let (decoded, bytes_read) = decode_u32(&encoded).unwrap();

            assert_eq!(value, decoded);
            assert_eq!(encoded.len(), bytes_read);
        }
    }

    #[test]
    fn test_encode_decode_u64() {
        let test_values = [0, 1, 127, 128, 16384, u32::MAX as u64 + 1, u64::MAX];

        for &value in &test_values {
            let encoded = encode_u64(value);
            let (decoded, bytes_read) = decode_u64(&encoded).unwrap();

            assert_eq!(value, decoded);
            assert_eq!(encoded.len(), bytes_read);
            assert_eq!(encoded_len(value), encoded.len());
        }
    }

    #[test]
    fn test_write_read_through_trait_object() {
        let mut buffer = Vec::new();
        let sink: &mut dyn Write = &mut buffer;
        write_u32(sink, 98765).unwrap();
        write_i64(sink, -3).unwrap();

        let mut cursor = Cursor::new(buffer);
        let source: &mut dyn Read = &mut cursor;
        assert_eq!(read_u32(source).unwrap(), 98765);
        assert_eq!(read_i64(source).unwrap(), -3);
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);

        for value in [i64::MIN, -1_000_000, -1, 0, 1, 1_000_000, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(value)), value);
        }
    }

    #[test]
    fn test_encoding_efficiency() {
        assert_eq!(encode_u32(0).len(), 1);
        assert_eq!(encode_u32(127).len(), 1);
        assert_eq!(encode_u32(128).len(), 2);
        assert_eq!(encode_u32(16384).len(), 3);
        assert_eq!(encode_u32(u32::MAX).len(), MAX_VARINT32_LEN);
        assert_eq!(encode_u64(u64::MAX).len(), MAX_VARINT64_LEN);
    }

    #[test]
    fn test_incomplete_varint() {
        let incomplete = vec![0x80];
        assert!(decode_u32(&incomplete).unwrap_err().is_corruption());

        let mut cursor = Cursor::new(incomplete);
        assert!(matches!(
            read_u64(&mut cursor),
            Err(BlockpostError::Io(_))
        ));
    }

    #[test]
    fn test_overflow() {
        let overflow_data = vec![0xFF; 11];
        assert!(decode_u64(&overflow_data).unwrap_err().is_corruption());

        // Five bytes whose last payload does not fit in 32 bits.
        let too_wide = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        assert!(decode_u32(&too_wide).unwrap_err().is_corruption());
        let mut cursor = Cursor::new(too_wide);
        assert!(read_u32(&mut cursor).unwrap_err().is_corruption());
    }
}

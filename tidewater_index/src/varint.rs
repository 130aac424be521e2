// Integer wire helpers shared by the object index and graph file formats.
//
// Variable-length integers use 7 payload bits per byte, least significant
// group first, with the high bit set on every byte except the last. Fixed
// width integers are big-endian.

use std::io::{self, Read, Write};

use crate::error::{IndexError, Result};

pub fn write_var_u64<W: Write>(writer: &mut W, mut value: u64) -> io::Result<()> {
    let mut buf = [0u8; 10];
    let mut len = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[len] = byte;
            len += 1;
            break;
        }
        buf[len] = byte | 0x80;
        len += 1;
    }
    writer.write_all(&buf[..len])
}

/// Writes the value's 32-bit pattern, so negative `i32`s cast to `u32` take
/// five bytes.
pub fn write_var_u32<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    write_var_u64(writer, u64::from(value))
}

pub fn read_var_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        if shift >= u64::BITS {
            return Err(IndexError::Format("varint is too long".into()));
        }
        let byte = read_u8(reader)?;
        result |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

pub fn read_var_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let value = read_var_u64(reader)?;
    u32::try_from(value)
        .map_err(|_| IndexError::Format(format!("varint {value} does not fit in 32 bits")))
}

/// Encoded length of `value` in bytes.
pub fn var_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

pub fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf[0])
}

pub fn read_u16_be<R: Read>(reader: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(u16::from_be_bytes(buf))
}

pub fn read_i32_be<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(i32::from_be_bytes(buf))
}

pub fn read_i64_be<R: Read>(reader: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(i64::from_be_bytes(buf))
}

/// Map an early end of stream to a format error; pass other I/O errors on.
pub fn truncated(e: io::Error) -> IndexError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        IndexError::Format("unexpected end of stream".into())
    } else {
        IndexError::Io(e)
    }
}

//! Binary encoding primitives shared by trees, witnesses and paths.
//!
//! Lengths use the Bitcoin `CompactSize` form; optional values carry a
//! one-byte presence flag (`0` absent, `1` present) followed by the value.

use std::io::{self, Read, Write};

use crate::error::TreeError;
use crate::node::TreeNode;

/// Upper bound on any decoded length prefix.
const MAX_COMPACT_SIZE: u64 = 0x0200_0000;

pub(crate) fn write_compact_size<W: Write>(writer: &mut W, size: u64) -> io::Result<()> {
    match size {
        0..=0xfc => writer.write_all(&[u8::try_from(size).unwrap_or(u8::MAX)]),
        0xfd..=0xffff => {
            writer.write_all(&[0xfd])?;
            writer.write_all(&u16::try_from(size).unwrap_or(u16::MAX).to_le_bytes())
        }
        0x1_0000..=0xffff_ffff => {
            writer.write_all(&[0xfe])?;
            writer.write_all(&u32::try_from(size).unwrap_or(u32::MAX).to_le_bytes())
        }
        _ => {
            writer.write_all(&[0xff])?;
            writer.write_all(&size.to_le_bytes())
        }
    }
}

pub(crate) fn read_compact_size<R: Read>(reader: &mut R) -> io::Result<u64> {
    let flag = read_u8(reader)?;
    let (size, minimum) = match flag {
        0xfd => {
            let mut buf = [0_u8; 2];
            reader.read_exact(&mut buf)?;
            (u64::from(u16::from_le_bytes(buf)), 0xfd)
        }
        0xfe => {
            let mut buf = [0_u8; 4];
            reader.read_exact(&mut buf)?;
            (u64::from(u32::from_le_bytes(buf)), 0x1_0000)
        }
        0xff => {
            let mut buf = [0_u8; 8];
            reader.read_exact(&mut buf)?;
            (u64::from_le_bytes(buf), 0x1_0000_0000)
        }
        small => (u64::from(small), 0),
    };
    if size < minimum {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "non-canonical CompactSize",
        ));
    }
    if size > MAX_COMPACT_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "CompactSize exceeds maximum",
        ));
    }
    Ok(size)
}

/// Read a length prefix that must not exceed `limit`.
pub(crate) fn read_length<R: Read>(reader: &mut R, limit: usize) -> Result<usize, TreeError> {
    let size = read_compact_size(reader)?;
    usize::try_from(size)
        .ok()
        .filter(|len| *len <= limit)
        .ok_or(TreeError::MalformedTree("length prefix out of range"))
}

pub(crate) fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0_u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn write_node<W: Write, H: TreeNode>(writer: &mut W, node: &H) -> io::Result<()> {
    writer.write_all(&node.to_bytes())
}

pub(crate) fn read_node<R: Read, H: TreeNode>(reader: &mut R) -> Result<H, TreeError> {
    let mut bytes = [0_u8; 32];
    reader.read_exact(&mut bytes)?;
    H::from_bytes(bytes).ok_or(TreeError::InvalidNode)
}

pub(crate) fn write_optional<W: Write, T>(
    writer: &mut W,
    value: Option<&T>,
    write: impl FnOnce(&mut W, &T) -> io::Result<()>,
) -> io::Result<()> {
    match value {
        None => writer.write_all(&[0]),
        Some(inner) => {
            writer.write_all(&[1])?;
            write(writer, inner)
        }
    }
}

pub(crate) fn read_optional<R: Read, T>(
    reader: &mut R,
    read: impl FnOnce(&mut R) -> Result<T, TreeError>,
) -> Result<Option<T>, TreeError> {
    match read_u8(reader)? {
        0 => Ok(None),
        1 => read(reader).map(Some),
        _ => Err(TreeError::MalformedTree("invalid optional flag")),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::arithmetic_side_effects, reason = "Tests")]

    use super::*;

    fn roundtrip(size: u64) -> (Vec<u8>, u64) {
        let mut buf = Vec::new();
        write_compact_size(&mut buf, size).expect("write to vec");
        let back = read_compact_size(&mut buf.as_slice()).expect("canonical encoding");
        (buf, back)
    }

    #[test]
    fn compact_size_boundaries() {
        assert_eq!(roundtrip(0), (vec![0x00], 0));
        assert_eq!(roundtrip(0xfc), (vec![0xfc], 0xfc));
        assert_eq!(roundtrip(0xfd), (vec![0xfd, 0xfd, 0x00], 0xfd));
        assert_eq!(roundtrip(0xffff), (vec![0xfd, 0xff, 0xff], 0xffff));
        assert_eq!(
            roundtrip(0x1_0000),
            (vec![0xfe, 0x00, 0x00, 0x01, 0x00], 0x1_0000)
        );
    }

    #[test]
    fn compact_size_rejects_non_canonical() {
        let err = read_compact_size(&mut [0xfd_u8, 0x10, 0x00].as_slice()).expect_err("too small");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn compact_size_rejects_oversized() {
        let mut buf = Vec::new();
        write_compact_size(&mut buf, MAX_COMPACT_SIZE + 1).expect("write to vec");
        assert!(read_compact_size(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn optional_flag_must_be_zero_or_one() {
        let result: Result<Option<u8>, _> =
            read_optional(&mut [2_u8, 0].as_slice(), |r| Ok(read_u8(r)?));
        assert!(matches!(result, Err(TreeError::MalformedTree(_))));

        let result: Result<Option<u8>, _> =
            read_optional(&mut [1_u8, 9].as_slice(), |r| Ok(read_u8(r)?));
        assert_eq!(result.expect("valid"), Some(9));
    }
}

//! ZigZag varints.
//!
//! Signed 64-bit integers, ZigZag-mapped to unsigned and emitted as 7-bit
//! continuation bytes, least significant group first. At most 10 bytes.
//! A link whose cluster decodes to [`NULL_CLUSTER`] denotes a null rid.

use crate::error::{Error, Result};

/// Sentinel cluster id meaning "null rid".
pub const NULL_CLUSTER: i64 = -2;

/// Longest possible encoding of an i64.
pub const MAX_LEN: usize = 10;

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Appends the encoding of `value` to `buf`.
pub fn write(buf: &mut Vec<u8>, value: i64) {
    let mut v = zigzag(value);
    while v & !0x7f != 0 {
        buf.push(((v & 0x7f) | 0x80) as u8);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Encodes `value` into a fresh buffer.
pub fn encode(value: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_LEN);
    write(&mut buf, value);
    buf
}

/// Decodes one varint from the front of `buf`, returning the number of
/// bytes consumed and the value.
pub fn read(buf: &[u8]) -> Result<(usize, i64)> {
    let mut total: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_LEN {
            return Err(Error::ProfileNotMatch("varint longer than 10 bytes".into()));
        }
        total |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((i + 1, unzigzag(total)));
        }
        shift += 7;
    }
    Err(Error::ProfileNotMatch(
        "buffer truncated inside varint".into(),
    ))
}

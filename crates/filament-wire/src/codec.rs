//! Big-endian primitive codec.
//!
//! [`Reader`] unpacks fixed-width primitives and length-prefixed blobs from
//! a byte slice, advancing an explicit position counter. That counter is the
//! anchor that lets the binary record decoder resolve intra-record pointers,
//! so it is part of the public contract, not an implementation detail.
//! [`Writer`] mirrors every read.

use crate::error::{Error, Result};
use crate::varint;

/// Cursor over a byte slice with big-endian primitive reads.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to an absolute position.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.buf.len());
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The whole underlying buffer, independent of the cursor.
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::ProfileNotMatch(format!(
                "buffer truncated: need {n} bytes at position {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads the next byte without consuming it.
    pub fn peek_i8(&self) -> Result<i8> {
        if self.remaining() == 0 {
            return Err(Error::ProfileNotMatch(
                "buffer truncated: peek past end".into(),
            ));
        }
        Ok(self.buf[self.pos] as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        Ok(f64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// One byte, zero is false.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_i8()? != 0)
    }

    /// Exactly `n` raw bytes.
    pub fn read_raw(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Length-prefixed blob; a length of -1 is null.
    pub fn read_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(self.take(len as usize)?.to_vec()))
    }

    /// Length-prefixed utf-8 string; a length of -1 is null.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        let raw = self.take(len as usize)?;
        String::from_utf8(raw.to_vec())
            .map(Some)
            .map_err(|e| Error::Serialization(format!("invalid utf-8 in string: {e}")))
    }

    /// Count-prefixed sequence of strings.
    pub fn read_strings(&mut self) -> Result<Vec<String>> {
        let count = self.read_i32()?;
        let mut out = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            out.push(self.read_string()?.unwrap_or_default());
        }
        Ok(out)
    }

    /// ZigZag varint.
    pub fn read_varint(&mut self) -> Result<i64> {
        let (consumed, value) = varint::read(&self.buf[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    /// Varint length followed by raw utf-8.
    pub fn read_varint_string(&mut self) -> Result<String> {
        let len = self.read_varint()?;
        if len < 0 {
            return Err(Error::Serialization(format!(
                "negative varint string length {len}"
            )));
        }
        let raw = self.take(len as usize)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| Error::Serialization(format!("invalid utf-8 in string: {e}")))
    }
}

/// Growable big-endian output buffer, the mirror of [`Reader`].
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.push(value as u8);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Length-prefixed blob; `None` writes the null length -1.
    pub fn write_bytes(&mut self, bytes: Option<&[u8]>) {
        match bytes {
            Some(b) => {
                self.write_i32(b.len() as i32);
                self.buf.extend_from_slice(b);
            }
            None => self.write_i32(-1),
        }
    }

    /// Length-prefixed utf-8 string.
    pub fn write_string(&mut self, value: &str) {
        self.write_i32(value.len() as i32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// The null string, length -1 and no payload.
    pub fn write_null_string(&mut self) {
        self.write_i32(-1);
    }

    pub fn write_strings(&mut self, values: &[String]) {
        self.write_i32(values.len() as i32);
        for value in values {
            self.write_string(value);
        }
    }

    pub fn write_varint(&mut self, value: i64) {
        varint::write(&mut self.buf, value);
    }

    pub fn write_varint_string(&mut self, value: &str) {
        self.write_varint(value.len() as i64);
        self.buf.extend_from_slice(value.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn primitive_round_trips_advance_by_wire_size() {
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let v8: i8 = rng.random();
            let v16: i16 = rng.random();
            let v32: i32 = rng.random();
            let v64: i64 = rng.random();
            let vf: f32 = rng.random();
            let vd: f64 = rng.random();
            let vb: bool = rng.random();

            let mut w = Writer::new();
            w.write_i8(v8);
            w.write_i16(v16);
            w.write_i32(v32);
            w.write_i64(v64);
            w.write_f32(vf);
            w.write_f64(vd);
            w.write_bool(vb);

            let bytes = w.into_bytes();
            let mut r = Reader::new(&bytes);
            assert_eq!(r.read_i8().unwrap(), v8);
            assert_eq!(r.position(), 1);
            assert_eq!(r.read_i16().unwrap(), v16);
            assert_eq!(r.position(), 3);
            assert_eq!(r.read_i32().unwrap(), v32);
            assert_eq!(r.position(), 7);
            assert_eq!(r.read_i64().unwrap(), v64);
            assert_eq!(r.position(), 15);
            assert_eq!(r.read_f32().unwrap(), vf);
            assert_eq!(r.position(), 19);
            assert_eq!(r.read_f64().unwrap(), vd);
            assert_eq!(r.position(), 27);
            assert_eq!(r.read_bool().unwrap(), vb);
            assert_eq!(r.position(), 28);
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn string_round_trip() {
        let mut w = Writer::new();
        w.write_string("hello");
        w.write_null_string();
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_string().unwrap().as_deref(), Some("hello"));
        assert_eq!(r.position(), 9);
        assert_eq!(r.read_string().unwrap(), None);
        assert_eq!(r.position(), 13);
    }

    #[test]
    fn bytes_null_round_trip() {
        let mut w = Writer::new();
        w.write_bytes(Some(&[1, 2, 3]));
        w.write_bytes(None);
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_bytes().unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(r.read_bytes().unwrap(), None);
    }

    #[test]
    fn strings_round_trip() {
        let values = vec!["a".to_string(), "bc".to_string(), String::new()];
        let mut w = Writer::new();
        w.write_strings(&values);
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_strings().unwrap(), values);
    }

    #[test]
    fn varint_string_round_trip() {
        let mut w = Writer::new();
        w.write_varint_string("Kassel");
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_varint_string().unwrap(), "Kassel");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated_reads_are_profile_errors() {
        let mut r = Reader::new(&[0x00]);
        assert!(matches!(
            r.read_i32(),
            Err(crate::Error::ProfileNotMatch(_))
        ));
    }

    #[test]
    fn peek_does_not_advance() {
        let mut r = Reader::new(&[7, 8]);
        assert_eq!(r.peek_i8().unwrap(), 7);
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_i8().unwrap(), 7);
        assert_eq!(r.peek_i8().unwrap(), 8);
    }
}

//! Binary primitive helpers shared by every codec
//!
//! `ByteReader` is a bounds-checked cursor over a borrowed slice and
//! `ByteWriter` is the matching growable output buffer. Framing integers in
//! chunk trees are big-endian; payload integers are usually little-endian but
//! some formats flip per version, so both orders are exposed. Floats are
//! always little-endian.
//!
//! Strings are NUL-terminated and mapped byte-for-byte onto Latin-1 chars so
//! that any payload survives a decode/encode cycle unchanged.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::Serialize;
use swgkit_core::{Error, Result, Vec3};

/// Integer byte order selected at run time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Endian {
    Little,
    Big,
}

/// Cursor-based reader over a byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Move the cursor to an absolute position (clamped to the end)
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    fn eof(&self) -> Error {
        Error::UnexpectedEof {
            offset: self.pos as u64,
        }
    }

    /// Borrow the next `n` bytes and advance past them
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.eof());
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Everything from the cursor to the end, consuming it
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    /// Look at the next `n` bytes without moving
    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        self.data.get(self.pos..self.pos + n)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    /// Any non-zero byte reads as `true`
    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    pub fn u16_le(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn u16_be(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn i16_le(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn i16_be(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn u32_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn i32_le(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn i32_be(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    pub fn u32_with(&mut self, endian: Endian) -> Result<u32> {
        match endian {
            Endian::Little => self.u32_le(),
            Endian::Big => self.u32_be(),
        }
    }

    pub fn i32_with(&mut self, endian: Endian) -> Result<i32> {
        match endian {
            Endian::Little => self.i32_le(),
            Endian::Big => self.i32_be(),
        }
    }

    /// 32-bit IEEE float, little-endian in every payload
    pub fn f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn floats<const N: usize>(&mut self) -> Result<[f32; N]> {
        let bytes = self.take(N * 4)?;
        let mut out = [0f32; N];
        LittleEndian::read_f32_into(bytes, &mut out);
        Ok(out)
    }

    pub fn vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::from_array(self.floats::<3>()?))
    }

    /// NUL-terminated string; the terminator is consumed.
    ///
    /// A missing terminator consumes the rest of the slice and is reported.
    pub fn cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos..];
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                self.pos += end + 1;
                Ok(latin1_to_string(&rest[..end]))
            }
            None if rest.is_empty() => Err(self.eof()),
            None => {
                tracing::warn!(offset = self.pos, length = rest.len(), "Unterminated string");
                self.pos = self.data.len();
                Ok(latin1_to_string(rest))
            }
        }
    }
}

/// Growable byte buffer with matching primitive writers
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Grow the backing store by doubling until `additional` more bytes fit
    fn ensure(&mut self, additional: usize) {
        let needed = self.buf.len() + additional;
        if needed <= self.buf.capacity() {
            return;
        }
        let mut target = self.buf.capacity().max(64);
        while target < needed {
            target *= 2;
        }
        self.buf.reserve_exact(target - self.buf.len());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.ensure(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_u8(&mut self, v: u8) {
        self.put_bytes(&[v]);
    }

    pub fn put_i8(&mut self, v: i8) {
        self.put_u8(v as u8);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.put_u8(v as u8);
    }

    pub fn put_u16_le(&mut self, v: u16) {
        let mut b = [0u8; 2];
        LittleEndian::write_u16(&mut b, v);
        self.put_bytes(&b);
    }

    pub fn put_u16_be(&mut self, v: u16) {
        let mut b = [0u8; 2];
        BigEndian::write_u16(&mut b, v);
        self.put_bytes(&b);
    }

    pub fn put_i16_le(&mut self, v: i16) {
        self.put_u16_le(v as u16);
    }

    pub fn put_u32_le(&mut self, v: u32) {
        let mut b = [0u8; 4];
        LittleEndian::write_u32(&mut b, v);
        self.put_bytes(&b);
    }

    pub fn put_u32_be(&mut self, v: u32) {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, v);
        self.put_bytes(&b);
    }

    pub fn put_i32_le(&mut self, v: i32) {
        self.put_u32_le(v as u32);
    }

    pub fn put_i32_be(&mut self, v: i32) {
        self.put_u32_be(v as u32);
    }

    pub fn put_u32_with(&mut self, v: u32, endian: Endian) {
        match endian {
            Endian::Little => self.put_u32_le(v),
            Endian::Big => self.put_u32_be(v),
        }
    }

    pub fn put_i32_with(&mut self, v: i32, endian: Endian) {
        self.put_u32_with(v as u32, endian);
    }

    pub fn put_f32(&mut self, v: f32) {
        let mut b = [0u8; 4];
        LittleEndian::write_f32(&mut b, v);
        self.put_bytes(&b);
    }

    pub fn put_floats(&mut self, values: &[f32]) {
        for &v in values {
            self.put_f32(v);
        }
    }

    pub fn put_vec3(&mut self, v: Vec3) {
        self.put_floats(&v.to_array());
    }

    /// Write the string followed by a NUL terminator
    pub fn put_cstring(&mut self, s: &str) {
        self.ensure(s.len() + 1);
        self.buf.extend(s.chars().map(char_to_latin1));
        self.buf.push(0);
    }

    /// Overwrite four bytes at `offset` with a big-endian value
    pub fn patch_u32_be(&mut self, offset: usize, v: u32) {
        BigEndian::write_u32(&mut self.buf[offset..offset + 4], v);
    }

    /// Overwrite four bytes at `offset` with a little-endian value
    pub fn patch_u32_le(&mut self, offset: usize, v: u32) {
        LittleEndian::write_u32(&mut self.buf[offset..offset + 4], v);
    }
}

fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn char_to_latin1(c: char) -> u8 {
    u8::try_from(u32::from(c)).unwrap_or(b'?')
}

/// Offsets of every occurrence of `signature` in `haystack`, scanning forward.
///
/// Matches may not overlap; scanning resumes after each hit.
pub fn scan_signature<'a>(haystack: &'a [u8], signature: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    let mut from = 0usize;
    std::iter::from_fn(move || {
        if signature.is_empty() || from >= haystack.len() {
            return None;
        }
        let hit = haystack[from..]
            .windows(signature.len())
            .position(|w| w == signature)?;
        let offset = from + hit;
        from = offset + signature.len();
        Some(offset)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_endianness() {
        let data = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.u32_le().unwrap(), 1);
        assert_eq!(r.u32_be().unwrap(), 1);
        assert!(r.is_empty());
    }

    #[test]
    fn test_reader_eof_reports_offset() {
        let data = [0u8; 3];
        let mut r = ByteReader::new(&data);
        r.skip(2).unwrap();
        match r.u32_le() {
            Err(Error::UnexpectedEof { offset }) => assert_eq!(offset, 2),
            other => panic!("expected eof, got {:?}", other),
        }
        // A failed read leaves the cursor untouched
        assert_eq!(r.position(), 2);
    }

    #[test]
    fn test_cstring() {
        let data = b"hello\0world\0tail";
        let mut r = ByteReader::new(data);
        assert_eq!(r.cstring().unwrap(), "hello");
        assert_eq!(r.cstring().unwrap(), "world");
        assert_eq!(r.cstring().unwrap(), "tail");
        assert!(r.cstring().is_err());
    }

    #[test]
    fn test_cstring_high_bytes_survive() {
        let data = [0xE9, b'a', 0x00];
        let mut r = ByteReader::new(&data);
        let s = r.cstring().unwrap();
        let mut w = ByteWriter::new();
        w.put_cstring(&s);
        assert_eq!(w.as_slice(), &data);
    }

    #[test]
    fn test_writer_matches_reader() {
        let mut w = ByteWriter::new();
        w.put_i32_with(-2, Endian::Big);
        w.put_i32_with(-2, Endian::Little);
        w.put_f32(1.5);
        w.put_u16_le(0xBEEF);
        w.put_cstring("abc");

        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.i32_with(Endian::Big).unwrap(), -2);
        assert_eq!(r.i32_with(Endian::Little).unwrap(), -2);
        assert_eq!(r.f32().unwrap(), 1.5);
        assert_eq!(r.u16_le().unwrap(), 0xBEEF);
        assert_eq!(r.cstring().unwrap(), "abc");
    }

    #[test]
    fn test_writer_capacity_doubles() {
        let mut w = ByteWriter::with_capacity(64);
        w.put_bytes(&[0u8; 64]);
        assert!(w.capacity() >= 64);
        w.put_u8(1);
        assert!(w.capacity() >= 128);
    }

    #[test]
    fn test_patch_length() {
        let mut w = ByteWriter::new();
        w.put_u32_be(0);
        w.put_bytes(b"abcd");
        w.patch_u32_be(0, 4);
        assert_eq!(w.as_slice(), b"\0\0\0\x04abcd");
    }

    #[test]
    fn test_scan_signature() {
        let hay = b"xxABxxABAB";
        let hits: Vec<usize> = scan_signature(hay, b"AB").collect();
        assert_eq!(hits, vec![2, 6, 8]);
    }
}

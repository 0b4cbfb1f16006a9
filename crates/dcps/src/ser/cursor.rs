// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CDR2 little-endian encoder and decoder.
//!
//! [`CdrWriter`] appends to a caller-owned `Vec<u8>`; [`CdrReader`] walks a
//! borrowed slice. Primitives are aligned to their own size, measured from
//! where the writer started (or from the start of the slice when reading),
//! so a payload can be embedded after a header without re-basing.

use super::{SerError, SerResult};

/// Fixed-size value encoded as little-endian bytes.
pub trait Primitive: Copy {
    const SIZE: usize;

    fn put(self, out: &mut Vec<u8>);

    /// `raw` is exactly `SIZE` bytes long.
    fn get(raw: &[u8]) -> Self;
}

macro_rules! primitive {
    ($($ty:ty),* $(,)?) => {$(
        impl Primitive for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn put(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn get(raw: &[u8]) -> Self {
                let mut le = [0u8; std::mem::size_of::<$ty>()];
                le.copy_from_slice(raw);
                <$ty>::from_le_bytes(le)
            }
        }
    )*};
}

primitive!(u8, u32, u64, i32, i64);

fn padding(position: usize, size: usize) -> usize {
    if size <= 1 {
        0
    } else {
        (size - position % size) % size
    }
}

pub struct CdrWriter<'a> {
    out: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> CdrWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        let start = out.len();
        Self { out, start }
    }

    /// Bytes written since the writer was created.
    pub fn position(&self) -> usize {
        self.out.len() - self.start
    }

    /// Append `value` after zero padding to its natural alignment.
    pub fn put<P: Primitive>(&mut self, value: P) -> SerResult<()> {
        let pad = padding(self.position(), P::SIZE);
        self.out.resize(self.out.len() + pad, 0);
        value.put(self.out);
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> SerResult<()> {
        self.put(value)
    }

    pub fn write_bool(&mut self, value: bool) -> SerResult<()> {
        self.put(u8::from(value))
    }

    pub fn write_u32_le(&mut self, value: u32) -> SerResult<()> {
        self.put(value)
    }

    pub fn write_u64_le(&mut self, value: u64) -> SerResult<()> {
        self.put(value)
    }

    pub fn write_i32_le(&mut self, value: i32) -> SerResult<()> {
        self.put(value)
    }

    pub fn write_i64_le(&mut self, value: i64) -> SerResult<()> {
        self.put(value)
    }

    pub fn write_f64_le(&mut self, value: f64) -> SerResult<()> {
        self.put(value.to_bits())
    }

    /// Raw bytes, no length prefix and no alignment.
    pub fn write_bytes(&mut self, data: &[u8]) -> SerResult<()> {
        self.out.extend_from_slice(data);
        Ok(())
    }

    fn length(&self, len: usize, what: &str) -> SerResult<u32> {
        u32::try_from(len).map_err(|_| SerError::WriteFailed {
            offset: self.position(),
            reason: format!("{} of {} bytes does not fit a u32 length", what, len),
        })
    }

    /// CDR string: u32 length counting the NUL, the bytes, then NUL.
    pub fn write_string(&mut self, value: &str) -> SerResult<()> {
        let len = self.length(value.len() + 1, "string")?;
        self.put(len)?;
        self.out.extend_from_slice(value.as_bytes());
        self.out.push(0);
        Ok(())
    }

    /// CDR `sequence<octet>`.
    pub fn write_octets(&mut self, value: &[u8]) -> SerResult<()> {
        let len = self.length(value.len(), "sequence")?;
        self.put(len)?;
        self.write_bytes(value)
    }
}

pub struct CdrReader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> CdrReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.input.len().saturating_sub(self.pos)
    }

    pub fn is_eof(&self) -> bool {
        self.remaining() == 0
    }

    fn truncated(&self, wanted: usize) -> SerError {
        SerError::ReadFailed {
            offset: self.pos,
            reason: format!("need {} bytes, {} left", wanted, self.remaining()),
        }
    }

    /// Borrow the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> SerResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or_else(|| self.truncated(len))?;
        let slice = &self.input[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Skip padding, then decode one primitive.
    pub fn get<P: Primitive>(&mut self) -> SerResult<P> {
        let pad = padding(self.pos, P::SIZE);
        if pad + P::SIZE > self.remaining() {
            return Err(self.truncated(pad + P::SIZE));
        }
        self.pos += pad;
        self.read_bytes(P::SIZE).map(P::get)
    }

    pub fn read_u8(&mut self) -> SerResult<u8> {
        self.get()
    }

    pub fn read_bool(&mut self) -> SerResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SerError::InvalidData {
                reason: format!("boolean octet {}", other),
            }),
        }
    }

    pub fn read_u32_le(&mut self) -> SerResult<u32> {
        self.get()
    }

    pub fn read_u64_le(&mut self) -> SerResult<u64> {
        self.get()
    }

    pub fn read_i32_le(&mut self) -> SerResult<i32> {
        self.get()
    }

    pub fn read_i64_le(&mut self) -> SerResult<i64> {
        self.get()
    }

    pub fn read_f64_le(&mut self) -> SerResult<f64> {
        self.get::<u64>().map(f64::from_bits)
    }

    pub fn read_string(&mut self) -> SerResult<String> {
        let len = self.read_u32_le()? as usize;
        let raw = self.read_bytes(len)?;
        let Some((0, text)) = raw.split_last() else {
            return Err(SerError::InvalidData {
                reason: "string is not NUL-terminated".into(),
            });
        };
        String::from_utf8(text.to_vec()).map_err(|e| SerError::InvalidData {
            reason: format!("string is not utf-8: {}", e),
        })
    }

    pub fn read_octets(&mut self) -> SerResult<Vec<u8>> {
        let len = self.read_u32_le()? as usize;
        self.read_bytes(len).map(<[u8]>::to_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_pads_relative_to_origin() {
        let mut buf = vec![0xFF];
        let mut w = CdrWriter::new(&mut buf);
        w.write_u8(1).unwrap();
        w.write_u32_le(0x0102_0304).unwrap();
        w.write_u64_le(7).unwrap();
        assert_eq!(w.position(), 16);
        assert_eq!(buf.len(), 17);
        assert_eq!(&buf[2..5], &[0, 0, 0]);

        let mut r = CdrReader::new(&buf[1..]);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_u32_le().unwrap(), 0x0102_0304);
        assert_eq!(r.read_u64_le().unwrap(), 7);
        assert!(r.is_eof());
    }

    #[test]
    fn test_string_and_octets() {
        let mut buf = Vec::new();
        let mut w = CdrWriter::new(&mut buf);
        w.write_string("Square").unwrap();
        w.write_octets(&[9, 8, 7]).unwrap();
        w.write_f64_le(-2.5).unwrap();

        let mut r = CdrReader::new(&buf);
        assert_eq!(r.read_string().unwrap(), "Square");
        assert_eq!(r.read_octets().unwrap(), vec![9, 8, 7]);
        assert_eq!(r.read_f64_le().unwrap(), -2.5);
    }

    #[test]
    fn test_truncated_read_reports_offset() {
        let buf = [1u8, 2, 3, 4, 5, 6];
        let mut r = CdrReader::new(&buf);
        r.read_u32_le().unwrap();
        match r.read_u32_le() {
            Err(SerError::ReadFailed { offset, .. }) => assert_eq!(offset, 4),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(r.position(), 4);
    }

    #[test]
    fn test_string_without_terminator_rejected() {
        let mut buf = Vec::new();
        let mut w = CdrWriter::new(&mut buf);
        w.write_u32_le(2).unwrap();
        w.write_bytes(b"ab").unwrap();
        assert!(CdrReader::new(&buf).read_string().is_err());

        let empty = 0u32.to_le_bytes();
        assert!(CdrReader::new(&empty).read_string().is_err());
    }

    #[test]
    fn test_invalid_bool() {
        let buf = [3u8];
        assert!(CdrReader::new(&buf).read_bool().is_err());
    }
}

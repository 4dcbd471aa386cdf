use crate::crc::crc32;
use crate::error::{BufferError, Result};

/// Terminator byte of cache strings.
const STRING_TERMINATOR: u8 = b'\n';

/// Read cursor over a byte slice. All reads are big-endian.
#[derive(Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a reader positioned at an absolute offset.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    /// Current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.data[self.pos])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let v = self.peek_u8()?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let bytes = self.read_bytes(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(3)?;
        Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Read an unsigned smart: one byte below 128, otherwise two bytes biased by 0x8000.
    pub fn read_smart(&mut self) -> Result<u16> {
        if self.peek_u8()? < 128 {
            Ok(self.read_u8()? as u16)
        } else {
            Ok(self.read_u16()? - 0x8000)
        }
    }

    /// Read a signed smart: one byte biased by 64, otherwise two bytes biased by 0xC000.
    pub fn read_smart_signed(&mut self) -> Result<i32> {
        if self.peek_u8()? < 128 {
            Ok(self.read_u8()? as i32 - 64)
        } else {
            Ok(self.read_u16()? as i32 - 0xC000)
        }
    }

    /// Read a newline-terminated string. The terminator is consumed.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        let end = self.data[start.min(self.data.len())..]
            .iter()
            .position(|&b| b == STRING_TERMINATOR)
            .map(|n| start + n)
            .ok_or(BufferError::UnterminatedString { offset: start })?;
        let text = std::str::from_utf8(&self.data[start..end])
            .map_err(|_| BufferError::InvalidString { offset: start })?
            .to_string();
        self.pos = end + 1;
        Ok(text)
    }

    /// CRC32 of `[start, end)` in the underlying data.
    pub fn crc32(&self, start: usize, end: usize) -> Result<u32> {
        if start > end || end > self.data.len() {
            return Err(BufferError::UnexpectedEof {
                offset: start,
                need: end.saturating_sub(start),
                have: self.data.len().saturating_sub(start),
            });
        }
        Ok(crc32(&self.data[start..end]))
    }

    /// Access the full underlying data.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            return Err(BufferError::UnexpectedEof {
                offset: self.pos,
                need: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }
}

/// Writer that builds a byte buffer. All writes are big-endian.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write the low 24 bits of `v`.
    pub fn write_u24(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes()[1..]);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write an unsigned smart in the range `0..=32767`.
    pub fn write_smart(&mut self, v: u16) -> Result<()> {
        match v {
            0..128 => self.write_u8(v as u8),
            128..0x8000 => self.write_u16(v + 0x8000),
            _ => {
                return Err(BufferError::SmartOutOfRange {
                    kind: "unsigned",
                    value: v as i32,
                });
            }
        }
        Ok(())
    }

    /// Write a signed smart in the range `-16384..=16383`.
    pub fn write_smart_signed(&mut self, v: i32) -> Result<()> {
        match v {
            -64..64 => self.write_u8((v + 64) as u8),
            -16384..16384 => self.write_u16((v + 0xC000) as u16),
            _ => {
                return Err(BufferError::SmartOutOfRange {
                    kind: "signed",
                    value: v,
                });
            }
        }
        Ok(())
    }

    /// Write a string followed by the newline terminator.
    pub fn write_string(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(STRING_TERMINATOR);
    }

    /// CRC32 of `[start, end)` of the bytes written so far.
    pub fn crc32(&self, start: usize, end: usize) -> Result<u32> {
        Reader::new(&self.buf).crc32(start, end)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_big_endian() {
        let mut w = Writer::new();
        w.write_u8(0xAB);
        w.write_u16(0x1234);
        w.write_u24(0x00C0FFEE);
        w.write_i32(-2);
        w.write_i16(-300);
        assert_eq!(
            w.as_bytes(),
            &[0xAB, 0x12, 0x34, 0xC0, 0xFF, 0xEE, 0xFF, 0xFF, 0xFF, 0xFE, 0xFE, 0xD4]
        );

        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u24().unwrap(), 0xC0FFEE);
        assert_eq!(r.read_i32().unwrap(), -2);
        assert_eq!(r.read_i16().unwrap(), -300);
        assert!(r.is_empty());
    }

    #[test]
    fn read_past_end_fails() {
        let data = [1u8];
        let mut r = Reader::new(&data);
        let err = r.read_u16().unwrap_err();
        assert_eq!(
            err,
            BufferError::UnexpectedEof {
                offset: 0,
                need: 2,
                have: 1
            }
        );
        // A failed read does not advance the cursor.
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn smart_width_threshold() {
        let mut w = Writer::new();
        w.write_smart(127).unwrap();
        w.write_smart(128).unwrap();
        assert_eq!(w.as_bytes(), &[0x7F, 0x80, 0x80]);
        assert!(w.write_smart(0x8000).is_err());
    }

    #[test]
    fn signed_smart_boundaries() {
        let mut w = Writer::new();
        for v in [-64, 63, -65, 64, -16384, 16383, 0] {
            w.write_smart_signed(v).unwrap();
        }
        assert!(w.write_smart_signed(16384).is_err());

        let bytes = w.into_bytes();
        // -64 and 63 are single bytes; -65 and 64 need two.
        assert_eq!(&bytes[..2], &[0x00, 0x7F]);
        let mut r = Reader::new(&bytes);
        for v in [-64, 63, -65, 64, -16384, 16383, 0] {
            assert_eq!(r.read_smart_signed().unwrap(), v);
        }
    }

    #[test]
    fn newline_terminated_string() {
        let mut w = Writer::new();
        w.write_string("Talk-to");
        w.write_string("");
        let bytes = w.into_bytes();
        assert_eq!(&bytes[..8], b"Talk-to\n");

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_string().unwrap(), "Talk-to");
        assert_eq!(r.read_string().unwrap(), "");
        assert!(matches!(
            r.read_string(),
            Err(BufferError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn crc_over_range() {
        let data = b"xx123456789yy";
        let r = Reader::new(data);
        assert_eq!(r.crc32(2, 11).unwrap(), 0xCBF4_3926);
        assert!(r.crc32(2, 20).is_err());
    }
}

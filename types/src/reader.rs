//! Forward-only cursor over the ledger's native binary encoding.
//!
//! Integers are little-endian, sequence lengths are unsigned LEB128, booleans are a single
//! `0x00`/`0x01` byte and optional values carry a one-byte presence tag. Every read either
//! advances the cursor or fails without producing a partial value.

use thiserror::Error;

/// Largest sequence length the ledger will ever encode.
pub const MAX_SEQUENCE_LENGTH: usize = (1 << 31) - 1;

/// Error raised when a payload does not match the layout being decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("end of buffer: needed {needed} bytes, {remaining} remaining")]
    EndOfBuffer { needed: usize, remaining: usize },
    #[error("unsupported integer width: {0}")]
    InvalidWidth(usize),
    #[error("invalid bool byte: {0:#04x}")]
    InvalidBool(u8),
    #[error("invalid option tag: {0:#04x}")]
    InvalidOptionTag(u8),
    #[error("varint overflows u64")]
    VarintOverflow,
    #[error("varint is not minimally encoded")]
    NonCanonicalVarint,
    #[error("sequence length {len} exceeds maximum {max}")]
    LengthTooLarge { len: u64, max: usize },
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("field {field} is not a {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("expected {expected} return values, got {got}")]
    ReturnCount { expected: usize, got: usize },
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Cursor over a borrowed byte slice.
#[derive(Clone, Debug)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(DecodeError::EndOfBuffer {
                needed: len,
                remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Reads an unsigned little-endian integer occupying `width` bytes (1 to 8).
    pub fn read_fixed_uint(&mut self, width: usize) -> Result<u64> {
        if width == 0 || width > 8 {
            return Err(DecodeError::InvalidWidth(width));
        }
        let bytes = self.take(width)?;
        let mut padded = [0u8; 8];
        padded[..width].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(padded))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_fixed_uint(8)
    }

    /// Reads an unsigned LEB128 integer: seven data bits per byte, high bit set on every byte
    /// but the last.
    pub fn read_var_uint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            let data = u64::from(byte & 0x7f);
            if shift == 63 && data > 1 {
                return Err(DecodeError::VarintOverflow);
            }
            value |= data << shift;
            if byte & 0x80 == 0 {
                if byte == 0 && shift > 0 {
                    return Err(DecodeError::NonCanonicalVarint);
                }
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(DecodeError::VarintOverflow);
            }
        }
    }

    /// Reads a sequence length prefix.
    pub fn read_length(&mut self) -> Result<usize> {
        let len = self.read_var_uint()?;
        if len > MAX_SEQUENCE_LENGTH as u64 {
            return Err(DecodeError::LengthTooLarge {
                len,
                max: MAX_SEQUENCE_LENGTH,
            });
        }
        Ok(len as usize)
    }

    /// Reads exactly `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Reads a length-prefixed byte vector.
    pub fn read_byte_vector(&mut self) -> Result<&'a [u8]> {
        let len = self.read_length()?;
        self.take(len)
    }

    /// Reads a length-prefixed byte vector and interprets it as UTF-8.
    pub fn read_text(&mut self, field: &'static str) -> Result<String> {
        let bytes = self.read_byte_vector()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::InvalidBool(other)),
        }
    }

    /// Reads a presence tag and, when present, the value decoded by `decode`.
    pub fn read_option<T>(
        &mut self,
        decode: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        match self.read_u8()? {
            0 => Ok(None),
            1 => decode(self).map(Some),
            other => Err(DecodeError::InvalidOptionTag(other)),
        }
    }

    /// Consumes the reader, failing if any input was left unread.
    pub fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            left => Err(DecodeError::TrailingBytes(left)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_uint_little_endian() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0xff];
        let mut reader = BinaryReader::new(&buf);
        assert_eq!(reader.read_u64().unwrap(), 0x0807_0605_0403_0201);
        assert_eq!(reader.read_fixed_uint(1).unwrap(), 0xff);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_fixed_uint_rejects_bad_width() {
        let mut reader = BinaryReader::new(&[0u8; 16]);
        assert_eq!(reader.read_fixed_uint(0), Err(DecodeError::InvalidWidth(0)));
        assert_eq!(reader.read_fixed_uint(9), Err(DecodeError::InvalidWidth(9)));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_var_uint_known_values() {
        let cases: &[(&[u8], u64)] = &[
            (&[0x00], 0),
            (&[0x7f], 127),
            (&[0x80, 0x01], 128),
            (&[0xe5, 0x8e, 0x26], 624_485),
            (
                &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01],
                u64::MAX,
            ),
        ];
        for (bytes, expected) in cases {
            let mut reader = BinaryReader::new(bytes);
            assert_eq!(reader.read_var_uint().unwrap(), *expected);
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_var_uint_overflow() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02];
        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_var_uint(), Err(DecodeError::VarintOverflow));

        let bytes = [0x80; 11];
        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_var_uint(), Err(DecodeError::VarintOverflow));
    }

    #[test]
    fn test_var_uint_rejects_padding() {
        let mut reader = BinaryReader::new(&[0x80, 0x00]);
        assert_eq!(reader.read_var_uint(), Err(DecodeError::NonCanonicalVarint));
    }

    #[test]
    fn test_var_uint_truncated() {
        let mut reader = BinaryReader::new(&[0x80, 0x80]);
        assert!(matches!(
            reader.read_var_uint(),
            Err(DecodeError::EndOfBuffer { .. })
        ));
    }

    #[test]
    fn test_byte_vector_one_short() {
        // Declares five bytes, carries four.
        let buf = [0x05, b'a', b'b', b'c', b'd'];
        let mut reader = BinaryReader::new(&buf);
        assert_eq!(
            reader.read_byte_vector(),
            Err(DecodeError::EndOfBuffer {
                needed: 5,
                remaining: 4
            })
        );
    }

    #[test]
    fn test_read_bytes_exact() {
        let buf = [1, 2, 3];
        let mut reader = BinaryReader::new(&buf);
        assert_eq!(reader.read_bytes(2).unwrap(), &[1, 2]);
        assert!(reader.read_bytes(2).is_err());
        assert_eq!(reader.read_bytes(1).unwrap(), &[3]);
    }

    #[test]
    fn test_bool_strict() {
        let mut reader = BinaryReader::new(&[0x00, 0x01, 0x02]);
        assert!(!reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_bool(), Err(DecodeError::InvalidBool(2)));
    }

    #[test]
    fn test_option_tags() {
        let mut reader = BinaryReader::new(&[0x00, 0x01, 0x2a, 0x03]);
        assert_eq!(reader.read_option(|r| r.read_u8()).unwrap(), None);
        assert_eq!(reader.read_option(|r| r.read_u8()).unwrap(), Some(42));
        assert_eq!(
            reader.read_option(|r| r.read_u8()),
            Err(DecodeError::InvalidOptionTag(3))
        );
    }

    #[test]
    fn test_option_present_but_truncated() {
        let mut reader = BinaryReader::new(&[0x01]);
        assert!(matches!(
            reader.read_option(|r| r.read_u64()),
            Err(DecodeError::EndOfBuffer { .. })
        ));
    }

    #[test]
    fn test_text_rejects_invalid_utf8() {
        let mut reader = BinaryReader::new(&[0x02, 0xff, 0xfe]);
        assert_eq!(
            reader.read_text("name"),
            Err(DecodeError::InvalidUtf8 { field: "name" })
        );
    }

    #[test]
    fn test_finish_reports_trailing() {
        let mut reader = BinaryReader::new(&[0x01, 0x02]);
        reader.read_u8().unwrap();
        assert_eq!(reader.finish(), Err(DecodeError::TrailingBytes(1)));
    }
}

//! Encoder for the ledger's native binary format, the inverse of [crate::BinaryReader].

use bytes::{BufMut, Bytes, BytesMut};

#[derive(Clone, Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    pub fn write_var_uint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.put_u8(byte);
                return;
            }
            self.buf.put_u8(byte | 0x80);
        }
    }

    /// Writes raw bytes with no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Writes a length-prefixed byte vector.
    pub fn write_byte_vector(&mut self, bytes: &[u8]) {
        self.write_var_uint(bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_byte_vector(value.as_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn write_option<T>(&mut self, value: Option<&T>, encode: impl FnOnce(&mut Self, &T)) {
        match value {
            None => self.buf.put_u8(0),
            Some(inner) => {
                self.buf.put_u8(1);
                encode(self, inner);
            }
        }
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinaryReader;

    #[test]
    fn test_var_uint_matches_reader() {
        for value in [0u64, 1, 127, 128, 300, 16_384, 624_485, u32::MAX as u64, u64::MAX] {
            let mut writer = BinaryWriter::new();
            writer.write_var_uint(value);
            let bytes = writer.into_vec();
            let mut reader = BinaryReader::new(&bytes);
            assert_eq!(reader.read_var_uint().unwrap(), value);
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_known_encoding() {
        let mut writer = BinaryWriter::new();
        writer.write_str("ab");
        writer.write_bool(true);
        writer.write_option(Some(&7u64), |w, v| w.write_u64(*v));
        writer.write_option::<u64>(None, |w, v| w.write_u64(*v));
        assert_eq!(
            writer.into_vec(),
            vec![2, b'a', b'b', 1, 1, 7, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }
}

//! Versioned layout tables for records returned by read-only contract calls.
//!
//! Each record is described once as an ordered list of fields; a single generic decoder walks
//! the table. A layout change on the contract side is a table edit here, not a new set of
//! byte offsets.

use crate::{
    address::Address,
    reader::{BinaryReader, DecodeError, Result},
};

/// Encoding of a single field.
#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    /// Object id header; 32 bytes, carried through but not interpreted.
    Uid,
    /// 32-byte address.
    Address,
    /// Length-prefixed UTF-8.
    Text,
    U8,
    U64,
    Bool,
    /// Presence tag followed by a nested record.
    Option(&'static Schema),
}

#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub version: u16,
    pub fields: &'static [Field],
}

const fn field(name: &'static str, kind: FieldKind) -> Field {
    Field { name, kind }
}

/// Opponent bound to an asset (`EnemyInfo` on the contract).
pub static ENCOUNTER_SCHEMA: Schema = Schema {
    name: "EnemyInfo",
    version: 1,
    fields: &[
        field("name", FieldKind::Text),
        field("level", FieldKind::U8),
        field("element", FieldKind::U8),
        field("category", FieldKind::U8),
        field("is_golden", FieldKind::Bool),
        field("generated_at", FieldKind::U64),
    ],
};

/// Player-owned asset (`HealthNFT` on the contract).
pub static ASSET_SCHEMA: Schema = Schema {
    name: "HealthNFT",
    version: 1,
    fields: &[
        field("uid", FieldKind::Uid),
        field("owner", FieldKind::Address),
        field("name", FieldKind::Text),
        field("element", FieldKind::U8),
        field("category", FieldKind::U8),
        field("level", FieldKind::U8),
        field("experience", FieldKind::U64),
        field("minted_at", FieldKind::U64),
        field("defeated_golden", FieldKind::Bool),
        field("current_encounter", FieldKind::Option(&ENCOUNTER_SCHEMA)),
        field("last_encounter_at", FieldKind::U64),
        field("is_listed", FieldKind::Bool),
        field("has_active_commitment", FieldKind::Bool),
    ],
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Address(Address),
    Text(String),
    U8(u8),
    U64(u64),
    Bool(bool),
    Record(Option<Box<Decoded>>),
}

/// Field values of one decoded record, in schema order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub schema: &'static str,
    pub fields: Vec<(&'static str, Value)>,
}

impl Decoded {
    pub fn value(&self, name: &'static str) -> Result<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
            .ok_or(DecodeError::MissingField(name))
    }

    pub fn address(&self, name: &'static str) -> Result<Address> {
        match self.value(name)? {
            Value::Address(address) => Ok(*address),
            _ => Err(type_error(name, "address")),
        }
    }

    pub fn text(&self, name: &'static str) -> Result<String> {
        match self.value(name)? {
            Value::Text(text) => Ok(text.clone()),
            _ => Err(type_error(name, "text")),
        }
    }

    pub fn u8(&self, name: &'static str) -> Result<u8> {
        match self.value(name)? {
            Value::U8(value) => Ok(*value),
            _ => Err(type_error(name, "u8")),
        }
    }

    pub fn u64(&self, name: &'static str) -> Result<u64> {
        match self.value(name)? {
            Value::U64(value) => Ok(*value),
            _ => Err(type_error(name, "u64")),
        }
    }

    pub fn bool(&self, name: &'static str) -> Result<bool> {
        match self.value(name)? {
            Value::Bool(value) => Ok(*value),
            _ => Err(type_error(name, "bool")),
        }
    }

    pub fn record(&self, name: &'static str) -> Result<Option<&Decoded>> {
        match self.value(name)? {
            Value::Record(record) => Ok(record.as_deref()),
            _ => Err(type_error(name, "record")),
        }
    }
}

fn type_error(field: &'static str, expected: &'static str) -> DecodeError {
    DecodeError::FieldType { field, expected }
}

/// Decodes one record described by `schema` from the reader's current position.
pub fn decode(schema: &'static Schema, reader: &mut BinaryReader<'_>) -> Result<Decoded> {
    let mut fields = Vec::with_capacity(schema.fields.len());
    for field in schema.fields {
        let value = match field.kind {
            FieldKind::Uid | FieldKind::Address => Value::Address(Address::new(reader.read_array()?)),
            FieldKind::Text => Value::Text(reader.read_text(field.name)?),
            FieldKind::U8 => Value::U8(reader.read_u8()?),
            FieldKind::U64 => Value::U64(reader.read_u64()?),
            FieldKind::Bool => Value::Bool(reader.read_bool()?),
            FieldKind::Option(inner) => {
                Value::Record(reader.read_option(|r| decode(inner, r))?.map(Box::new))
            }
        };
        fields.push((field.name, value));
    }
    Ok(Decoded {
        schema: schema.name,
        fields,
    })
}

/// Decodes a record that must span the whole buffer.
pub fn decode_exact(schema: &'static Schema, bytes: &[u8]) -> Result<Decoded> {
    let mut reader = BinaryReader::new(bytes);
    let decoded = decode(schema, &mut reader)?;
    reader.finish()?;
    Ok(decoded)
}

/// Encodes `decoded` following `schema`; the inverse of [decode].
#[cfg(any(test, feature = "mocks"))]
pub fn encode(
    schema: &'static Schema,
    decoded: &Decoded,
    writer: &mut crate::writer::BinaryWriter,
) -> Result<()> {
    for field in schema.fields {
        match (field.kind, decoded.value(field.name)?) {
            (FieldKind::Uid | FieldKind::Address, Value::Address(address)) => {
                writer.write_bytes(address.as_ref())
            }
            (FieldKind::Text, Value::Text(text)) => writer.write_str(text),
            (FieldKind::U8, Value::U8(value)) => writer.write_u8(*value),
            (FieldKind::U64, Value::U64(value)) => writer.write_u64(*value),
            (FieldKind::Bool, Value::Bool(value)) => writer.write_bool(*value),
            (FieldKind::Option(inner), Value::Record(record)) => match record {
                None => writer.write_u8(0),
                Some(record) => {
                    writer.write_u8(1);
                    encode(inner, record, writer)?;
                }
            },
            _ => return Err(type_error(field.name, "schema kind")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::BinaryWriter;

    fn encounter_bytes() -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        writer.write_str("Slime");
        writer.write_u8(2);
        writer.write_u8(4);
        writer.write_u8(1);
        writer.write_bool(false);
        writer.write_u64(1_700_000_000_000);
        writer.into_vec()
    }

    #[test]
    fn test_decode_walks_table_in_order() {
        let decoded = decode_exact(&ENCOUNTER_SCHEMA, &encounter_bytes()).unwrap();
        assert_eq!(decoded.schema, "EnemyInfo");
        assert_eq!(decoded.text("name").unwrap(), "Slime");
        assert_eq!(decoded.u8("level").unwrap(), 2);
        assert_eq!(decoded.u8("element").unwrap(), 4);
        assert_eq!(decoded.u8("category").unwrap(), 1);
        assert!(!decoded.bool("is_golden").unwrap());
        assert_eq!(decoded.u64("generated_at").unwrap(), 1_700_000_000_000);
    }

    #[test]
    fn test_accessor_type_mismatch() {
        let decoded = decode_exact(&ENCOUNTER_SCHEMA, &encounter_bytes()).unwrap();
        assert_eq!(
            decoded.u64("level"),
            Err(DecodeError::FieldType {
                field: "level",
                expected: "u64"
            })
        );
        assert_eq!(decoded.u8("missing"), Err(DecodeError::MissingField("missing")));
    }

    #[test]
    fn test_encode_is_inverse() {
        let bytes = encounter_bytes();
        let decoded = decode_exact(&ENCOUNTER_SCHEMA, &bytes).unwrap();
        let mut writer = BinaryWriter::new();
        encode(&ENCOUNTER_SCHEMA, &decoded, &mut writer).unwrap();
        assert_eq!(writer.into_vec(), bytes);
    }

    #[test]
    fn test_every_truncation_fails() {
        let bytes = encounter_bytes();
        for len in 0..bytes.len() {
            assert!(
                decode_exact(&ENCOUNTER_SCHEMA, &bytes[..len]).is_err(),
                "prefix of {len} bytes decoded"
            );
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encounter_bytes();
        bytes.push(0);
        assert_eq!(
            decode_exact(&ENCOUNTER_SCHEMA, &bytes),
            Err(DecodeError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_asset_layout_width() {
        // uid + owner + empty name + 3 enums + 2 counters + flag + absent option + timestamp + 2 flags
        let fixed = 32 + 32 + 1 + 3 + 16 + 1 + 1 + 8 + 2;
        let decoded = decode_exact(&ASSET_SCHEMA, &vec![0u8; fixed]).unwrap();
        assert_eq!(decoded.record("current_encounter").unwrap(), None);
    }
}

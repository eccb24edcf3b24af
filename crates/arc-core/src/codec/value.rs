//! Payload encoding for attribute values.
//!
//! A [`Value`] payload is one [`DataType`] byte followed by the raw form of
//! the value. The scalar types also implement [`AttrValue`] directly and
//! then write only the raw form, which is what typed records composed of
//! several fields use.

use crate::codec::primitives::{ByteSource, Reader, Writer};
use crate::error::DecodeError;
use crate::limits::{MAX_BYTES_LEN, MAX_STRING_LEN};
use crate::model::tag::{TagLiteral, split_tags};
use crate::model::{AttrValue, DataType, Eid, TagSpec, Value};

// =============================================================================
// DECODING
// =============================================================================

/// Decodes a tagged Value from the reader.
pub fn decode_value(reader: &mut Reader<'_>) -> Result<Value, DecodeError> {
    let type_byte = reader.read_byte("data_type")?;
    let data_type =
        DataType::from_u8(type_byte).ok_or(DecodeError::InvalidDataType { data_type: type_byte })?;
    decode_value_of(reader, data_type)
}

/// Decodes the raw form of a value whose type is already known.
pub fn decode_value_of(reader: &mut Reader<'_>, data_type: DataType) -> Result<Value, DecodeError> {
    match data_type {
        DataType::Bool => decode_bool(reader).map(Value::Bool),
        DataType::Int64 => reader.read_signed_varint("int64").map(Value::Int64),
        DataType::Float64 => reader.read_f64("float64").map(Value::Float64),
        DataType::Text => reader.read_string(MAX_STRING_LEN, "text").map(Value::Text),
        DataType::Bytes => reader
            .read_bytes_prefixed(MAX_BYTES_LEN, "bytes")
            .map(|b| Value::Bytes(b.to_vec())),
        DataType::Eid => reader.read_eid("eid").map(Value::Eid),
        DataType::Tag => decode_tag(reader).map(Value::Tag),
    }
}

fn decode_bool(reader: &mut Reader<'_>) -> Result<bool, DecodeError> {
    let byte = reader.read_byte("bool")?;
    match byte {
        0x00 => Ok(false),
        0x01 => Ok(true),
        _ => Err(DecodeError::InvalidBool { value: byte }),
    }
}

fn decode_tag(reader: &mut Reader<'_>) -> Result<TagSpec, DecodeError> {
    let id = reader.read_eid("tag.id")?;
    let canonic = reader.read_string(MAX_STRING_LEN, "tag.canonic")?;
    let tags = split_tags(&canonic).map(TagLiteral::new).collect();
    Ok(TagSpec { id, canonic, tags })
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a Value with its leading type byte.
pub fn encode_value(writer: &mut Writer, value: &Value) {
    writer.write_byte(value.data_type() as u8);
    encode_value_raw(writer, value);
}

/// Encodes a Value without the type byte.
pub fn encode_value_raw(writer: &mut Writer, value: &Value) {
    match value {
        Value::Bool(b) => writer.write_byte(*b as u8),
        Value::Int64(v) => writer.write_signed_varint(*v),
        Value::Float64(v) => writer.write_f64(*v),
        Value::Text(s) => writer.write_string(s),
        Value::Bytes(b) => writer.write_bytes_prefixed(b),
        Value::Eid(id) => writer.write_eid(id),
        Value::Tag(spec) => {
            writer.write_eid(&spec.id);
            writer.write_string(&spec.canonic_string());
        }
    }
}

// =============================================================================
// AttrValue impls
// =============================================================================

impl AttrValue for Value {
    fn encode(&self, writer: &mut Writer) {
        encode_value(writer, self);
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        decode_value(reader)
    }
}

impl AttrValue for bool {
    fn encode(&self, writer: &mut Writer) {
        writer.write_byte(*self as u8);
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        decode_bool(reader)
    }
}

impl AttrValue for i64 {
    fn encode(&self, writer: &mut Writer) {
        writer.write_signed_varint(*self);
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        reader.read_signed_varint("int64")
    }
}

impl AttrValue for u64 {
    fn encode(&self, writer: &mut Writer) {
        writer.write_varint(*self);
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        reader.read_varint("uint64")
    }
}

impl AttrValue for f64 {
    fn encode(&self, writer: &mut Writer) {
        writer.write_f64(*self);
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        reader.read_f64("float64")
    }
}

impl AttrValue for String {
    fn encode(&self, writer: &mut Writer) {
        writer.write_string(self);
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        reader.read_string(MAX_STRING_LEN, "text")
    }
}

impl AttrValue for Vec<u8> {
    fn encode(&self, writer: &mut Writer) {
        writer.write_bytes_prefixed(self);
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        reader.read_bytes_prefixed(MAX_BYTES_LEN, "bytes").map(<[u8]>::to_vec)
    }
}

impl AttrValue for Eid {
    fn encode(&self, writer: &mut Writer) {
        writer.write_eid(self);
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        reader.read_eid("eid")
    }
}

impl AttrValue for TagSpec {
    fn encode(&self, writer: &mut Writer) {
        encode_value_raw(writer, &Value::Tag(self.clone()));
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        decode_tag(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OpCode, Tx, TxOp};

    fn roundtrip(value: &Value) -> Value {
        let mut writer = Writer::new();
        encode_value(&mut writer, value);
        let mut reader = Reader::new(writer.as_bytes());
        let decoded = decode_value(&mut reader).unwrap();
        assert!(reader.is_empty());
        decoded
    }

    #[test]
    fn test_bool_roundtrip() {
        assert_eq!(roundtrip(&Value::Bool(true)), Value::Bool(true));
        assert_eq!(roundtrip(&Value::Bool(false)), Value::Bool(false));
    }

    #[test]
    fn test_invalid_bool() {
        let data = [DataType::Bool as u8, 0x02];
        let mut reader = Reader::new(&data);
        assert_eq!(decode_value(&mut reader), Err(DecodeError::InvalidBool { value: 2 }));
    }

    #[test]
    fn test_int64_extremes() {
        for v in [0i64, -1, i64::MIN, i64::MAX] {
            assert_eq!(roundtrip(&Value::Int64(v)), Value::Int64(v));
        }
    }

    #[test]
    fn test_float64_roundtrip() {
        assert_eq!(roundtrip(&Value::Float64(-0.5)), Value::Float64(-0.5));
        assert_eq!(roundtrip(&Value::Float64(f64::INFINITY)), Value::Float64(f64::INFINITY));
    }

    #[test]
    fn test_text_and_bytes() {
        let text = Value::Text("hëllo wörld".to_string());
        assert_eq!(roundtrip(&text), text);
        let bytes = Value::Bytes(vec![0, 1, 2, 255]);
        assert_eq!(roundtrip(&bytes), bytes);
    }

    #[test]
    fn test_invalid_utf8() {
        let data = [DataType::Text as u8, 2, 0xC3, 0x28];
        let mut reader = Reader::new(&data);
        assert_eq!(
            decode_value(&mut reader),
            Err(DecodeError::InvalidUtf8 { field: "text" })
        );
    }

    #[test]
    fn test_eid_and_tag() {
        let id = Value::Eid(Eid([1, 2, 3]));
        assert_eq!(roundtrip(&id), id);

        let spec = TagSpec::parse("media.image/png");
        match roundtrip(&Value::Tag(spec.clone())) {
            Value::Tag(decoded) => {
                assert_eq!(decoded.id, spec.id);
                assert_eq!(decoded.canonic, "media.image.png");
                assert_eq!(decoded.tags, spec.tags);
            }
            other => panic!("expected tag, got {other:?}"),
        }
    }

    #[test]
    fn test_tag_without_canonic_keeps_literals() {
        let spec = TagSpec {
            id: TagSpec::parse("a.b").id,
            canonic: String::new(),
            tags: vec![TagLiteral::new("a"), TagLiteral::new("b")],
        };
        match roundtrip(&Value::Tag(spec.clone())) {
            Value::Tag(decoded) => {
                assert_eq!(decoded.id, spec.id);
                assert_eq!(decoded.canonic, "a.b");
                assert_eq!(decoded.tags, spec.tags);
            }
            other => panic!("expected tag, got {other:?}"),
        }

        let mut tx = Tx::new();
        let mut op = TxOp::new(OpCode::UpsertAttr);
        tx.push_op_value(&mut op, &Value::Tag(spec.clone())).unwrap();
        match tx.load_value::<Value>(&tx.ops[0]).unwrap() {
            Value::Tag(loaded) => {
                assert_eq!(loaded.id, spec.id);
                assert_eq!(loaded.tags.len(), 2);
            }
            other => panic!("expected tag, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_data_type() {
        let data = [0x7F];
        let mut reader = Reader::new(&data);
        assert_eq!(
            decode_value(&mut reader),
            Err(DecodeError::InvalidDataType { data_type: 0x7F })
        );
    }

    #[test]
    fn test_truncated_value() {
        let mut writer = Writer::new();
        encode_value(&mut writer, &Value::Eid(Eid([9, 9, 9])));
        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes[..10]);
        assert!(decode_value(&mut reader).unwrap_err().is_unexpected_end());
    }

    #[test]
    fn test_scalar_impls_are_untagged() {
        let mut writer = Writer::new();
        true.encode(&mut writer);
        "ab".to_string().encode(&mut writer);
        7u64.encode(&mut writer);
        assert_eq!(writer.as_bytes(), &[1, 2, b'a', b'b', 7]);

        let mut reader = Reader::new(writer.as_bytes());
        assert!(bool::decode(&mut reader).unwrap());
        assert_eq!(String::decode(&mut reader).unwrap(), "ab");
        assert_eq!(u64::decode(&mut reader).unwrap(), 7);
    }
}

//! Binary protobuf codec.
//!
//! A single descriptor-driven encoder and decoder for every message type.
//!
//! # Encoding
//!
//! Fields are written in ascending field-number order. Implicit-presence
//! fields holding their zero value are omitted, so an all-default message
//! encodes to zero bytes. Repeated packable fields are written packed unless
//! the descriptor opts out. Map entries are written as nested messages with
//! the key in field 1 and the value in field 2.
//!
//! # Decoding
//!
//! Decoding starts from [`MessageValue::with_defaults`] and merges every field
//! found on the wire:
//! - unknown field numbers are skipped
//! - a known field with an unexpected wire type is skipped as well
//! - packed and unpacked encodings are both accepted for packable fields
//! - scalars are last-wins; embedded messages merge recursively
//! - a oneof member clears the other members of its group
//!
//! # Example
//!
//! ```
//! use zrpc_common::catalog;
//! use zrpc_common::codec::wire;
//! use zrpc_common::protocol::MessageValue;
//!
//! let pool = catalog::builtin_pool().unwrap();
//! let desc = pool.message("zitadel.action.v3alpha.Target").unwrap();
//!
//! let target = MessageValue::new().with("target_id", "t1");
//! let bytes = wire::encode(&pool, desc, &target).unwrap();
//! assert_eq!(bytes, b"\x0a\x02t1");
//! ```

use bytes::{Buf, BufMut};

use super::convert::{enum_number, int32, int64, mismatch, uint32, uint64};
use super::varint::{
    decode_length, decode_tag, decode_varint, encode_tag, encode_varint, skip_field,
    zigzag_decode32, zigzag_decode64, zigzag_encode32, zigzag_encode64,
};
use crate::protocol::descriptor::{FieldDescriptor, FieldKind, MessageDescriptor, ScalarType, WireType};
use crate::protocol::error::{Result, ZrpcError};
use crate::protocol::pool::DescriptorPool;
use crate::protocol::value::{MapKey, MessageValue, Value};

/// Maximum depth of nested messages.
pub const RECURSION_LIMIT: usize = 100;

/// Serializes `value` as a `desc` message.
///
/// # Errors
///
/// [`ZrpcError::SchemaViolation`] when a value does not fit its field type,
/// or [`ZrpcError::UnknownMessage`] when a nested type is not in the pool.
pub fn encode(pool: &DescriptorPool, desc: &MessageDescriptor, value: &MessageValue) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_message(pool, desc, value, &mut buf, 0)?;
    Ok(buf)
}

/// Parses `bytes` as a `desc` message.
pub fn decode(pool: &DescriptorPool, desc: &MessageDescriptor, bytes: &[u8]) -> Result<MessageValue> {
    let mut message = MessageValue::with_defaults(desc);
    merge(pool, desc, &mut message, bytes)?;
    Ok(message)
}

/// Merges the fields encoded in `bytes` into `target`.
pub fn merge(
    pool: &DescriptorPool,
    desc: &MessageDescriptor,
    target: &mut MessageValue,
    bytes: &[u8],
) -> Result<()> {
    let mut buf = bytes;
    merge_message(pool, desc, target, &mut buf, 0)
}

fn encode_message(
    pool: &DescriptorPool,
    desc: &MessageDescriptor,
    value: &MessageValue,
    buf: &mut Vec<u8>,
    depth: usize,
) -> Result<()> {
    if depth > RECURSION_LIMIT {
        return Err(ZrpcError::SchemaViolation(format!(
            "{} nests deeper than {} levels",
            desc.full_name(),
            RECURSION_LIMIT
        )));
    }
    for field in desc.fields() {
        if let Some(field_value) = value.get(field.name()) {
            encode_field(pool, field, field_value, buf, depth)?;
        }
    }
    Ok(())
}

fn encode_field(
    pool: &DescriptorPool,
    field: &FieldDescriptor,
    value: &Value,
    buf: &mut Vec<u8>,
    depth: usize,
) -> Result<()> {
    if let FieldKind::Map {
        key: key_type,
        value: value_kind,
    } = field.kind()
    {
        let Value::Map(entries) = value else {
            return Err(mismatch(field.name(), "map", value));
        };
        for (key, entry_value) in entries {
            let mut entry = Vec::new();
            encode_tag(1, key_type.wire_type(), &mut entry);
            encode_scalar(field.name(), *key_type, &key.clone().into_value(), &mut entry)?;
            encode_single(pool, field.name(), 2, value_kind, entry_value, &mut entry, depth)?;
            write_length_delimited(field.number(), &entry, buf);
        }
        return Ok(());
    }

    if field.is_list() {
        let Value::List(items) = value else {
            return Err(mismatch(field.name(), "list", value));
        };
        if items.is_empty() {
            return Ok(());
        }
        if field.is_packed() {
            let mut packed = Vec::new();
            for item in items {
                encode_payload(field.name(), field.kind(), item, &mut packed)?;
            }
            write_length_delimited(field.number(), &packed, buf);
        } else {
            for item in items {
                encode_single(pool, field.name(), field.number(), field.kind(), item, buf, depth)?;
            }
        }
        return Ok(());
    }

    let start = buf.len();
    encode_single(pool, field.name(), field.number(), field.kind(), value, buf, depth)?;
    // implicit presence: the zero value is never on the wire
    if !field.has_explicit_presence() && value.is_default() {
        buf.truncate(start);
    }
    Ok(())
}

/// Writes one tagged element of a non-map kind.
fn encode_single(
    pool: &DescriptorPool,
    field: &str,
    number: u32,
    kind: &FieldKind,
    value: &Value,
    buf: &mut Vec<u8>,
    depth: usize,
) -> Result<()> {
    match kind {
        FieldKind::Message(type_name) => {
            let Value::Message(message) = value else {
                return Err(mismatch(field, "message", value));
            };
            let nested = pool.message(type_name)?;
            let mut inner = Vec::new();
            encode_message(pool, nested, message, &mut inner, depth + 1)?;
            write_length_delimited(number, &inner, buf);
            Ok(())
        }
        FieldKind::Map { .. } => Err(ZrpcError::SchemaViolation(format!(
            "field `{}`: map values cannot be maps",
            field
        ))),
        FieldKind::Scalar(_) | FieldKind::Enum(_) => {
            encode_tag(number, kind.wire_type(), buf);
            encode_payload(field, kind, value, buf)
        }
    }
}

/// Writes the untagged payload of a scalar or enum value.
fn encode_payload(field: &str, kind: &FieldKind, value: &Value, buf: &mut Vec<u8>) -> Result<()> {
    match kind {
        FieldKind::Scalar(scalar) => encode_scalar(field, *scalar, value, buf),
        FieldKind::Enum(_) => {
            let number = enum_number(field, value)?;
            // negative enum numbers are sign-extended like int32
            encode_varint(i64::from(number) as u64, buf);
            Ok(())
        }
        _ => Err(mismatch(field, "scalar", value)),
    }
}

fn encode_scalar(field: &str, scalar: ScalarType, value: &Value, buf: &mut Vec<u8>) -> Result<()> {
    match scalar {
        ScalarType::Int32 => encode_varint(i64::from(int32(field, value)?) as u64, buf),
        ScalarType::Int64 => encode_varint(int64(field, value)? as u64, buf),
        ScalarType::Uint32 => encode_varint(u64::from(uint32(field, value)?), buf),
        ScalarType::Uint64 => encode_varint(uint64(field, value)?, buf),
        ScalarType::Sint32 => encode_varint(u64::from(zigzag_encode32(int32(field, value)?)), buf),
        ScalarType::Sint64 => encode_varint(zigzag_encode64(int64(field, value)?), buf),
        ScalarType::Fixed32 => buf.put_u32_le(uint32(field, value)?),
        ScalarType::Fixed64 => buf.put_u64_le(uint64(field, value)?),
        ScalarType::Sfixed32 => buf.put_i32_le(int32(field, value)?),
        ScalarType::Sfixed64 => buf.put_i64_le(int64(field, value)?),
        ScalarType::Bool => match value {
            Value::Bool(v) => encode_varint(u64::from(*v), buf),
            other => return Err(mismatch(field, "bool", other)),
        },
        ScalarType::Double => match value {
            Value::F64(v) => buf.put_f64_le(*v),
            Value::F32(v) => buf.put_f64_le(f64::from(*v)),
            other => return Err(mismatch(field, "double", other)),
        },
        ScalarType::Float => match value {
            Value::F32(v) => buf.put_f32_le(*v),
            Value::F64(v) if v.is_nan() || f64::from(*v as f32) == *v => buf.put_f32_le(*v as f32),
            other => return Err(mismatch(field, "float", other)),
        },
        ScalarType::String => match value {
            Value::String(v) => {
                encode_varint(v.len() as u64, buf);
                buf.put_slice(v.as_bytes());
            }
            other => return Err(mismatch(field, "string", other)),
        },
        ScalarType::Bytes => match value {
            Value::Bytes(v) => {
                encode_varint(v.len() as u64, buf);
                buf.put_slice(v);
            }
            other => return Err(mismatch(field, "bytes", other)),
        },
    }
    Ok(())
}

fn write_length_delimited(number: u32, payload: &[u8], buf: &mut Vec<u8>) {
    encode_tag(number, WireType::LengthDelimited, buf);
    encode_varint(payload.len() as u64, buf);
    buf.put_slice(payload);
}

fn merge_message(
    pool: &DescriptorPool,
    desc: &MessageDescriptor,
    target: &mut MessageValue,
    buf: &mut &[u8],
    depth: usize,
) -> Result<()> {
    if depth > RECURSION_LIMIT {
        return Err(ZrpcError::MalformedWireData(format!(
            "message nesting exceeds {} levels",
            RECURSION_LIMIT
        )));
    }

    while buf.has_remaining() {
        let (number, wire_type) = decode_tag(buf)?;
        let Some(field) = desc.field_by_number(number) else {
            skip_field(wire_type, buf)?;
            continue;
        };
        if !accepts(field, wire_type) {
            skip_field(wire_type, buf)?;
            continue;
        }
        merge_field(pool, desc, field, wire_type, target, buf, depth)?;
    }
    Ok(())
}

fn accepts(field: &FieldDescriptor, wire_type: WireType) -> bool {
    if field.is_map() {
        return wire_type == WireType::LengthDelimited;
    }
    let native = field.kind().wire_type();
    if field.is_list() && field.kind().is_packable() {
        return wire_type == native || wire_type == WireType::LengthDelimited;
    }
    wire_type == native
}

fn merge_field(
    pool: &DescriptorPool,
    desc: &MessageDescriptor,
    field: &FieldDescriptor,
    wire_type: WireType,
    target: &mut MessageValue,
    buf: &mut &[u8],
    depth: usize,
) -> Result<()> {
    if let FieldKind::Map {
        key: key_type,
        value: value_kind,
    } = field.kind()
    {
        let mut entry = take_length_delimited(buf)?;
        let (key, value) = decode_map_entry(pool, *key_type, value_kind, &mut entry, depth)?;
        match target
            .entry(field.name())
            .or_insert_with(|| Value::Map(Default::default()))
        {
            Value::Map(entries) => {
                entries.insert(key, value);
            }
            other => return Err(mismatch(field.name(), "map", other)),
        }
        return Ok(());
    }

    if field.is_list() {
        let mut items = Vec::new();
        if wire_type == WireType::LengthDelimited && field.kind().is_packable() {
            let mut packed = take_length_delimited(buf)?;
            while packed.has_remaining() {
                items.push(read_element(pool, field.kind(), &mut packed, depth)?);
            }
        } else {
            items.push(read_element(pool, field.kind(), buf, depth)?);
        }
        match target
            .entry(field.name())
            .or_insert_with(|| Value::List(Vec::new()))
        {
            Value::List(existing) => existing.extend(items),
            other => return Err(mismatch(field.name(), "list", other)),
        }
        return Ok(());
    }

    if let Some(oneof) = field.oneof().and_then(|name| desc.oneof(name)) {
        for member in oneof.fields() {
            if member != field.name() {
                target.remove(member);
            }
        }
    }

    if let FieldKind::Message(type_name) = field.kind() {
        let nested = pool.message(type_name)?;
        let mut payload = take_length_delimited(buf)?;
        let slot = target
            .entry(field.name())
            .or_insert_with(|| Value::Message(MessageValue::with_defaults(nested)));
        if !matches!(slot, Value::Message(_)) {
            *slot = Value::Message(MessageValue::with_defaults(nested));
        }
        if let Value::Message(existing) = slot {
            merge_message(pool, nested, existing, &mut payload, depth + 1)?;
        }
        return Ok(());
    }

    let value = read_element(pool, field.kind(), buf, depth)?;
    target.set(field.name(), value);
    Ok(())
}

fn decode_map_entry(
    pool: &DescriptorPool,
    key_type: ScalarType,
    value_kind: &FieldKind,
    entry: &mut &[u8],
    depth: usize,
) -> Result<(MapKey, Value)> {
    let mut key = MapKey::default_for(key_type);
    let mut value = None;

    while entry.has_remaining() {
        let (number, wire_type) = decode_tag(entry)?;
        match number {
            1 if wire_type == key_type.wire_type() => {
                let raw = read_scalar(key_type, entry)?;
                key = MapKey::from_value(raw).ok_or_else(|| {
                    ZrpcError::MalformedWireData(format!("invalid map key type {}", key_type))
                })?;
            }
            2 if wire_type == value_kind.wire_type() => {
                value = Some(read_element(pool, value_kind, entry, depth)?);
            }
            _ => skip_field(wire_type, entry)?,
        }
    }

    let value = match value {
        Some(value) => value,
        None => Value::default_for(pool, value_kind)?,
    };
    Ok((key, value))
}

/// Reads one untagged element of `kind`.
fn read_element(pool: &DescriptorPool, kind: &FieldKind, buf: &mut &[u8], depth: usize) -> Result<Value> {
    match kind {
        FieldKind::Scalar(scalar) => read_scalar(*scalar, buf),
        FieldKind::Enum(_) => Ok(Value::Enum(decode_varint(buf)? as i32)),
        FieldKind::Message(type_name) => {
            let nested = pool.message(type_name)?;
            let mut payload = take_length_delimited(buf)?;
            let mut message = MessageValue::with_defaults(nested);
            merge_message(pool, nested, &mut message, &mut payload, depth + 1)?;
            Ok(Value::Message(message))
        }
        FieldKind::Map { .. } => Err(ZrpcError::MalformedWireData(
            "map values cannot be maps".to_string(),
        )),
    }
}

fn read_scalar(scalar: ScalarType, buf: &mut &[u8]) -> Result<Value> {
    let value = match scalar {
        // int32 values travel sign-extended; truncation recovers them
        ScalarType::Int32 => Value::I32(decode_varint(buf)? as i32),
        ScalarType::Int64 => Value::I64(decode_varint(buf)? as i64),
        ScalarType::Uint32 => Value::U32(decode_varint(buf)? as u32),
        ScalarType::Uint64 => Value::U64(decode_varint(buf)?),
        ScalarType::Sint32 => Value::I32(zigzag_decode32(decode_varint(buf)? as u32)),
        ScalarType::Sint64 => Value::I64(zigzag_decode64(decode_varint(buf)?)),
        ScalarType::Bool => Value::Bool(decode_varint(buf)? != 0),
        ScalarType::Fixed32 => {
            ensure_remaining(*buf, 4)?;
            Value::U32(buf.get_u32_le())
        }
        ScalarType::Fixed64 => {
            ensure_remaining(*buf, 8)?;
            Value::U64(buf.get_u64_le())
        }
        ScalarType::Sfixed32 => {
            ensure_remaining(*buf, 4)?;
            Value::I32(buf.get_i32_le())
        }
        ScalarType::Sfixed64 => {
            ensure_remaining(*buf, 8)?;
            Value::I64(buf.get_i64_le())
        }
        ScalarType::Float => {
            ensure_remaining(*buf, 4)?;
            Value::F32(buf.get_f32_le())
        }
        ScalarType::Double => {
            ensure_remaining(*buf, 8)?;
            Value::F64(buf.get_f64_le())
        }
        ScalarType::String => {
            let bytes = take_length_delimited(buf)?;
            let text = std::str::from_utf8(bytes).map_err(|err| {
                ZrpcError::MalformedWireData(format!("string is not valid UTF-8: {}", err))
            })?;
            Value::String(text.to_string())
        }
        ScalarType::Bytes => Value::Bytes(take_length_delimited(buf)?.to_vec()),
    };
    Ok(value)
}

fn take_length_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = decode_length(buf)?;
    let data: &'a [u8] = *buf;
    let (head, rest) = data.split_at(len);
    *buf = rest;
    Ok(head)
}

fn ensure_remaining(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(ZrpcError::MalformedWireData(format!(
            "fixed-width value needs {} bytes, {} remaining",
            needed,
            buf.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::catalog;
    use crate::protocol::descriptor::FieldDescriptor;

    fn pool() -> DescriptorPool {
        catalog::builtin_pool().unwrap()
    }

    fn echo(pool: &DescriptorPool) -> &MessageDescriptor {
        pool.message(catalog::echo::ECHO_MESSAGE).unwrap()
    }

    #[test]
    fn test_target_id_prefix() {
        let pool = pool();
        let desc = pool.message("zitadel.action.v3alpha.Target").unwrap();
        let target = MessageValue::new()
            .with("target_id", "t1")
            .with("name", "hook")
            .with("endpoint", "https://example.com");

        let bytes = encode(&pool, desc, &target).unwrap();
        assert_eq!(&bytes[..4], &[0x0a, 0x02, b't', b'1']);

        let decoded = decode(&pool, desc, &bytes).unwrap();
        assert_eq!(decoded, target.normalized(&pool, desc).unwrap());
    }

    #[test]
    fn test_empty_list_targets_request() {
        let pool = pool();
        let desc = pool
            .message("zitadel.action.v3alpha.ListTargetsRequest")
            .unwrap();

        let bytes = encode(&pool, desc, &MessageValue::new()).unwrap();
        assert!(bytes.is_empty());

        let decoded = decode(&pool, desc, &[]).unwrap();
        assert!(!decoded.contains("query"));
        assert_eq!(decoded.get("sorting_column"), Some(&Value::Enum(0)));
        assert_eq!(decoded.get("queries"), Some(&Value::List(vec![])));
    }

    #[test]
    fn test_defaults_are_omitted() {
        let pool = pool();
        let desc = echo(&pool);
        let message = MessageValue::new()
            .with("int32_value", 0)
            .with("string_value", "")
            .with("bool_value", false)
            .with("status", Value::Enum(0));
        assert!(encode(&pool, desc, &message).unwrap().is_empty());
    }

    #[test]
    fn test_explicit_presence_keeps_zero() {
        let pool = pool();
        let desc = echo(&pool);
        let message = MessageValue::new().with("optional_int32", 0);
        let bytes = encode(&pool, desc, &message).unwrap();
        assert!(!bytes.is_empty());

        let decoded = decode(&pool, desc, &bytes).unwrap();
        assert_eq!(decoded.get("optional_int32"), Some(&Value::I32(0)));
    }

    #[test]
    fn test_negative_int32_is_ten_bytes() {
        let pool = pool();
        let desc = echo(&pool);
        let message = MessageValue::new().with("int32_value", -1);
        let bytes = encode(&pool, desc, &message).unwrap();
        // tag + 10 byte varint
        assert_eq!(bytes.len(), 11);
        let decoded = decode(&pool, desc, &bytes).unwrap();
        assert_eq!(decoded.get("int32_value"), Some(&Value::I32(-1)));
    }

    #[test]
    fn test_sint_zigzag_on_wire() {
        let pool = pool();
        let desc = echo(&pool);
        let number = desc.field("sint32_value").unwrap().number();
        let message = MessageValue::new().with("sint32_value", -1);
        let bytes = encode(&pool, desc, &message).unwrap();

        let mut expected = Vec::new();
        encode_tag(number, WireType::Varint, &mut expected);
        expected.push(0x01);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_all_scalar_kinds_roundtrip() {
        let pool = pool();
        let desc = echo(&pool);
        let message = MessageValue::new()
            .with("int32_value", i32::MIN)
            .with("int64_value", i64::MIN)
            .with("uint32_value", u32::MAX)
            .with("uint64_value", u64::MAX)
            .with("sint32_value", i32::MIN)
            .with("sint64_value", i64::MIN)
            .with("fixed32_value", 7u32)
            .with("fixed64_value", 8u64)
            .with("sfixed32_value", -9)
            .with("sfixed64_value", -10i64)
            .with("bool_value", true)
            .with("string_value", "grüße")
            .with("bytes_value", vec![0u8, 255, 1])
            .with("double_value", -1.5f64)
            .with("float_value", 2.25f32);

        let bytes = encode(&pool, desc, &message).unwrap();
        let decoded = decode(&pool, desc, &bytes).unwrap();
        assert_eq!(decoded, message.normalized(&pool, desc).unwrap());
    }

    #[test]
    fn test_packed_and_unpacked_both_decode() {
        let pool = pool();
        let desc = echo(&pool);
        let number = desc.field("int32_list").unwrap().number();

        // packed: one tag, length 3, values 1 2 3
        let mut packed = Vec::new();
        encode_tag(number, WireType::LengthDelimited, &mut packed);
        packed.extend_from_slice(&[0x03, 0x01, 0x02, 0x03]);
        // unpacked: one tag per element
        let mut unpacked = Vec::new();
        for value in 1..=3u8 {
            encode_tag(number, WireType::Varint, &mut unpacked);
            unpacked.push(value);
        }

        let expected = Value::List(vec![Value::I32(1), Value::I32(2), Value::I32(3)]);
        for bytes in [packed.clone(), unpacked] {
            let decoded = decode(&pool, desc, &bytes).unwrap();
            assert_eq!(decoded.get("int32_list"), Some(&expected));
        }

        let encoded = encode(
            &pool,
            desc,
            &MessageValue::new().with("int32_list", expected.clone()),
        )
        .unwrap();
        assert_eq!(encoded, packed);
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let pool = pool();
        let desc = pool.message("zitadel.action.v3alpha.Target").unwrap();
        let mut bytes = Vec::new();
        // field 999 varint, field 998 length-delimited, field 997 fixed32
        encode_tag(999, WireType::Varint, &mut bytes);
        encode_varint(42, &mut bytes);
        encode_tag(998, WireType::LengthDelimited, &mut bytes);
        encode_varint(2, &mut bytes);
        bytes.extend_from_slice(b"zz");
        encode_tag(997, WireType::Fixed32, &mut bytes);
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        bytes.extend_from_slice(b"\x0a\x02t1");

        let decoded = decode(&pool, desc, &bytes).unwrap();
        assert_eq!(decoded.get_str("target_id"), Some("t1"));
    }

    #[test]
    fn test_wrong_wire_type_is_skipped() {
        let pool = pool();
        let desc = pool.message("zitadel.action.v3alpha.Target").unwrap();
        // target_id (string) sent as varint
        let decoded = decode(&pool, desc, &[0x08, 0x05]).unwrap();
        assert_eq!(decoded.get_str("target_id"), Some(""));
    }

    #[test]
    fn test_oneof_last_wins_on_decode() {
        let pool = pool();
        let desc = pool.message("zitadel.action.v3alpha.Target").unwrap();
        let webhook = desc.field("rest_webhook").unwrap().number();
        let call = desc.field("rest_call").unwrap().number();

        let mut bytes = Vec::new();
        write_length_delimited(webhook, &[0x08, 0x01], &mut bytes);
        write_length_delimited(call, &[], &mut bytes);

        let decoded = decode(&pool, desc, &bytes).unwrap();
        assert!(!decoded.contains("rest_webhook"));
        assert!(decoded.contains("rest_call"));
    }

    #[test]
    fn test_embedded_messages_merge() {
        let pool = pool();
        let desc = pool.message("zitadel.action.v3alpha.Target").unwrap();
        let details = desc.field("details").unwrap().number();

        let mut bytes = Vec::new();
        // details { sequence: 5 } then details { resource_owner: "o" }
        write_length_delimited(details, &[0x08, 0x05], &mut bytes);
        write_length_delimited(details, &[0x1a, 0x01, b'o'], &mut bytes);

        let decoded = decode(&pool, desc, &bytes).unwrap();
        let merged = decoded.get_message("details").unwrap();
        assert_eq!(merged.get("sequence"), Some(&Value::U64(5)));
        assert_eq!(merged.get_str("resource_owner"), Some("o"));
    }

    #[test]
    fn test_repeated_messages_roundtrip() {
        let pool = pool();
        let desc = pool
            .message("zitadel.action.v3alpha.ListTargetsRequest")
            .unwrap();
        let request = MessageValue::new()
            .with(
                "query",
                MessageValue::new().with("offset", 10u64).with("limit", 5u32),
            )
            .with("sorting_column", Value::Enum(4))
            .with(
                "queries",
                vec![Value::Message(MessageValue::new().with(
                    "in_target_ids_query",
                    MessageValue::new().with(
                        "target_ids",
                        vec![Value::from("a"), Value::from("b")],
                    ),
                ))],
            );

        let bytes = encode(&pool, desc, &request).unwrap();
        let decoded = decode(&pool, desc, &bytes).unwrap();
        assert_eq!(decoded, request.normalized(&pool, desc).unwrap());
    }

    #[test]
    fn test_map_roundtrip_and_order() {
        let pool = pool();
        let desc = echo(&pool);
        let mut labels = BTreeMap::new();
        labels.insert(MapKey::from("b"), Value::from("2"));
        labels.insert(MapKey::from("a"), Value::from("1"));
        let message = MessageValue::new().with("labels", labels);

        let bytes = encode(&pool, desc, &message).unwrap();
        let decoded = decode(&pool, desc, &bytes).unwrap();
        assert_eq!(decoded, message.normalized(&pool, desc).unwrap());
    }

    #[test]
    fn test_map_entry_missing_value_gets_default() {
        let pool = pool();
        let desc = echo(&pool);
        let number = desc.field("labels").unwrap().number();
        let mut bytes = Vec::new();
        write_length_delimited(number, &[0x0a, 0x01, b'k'], &mut bytes);

        let decoded = decode(&pool, desc, &bytes).unwrap();
        let labels = decoded.get("labels").and_then(Value::as_map).unwrap();
        assert_eq!(labels.get(&MapKey::from("k")), Some(&Value::from("")));

        let number = desc.field("children").unwrap().number();
        let mut bytes = Vec::new();
        write_length_delimited(number, &[0x08, 0x07], &mut bytes);

        let decoded = decode(&pool, desc, &bytes).unwrap();
        let children = decoded.get("children").and_then(Value::as_map).unwrap();
        assert_eq!(
            children.get(&MapKey::I64(7)),
            Some(&Value::Message(MessageValue::with_defaults(desc)))
        );
    }

    #[test]
    fn test_unknown_enum_number_preserved() {
        let pool = pool();
        let desc = echo(&pool);
        let message = MessageValue::new().with("status", Value::Enum(77));
        let bytes = encode(&pool, desc, &message).unwrap();
        let decoded = decode(&pool, desc, &bytes).unwrap();
        assert_eq!(decoded.get("status"), Some(&Value::Enum(77)));
    }

    #[test]
    fn test_truncated_input_is_malformed() {
        let pool = pool();
        let desc = pool.message("zitadel.action.v3alpha.Target").unwrap();
        // target_id claims 5 bytes, only 2 follow
        let result = decode(&pool, desc, &[0x0a, 0x05, b't', b'1']);
        assert!(matches!(result, Err(ZrpcError::MalformedWireData(_))));

        let result = decode(&pool, desc, &[0x0a]);
        assert!(matches!(result, Err(ZrpcError::MalformedWireData(_))));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let pool = pool();
        let desc = pool.message("zitadel.action.v3alpha.Target").unwrap();
        let result = decode(&pool, desc, &[0x0a, 0x02, 0xff, 0xfe]);
        assert!(matches!(result, Err(ZrpcError::MalformedWireData(_))));
    }

    #[test]
    fn test_group_wire_type_is_malformed() {
        let pool = pool();
        let desc = pool.message("zitadel.action.v3alpha.Target").unwrap();
        assert!(decode(&pool, desc, &[0x0b, 0x0c]).is_err());
    }

    #[test]
    fn test_recursion_limit() {
        let mut pool = DescriptorPool::new();
        let desc = pool
            .add_message(
                MessageDescriptor::builder("test.Node")
                    .field(FieldDescriptor::message(1, "child", "test.Node"))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        fn nested(levels: usize) -> Vec<u8> {
            let mut bytes = Vec::new();
            for _ in 0..levels {
                let mut outer = Vec::new();
                write_length_delimited(1, &bytes, &mut outer);
                bytes = outer;
            }
            bytes
        }

        assert!(decode(&pool, &desc, &nested(100)).is_ok());
        assert!(matches!(
            decode(&pool, &desc, &nested(101)),
            Err(ZrpcError::MalformedWireData(_))
        ));
    }

    #[test]
    fn test_type_mismatch_is_schema_violation() {
        let pool = pool();
        let desc = echo(&pool);
        let message = MessageValue::new().with("int64_value", "not a number");
        assert!(matches!(
            encode(&pool, desc, &message),
            Err(ZrpcError::SchemaViolation(_))
        ));

        let message = MessageValue::new().with("int32_value", i64::MAX);
        assert!(encode(&pool, desc, &message).is_err());
    }

    #[test]
    fn test_merge_appends_repeated() {
        let pool = pool();
        let desc = echo(&pool);
        let first = encode(
            &pool,
            desc,
            &MessageValue::new().with("string_list", vec![Value::from("a")]),
        )
        .unwrap();
        let second = encode(
            &pool,
            desc,
            &MessageValue::new().with("string_list", vec![Value::from("b")]),
        )
        .unwrap();

        let mut target = decode(&pool, desc, &first).unwrap();
        merge(&pool, desc, &mut target, &second).unwrap();
        assert_eq!(
            target.get("string_list"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );
    }
}

//! Lossless conversions from [`Value`] to the field's declared scalar type.
//!
//! Both codecs accept any integer variant whose value fits the target type,
//! so callers may write `Value::I32(5)` into an `int64` field.

use crate::protocol::error::ZrpcError;
use crate::protocol::value::Value;

pub(crate) fn int32(field: &str, value: &Value) -> Result<i32, ZrpcError> {
    integer(value)
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| mismatch(field, "int32", value))
}

pub(crate) fn int64(field: &str, value: &Value) -> Result<i64, ZrpcError> {
    integer(value)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| mismatch(field, "int64", value))
}

pub(crate) fn uint32(field: &str, value: &Value) -> Result<u32, ZrpcError> {
    integer(value)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| mismatch(field, "uint32", value))
}

pub(crate) fn uint64(field: &str, value: &Value) -> Result<u64, ZrpcError> {
    integer(value)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| mismatch(field, "uint64", value))
}

pub(crate) fn enum_number(field: &str, value: &Value) -> Result<i32, ZrpcError> {
    match value {
        Value::Enum(number) | Value::I32(number) => Ok(*number),
        other => Err(mismatch(field, "enum", other)),
    }
}

pub(crate) fn mismatch(field: &str, expected: &str, value: &Value) -> ZrpcError {
    ZrpcError::SchemaViolation(format!(
        "field `{}` expects {}, got {}",
        field,
        expected,
        value.type_name()
    ))
}

/// Integer variants only; enums are not integers here.
fn integer(value: &Value) -> Option<&Value> {
    match value {
        Value::I32(_) | Value::I64(_) | Value::U32(_) | Value::U64(_) => Some(value),
        _ => None,
    }
}

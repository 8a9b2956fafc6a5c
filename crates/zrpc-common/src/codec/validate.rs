//! Client-side request validation.
//!
//! Runs before a request is encoded. Value/type mismatches are always
//! rejected. Strict mode additionally rejects field names the descriptor does
//! not declare and oneof groups with more than one member set; lenient mode
//! lets the encoder drop unknown names and the peer's decoder resolve oneof
//! conflicts (last member on the wire wins).

use super::convert::{enum_number, int32, int64, uint32, uint64};
use crate::protocol::descriptor::{FieldDescriptor, FieldKind, MessageDescriptor, ScalarType};
use crate::protocol::error::{Result, ZrpcError};
use crate::protocol::pool::DescriptorPool;
use crate::protocol::value::{MessageValue, Value};

/// Checks `value` against `desc`.
///
/// # Errors
///
/// [`ZrpcError::InvalidRequest`] naming the offending field.
pub fn check(pool: &DescriptorPool, desc: &MessageDescriptor, value: &MessageValue, strict: bool) -> Result<()> {
    check_message(pool, desc, value, strict, true)
}

fn invalid(msg: impl Into<String>) -> ZrpcError {
    ZrpcError::InvalidRequest(msg.into())
}

fn check_message(
    pool: &DescriptorPool,
    desc: &MessageDescriptor,
    value: &MessageValue,
    strict: bool,
    top_level: bool,
) -> Result<()> {
    for (name, field_value) in value.iter() {
        let field = match desc.field(name) {
            Some(field) if field.name() == name => field,
            _ => {
                if strict && top_level {
                    return Err(invalid(format!(
                        "{} has no field `{}`",
                        desc.full_name(),
                        name
                    )));
                }
                continue;
            }
        };
        check_field(pool, field, field_value, strict)?;
    }

    if strict {
        for oneof in desc.oneofs() {
            let set: Vec<&str> = oneof
                .fields()
                .iter()
                .map(String::as_str)
                .filter(|member| value.contains(member))
                .collect();
            if set.len() > 1 {
                return Err(invalid(format!(
                    "{}: oneof `{}` has several members set: {}",
                    desc.full_name(),
                    oneof.name(),
                    set.join(", ")
                )));
            }
        }
    }
    Ok(())
}

fn check_field(pool: &DescriptorPool, field: &FieldDescriptor, value: &Value, strict: bool) -> Result<()> {
    match field.kind() {
        FieldKind::Map {
            key: key_type,
            value: value_kind,
        } => {
            let Value::Map(entries) = value else {
                return Err(type_error(field.name(), "map", value));
            };
            for (key, entry) in entries {
                check_scalar(field.name(), *key_type, &key.clone().into_value())?;
                check_element(pool, field.name(), value_kind, entry, strict)?;
            }
            Ok(())
        }
        kind if field.is_list() => {
            let Value::List(items) = value else {
                return Err(type_error(field.name(), "list", value));
            };
            items
                .iter()
                .try_for_each(|item| check_element(pool, field.name(), kind, item, strict))
        }
        kind => check_element(pool, field.name(), kind, value, strict),
    }
}

fn check_element(
    pool: &DescriptorPool,
    field: &str,
    kind: &FieldKind,
    value: &Value,
    strict: bool,
) -> Result<()> {
    match kind {
        FieldKind::Scalar(scalar) => check_scalar(field, *scalar, value),
        FieldKind::Enum(_) => enum_number(field, value)
            .map(|_| ())
            .map_err(|err| invalid(err.to_string())),
        FieldKind::Message(type_name) => {
            let Value::Message(message) = value else {
                return Err(type_error(field, "message", value));
            };
            let nested = pool.message(type_name)?;
            check_message(pool, nested, message, strict, false)
        }
        FieldKind::Map { .. } => Err(invalid(format!("field `{}`: nested map", field))),
    }
}

fn check_scalar(field: &str, scalar: ScalarType, value: &Value) -> Result<()> {
    let fits = match scalar {
        ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => {
            int32(field, value).is_ok()
        }
        ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => {
            int64(field, value).is_ok()
        }
        ScalarType::Uint32 | ScalarType::Fixed32 => uint32(field, value).is_ok(),
        ScalarType::Uint64 | ScalarType::Fixed64 => uint64(field, value).is_ok(),
        ScalarType::Bool => matches!(value, Value::Bool(_)),
        ScalarType::String => matches!(value, Value::String(_)),
        ScalarType::Bytes => matches!(value, Value::Bytes(_)),
        ScalarType::Double => matches!(value, Value::F64(_) | Value::F32(_)),
        ScalarType::Float => match value {
            Value::F32(_) => true,
            Value::F64(v) => v.is_nan() || f64::from(*v as f32) == *v,
            _ => false,
        },
    };
    if fits {
        Ok(())
    } else {
        Err(type_error(field, scalar.name(), value))
    }
}

fn type_error(field: &str, expected: &str, value: &Value) -> ZrpcError {
    invalid(format!(
        "field `{}` expects {}, got {}",
        field,
        expected,
        value.type_name()
    ))
}

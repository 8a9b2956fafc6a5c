//! Canonical JSON mapping.
//!
//! # Output
//!
//! - field names in lowerCamelCase
//! - implicit-presence fields at their default, empty lists and empty maps
//!   are omitted
//! - 64-bit integers as strings, other integers as numbers
//! - enums by name; numbers the schema does not know stay numbers
//! - bytes as standard padded base64
//! - `Timestamp` as RFC 3339, `Duration` as `"1.5s"`
//!
//! # Input
//!
//! Input is more lenient: proto names are accepted next to JSON names,
//! unknown keys are ignored, `null` means absent, integers may be quoted,
//! bytes may be URL-safe or unpadded base64, enums may be numbers.

use std::collections::{BTreeMap, HashMap};

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde_json::{Map, Number, Value as JsonValue};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::convert::{enum_number, int32, int64, mismatch, uint32, uint64};
use super::wire::RECURSION_LIMIT;
use crate::catalog::wkt;
use crate::protocol::descriptor::{FieldDescriptor, FieldKind, MessageDescriptor, ScalarType};
use crate::protocol::error::{Result, ZrpcError};
use crate::protocol::pool::DescriptorPool;
use crate::protocol::value::{MapKey, MessageValue, Value};

/// 0001-01-01T00:00:00Z
const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;
/// 9999-12-31T23:59:59Z
const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;
/// ±10000 years
const MAX_DURATION_SECONDS: i64 = 315_576_000_000;
const NANOS_PER_SECOND: i32 = 1_000_000_000;

/// Renders `value` as canonical JSON.
pub fn to_json(pool: &DescriptorPool, desc: &MessageDescriptor, value: &MessageValue) -> Result<JsonValue> {
    message_to_json(pool, desc, value, 0)
}

/// Parses canonical (or lenient) JSON into a message value.
///
/// # Errors
///
/// [`ZrpcError::SchemaViolation`] when the JSON does not fit the schema,
/// including two members of one oneof set at once.
pub fn from_json(pool: &DescriptorPool, desc: &MessageDescriptor, json: &JsonValue) -> Result<MessageValue> {
    message_from_json(pool, desc, json, 0)
}

fn violation(msg: impl Into<String>) -> ZrpcError {
    ZrpcError::SchemaViolation(msg.into())
}

fn message_to_json(
    pool: &DescriptorPool,
    desc: &MessageDescriptor,
    value: &MessageValue,
    depth: usize,
) -> Result<JsonValue> {
    if depth > RECURSION_LIMIT {
        return Err(violation(format!(
            "{} nests deeper than {} levels",
            desc.full_name(),
            RECURSION_LIMIT
        )));
    }

    match desc.full_name() {
        wkt::TIMESTAMP => {
            let (seconds, nanos) = seconds_and_nanos(value)?;
            return format_timestamp(seconds, nanos).map(JsonValue::String);
        }
        wkt::DURATION => {
            let (seconds, nanos) = seconds_and_nanos(value)?;
            return format_duration(seconds, nanos).map(JsonValue::String);
        }
        _ => {}
    }

    let mut object = Map::new();
    for field in desc.fields() {
        let Some(field_value) = value.get(field.name()) else {
            continue;
        };

        let json = match field.kind() {
            FieldKind::Map {
                value: value_kind, ..
            } => {
                let Value::Map(entries) = field_value else {
                    return Err(mismatch(field.name(), "map", field_value));
                };
                if entries.is_empty() {
                    continue;
                }
                let mut map = Map::new();
                for (key, entry) in entries {
                    map.insert(
                        key.to_string(),
                        element_to_json(pool, field.name(), value_kind, entry, depth)?,
                    );
                }
                JsonValue::Object(map)
            }
            kind if field.is_list() => {
                let Value::List(items) = field_value else {
                    return Err(mismatch(field.name(), "list", field_value));
                };
                if items.is_empty() {
                    continue;
                }
                items
                    .iter()
                    .map(|item| element_to_json(pool, field.name(), kind, item, depth))
                    .collect::<Result<Vec<_>>>()
                    .map(JsonValue::Array)?
            }
            kind => {
                if !field.has_explicit_presence() && field_value.is_default() {
                    continue;
                }
                element_to_json(pool, field.name(), kind, field_value, depth)?
            }
        };
        object.insert(field.json_name().to_string(), json);
    }
    Ok(JsonValue::Object(object))
}

fn element_to_json(
    pool: &DescriptorPool,
    field: &str,
    kind: &FieldKind,
    value: &Value,
    depth: usize,
) -> Result<JsonValue> {
    match kind {
        FieldKind::Scalar(scalar) => scalar_to_json(field, *scalar, value),
        FieldKind::Enum(type_name) => {
            let number = enum_number(field, value)?;
            let enumeration = pool.enumeration(type_name)?;
            Ok(match enumeration.name_of(number) {
                Some(name) => JsonValue::String(name.to_string()),
                None => JsonValue::from(number),
            })
        }
        FieldKind::Message(type_name) => {
            let Value::Message(message) = value else {
                return Err(mismatch(field, "message", value));
            };
            message_to_json(pool, pool.message(type_name)?, message, depth + 1)
        }
        FieldKind::Map { .. } => Err(violation(format!(
            "field `{}`: map values cannot be maps",
            field
        ))),
    }
}

fn scalar_to_json(field: &str, scalar: ScalarType, value: &Value) -> Result<JsonValue> {
    let json = match scalar {
        ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => {
            JsonValue::from(int32(field, value)?)
        }
        ScalarType::Uint32 | ScalarType::Fixed32 => JsonValue::from(uint32(field, value)?),
        ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => {
            JsonValue::String(int64(field, value)?.to_string())
        }
        ScalarType::Uint64 | ScalarType::Fixed64 => {
            JsonValue::String(uint64(field, value)?.to_string())
        }
        ScalarType::Bool => match value {
            Value::Bool(v) => JsonValue::Bool(*v),
            other => return Err(mismatch(field, "bool", other)),
        },
        ScalarType::String => match value {
            Value::String(v) => JsonValue::String(v.clone()),
            other => return Err(mismatch(field, "string", other)),
        },
        ScalarType::Bytes => match value {
            Value::Bytes(v) => JsonValue::String(STANDARD.encode(v)),
            other => return Err(mismatch(field, "bytes", other)),
        },
        ScalarType::Double => match value {
            Value::F64(v) => float_to_json(*v),
            Value::F32(v) => float_to_json(f64::from(*v)),
            other => return Err(mismatch(field, "double", other)),
        },
        ScalarType::Float => match value {
            // shortest f32 representation, not the widened f64 digits
            Value::F32(v) => match v.to_string().parse::<f64>() {
                Ok(shortest) if v.is_finite() => float_to_json(shortest),
                _ => float_to_json(f64::from(*v)),
            },
            Value::F64(v) => float_to_json(*v),
            other => return Err(mismatch(field, "float", other)),
        },
    };
    Ok(json)
}

fn float_to_json(value: f64) -> JsonValue {
    if value.is_nan() {
        JsonValue::String("NaN".to_string())
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        JsonValue::String(text.to_string())
    } else {
        Number::from_f64(value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

fn message_from_json(
    pool: &DescriptorPool,
    desc: &MessageDescriptor,
    json: &JsonValue,
    depth: usize,
) -> Result<MessageValue> {
    if depth > RECURSION_LIMIT {
        return Err(violation(format!(
            "{} nests deeper than {} levels",
            desc.full_name(),
            RECURSION_LIMIT
        )));
    }

    if let JsonValue::String(text) = json {
        let (seconds, nanos) = match desc.full_name() {
            wkt::TIMESTAMP => parse_timestamp(text)?,
            wkt::DURATION => parse_duration(text)?,
            other => {
                return Err(violation(format!(
                    "{} expects a JSON object, got a string",
                    other
                )))
            }
        };
        let mut message = MessageValue::with_defaults(desc);
        message.set("seconds", seconds);
        message.set("nanos", nanos);
        return Ok(message);
    }

    let JsonValue::Object(object) = json else {
        return Err(violation(format!(
            "{} expects a JSON object, got {}",
            desc.full_name(),
            json_type(json)
        )));
    };

    let mut message = MessageValue::with_defaults(desc);
    let mut oneofs: HashMap<&str, &str> = HashMap::new();

    for (key, item) in object {
        let Some(field) = desc.field(key) else {
            continue;
        };
        if item.is_null() {
            continue;
        }
        if let Some(oneof) = field.oneof() {
            if let Some(previous) = oneofs.insert(oneof, field.name()) {
                if previous != field.name() {
                    return Err(violation(format!(
                        "oneof `{}` has both `{}` and `{}` set",
                        oneof,
                        previous,
                        field.name()
                    )));
                }
            }
        }
        let value = field_from_json(pool, field, item, depth)?;
        message.set(field.name(), value);
    }
    Ok(message)
}

fn field_from_json(
    pool: &DescriptorPool,
    field: &FieldDescriptor,
    json: &JsonValue,
    depth: usize,
) -> Result<Value> {
    match field.kind() {
        FieldKind::Map {
            key: key_type,
            value: value_kind,
        } => {
            let JsonValue::Object(object) = json else {
                return Err(violation(format!(
                    "field `{}` expects a JSON object, got {}",
                    field.name(),
                    json_type(json)
                )));
            };
            let mut entries = BTreeMap::new();
            for (key, item) in object {
                let key = map_key_from_json(field.name(), *key_type, key)?;
                let value = element_from_json(pool, field.name(), value_kind, item, depth)?;
                entries.insert(key, value);
            }
            Ok(Value::Map(entries))
        }
        kind if field.is_list() => {
            let JsonValue::Array(items) = json else {
                return Err(violation(format!(
                    "field `{}` expects a JSON array, got {}",
                    field.name(),
                    json_type(json)
                )));
            };
            items
                .iter()
                .map(|item| element_from_json(pool, field.name(), kind, item, depth))
                .collect::<Result<Vec<_>>>()
                .map(Value::List)
        }
        kind => element_from_json(pool, field.name(), kind, json, depth),
    }
}

fn element_from_json(
    pool: &DescriptorPool,
    field: &str,
    kind: &FieldKind,
    json: &JsonValue,
    depth: usize,
) -> Result<Value> {
    match kind {
        FieldKind::Scalar(scalar) => scalar_from_json(field, *scalar, json),
        FieldKind::Enum(type_name) => {
            let enumeration = pool.enumeration(type_name)?;
            match json {
                JsonValue::String(name) => enumeration
                    .number_of(name)
                    .map(Value::Enum)
                    .ok_or_else(|| {
                        violation(format!(
                            "field `{}`: unknown {} value `{}`",
                            field,
                            enumeration.full_name(),
                            name
                        ))
                    }),
                JsonValue::Number(_) => {
                    let number = integer_from_json(field, json)?;
                    i32::try_from(number).map(Value::Enum).map_err(|_| {
                        violation(format!("field `{}`: enum number {} out of range", field, number))
                    })
                }
                other => Err(violation(format!(
                    "field `{}` expects an enum name or number, got {}",
                    field,
                    json_type(other)
                ))),
            }
        }
        FieldKind::Message(type_name) => {
            let nested = pool.message(type_name)?;
            message_from_json(pool, nested, json, depth + 1).map(Value::Message)
        }
        FieldKind::Map { .. } => Err(violation(format!(
            "field `{}`: map values cannot be maps",
            field
        ))),
    }
}

fn scalar_from_json(field: &str, scalar: ScalarType, json: &JsonValue) -> Result<Value> {
    let out_of_range = |number: i128| {
        violation(format!(
            "field `{}`: {} is out of range for {}",
            field, number, scalar
        ))
    };

    let value = match scalar {
        ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => {
            let number = integer_from_json(field, json)?;
            Value::I32(i32::try_from(number).map_err(|_| out_of_range(number))?)
        }
        ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => {
            let number = integer_from_json(field, json)?;
            Value::I64(i64::try_from(number).map_err(|_| out_of_range(number))?)
        }
        ScalarType::Uint32 | ScalarType::Fixed32 => {
            let number = integer_from_json(field, json)?;
            Value::U32(u32::try_from(number).map_err(|_| out_of_range(number))?)
        }
        ScalarType::Uint64 | ScalarType::Fixed64 => {
            let number = integer_from_json(field, json)?;
            Value::U64(u64::try_from(number).map_err(|_| out_of_range(number))?)
        }
        ScalarType::Bool => match json {
            JsonValue::Bool(v) => Value::Bool(*v),
            other => {
                return Err(violation(format!(
                    "field `{}` expects a boolean, got {}",
                    field,
                    json_type(other)
                )))
            }
        },
        ScalarType::String => match json {
            JsonValue::String(v) => Value::String(v.clone()),
            other => {
                return Err(violation(format!(
                    "field `{}` expects a string, got {}",
                    field,
                    json_type(other)
                )))
            }
        },
        ScalarType::Bytes => match json {
            JsonValue::String(text) => Value::Bytes(decode_base64(field, text)?),
            other => {
                return Err(violation(format!(
                    "field `{}` expects a base64 string, got {}",
                    field,
                    json_type(other)
                )))
            }
        },
        ScalarType::Double => Value::F64(float_from_json(field, json)?),
        ScalarType::Float => {
            let value = float_from_json(field, json)?;
            if value.is_finite() && value.abs() > f64::from(f32::MAX) {
                return Err(violation(format!(
                    "field `{}`: {} is out of range for float",
                    field, value
                )));
            }
            Value::F32(value as f32)
        }
    };
    Ok(value)
}

/// Integer from a JSON number or a quoted number; integral floats are accepted.
fn integer_from_json(field: &str, json: &JsonValue) -> Result<i128> {
    let not_integer = || {
        violation(format!(
            "field `{}` expects an integer, got {}",
            field,
            json
        ))
    };
    match json {
        JsonValue::Number(number) => {
            if let Some(v) = number.as_i64() {
                Ok(i128::from(v))
            } else if let Some(v) = number.as_u64() {
                Ok(i128::from(v))
            } else {
                number
                    .as_f64()
                    .filter(|v| v.fract() == 0.0 && v.abs() < 1.9e19)
                    .map(|v| v as i128)
                    .ok_or_else(not_integer)
            }
        }
        JsonValue::String(text) => {
            let text = text.trim();
            if let Ok(v) = text.parse::<i128>() {
                return Ok(v);
            }
            text.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() < 1.9e19)
                .map(|v| v as i128)
                .ok_or_else(not_integer)
        }
        _ => Err(not_integer()),
    }
}

fn float_from_json(field: &str, json: &JsonValue) -> Result<f64> {
    match json {
        JsonValue::Number(number) => number
            .as_f64()
            .ok_or_else(|| violation(format!("field `{}`: {} is not a float", field, number))),
        JsonValue::String(text) => match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| violation(format!("field `{}`: `{}` is not a float", field, other))),
        },
        other => Err(violation(format!(
            "field `{}` expects a number, got {}",
            field,
            json_type(other)
        ))),
    }
}

fn map_key_from_json(field: &str, key_type: ScalarType, key: &str) -> Result<MapKey> {
    if key_type == ScalarType::String {
        return Ok(MapKey::String(key.to_string()));
    }
    if key_type == ScalarType::Bool {
        return match key {
            "true" => Ok(MapKey::Bool(true)),
            "false" => Ok(MapKey::Bool(false)),
            other => Err(violation(format!(
                "field `{}`: map key `{}` is not a boolean",
                field, other
            ))),
        };
    }
    let value = scalar_from_json(field, key_type, &JsonValue::String(key.to_string()))?;
    MapKey::from_value(value)
        .ok_or_else(|| violation(format!("field `{}`: invalid map key `{}`", field, key)))
}

fn decode_base64(field: &str, text: &str) -> Result<Vec<u8>> {
    let trimmed = text.trim_end_matches('=');
    let decoded = if trimmed.contains(['-', '_']) {
        URL_SAFE_NO_PAD.decode(trimmed)
    } else {
        STANDARD_NO_PAD.decode(trimmed)
    };
    decoded.map_err(|err| violation(format!("field `{}`: invalid base64: {}", field, err)))
}

fn json_type(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

fn seconds_and_nanos(value: &MessageValue) -> Result<(i64, i32)> {
    let seconds = match value.get("seconds") {
        Some(v) => int64("seconds", v)?,
        None => 0,
    };
    let nanos = match value.get("nanos") {
        Some(v) => int32("nanos", v)?,
        None => 0,
    };
    Ok((seconds, nanos))
}

/// Fraction with 0, 3, 6 or 9 digits.
fn format_nanos(nanos: u32) -> String {
    if nanos == 0 {
        String::new()
    } else if nanos % 1_000_000 == 0 {
        format!(".{:03}", nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!(".{:06}", nanos / 1_000)
    } else {
        format!(".{:09}", nanos)
    }
}

fn format_timestamp(seconds: i64, nanos: i32) -> Result<String> {
    if !(MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&seconds) {
        return Err(violation(format!("timestamp seconds {} out of range", seconds)));
    }
    if !(0..NANOS_PER_SECOND).contains(&nanos) {
        return Err(violation(format!("timestamp nanos {} out of range", nanos)));
    }
    let datetime = OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|err| violation(format!("invalid timestamp: {}", err)))?;
    Ok(format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}Z",
        datetime.year(),
        u8::from(datetime.month()),
        datetime.day(),
        datetime.hour(),
        datetime.minute(),
        datetime.second(),
        format_nanos(nanos.unsigned_abs())
    ))
}

fn parse_timestamp(text: &str) -> Result<(i64, i32)> {
    let datetime = OffsetDateTime::parse(text, &Rfc3339)
        .map_err(|err| violation(format!("invalid RFC 3339 timestamp `{}`: {}", text, err)))?;
    let seconds = datetime.unix_timestamp();
    if !(MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&seconds) {
        return Err(violation(format!("timestamp `{}` out of range", text)));
    }
    Ok((seconds, datetime.nanosecond() as i32))
}

fn format_duration(seconds: i64, nanos: i32) -> Result<String> {
    if seconds.unsigned_abs() > MAX_DURATION_SECONDS.unsigned_abs()
        || nanos.unsigned_abs() >= NANOS_PER_SECOND.unsigned_abs()
    {
        return Err(violation(format!(
            "duration {}s {}ns out of range",
            seconds, nanos
        )));
    }
    if (seconds > 0 && nanos < 0) || (seconds < 0 && nanos > 0) {
        return Err(violation(format!(
            "duration {}s {}ns has mixed signs",
            seconds, nanos
        )));
    }
    let sign = if seconds < 0 || nanos < 0 { "-" } else { "" };
    Ok(format!(
        "{}{}{}s",
        sign,
        seconds.unsigned_abs(),
        format_nanos(nanos.unsigned_abs())
    ))
}

fn parse_duration(text: &str) -> Result<(i64, i32)> {
    let invalid = || violation(format!("invalid duration `{}`", text));

    let body = text.strip_suffix('s').ok_or_else(invalid)?;
    let (negative, body) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    let (whole, fraction) = body.split_once('.').unwrap_or((body, ""));
    let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty())
        || !digits(whole)
        || !digits(fraction)
        || fraction.len() > 9
    {
        return Err(invalid());
    }

    let seconds: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let nanos: i32 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<9}", fraction).parse().map_err(|_| invalid())?
    };
    if seconds > MAX_DURATION_SECONDS {
        return Err(violation(format!("duration `{}` out of range", text)));
    }

    Ok(if negative {
        (-seconds, -nanos)
    } else {
        (seconds, nanos)
    })
}

//! Dynamic message values.
//!
//! A [`MessageValue`] is what the codecs produce and consume: an ordered map
//! from proto field name to [`Value`]. Absent fields are simply not in the map.

use std::collections::BTreeMap;
use std::fmt;

use super::descriptor::{FieldDescriptor, FieldKind, Label, MessageDescriptor, ScalarType};
use super::error::Result;
use super::pool::DescriptorPool;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Enum number; numbers unknown to the schema are kept as-is
    Enum(i32),
    Message(MessageValue),
    List(Vec<Value>),
    Map(BTreeMap<MapKey, Value>),
}

/// Map key; floats and bytes cannot be keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl Value {
    /// Zero value of a scalar type.
    pub fn default_scalar(scalar: ScalarType) -> Value {
        match scalar {
            ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => Value::I32(0),
            ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => Value::I64(0),
            ScalarType::Uint32 | ScalarType::Fixed32 => Value::U32(0),
            ScalarType::Uint64 | ScalarType::Fixed64 => Value::U64(0),
            ScalarType::Bool => Value::Bool(false),
            ScalarType::String => Value::String(String::new()),
            ScalarType::Bytes => Value::Bytes(Vec::new()),
            ScalarType::Double => Value::F64(0.0),
            ScalarType::Float => Value::F32(0.0),
        }
    }

    /// Zero value of a single element of `kind`, as decoding produces it.
    ///
    /// Used for map entries whose value is missing on the wire. A message
    /// value becomes an empty message with its own defaults filled in.
    pub fn default_for(pool: &DescriptorPool, kind: &FieldKind) -> Result<Value> {
        Ok(match kind {
            FieldKind::Scalar(scalar) => Value::default_scalar(*scalar),
            FieldKind::Enum(_) => Value::Enum(0),
            FieldKind::Message(type_name) => {
                Value::Message(MessageValue::with_defaults(pool.message(type_name)?))
            }
            FieldKind::Map { .. } => Value::Map(BTreeMap::new()),
        })
    }

    /// Whether this is the zero value of its type.
    pub fn is_default(&self) -> bool {
        match self {
            Value::Bool(v) => !v,
            Value::I32(v) => *v == 0,
            Value::I64(v) => *v == 0,
            Value::U32(v) => *v == 0,
            Value::U64(v) => *v == 0,
            // -0.0 is not the default: its bit pattern differs
            Value::F32(v) => v.to_bits() == 0,
            Value::F64(v) => v.to_bits() == 0,
            Value::String(v) => v.is_empty(),
            Value::Bytes(v) => v.is_empty(),
            Value::Enum(v) => *v == 0,
            Value::Message(_) => false,
            Value::List(v) => v.is_empty(),
            Value::Map(v) => v.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::Message(_) => "message",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Signed view of any integer value that fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(v) => Some(i64::from(*v)),
            Value::I64(v) => Some(*v),
            Value::U32(v) => Some(i64::from(*v)),
            Value::U64(v) => i64::try_from(*v).ok(),
            Value::Enum(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Unsigned view of any non-negative integer value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::I32(v) => u64::try_from(*v).ok(),
            Value::I64(v) => u64::try_from(*v).ok(),
            Value::U32(v) => Some(u64::from(*v)),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<i32> {
        match self {
            Value::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessageValue> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, Value>> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<MessageValue> for Value {
    fn from(v: MessageValue) -> Self {
        Value::Message(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<MapKey, Value>> for Value {
    fn from(v: BTreeMap<MapKey, Value>) -> Self {
        Value::Map(v)
    }
}

impl MapKey {
    pub fn default_for(scalar: ScalarType) -> MapKey {
        match scalar {
            ScalarType::Bool => MapKey::Bool(false),
            ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => MapKey::I32(0),
            ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => MapKey::I64(0),
            ScalarType::Uint32 | ScalarType::Fixed32 => MapKey::U32(0),
            ScalarType::Uint64 | ScalarType::Fixed64 => MapKey::U64(0),
            _ => MapKey::String(String::new()),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            MapKey::Bool(v) => Value::Bool(v),
            MapKey::I32(v) => Value::I32(v),
            MapKey::I64(v) => Value::I64(v),
            MapKey::U32(v) => Value::U32(v),
            MapKey::U64(v) => Value::U64(v),
            MapKey::String(v) => Value::String(v),
        }
    }

    pub fn from_value(value: Value) -> Option<MapKey> {
        match value {
            Value::Bool(v) => Some(MapKey::Bool(v)),
            Value::I32(v) => Some(MapKey::I32(v)),
            Value::I64(v) => Some(MapKey::I64(v)),
            Value::U32(v) => Some(MapKey::U32(v)),
            Value::U64(v) => Some(MapKey::U64(v)),
            Value::String(v) => Some(MapKey::String(v)),
            _ => None,
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(v) => write!(f, "{}", v),
            MapKey::I32(v) => write!(f, "{}", v),
            MapKey::I64(v) => write!(f, "{}", v),
            MapKey::U32(v) => write!(f, "{}", v),
            MapKey::U64(v) => write!(f, "{}", v),
            MapKey::String(v) => f.write_str(v),
        }
    }
}

impl From<&str> for MapKey {
    fn from(v: &str) -> Self {
        MapKey::String(v.to_string())
    }
}

impl From<String> for MapKey {
    fn from(v: String) -> Self {
        MapKey::String(v)
    }
}

impl From<i32> for MapKey {
    fn from(v: i32) -> Self {
        MapKey::I32(v)
    }
}

impl From<i64> for MapKey {
    fn from(v: i64) -> Self {
        MapKey::I64(v)
    }
}

impl From<bool> for MapKey {
    fn from(v: bool) -> Self {
        MapKey::Bool(v)
    }
}

/// A message instance: field name → value, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageValue {
    fields: BTreeMap<String, Value>,
}

impl MessageValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value a decoder produces from an empty buffer.
    ///
    /// Implicit-presence scalars and enums hold zero, repeated fields an empty
    /// list, maps an empty map. Message, `optional` and oneof fields are absent.
    pub fn with_defaults(desc: &MessageDescriptor) -> Self {
        let mut message = MessageValue::new();
        message.fill_defaults(desc);
        message
    }

    fn fill_defaults(&mut self, desc: &MessageDescriptor) {
        for field in desc.fields() {
            if self.fields.contains_key(field.name()) {
                continue;
            }
            if let Some(default) = implicit_default(field) {
                self.fields.insert(field.name().to_string(), default);
            }
        }
    }

    /// Returns a copy with every implicit default filled in, recursively.
    ///
    /// Two values that encode to the same bytes compare equal once normalized.
    pub fn normalized(&self, pool: &DescriptorPool, desc: &MessageDescriptor) -> Result<Self> {
        let mut message = self.clone();
        message.normalize(pool, desc)?;
        Ok(message)
    }

    fn normalize(&mut self, pool: &DescriptorPool, desc: &MessageDescriptor) -> Result<()> {
        self.fill_defaults(desc);
        for field in desc.fields() {
            let element_type = match field.kind() {
                FieldKind::Message(name) => name,
                FieldKind::Map { value, .. } => match value.as_ref() {
                    FieldKind::Message(name) => name,
                    _ => continue,
                },
                _ => continue,
            };
            let Some(value) = self.fields.get_mut(field.name()) else {
                continue;
            };
            let nested = pool.message(element_type)?;
            match value {
                Value::Message(inner) => inner.normalize(pool, nested)?,
                Value::List(items) => {
                    for item in items {
                        if let Value::Message(inner) = item {
                            inner.normalize(pool, nested)?;
                        }
                    }
                }
                Value::Map(entries) => {
                    for entry in entries.values_mut() {
                        if let Value::Message(inner) = entry {
                            inner.normalize(pool, nested)?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Builder-style setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convenience accessors used by handlers.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_message(&self, name: &str) -> Option<&MessageValue> {
        self.get(name).and_then(Value::as_message)
    }

    pub(crate) fn entry(&mut self, name: &str) -> std::collections::btree_map::Entry<'_, String, Value> {
        self.fields.entry(name.to_string())
    }
}

impl FromIterator<(String, Value)> for MessageValue {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MessageValue {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Default a field takes when it is absent, or `None` for explicit presence.
pub(crate) fn implicit_default(field: &FieldDescriptor) -> Option<Value> {
    if field.is_map() {
        return Some(Value::Map(BTreeMap::new()));
    }
    if field.label() == Label::Repeated {
        return Some(Value::List(Vec::new()));
    }
    if field.has_explicit_presence() {
        return None;
    }
    match field.kind() {
        FieldKind::Scalar(scalar) => Some(Value::default_scalar(*scalar)),
        FieldKind::Enum(_) => Some(Value::Enum(0)),
        FieldKind::Message(_) | FieldKind::Map { .. } => None,
    }
}

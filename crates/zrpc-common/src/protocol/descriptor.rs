//! Schema Descriptors
//!
//! Descriptors describe message, enum and service shapes as plain immutable
//! data. The codec is a single generic implementation parameterized over these
//! descriptors instead of per-message generated code.
//!
//! Descriptors refer to each other by fully-qualified name (for example
//! `google.protobuf.Timestamp`). Names are resolved through a
//! [`DescriptorPool`](super::pool::DescriptorPool), which allows schemas with
//! forward and self references.
//!
//! # Example
//!
//! ```
//! use zrpc_common::protocol::{FieldDescriptor, MessageDescriptor, ScalarType};
//!
//! let webhook = MessageDescriptor::builder("zitadel.action.v3alpha.SetRESTWebhook")
//!     .field(FieldDescriptor::scalar(1, "interrupt_on_error", ScalarType::Bool))
//!     .build()
//!     .unwrap();
//!
//! let field = webhook.field("interruptOnError").unwrap();
//! assert_eq!(field.number(), 1);
//! assert_eq!(field.name(), "interrupt_on_error");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;

use super::error::{Result, ZrpcError};

/// Largest legal field number (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Field numbers reserved for the protobuf implementation itself.
pub const RESERVED_FIELD_NUMBERS: RangeInclusive<u32> = 19000..=19999;

/// Wire type carried in the low three bits of every tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    /// Parses the three wire-type bits of a tag.
    ///
    /// Only the four wire types used by proto3 are legal; the deprecated group
    /// markers (3, 4) and the unassigned values (6, 7) are malformed data.
    pub fn from_bits(bits: u64) -> Result<Self> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            3 | 4 => Err(ZrpcError::MalformedWireData(format!(
                "group wire type {} is not supported",
                bits
            ))),
            other => Err(ZrpcError::MalformedWireData(format!(
                "invalid wire type {}",
                other
            ))),
        }
    }

    pub fn bits(self) -> u64 {
        match self {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::LengthDelimited => 2,
            WireType::Fixed32 => 5,
        }
    }
}

/// Scalar value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Double,
    Float,
}

impl ScalarType {
    pub fn wire_type(self) -> WireType {
        match self {
            ScalarType::Int32
            | ScalarType::Int64
            | ScalarType::Uint32
            | ScalarType::Uint64
            | ScalarType::Sint32
            | ScalarType::Sint64
            | ScalarType::Bool => WireType::Varint,
            ScalarType::Fixed64 | ScalarType::Sfixed64 | ScalarType::Double => WireType::Fixed64,
            ScalarType::Fixed32 | ScalarType::Sfixed32 | ScalarType::Float => WireType::Fixed32,
            ScalarType::String | ScalarType::Bytes => WireType::LengthDelimited,
        }
    }

    /// Whether repeated values of this type may use packed encoding.
    pub fn is_packable(self) -> bool {
        !matches!(self, ScalarType::String | ScalarType::Bytes)
    }

    /// Whether this type may be used as a map key.
    pub fn is_valid_map_key(self) -> bool {
        !matches!(
            self,
            ScalarType::Double | ScalarType::Float | ScalarType::Bytes
        )
    }

    /// 64-bit integers are carried as strings in JSON.
    pub fn is_64_bit_integer(self) -> bool {
        matches!(
            self,
            ScalarType::Int64
                | ScalarType::Uint64
                | ScalarType::Sint64
                | ScalarType::Fixed64
                | ScalarType::Sfixed64
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
            ScalarType::Double => "double",
            ScalarType::Float => "float",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a field holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    /// Fully-qualified enum name
    Enum(String),
    /// Fully-qualified message name
    Message(String),
    /// `map<key, value>`; encoded as repeated entry messages (key = 1, value = 2)
    Map { key: ScalarType, value: Box<FieldKind> },
}

impl FieldKind {
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldKind::Scalar(scalar) => scalar.wire_type(),
            FieldKind::Enum(_) => WireType::Varint,
            FieldKind::Message(_) | FieldKind::Map { .. } => WireType::LengthDelimited,
        }
    }

    pub fn is_packable(&self) -> bool {
        match self {
            FieldKind::Scalar(scalar) => scalar.is_packable(),
            FieldKind::Enum(_) => true,
            FieldKind::Message(_) | FieldKind::Map { .. } => false,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar(scalar) => write!(f, "{}", scalar),
            FieldKind::Enum(name) | FieldKind::Message(name) => f.write_str(name),
            FieldKind::Map { key, value } => write!(f, "map<{}, {}>", key, value),
        }
    }
}

/// Field cardinality and presence discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// Implicit presence: the zero value means "absent" and is never encoded.
    Singular,
    /// Explicit presence (`optional`): encoded whenever set, even to zero.
    Optional,
    Repeated,
}

/// A single field of a message.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    number: u32,
    name: String,
    json_name: String,
    kind: FieldKind,
    label: Label,
    packed: bool,
    oneof: Option<String>,
}

impl FieldDescriptor {
    pub fn new(number: u32, name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let label = match kind {
            FieldKind::Map { .. } => Label::Repeated,
            _ => Label::Singular,
        };
        Self {
            number,
            json_name: to_lower_camel_case(&name),
            name,
            kind,
            label,
            packed: true,
            oneof: None,
        }
    }

    pub fn scalar(number: u32, name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(number, name, FieldKind::Scalar(scalar))
    }

    pub fn message(number: u32, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(number, name, FieldKind::Message(qualified(type_name.into())))
    }

    pub fn enumeration(number: u32, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(number, name, FieldKind::Enum(qualified(type_name.into())))
    }

    pub fn map(number: u32, name: impl Into<String>, key: ScalarType, value: FieldKind) -> Self {
        let value = match value {
            FieldKind::Enum(name) => FieldKind::Enum(qualified(name)),
            FieldKind::Message(name) => FieldKind::Message(qualified(name)),
            other => other,
        };
        Self::new(
            number,
            name,
            FieldKind::Map {
                key,
                value: Box::new(value),
            },
        )
    }

    pub fn repeated(mut self) -> Self {
        self.label = Label::Repeated;
        self
    }

    /// Marks the field as proto3 `optional` (explicit presence).
    pub fn optional(mut self) -> Self {
        self.label = Label::Optional;
        self
    }

    /// Opts a repeated numeric field out of packed encoding.
    pub fn unpacked(mut self) -> Self {
        self.packed = false;
        self
    }

    pub fn in_oneof(mut self, oneof: impl Into<String>) -> Self {
        self.oneof = Some(oneof.into());
        self
    }

    pub fn with_json_name(mut self, json_name: impl Into<String>) -> Self {
        self.json_name = json_name.into();
        self
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn oneof(&self) -> Option<&str> {
        self.oneof.as_deref()
    }

    pub fn is_map(&self) -> bool {
        matches!(self.kind, FieldKind::Map { .. })
    }

    pub fn is_list(&self) -> bool {
        self.label == Label::Repeated && !self.is_map()
    }

    pub fn is_packed(&self) -> bool {
        self.is_list() && self.packed && self.kind.is_packable()
    }

    /// Message fields, `optional` fields and oneof members track presence
    /// explicitly; every other singular field uses zero-means-absent.
    pub fn has_explicit_presence(&self) -> bool {
        match self.label {
            Label::Repeated => false,
            Label::Optional => true,
            Label::Singular => {
                self.oneof.is_some() || matches!(self.kind, FieldKind::Message(_))
            }
        }
    }

    /// Wire type this field is written with.
    pub fn wire_type(&self) -> WireType {
        if self.is_packed() || self.is_map() {
            WireType::LengthDelimited
        } else {
            self.kind.wire_type()
        }
    }
}

/// A named group of mutually exclusive fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneofDescriptor {
    name: String,
    fields: Vec<String>,
}

impl OneofDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Proto names of the member fields.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|member| member == field)
    }
}

/// Shape of a message type.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    full_name: String,
    /// Sorted by field number
    fields: Vec<FieldDescriptor>,
    oneofs: Vec<OneofDescriptor>,
    by_number: HashMap<u32, usize>,
    /// Both proto names and JSON names
    by_name: HashMap<String, usize>,
}

impl MessageDescriptor {
    pub fn builder(full_name: impl Into<String>) -> MessageBuilder {
        MessageBuilder {
            full_name: qualified(full_name.into()),
            fields: Vec::new(),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Unqualified name, e.g. `Target`.
    pub fn name(&self) -> &str {
        short_name(&self.full_name)
    }

    /// Package part of the full name, e.g. `zitadel.action.v3alpha`.
    pub fn package(&self) -> &str {
        package_of(&self.full_name)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|index| &self.fields[*index])
    }

    /// Looks a field up by proto name or JSON name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|index| &self.fields[*index])
    }

    pub fn oneofs(&self) -> &[OneofDescriptor] {
        &self.oneofs
    }

    pub fn oneof(&self, name: &str) -> Option<&OneofDescriptor> {
        self.oneofs.iter().find(|oneof| oneof.name == name)
    }
}

impl PartialEq for MessageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name && self.fields == other.fields
    }
}

/// Builder for [`MessageDescriptor`]; validation happens in [`build`](Self::build).
pub struct MessageBuilder {
    full_name: String,
    fields: Vec<FieldDescriptor>,
}

impl MessageBuilder {
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Validates the field set and freezes the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ZrpcError::InvalidDescriptor`] when:
    /// - a field number is 0, above 2^29-1 or inside 19000..=19999
    /// - two fields share a number, a proto name or a JSON name
    /// - a map key type is float, double or bytes, or a map value is a map
    /// - a repeated, map or `optional` field is declared inside a oneof
    pub fn build(self) -> Result<MessageDescriptor> {
        let full_name = self.full_name;
        if full_name.is_empty() {
            return Err(ZrpcError::InvalidDescriptor(
                "message name must not be empty".to_string(),
            ));
        }

        let invalid = |msg: String| ZrpcError::InvalidDescriptor(format!("{}: {}", full_name, msg));

        let mut fields = self.fields;
        fields.sort_by_key(|field| field.number);

        let mut by_number = HashMap::new();
        let mut by_name = HashMap::new();
        let mut json_names = HashMap::new();
        let mut oneofs: Vec<OneofDescriptor> = Vec::new();

        for (index, field) in fields.iter().enumerate() {
            if field.number == 0 || field.number > MAX_FIELD_NUMBER {
                return Err(invalid(format!(
                    "field `{}` has out-of-range number {}",
                    field.name, field.number
                )));
            }
            if RESERVED_FIELD_NUMBERS.contains(&field.number) {
                return Err(invalid(format!(
                    "field `{}` uses reserved number {}",
                    field.name, field.number
                )));
            }
            if field.name.is_empty() {
                return Err(invalid(format!("field {} has no name", field.number)));
            }
            if by_number.insert(field.number, index).is_some() {
                return Err(invalid(format!("duplicate field number {}", field.number)));
            }
            if by_name.insert(field.name.clone(), index).is_some() {
                return Err(invalid(format!("duplicate field name `{}`", field.name)));
            }
            if json_names.insert(field.json_name.clone(), index).is_some() {
                return Err(invalid(format!(
                    "duplicate JSON name `{}`",
                    field.json_name
                )));
            }

            if let FieldKind::Map { key, value } = &field.kind {
                if !key.is_valid_map_key() {
                    return Err(invalid(format!(
                        "map field `{}` has invalid key type {}",
                        field.name, key
                    )));
                }
                if matches!(**value, FieldKind::Map { .. }) {
                    return Err(invalid(format!(
                        "map field `{}` has a map as value type",
                        field.name
                    )));
                }
            }

            if let Some(oneof) = &field.oneof {
                if field.label != Label::Singular {
                    return Err(invalid(format!(
                        "oneof member `{}` must be a singular field",
                        field.name
                    )));
                }
                match oneofs.iter_mut().find(|group| &group.name == oneof) {
                    Some(group) => group.fields.push(field.name.clone()),
                    None => oneofs.push(OneofDescriptor {
                        name: oneof.clone(),
                        fields: vec![field.name.clone()],
                    }),
                }
            }
        }

        // JSON names resolve too, unless they shadow another field's proto name.
        for (json_name, index) in json_names {
            by_name.entry(json_name).or_insert(index);
        }

        Ok(MessageDescriptor {
            full_name,
            fields,
            oneofs,
            by_number,
            by_name,
        })
    }
}

/// A named enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

/// Bidirectional name ↔ number map of an enum type.
///
/// Numbers without a name are legal on the wire and in JSON: they are carried
/// through unchanged so that older peers tolerate newer schema values.
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    full_name: String,
    values: Vec<EnumValue>,
    by_name: HashMap<String, i32>,
    by_number: HashMap<i32, usize>,
}

impl EnumDescriptor {
    /// Sentinel name shown for numbers the schema does not know.
    pub const UNRECOGNIZED: &'static str = "UNRECOGNIZED";

    /// Builds an enum from `(name, number)` pairs.
    ///
    /// The first value must be zero. Several names may share a number
    /// (aliases); the first one is the canonical JSON name.
    pub fn new<'a>(
        full_name: impl Into<String>,
        values: impl IntoIterator<Item = (&'a str, i32)>,
    ) -> Result<Self> {
        let full_name = qualified(full_name.into());
        let values: Vec<EnumValue> = values
            .into_iter()
            .map(|(name, number)| EnumValue {
                name: name.to_string(),
                number,
            })
            .collect();

        match values.first() {
            None => {
                return Err(ZrpcError::InvalidDescriptor(format!(
                    "{}: enum has no values",
                    full_name
                )))
            }
            Some(first) if first.number != 0 => {
                return Err(ZrpcError::InvalidDescriptor(format!(
                    "{}: first enum value must be zero, got {} = {}",
                    full_name, first.name, first.number
                )))
            }
            Some(_) => {}
        }

        let mut by_name = HashMap::new();
        let mut by_number = HashMap::new();
        for (index, value) in values.iter().enumerate() {
            if by_name.insert(value.name.clone(), value.number).is_some() {
                return Err(ZrpcError::InvalidDescriptor(format!(
                    "{}: duplicate enum value name `{}`",
                    full_name, value.name
                )));
            }
            by_number.entry(value.number).or_insert(index);
        }

        Ok(Self {
            full_name,
            values,
            by_name,
            by_number,
        })
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        short_name(&self.full_name)
    }

    pub fn values(&self) -> &[EnumValue] {
        &self.values
    }

    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.by_number
            .get(&number)
            .map(|index| self.values[*index].name.as_str())
    }

    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).copied()
    }

    /// Like [`name_of`](Self::name_of) but falls back to `UNRECOGNIZED`.
    pub fn display_name(&self, number: i32) -> &str {
        self.name_of(number).unwrap_or(Self::UNRECOGNIZED)
    }
}

/// Call shape of an RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

/// A single RPC method of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    input_type: String,
    output_type: String,
    kind: MethodKind,
    path: String,
}

impl MethodDescriptor {
    pub fn unary(
        name: impl Into<String>,
        input_type: impl Into<String>,
        output_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input_type: qualified(input_type.into()),
            output_type: qualified(output_type.into()),
            kind: MethodKind::Unary,
            path: String::new(),
        }
    }

    pub fn with_kind(mut self, kind: MethodKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_type(&self) -> &str {
        &self.input_type
    }

    pub fn output_type(&self) -> &str {
        &self.output_type
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// `/<package>.<Service>/<Method>`, as consumed by transports.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A service: a named table of methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    full_name: String,
    methods: Vec<MethodDescriptor>,
    by_name: HashMap<String, usize>,
}

impl ServiceDescriptor {
    /// Starts a service declaration, e.g. `builder("zitadel.action.v3alpha", "ActionService")`.
    pub fn builder(package: impl Into<String>, name: impl Into<String>) -> ServiceBuilder {
        let package = package.into();
        let name = name.into();
        let full_name = if package.is_empty() {
            name
        } else {
            format!("{}.{}", package, name)
        };
        ServiceBuilder {
            full_name,
            methods: Vec::new(),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        short_name(&self.full_name)
    }

    pub fn package(&self) -> &str {
        package_of(&self.full_name)
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.by_name.get(name).map(|index| &self.methods[*index])
    }
}

pub struct ServiceBuilder {
    full_name: String,
    methods: Vec<MethodDescriptor>,
}

impl ServiceBuilder {
    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> Result<ServiceDescriptor> {
        let full_name = self.full_name;
        let mut methods = self.methods;
        let mut by_name = HashMap::new();

        for (index, method) in methods.iter_mut().enumerate() {
            if method.name.is_empty() {
                return Err(ZrpcError::InvalidDescriptor(format!(
                    "{}: method without a name",
                    full_name
                )));
            }
            if by_name.insert(method.name.clone(), index).is_some() {
                return Err(ZrpcError::InvalidDescriptor(format!(
                    "{}: duplicate method `{}`",
                    full_name, method.name
                )));
            }
            method.path = format!("/{}/{}", full_name, method.name);
        }

        Ok(ServiceDescriptor {
            full_name,
            methods,
            by_name,
        })
    }
}

/// Splits `/<package>.<Service>/<Method>` into service and method names.
pub fn split_method_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix('/')?;
    let (service, method) = rest.split_once('/')?;
    if service.is_empty() || method.is_empty() || method.contains('/') {
        return None;
    }
    Some((service, method))
}

/// Converts a proto field name to its lowerCamelCase JSON name.
pub fn to_lower_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn qualified(name: String) -> String {
    match name.strip_prefix('.') {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

fn short_name(full_name: &str) -> &str {
    full_name.rsplit('.').next().unwrap_or(full_name)
}

fn package_of(full_name: &str) -> &str {
    full_name.rsplit_once('.').map(|(package, _)| package).unwrap_or("")
}

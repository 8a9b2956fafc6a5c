mod convert;
pub mod json;
pub mod validate;
pub mod varint;
pub mod wire;

use std::sync::Arc;

use crate::protocol::error::{Result, ZrpcError};
use crate::protocol::pool::DescriptorPool;
use crate::protocol::value::MessageValue;

/// Content type of binary protobuf bodies.
pub const CONTENT_TYPE_PROTO: &str = "application/proto";
/// Content type of canonical JSON bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Codec for encoding/decoding message bodies
///
/// Binary protobuf is the default representation; canonical JSON is offered
/// for debugging and for clients without a protobuf runtime. Both share the
/// same descriptor pool.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use zrpc_common::catalog;
/// use zrpc_common::codec::Codec;
/// use zrpc_common::protocol::MessageValue;
///
/// let pool = Arc::new(catalog::builtin_pool().unwrap());
/// let codec = Codec::from_content_type("application/json", pool).unwrap();
///
/// let request = MessageValue::new().with("target_id", "t1");
/// let body = codec
///     .encode_message("zitadel.action.v3alpha.GetTargetByIDRequest", &request)
///     .unwrap();
/// assert_eq!(body, br#"{"targetId":"t1"}"#);
/// ```
#[derive(Debug, Clone)]
pub enum Codec {
    /// Binary protobuf wire format
    Proto(ProtoCodec),
    /// Canonical JSON mapping
    Json(JsonCodec),
}

impl Codec {
    pub fn proto(pool: Arc<DescriptorPool>) -> Self {
        Codec::Proto(ProtoCodec::new(pool))
    }

    pub fn json(pool: Arc<DescriptorPool>) -> Self {
        Codec::Json(JsonCodec::new(pool))
    }

    /// Selects a codec from a `Content-Type` header value.
    ///
    /// Parameters such as `; charset=utf-8` are ignored. Returns `None` for
    /// unsupported media types.
    pub fn from_content_type(content_type: &str, pool: Arc<DescriptorPool>) -> Option<Self> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match media_type.as_str() {
            "application/proto" | "application/x-protobuf" | "application/protobuf"
            | "application/grpc+proto" => Some(Codec::proto(pool)),
            "application/json" => Some(Codec::json(pool)),
            _ => None,
        }
    }

    /// Content type this codec produces.
    pub fn content_type(&self) -> &'static str {
        match self {
            Codec::Proto(_) => CONTENT_TYPE_PROTO,
            Codec::Json(_) => CONTENT_TYPE_JSON,
        }
    }

    pub fn pool(&self) -> &Arc<DescriptorPool> {
        match self {
            Codec::Proto(codec) => &codec.pool,
            Codec::Json(codec) => &codec.pool,
        }
    }

    /// Encode a message to bytes
    ///
    /// # Arguments
    ///
    /// * `type_name` - Fully-qualified message name
    /// * `value` - The message to encode
    pub fn encode_message(&self, type_name: &str, value: &MessageValue) -> Result<Vec<u8>> {
        match self {
            Codec::Proto(codec) => codec.encode_message(type_name, value),
            Codec::Json(codec) => codec.encode_message(type_name, value),
        }
    }

    /// Decode a message from bytes
    ///
    /// # Arguments
    ///
    /// * `type_name` - Fully-qualified message name
    /// * `data` - The encoded message
    pub fn decode_message(&self, type_name: &str, data: &[u8]) -> Result<MessageValue> {
        match self {
            Codec::Proto(codec) => codec.decode_message(type_name, data),
            Codec::Json(codec) => codec.decode_message(type_name, data),
        }
    }
}

/// Binary protobuf codec
#[derive(Debug, Clone)]
pub struct ProtoCodec {
    pool: Arc<DescriptorPool>,
}

impl ProtoCodec {
    pub fn new(pool: Arc<DescriptorPool>) -> Self {
        Self { pool }
    }

    pub fn encode_message(&self, type_name: &str, value: &MessageValue) -> Result<Vec<u8>> {
        let desc = self.pool.message(type_name)?;
        wire::encode(&self.pool, desc, value)
    }

    pub fn decode_message(&self, type_name: &str, data: &[u8]) -> Result<MessageValue> {
        let desc = self.pool.message(type_name)?;
        wire::decode(&self.pool, desc, data)
    }
}

/// Canonical JSON codec
#[derive(Debug, Clone)]
pub struct JsonCodec {
    pool: Arc<DescriptorPool>,
}

impl JsonCodec {
    pub fn new(pool: Arc<DescriptorPool>) -> Self {
        Self { pool }
    }

    pub fn encode_message(&self, type_name: &str, value: &MessageValue) -> Result<Vec<u8>> {
        let desc = self.pool.message(type_name)?;
        let json = json::to_json(&self.pool, desc, value)?;
        Ok(serde_json::to_vec(&json)?)
    }

    /// An empty body decodes as `{}`.
    pub fn decode_message(&self, type_name: &str, data: &[u8]) -> Result<MessageValue> {
        let desc = self.pool.message(type_name)?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(MessageValue::with_defaults(desc));
        }
        let json: serde_json::Value = serde_json::from_slice(data)
            .map_err(|err| ZrpcError::SchemaViolation(format!("invalid JSON body: {}", err)))?;
        json::from_json(&self.pool, desc, &json)
    }
}

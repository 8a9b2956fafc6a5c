//! JSON ↔ wire conversions behind `zrpc encode`, `zrpc decode` and `zrpc call`.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value as JsonValue;
use zrpc_common::codec::{json, wire};
use zrpc_common::protocol::{DescriptorPool, MessageValue};

/// How binary messages are written on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteFormat {
    Hex,
    Base64,
}

impl ByteFormat {
    pub fn from_flag(base64: bool) -> Self {
        if base64 {
            ByteFormat::Base64
        } else {
            ByteFormat::Hex
        }
    }

    pub fn format(self, bytes: &[u8]) -> String {
        match self {
            ByteFormat::Hex => hex::encode(bytes),
            ByteFormat::Base64 => BASE64.encode(bytes),
        }
    }

    /// Whitespace is ignored so that dumps can be pasted as-is.
    pub fn parse(self, text: &str) -> Result<Vec<u8>> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        match self {
            ByteFormat::Hex => hex::decode(&compact).context("Invalid hex input"),
            ByteFormat::Base64 => BASE64.decode(&compact).context("Invalid base64 input"),
        }
    }
}

/// Parses `text` as the canonical JSON form of `message_type`.
pub fn message_from_json(
    pool: &DescriptorPool,
    message_type: &str,
    text: &str,
) -> Result<MessageValue> {
    let desc = pool.message(message_type)?;
    let value: JsonValue =
        serde_json::from_str(text).map_err(|e| anyhow!("Invalid JSON in args: {}", e))?;
    Ok(json::from_json(pool, desc, &value)?)
}

pub fn message_to_json(
    pool: &DescriptorPool,
    message_type: &str,
    value: &MessageValue,
) -> Result<JsonValue> {
    let desc = pool.message(message_type)?;
    Ok(json::to_json(pool, desc, value)?)
}

/// JSON text → binary message → hex/base64 text.
pub fn encode(pool: &DescriptorPool, message_type: &str, text: &str, format: ByteFormat) -> Result<String> {
    let value = message_from_json(pool, message_type, text)?;
    let bytes = wire::encode(pool, pool.message(message_type)?, &value)?;
    Ok(format.format(&bytes))
}

/// Hex/base64 text → binary message → pretty JSON text.
pub fn decode(pool: &DescriptorPool, message_type: &str, text: &str, format: ByteFormat) -> Result<String> {
    let bytes = format.parse(text)?;
    let value = wire::decode(pool, pool.message(message_type)?, &bytes)?;
    let json = message_to_json(pool, message_type, &value)?;
    Ok(serde_json::to_string_pretty(&json)?)
}

/// Splits a `-H name=value` argument.
pub fn parse_header(header: &str) -> Result<(String, String)> {
    let (name, value) = header
        .split_once('=')
        .or_else(|| header.split_once(':'))
        .ok_or_else(|| anyhow!("Invalid header '{}': expected name=value", header))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Invalid header '{}': empty name", header));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Validates that a URL string starts with http:// or https://
pub fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!(
            "Invalid {}: '{}' must start with http:// or https://",
            description,
            url
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zrpc_common::catalog::{self, action, echo};

    const GET_TARGET: &str = "zitadel.action.v3alpha.GetTargetByIDRequest";

    #[test]
    fn test_encode_hex_and_base64() {
        let pool = catalog::builtin_pool().unwrap();
        let hex = encode(&pool, GET_TARGET, r#"{"targetId":"t1"}"#, ByteFormat::Hex).unwrap();
        assert_eq!(hex, "0a027431");

        let b64 = encode(&pool, GET_TARGET, r#"{"targetId":"t1"}"#, ByteFormat::Base64).unwrap();
        assert_eq!(b64, "CgJ0MQ==");
    }

    #[test]
    fn test_decode_target() {
        let pool = catalog::builtin_pool().unwrap();
        let text = encode(
            &pool,
            action::TARGET,
            r#"{"targetId":"t1","name":"webhook-1","restWebhook":{"interruptOnError":true},"endpoint":"https://example.com/hook"}"#,
            ByteFormat::Hex,
        )
        .unwrap();
        assert!(text.starts_with("0a027431"));

        let json: JsonValue =
            serde_json::from_str(&decode(&pool, action::TARGET, &text, ByteFormat::Hex).unwrap())
                .unwrap();
        assert_eq!(json["targetId"], "t1");
        assert_eq!(json["restWebhook"]["interruptOnError"], true);
        assert!(json.get("restCall").is_none());
    }

    #[test]
    fn test_decode_ignores_whitespace() {
        let pool = catalog::builtin_pool().unwrap();
        let json = decode(&pool, GET_TARGET, "0a 02\n74 31", ByteFormat::Hex).unwrap();
        assert!(json.contains("\"targetId\": \"t1\""));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        let pool = catalog::builtin_pool().unwrap();
        assert!(decode(&pool, GET_TARGET, "zz", ByteFormat::Hex).is_err());
        // truncated string payload
        assert!(decode(&pool, echo::ECHO_MESSAGE, "6205", ByteFormat::Hex).is_err());
    }

    #[test]
    fn test_invalid_json_args() {
        let pool = catalog::builtin_pool().unwrap();
        let err = message_from_json(&pool, GET_TARGET, "{not json").unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("authorization=Bearer abc").unwrap(),
            ("authorization".to_string(), "Bearer abc".to_string())
        );
        assert_eq!(
            parse_header("x-org: 42").unwrap(),
            ("x-org".to_string(), "42".to_string())
        );
        assert!(parse_header("novalue").is_err());
        assert!(parse_header("=v").is_err());
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("http://127.0.0.1:8080", "server address").is_ok());
        assert!(validate_http_url("https://example.com", "server address").is_ok());
        assert!(validate_http_url("127.0.0.1:8080", "server address").is_err());
    }
}

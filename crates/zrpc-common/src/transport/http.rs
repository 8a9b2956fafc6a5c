//! HTTP Transport
//!
//! Unary calls travel as Connect-style HTTP/1.1 POST requests:
//!
//! ```text
//! POST /zitadel.action.v3alpha.ActionService/GetTargetByID HTTP/1.1
//! Content-Type: application/proto
//! Connect-Protocol-Version: 1
//! Connect-Timeout-Ms: 5000
//!
//! <binary request message>
//! ```
//!
//! A successful call answers `200 OK` with the encoded response message. A
//! failed call answers with the HTTP status mapped from the status code and a
//! JSON body `{"code": "...", "message": "..."}`.
//!
//! # Components
//!
//! - **[`HttpTransport`]**: pooled hyper client implementing [`Transport`]
//! - **[`HyperRequest`]** / **[`HyperResponse`]**: server-side type aliases
//!
//! # Example
//!
//! ```no_run
//! use zrpc_common::transport::{CallOptions, HttpTransport, Transport};
//! use bytes::Bytes;
//!
//! # async fn example() -> zrpc_common::protocol::Result<()> {
//! let transport = HttpTransport::new("http://127.0.0.1:8080");
//! let response = transport
//!     .call("/zrpc.echo.v1.EchoService/Echo", Bytes::new(), &CallOptions::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;

use super::{CallOptions, Transport};
use crate::codec::{CONTENT_TYPE_JSON, CONTENT_TYPE_PROTO};
use crate::protocol::error::{Result, ZrpcError};
use crate::protocol::status::Status;

/// Type alias for Hyper incoming requests
pub type HyperRequest = Request<Incoming>;

/// Type alias for Hyper responses with full body
pub type HyperResponse = Response<Full<Bytes>>;

/// Protocol version header sent with every call.
pub const PROTOCOL_VERSION_HEADER: &str = "connect-protocol-version";
/// Remaining call budget in milliseconds.
pub const TIMEOUT_HEADER: &str = "connect-timeout-ms";

/// Default timeout when neither the call nor the transport sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Unary HTTP transport backed by a pooled hyper client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client<HttpConnector, Full<Bytes>>,
    default_timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport for `base_url` (e.g. `http://127.0.0.1:8080`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::builder(TokioExecutor::new()).build_http(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, path: &str, body: Bytes, options: &CallOptions, timeout: Duration) -> Result<Request<Full<Bytes>>> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, CONTENT_TYPE_PROTO)
            .header(PROTOCOL_VERSION_HEADER, "1")
            .header(TIMEOUT_HEADER, timeout.as_millis().to_string());

        for (key, value) in &options.metadata {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|err| ZrpcError::InvalidRequest(format!("invalid metadata key `{}`: {}", key, err)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| ZrpcError::InvalidRequest(format!("invalid metadata value for `{}`: {}", key, err)))?;
            builder = builder.header(name, value);
        }

        Ok(builder.body(Full::new(body))?)
    }

    async fn exchange(&self, request: Request<Full<Bytes>>) -> Result<Bytes> {
        let response = self.client.request(request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();

        if status == StatusCode::OK {
            Ok(body)
        } else {
            Err(ZrpcError::Status(Status::from_http_error(status.as_u16(), &body)))
        }
    }

    /// Create an HTTP response carrying an encoded message
    ///
    /// # Arguments
    ///
    /// * `body` - Encoded response message
    /// * `content_type` - Content type of `body`
    pub fn to_http_response(body: impl Into<Bytes>, content_type: &'static str) -> HyperResponse {
        let mut response = Response::new(Full::new(body.into()));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        response
    }

    /// Create an HTTP error response from a status
    ///
    /// The HTTP status is derived from the status code; the body is the
    /// JSON-serialized status.
    pub fn to_http_error(status: &Status) -> HyperResponse {
        let http_status = StatusCode::from_u16(status.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::to_json_response(http_status, status)
    }

    /// Create an HTTP response with a JSON body
    pub fn to_json_response(http_status: StatusCode, value: &impl Serialize) -> HyperResponse {
        let body = serde_json::to_vec(value).unwrap_or_default();
        let mut response = Self::to_http_response(body, CONTENT_TYPE_JSON);
        *response.status_mut() = http_status;
        response
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, path: &str, request: Bytes, options: &CallOptions) -> Result<Bytes> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let http_request = self.build_request(path, request, options, timeout)?;

        tracing::debug!(path, timeout_ms = timeout.as_millis() as u64, "Sending HTTP request");

        tokio::time::timeout(timeout, self.exchange(http_request))
            .await
            .map_err(|_| ZrpcError::Timeout(timeout.as_millis() as u64))?
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::status::Code;

    #[test]
    fn test_base_url_trailing_slash() {
        let transport = HttpTransport::new("http://localhost:8080/");
        assert_eq!(transport.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_build_request_headers() {
        let transport = HttpTransport::new("http://localhost:8080");
        let options = CallOptions::new().with_metadata("x-trace", "t-1");
        let request = transport
            .build_request(
                "/zrpc.echo.v1.EchoService/Echo",
                Bytes::from_static(b"\x08\x01"),
                &options,
                Duration::from_millis(1500),
            )
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(
            request.uri().to_string(),
            "http://localhost:8080/zrpc.echo.v1.EchoService/Echo"
        );
        let headers = request.headers();
        assert_eq!(headers[CONTENT_TYPE], "application/proto");
        assert_eq!(headers[PROTOCOL_VERSION_HEADER], "1");
        assert_eq!(headers[TIMEOUT_HEADER], "1500");
        assert_eq!(headers["x-trace"], "t-1");
    }

    #[test]
    fn test_invalid_metadata_key() {
        let transport = HttpTransport::new("http://localhost:8080");
        let options = CallOptions::new().with_metadata("bad key", "v");
        let result = transport.build_request("/a.B/C", Bytes::new(), &options, DEFAULT_TIMEOUT);
        assert!(matches!(result, Err(ZrpcError::InvalidRequest(_))));
    }

    #[test]
    fn test_http_error_response() {
        let response = HttpTransport::to_http_error(&Status::unimplemented("no such method"));
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_http_error_body_roundtrip() {
        let status = Status::new(Code::NotFound, "target t1");
        let response = HttpTransport::to_http_error(&status);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(Status::from_http_error(404, &body), status);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // port 9 (discard) is not expected to be listening
        let transport = HttpTransport::new("http://127.0.0.1:9")
            .with_default_timeout(Duration::from_secs(5));
        let result = transport
            .call("/zrpc.echo.v1.EchoService/Echo", Bytes::new(), &CallOptions::new())
            .await;
        assert!(matches!(
            result,
            Err(ZrpcError::Transport(_)) | Err(ZrpcError::Timeout(_))
        ));
    }
}

//! HTTP Server
//!
//! Serves unary calls over HTTP/1.1 using hyper. Each accepted connection runs
//! on its own tokio task; each request is handed to the [`Router`].
//!
//! # Request handling
//!
//! - `POST /<package>.<Service>/<Method>`: unary call. The `Content-Type`
//!   selects the codec (`application/proto` or `application/json`) and the
//!   response uses the same one. `connect-timeout-ms` sets the call deadline;
//!   all other headers become call metadata.
//! - `GET /_health`: `{"status":"healthy"}`
//! - `GET /_metrics`: metrics snapshot
//! - `GET /_info`: version, uptime and registered services
//!
//! Failed calls answer with the mapped HTTP status and a JSON status body.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zrpc_common::catalog;
//! use zrpc_server::{echo, HttpServer, Router};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = Arc::new(catalog::builtin_pool().unwrap());
//!     let registry = echo::registry(pool).unwrap();
//!     let server = HttpServer::new(Router::new(registry));
//!     server.run("127.0.0.1:8080".parse().unwrap()).await.unwrap();
//! }
//! ```

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, HOST};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use zrpc_common::codec::{Codec, CONTENT_TYPE_PROTO};
use zrpc_common::protocol::{Result, Status, ZrpcError};
use zrpc_common::transport::http::{PROTOCOL_VERSION_HEADER, TIMEOUT_HEADER};
use zrpc_common::transport::{HttpTransport, HyperRequest, HyperResponse};

use crate::config::ServerConfig;
use crate::registry::CallContext;
use crate::router::Router;

/// Liveness endpoint.
pub const HEALTH_PATH: &str = "/_health";

/// HTTP server for zrpc services.
pub struct HttpServer {
    router: Arc<Router>,
    config: Arc<ServerConfig>,
}

impl HttpServer {
    pub fn new(router: Router) -> Self {
        Self::with_config(router, ServerConfig::default())
    }

    pub fn with_config(router: Router, config: ServerConfig) -> Self {
        Self {
            router: Arc::new(router),
            config: Arc::new(config),
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Binds `addr` and serves until the process exits.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ZrpcError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serves connections until `signal` resolves.
    ///
    /// Connections already accepted keep running to completion on their own
    /// tasks.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;

        tracing::info!(
            "HTTP server listening on {}",
            listener
                .local_addr()
                .map_err(|e| ZrpcError::Transport(format!("Failed to get local address: {}", e)))?
        );

        tokio::pin!(signal);
        loop {
            tokio::select! {
                _ = &mut signal => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            tracing::error!("Failed to accept connection: {}", err);
                            continue;
                        }
                    };
                    self.spawn_connection(stream, peer);
                }
            }
        }
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let io = TokioIo::new(stream);
        let router = Arc::clone(&self.router);
        let config = Arc::clone(&self.config);

        tokio::task::spawn(async move {
            let metrics = Arc::clone(router.metrics());
            metrics.connection_opened();
            tracing::debug!(%peer, "Connection opened");

            let service = service_fn(move |req| {
                let router = Arc::clone(&router);
                let config = Arc::clone(&config);
                async move { Ok::<_, Infallible>(Self::handle_request(router, config, req).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::error!("Error serving connection: {}", err);
            }

            metrics.connection_closed();
            tracing::debug!(%peer, "Connection closed");
        });
    }

    /// Handles one HTTP request. Never fails: errors become status responses.
    pub(crate) async fn handle_request(
        router: Arc<Router>,
        config: Arc<ServerConfig>,
        req: HyperRequest,
    ) -> HyperResponse {
        let path = req.uri().path().to_string();

        if req.method() == Method::POST {
            Self::handle_call(&router, &config, path, req).await
        } else if req.method() == Method::GET {
            Self::handle_builtin(&router, &path)
        } else {
            HttpTransport::to_json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &Status::unimplemented(format!("HTTP method {} is not supported", req.method())),
            )
        }
    }

    fn handle_builtin(router: &Router, path: &str) -> HyperResponse {
        if path == HEALTH_PATH {
            return HttpTransport::to_json_response(StatusCode::OK, &json!({ "status": "healthy" }));
        }

        let metrics = router.metrics();
        if !metrics.is_metrics_request(path) {
            return HttpTransport::to_http_error(&Status::not_found(format!(
                "no endpoint at GET {}",
                path
            )));
        }

        match metrics.handle_metrics_request(path, &router.registry().service_names()) {
            Ok(body) => HttpTransport::to_json_response(StatusCode::OK, &body),
            Err(err) => HttpTransport::to_http_error(&err.to_status()),
        }
    }

    async fn handle_call(
        router: &Router,
        config: &ServerConfig,
        path: String,
        req: HyperRequest,
    ) -> HyperResponse {
        let headers = req.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(CONTENT_TYPE_PROTO);

        let Some(codec) = Codec::from_content_type(content_type, Arc::clone(router.pool())) else {
            return HttpTransport::to_json_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                &Status::invalid_argument(format!("unsupported content type `{}`", content_type)),
            );
        };

        if let Some(length) = content_length(headers) {
            if length > config.max_body_bytes as u64 {
                return HttpTransport::to_http_error(&body_too_large(config.max_body_bytes));
            }
        }

        let mut ctx = CallContext::new(path.clone()).with_metadata(metadata(headers));
        if let Some(timeout) = call_timeout(headers).or(config.default_timeout) {
            ctx = ctx.with_timeout(timeout);
        }

        let body = match Limited::new(req.into_body(), config.max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                return HttpTransport::to_http_error(&body_too_large(config.max_body_bytes));
            }
            Err(err) => {
                tracing::warn!(path = %path, "Failed to read request body: {}", err);
                return HttpTransport::to_http_error(&Status::invalid_argument(format!(
                    "failed to read request body: {}",
                    err
                )));
            }
        };

        match router.dispatch(&path, &codec, body, ctx).await {
            Ok(response) => HttpTransport::to_http_response(response, codec.content_type()),
            Err(status) => HttpTransport::to_http_error(&status),
        }
    }
}

fn body_too_large(limit: usize) -> Status {
    Status::resource_exhausted(format!("request body exceeds {} bytes", limit))
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Parses `connect-timeout-ms`; malformed values are ignored.
fn call_timeout(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(TIMEOUT_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_millis)
}

/// Request headers other than transport framing, as call metadata.
fn metadata(headers: &HeaderMap) -> BTreeMap<String, String> {
    let framing = [
        CONTENT_TYPE.as_str(),
        CONTENT_LENGTH.as_str(),
        HOST.as_str(),
        PROTOCOL_VERSION_HEADER,
        TIMEOUT_HEADER,
    ];
    headers
        .iter()
        .filter(|(name, _)| !framing.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_call_timeout_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(call_timeout(&headers), None);

        headers.insert(TIMEOUT_HEADER, HeaderValue::from_static("1500"));
        assert_eq!(call_timeout(&headers), Some(Duration::from_millis(1500)));

        headers.insert(TIMEOUT_HEADER, HeaderValue::from_static("soon"));
        assert_eq!(call_timeout(&headers), None);
    }

    #[test]
    fn test_metadata_skips_framing_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/proto"));
        headers.insert(TIMEOUT_HEADER, HeaderValue::from_static("100"));
        headers.insert(PROTOCOL_VERSION_HEADER, HeaderValue::from_static("1"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        headers.insert("authorization", HeaderValue::from_static("Bearer t"));

        let metadata = metadata(&headers);
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["x-request-id"], "abc");
        assert_eq!(metadata["authorization"], "Bearer t");
    }

    #[test]
    fn test_content_length() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), None);
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("42"));
        assert_eq!(content_length(&headers), Some(42));
    }
}

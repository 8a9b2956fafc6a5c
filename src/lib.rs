//! # zrpc
//!
//! Descriptor-driven protobuf RPC: one generic wire/JSON codec parameterized
//! by message descriptors, a service registry with unary dispatch, and an
//! HTTP transport on both call sides.
//!
//! This crate re-exports the workspace crates:
//!
//! - [`common`]: descriptors, message values, codecs, status, transports
//! - [`server`]: service registry, router, HTTP server, in-process transport
//! - [`client`]: `invoke` over any transport
//! - [`metrics`]: per-method call metrics
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zrpc::client::ZrpcClient;
//! use zrpc::common::catalog::{self, echo};
//! use zrpc::common::protocol::MessageValue;
//! use zrpc::server::{HttpServer, Router};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Arc::new(catalog::builtin_pool()?);
//! let server = HttpServer::new(Router::new(zrpc::server::echo::registry(Arc::clone(&pool))?));
//! tokio::spawn(server.run("127.0.0.1:8080".parse()?));
//!
//! let client = ZrpcClient::http("http://127.0.0.1:8080", pool);
//! let reply = client
//!     .service(echo::SERVICE)?
//!     .call("Echo", &MessageValue::new().with("string_value", "hi"))
//!     .await?;
//! assert_eq!(reply.get_str("string_value"), Some("hi"));
//! # Ok(())
//! # }
//! ```

pub use zrpc_client as client;
pub use zrpc_common as common;
pub use zrpc_metrics as metrics;
pub use zrpc_server as server;

pub use zrpc_client::{ClientConfig, ServiceClient, ZrpcClient};
pub use zrpc_common::protocol::{
    Code, DescriptorPool, MessageDescriptor, MessageValue, Result, ServiceDescriptor, Status,
    Value, ZrpcError,
};
pub use zrpc_server::{HttpServer, Router, ServerConfig, ServiceImplementation, ServiceRegistry};

//! zrpc Client
//!
//! [`ZrpcClient`] invokes unary methods described in a
//! [`DescriptorPool`](zrpc_common::protocol::DescriptorPool) over any
//! [`Transport`](zrpc_common::transport::Transport): the HTTP transport for
//! remote servers, or the server crate's `LocalTransport` in-process.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zrpc_client::ZrpcClient;
//! use zrpc_common::catalog::{self, action};
//! use zrpc_common::protocol::MessageValue;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Arc::new(catalog::builtin_pool()?);
//! let client = ZrpcClient::http("http://127.0.0.1:8080", pool);
//!
//! let targets = client.service(action::SERVICE)?;
//! let response = targets
//!     .call("GetTargetByID", &MessageValue::new().with("target_id", "t1"))
//!     .await?;
//! println!("{:?}", response.get_message("target"));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;

pub use client::{ServiceClient, ZrpcClient};
pub use config::ClientConfig;

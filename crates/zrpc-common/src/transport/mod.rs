//! zrpc Transport Layer
//!
//! A transport moves already-encoded request bytes to a peer and returns the
//! encoded response bytes. It knows nothing about descriptors or messages.
//!
//! # Architecture
//!
//! ```text
//!   ZrpcClient::invoke
//!        │  encode (wire codec)
//!        ▼
//!   Transport::call(path, bytes, options) ──▶ peer ──▶ response bytes
//!        │  decode (wire codec)
//!        ▼
//!   MessageValue
//! ```
//!
//! # Components
//!
//! - **[`Transport`]**: the async collaborator trait
//! - **[`CallOptions`]**: per-call timeout and metadata
//! - **[`HttpTransport`]**: unary HTTP/1.1 POST transport (Connect-style)
//!
//! An in-process transport backed by the server's router lives in the
//! server crate.

pub mod http;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::protocol::error::Result;

pub use http::{HttpTransport, HyperRequest, HyperResponse};

/// Moves one unary request to a peer.
///
/// `path` is the method path `/<package>.<Service>/<Method>`. Implementations
/// must be shareable across tasks; concurrent calls must not block each other.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, path: &str, request: Bytes, options: &CallOptions) -> Result<Bytes>;
}

/// Per-call options, passed through to the transport unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Deadline for the whole exchange; `None` uses the transport default
    pub timeout: Option<Duration>,
    /// Sent as request headers over HTTP
    pub metadata: BTreeMap<String, String>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }
}

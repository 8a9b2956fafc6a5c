//! In-process transport.
//!
//! [`LocalTransport`] hands encoded requests straight to a [`Router`] without
//! touching the network. Clients built on it exercise the full encode,
//! dispatch and decode path, which makes it the transport of choice for tests
//! and for embedding a service next to its caller.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use zrpc_common::codec::Codec;
use zrpc_common::protocol::{Result, ZrpcError};
use zrpc_common::transport::{CallOptions, Transport};

use crate::registry::CallContext;
use crate::router::Router;

#[derive(Debug, Clone)]
pub struct LocalTransport {
    router: Arc<Router>,
    codec: Codec,
}

impl LocalTransport {
    pub fn new(router: Arc<Router>) -> Self {
        let codec = Codec::proto(Arc::clone(router.pool()));
        Self { router, codec }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn call(&self, path: &str, request: Bytes, options: &CallOptions) -> Result<Bytes> {
        let mut ctx = CallContext::new(path).with_metadata(options.metadata.clone());
        if let Some(timeout) = options.timeout {
            ctx = ctx.with_timeout(timeout);
        }

        self.router
            .dispatch(path, &self.codec, request, ctx)
            .await
            .map_err(ZrpcError::Status)
    }
}

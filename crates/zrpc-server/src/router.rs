//! Unary Dispatch
//!
//! The router turns request bytes into response bytes for one method path:
//!
//! 1. resolve the path in the [`ServiceRegistry`]
//! 2. decode the body as the method's input type
//! 3. run the handler on its own task, bounded by the call deadline
//! 4. encode the returned message as the output type
//!
//! Every failure leaves as a [`Status`]; nothing escapes as a panic or a
//! transport error. The mapping is:
//!
//! | failure                        | code                |
//! |--------------------------------|---------------------|
//! | unknown service or method      | `unimplemented`     |
//! | request decode                 | `invalid_argument`  |
//! | handler `Err(status)`          | that status         |
//! | handler panic                  | `internal`          |
//! | response encode                | `internal`          |
//! | deadline passed                | `deadline_exceeded` |

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use zrpc_common::codec::Codec;
use zrpc_common::protocol::{Code, DescriptorPool, Status};
use zrpc_metrics::{MetricsCollector, ServerMetricsCollector};

use crate::registry::{CallContext, ServiceRegistry};

/// Routes unary calls to registered handlers and records metrics.
pub struct Router {
    registry: Arc<ServiceRegistry>,
    metrics: Arc<dyn MetricsCollector>,
}

impl Router {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self::with_metrics(registry, Arc::new(ServerMetricsCollector::new()))
    }

    pub fn with_metrics(registry: ServiceRegistry, metrics: Arc<dyn MetricsCollector>) -> Self {
        Self {
            registry: Arc::new(registry),
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<DescriptorPool> {
        self.registry.pool()
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.metrics
    }

    /// Dispatches one unary call.
    ///
    /// `codec` decodes `body` and encodes the response; the HTTP server picks
    /// it from the request's content type.
    pub async fn dispatch(
        &self,
        path: &str,
        codec: &Codec,
        body: Bytes,
        ctx: CallContext,
    ) -> Result<Bytes, Status> {
        let start = Instant::now();
        let result = self.dispatch_inner(path, codec, body, ctx).await;

        let code = match &result {
            Ok(_) => Code::Ok,
            Err(status) => status.code,
        };
        self.metrics.record_call(path, start, code);

        match &result {
            Ok(response) => tracing::debug!(path, bytes = response.len(), "Call completed"),
            Err(status) if status.code == Code::Internal => {
                tracing::error!(path, %status, "Call failed")
            }
            Err(status) => tracing::debug!(path, %status, "Call failed"),
        }
        result
    }

    async fn dispatch_inner(
        &self,
        path: &str,
        codec: &Codec,
        body: Bytes,
        ctx: CallContext,
    ) -> Result<Bytes, Status> {
        let route = self.registry.resolve(path).map_err(|err| err.to_status())?;

        if ctx.is_expired() {
            return Err(Status::deadline_exceeded(format!(
                "deadline passed before {} was dispatched",
                path
            )));
        }

        let request = codec
            .decode_message(route.method.input_type(), &body)
            .map_err(|err| Status::invalid_argument(err.to_string()))?;

        let remaining = ctx.remaining();
        let task = tokio::spawn((route.handler)(request, ctx));
        let abort = task.abort_handle();

        let joined = match remaining {
            Some(remaining) => match tokio::time::timeout(remaining, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort.abort();
                    return Err(Status::deadline_exceeded(format!(
                        "{} did not finish within {}ms",
                        path,
                        remaining.as_millis()
                    )));
                }
            },
            None => task.await,
        };

        let response = match joined {
            Ok(Ok(response)) => response,
            Ok(Err(status)) => return Err(status),
            Err(err) if err.is_panic() => {
                return Err(Status::internal(format!("handler for {} panicked", path)))
            }
            Err(err) => return Err(Status::internal(format!("handler for {} failed: {}", path, err))),
        };

        codec
            .encode_message(route.method.output_type(), &response)
            .map(Bytes::from)
            .map_err(|err| Status::internal(format!("failed to encode response: {}", err)))
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("registry", &self.registry)
            .finish()
    }
}

//! Service Registry
//!
//! Maps fully-qualified service names to their descriptor and a handler per
//! method. Built once at startup, then shared read-only behind an `Arc`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use zrpc_common::catalog::{self, echo};
//! use zrpc_server::{ServiceImplementation, ServiceRegistry};
//!
//! let pool = Arc::new(catalog::builtin_pool().unwrap());
//! let mut registry = ServiceRegistry::new(Arc::clone(&pool));
//!
//! let implementation = ServiceImplementation::new()
//!     .method("Echo", |request, _ctx| async move { Ok(request) });
//! registry
//!     .register_service(Arc::clone(pool.service(echo::SERVICE).unwrap()), implementation)
//!     .unwrap();
//!
//! assert!(registry.lookup(echo::ECHO_PATH).is_some());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use zrpc_common::protocol::descriptor::split_method_path;
use zrpc_common::protocol::{
    DescriptorPool, MessageValue, MethodDescriptor, MethodKind, Result, ServiceDescriptor, Status,
    ZrpcError,
};

/// Future returned by a [`Handler`].
pub type HandlerFuture = BoxFuture<'static, std::result::Result<MessageValue, Status>>;

/// A unary method implementation.
pub type Handler = Arc<dyn Fn(MessageValue, CallContext) -> HandlerFuture + Send + Sync>;

/// Wraps an async closure into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(MessageValue, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<MessageValue, Status>> + Send + 'static,
{
    Arc::new(move |request, ctx| Box::pin(f(request, ctx)))
}

/// Per-call information handed to every handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Method path, `/<package>.<Service>/<Method>`
    pub path: String,
    /// Request metadata (HTTP headers, lower-cased names)
    pub metadata: BTreeMap<String, String>,
    pub deadline: Option<Instant>,
}

impl CallContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            metadata: BTreeMap::new(),
            deadline: None,
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// A timeout too large to express as an `Instant` leaves the call
    /// without a deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Time left before the deadline; `None` when no deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining() == Some(Duration::ZERO)
    }
}

/// Handlers for the methods of one service, keyed by method name.
#[derive(Clone, Default)]
pub struct ServiceImplementation {
    handlers: HashMap<String, Handler>,
}

impl ServiceImplementation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an async closure as the handler for `name`.
    pub fn method<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(MessageValue, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<MessageValue, Status>> + Send + 'static,
    {
        self.handler(name, handler_fn(f))
    }

    pub fn handler(mut self, name: impl Into<String>, handler: Handler) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ServiceImplementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceImplementation")
            .field("methods", &self.method_names())
            .finish()
    }
}

struct RegisteredService {
    descriptor: Arc<ServiceDescriptor>,
    handlers: HashMap<String, Handler>,
}

/// A method resolved from a path.
pub struct Route<'a> {
    pub service: &'a Arc<ServiceDescriptor>,
    pub method: &'a MethodDescriptor,
    pub handler: &'a Handler,
}

/// Process service table.
pub struct ServiceRegistry {
    pool: Arc<DescriptorPool>,
    services: HashMap<String, RegisteredService>,
}

impl ServiceRegistry {
    pub fn new(pool: Arc<DescriptorPool>) -> Self {
        Self {
            pool,
            services: HashMap::new(),
        }
    }

    pub fn pool(&self) -> &Arc<DescriptorPool> {
        &self.pool
    }

    /// Registers `implementation` for every method of `descriptor`.
    ///
    /// # Errors
    ///
    /// - `InvalidDescriptor` if a method is not unary
    /// - `DuplicateService` if the service name is already registered
    /// - `UnknownMessage` if an input or output type is missing from the pool
    /// - `IncompleteImplementation` listing every method without a handler
    ///
    /// Handlers for methods the descriptor does not declare are dropped with
    /// a warning.
    pub fn register_service(
        &mut self,
        descriptor: impl Into<Arc<ServiceDescriptor>>,
        implementation: ServiceImplementation,
    ) -> Result<()> {
        let descriptor = descriptor.into();
        let service_name = descriptor.full_name().to_string();

        if let Some(method) = descriptor
            .methods()
            .iter()
            .find(|method| method.kind() != MethodKind::Unary)
        {
            return Err(ZrpcError::InvalidDescriptor(format!(
                "{}: method {} is {:?}, only unary methods are supported",
                service_name,
                method.name(),
                method.kind()
            )));
        }

        if self.services.contains_key(&service_name) {
            return Err(ZrpcError::DuplicateService(service_name));
        }

        for method in descriptor.methods() {
            self.pool.message(method.input_type())?;
            self.pool.message(method.output_type())?;
        }

        let mut handlers = implementation.handlers;
        let missing: Vec<String> = descriptor
            .methods()
            .iter()
            .filter(|method| !handlers.contains_key(method.name()))
            .map(|method| method.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ZrpcError::IncompleteImplementation {
                service: service_name,
                missing,
            });
        }

        handlers.retain(|name, _| {
            let declared = descriptor.method(name).is_some();
            if !declared {
                tracing::warn!(
                    service = %service_name,
                    method = %name,
                    "Dropping handler for undeclared method"
                );
            }
            declared
        });

        tracing::info!(
            service = %service_name,
            methods = descriptor.methods().len(),
            "Registered service"
        );
        self.services.insert(
            service_name,
            RegisteredService {
                descriptor,
                handlers,
            },
        );
        Ok(())
    }

    /// Resolves `/<package>.<Service>/<Method>` to its method and handler.
    pub fn lookup(&self, path: &str) -> Option<Route<'_>> {
        let (service_name, method_name) = split_method_path(path)?;
        let service = self.services.get(service_name)?;
        let method = service.descriptor.method(method_name)?;
        let handler = service.handlers.get(method_name)?;
        Some(Route {
            service: &service.descriptor,
            method,
            handler,
        })
    }

    /// Like [`lookup`](Self::lookup), reporting what failed to resolve.
    pub fn resolve(&self, path: &str) -> Result<Route<'_>> {
        let (service_name, method_name) = split_method_path(path)
            .ok_or_else(|| ZrpcError::InvalidRequest(format!("malformed method path `{}`", path)))?;
        if !self.services.contains_key(service_name) {
            return Err(Status::unimplemented(format!("unknown service {}", service_name)).into());
        }
        self.lookup(path).ok_or_else(|| ZrpcError::UnknownMethod {
            service: service_name.to_string(),
            method: method_name.to_string(),
        })
    }

    pub fn service(&self, name: &str) -> Option<&Arc<ServiceDescriptor>> {
        self.services.get(name).map(|service| &service.descriptor)
    }

    /// Registered service names, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.service_names())
            .finish()
    }
}

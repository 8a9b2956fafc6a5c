//! `zrpc.echo.v1.EchoService`: returns every request unchanged.

use std::sync::Arc;

use zrpc_common::catalog::echo;
use zrpc_common::protocol::{DescriptorPool, Result, ZrpcError};

use crate::registry::{ServiceImplementation, ServiceRegistry};

pub fn implementation() -> ServiceImplementation {
    ServiceImplementation::new().method("Echo", |request, ctx| async move {
        tracing::debug!(path = %ctx.path, fields = request.len(), "Echoing request");
        Ok(request)
    })
}

/// A registry with only the echo service, resolved from `pool`.
pub fn registry(pool: Arc<DescriptorPool>) -> Result<ServiceRegistry> {
    let descriptor = pool
        .service(echo::SERVICE)
        .cloned()
        .ok_or_else(|| ZrpcError::InvalidDescriptor(format!("{} is not declared", echo::SERVICE)))?;

    let mut registry = ServiceRegistry::new(pool);
    registry.register_service(descriptor, implementation())?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zrpc_common::catalog;
    use zrpc_common::protocol::DescriptorPool;

    #[test]
    fn test_registry_serves_echo() {
        let pool = Arc::new(catalog::builtin_pool().unwrap());
        let registry = registry(pool).unwrap();
        assert!(registry.lookup(echo::ECHO_PATH).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_descriptor() {
        let err = registry(Arc::new(DescriptorPool::new())).unwrap_err();
        assert!(matches!(err, ZrpcError::InvalidDescriptor(_)));
    }
}

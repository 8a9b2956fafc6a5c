//! Server configuration.

use std::time::Duration;

use zrpc_common::protocol::{Result, ZrpcError};

/// Default request body limit (4 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Configuration for [`HttpServer`](crate::HttpServer).
///
/// # Example
///
/// ```
/// use zrpc_server::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::new()
///     .with_max_body_bytes(1024 * 1024)
///     .with_default_timeout(Duration::from_secs(10));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Requests with a larger body are rejected with `resource_exhausted`
    pub max_body_bytes: usize,
    /// Deadline applied when the caller sends no `connect-timeout-ms`
    pub default_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            default_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_body_bytes == 0 {
            return Err(ZrpcError::InvalidConfig(
                "max_body_bytes must be greater than 0".to_string(),
            ));
        }
        if self.default_timeout == Some(Duration::ZERO) {
            return Err(ZrpcError::InvalidConfig(
                "default_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_body_bytes, 4 * 1024 * 1024);
        assert!(config.default_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_body_limit_rejected() {
        let config = ServerConfig::new().with_max_body_bytes(0);
        assert!(matches!(config.validate(), Err(ZrpcError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ServerConfig::new().with_default_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ZrpcError::InvalidConfig(_))));
    }
}

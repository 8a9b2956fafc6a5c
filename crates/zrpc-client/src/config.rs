use std::time::Duration;

use zrpc_common::protocol::{Result, ZrpcError};

/// Client configuration.
///
/// # Default Configuration
///
/// - `strict`: `false` (unknown field names are dropped, oneof conflicts left
///   to the peer's decoder)
/// - `default_timeout`: `None` (the transport's own default applies)
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use zrpc_client::ClientConfig;
///
/// let config = ClientConfig::new()
///     .strict(true)
///     .with_default_timeout(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConfig {
    /// Reject unknown top-level fields and oneof conflicts before encoding
    pub strict: bool,
    /// Timeout for calls whose options do not carry one
    pub default_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_timeout == Some(Duration::ZERO) {
            return Err(ZrpcError::InvalidConfig(
                "default_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

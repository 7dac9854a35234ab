//! Bridge configuration.

use std::time::Duration;

/// Per-page-context configuration for the injected provider.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Client identifier returned for `web3_clientVersion`.
    pub client_version: String,
    /// Deadline for host answers to forwarded requests.
    ///
    /// `None` keeps the historical behavior: a request the host never
    /// answers stays pending for the life of the page context. `Some`
    /// rejects the future with code -32002 and clears the table entry.
    pub request_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            client_version: format!("WalletBridge/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: None,
        }
    }
}

impl BridgeConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_timeout() {
        let config = BridgeConfig::default();
        assert!(config.request_timeout.is_none());
        assert!(config.client_version.starts_with("WalletBridge/"));
    }

    #[test]
    fn test_builder_methods() {
        let config = BridgeConfig::default()
            .with_request_timeout(Duration::from_millis(250))
            .with_client_version("TestWallet/0.0.1");
        assert_eq!(config.request_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.client_version, "TestWallet/0.0.1");
    }
}

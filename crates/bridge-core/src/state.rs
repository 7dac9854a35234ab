//! Provider state snapshot.
//!
//! One instance lives in each page context, created at injection with
//! host-supplied initial values. Only incoming sync events mutate it;
//! the provider reads it synchronously for the read-only fast path.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// The page's view of the wallet: active accounts, chain, connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderState {
    /// Ordered account addresses; the first is the selected address.
    pub accounts: Vec<String>,
    /// Current chain id in hex, e.g. "0x1".
    pub chain_id: String,
    pub connected: bool,
}

impl ProviderState {
    pub fn new(accounts: Vec<String>, chain_id: impl Into<String>) -> Self {
        Self {
            accounts,
            chain_id: chain_id.into(),
            connected: true,
        }
    }

    /// First account, or none when the wallet has no active account.
    pub fn selected_address(&self) -> Option<&str> {
        self.accounts.first().map(String::as_str)
    }

    /// Legacy decimal network id derived from the hex chain id.
    ///
    /// Falls back to the raw chain id string when it is not 0x-hex;
    /// some dApps still read `net_version` and prefer a stale-looking
    /// value over a hard failure.
    pub fn net_version(&self) -> String {
        match parse_chain_id(&self.chain_id) {
            Some(n) => n.to_string(),
            None => {
                debug!("net_version: chain id {:?} is not 0x-hex", self.chain_id);
                self.chain_id.clone()
            }
        }
    }
}

/// Parse a "0x"-prefixed hex chain id.
pub fn parse_chain_id(chain_id: &str) -> Option<u64> {
    let hex = chain_id.strip_prefix("0x")?;
    if hex.is_empty() {
        return None;
    }
    u64::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_address_is_first_account() {
        let state = ProviderState::new(vec!["0xaaa".into(), "0xbbb".into()], "0x1");
        assert_eq!(state.selected_address(), Some("0xaaa"));

        let empty = ProviderState::new(vec![], "0x1");
        assert_eq!(empty.selected_address(), None);
    }

    #[test]
    fn test_net_version_decimal_rendering() {
        let state = ProviderState::new(vec![], "0x4f");
        assert_eq!(state.net_version(), "79");

        let mainnet = ProviderState::new(vec![], "0x1");
        assert_eq!(mainnet.net_version(), "1");
    }

    #[test]
    fn test_net_version_falls_back_on_bad_chain_id() {
        let state = ProviderState::new(vec![], "mainnet");
        assert_eq!(state.net_version(), "mainnet");
    }

    #[test]
    fn test_parse_chain_id() {
        assert_eq!(parse_chain_id("0x4f"), Some(79));
        assert_eq!(parse_chain_id("0x"), None);
        assert_eq!(parse_chain_id("4f"), None);
        assert_eq!(parse_chain_id("0xzz"), None);
    }
}

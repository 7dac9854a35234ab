//! Host-to-page state synchronization.
//!
//! Triggered by host-internal state changes unrelated to any page
//! request (the user switching account or chain in the wallet UI) and
//! by state-changing RPC methods. Diffs the new wallet-visible state
//! against the last-announced snapshot by value and pushes only the
//! events the page hasn't seen yet.

use crate::protocol::{events, EventEnvelope};
use crate::state::ProviderState;
use crate::transport::TransportChannel;
use serde_json::{json, Value};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Pushes wallet state changes to the page as provider events.
pub struct StateSyncController {
    outbound: TransportChannel,
    last: Mutex<ProviderState>,
}

impl StateSyncController {
    /// `initial` must match the state the provider was injected with,
    /// so the first real change produces a diff.
    pub fn new(outbound: TransportChannel, initial: ProviderState) -> Self {
        Self {
            outbound,
            last: Mutex::new(initial),
        }
    }

    /// Announce `next` to the page.
    ///
    /// - accounts differ: `accountsChanged` with the new ordered list
    /// - chain differs: `chainChanged`, plus a synthetic `connect`
    ///   (some pages only re-initialize on connect)
    /// - connectivity flips: `connect` / `disconnect`
    /// - identical to the last announcement: nothing (idempotent)
    pub fn announce(&self, next: &ProviderState) {
        let (accounts_changed, chain_changed, came_up, went_down) = {
            let mut last = self.last.lock().expect("sync snapshot poisoned");
            if *last == *next {
                debug!("state unchanged since last announcement; suppressing");
                return;
            }
            let diff = (
                last.accounts != next.accounts,
                last.chain_id != next.chain_id,
                !last.connected && next.connected,
                last.connected && !next.connected,
            );
            *last = next.clone();
            diff
        };

        if accounts_changed {
            self.push_event(events::ACCOUNTS_CHANGED, json!(next.accounts));
        }
        if chain_changed {
            self.push_event(events::CHAIN_CHANGED, json!(next.chain_id));
        }
        if chain_changed || came_up {
            self.push_event(events::CONNECT, json!({ "chainId": next.chain_id }));
        }
        if went_down {
            self.push_event(
                events::DISCONNECT,
                json!({ "code": 4900, "message": "Provider disconnected." }),
            );
        }
    }

    /// Last state pushed to the page.
    pub fn last_announced(&self) -> ProviderState {
        self.last.lock().expect("sync snapshot poisoned").clone()
    }

    fn push_event(&self, name: &str, data: Value) {
        let envelope = EventEnvelope::new(name, data);
        match serde_json::to_string(&envelope) {
            Ok(text) => {
                if self.outbound.push(text).is_err() {
                    warn!("page context gone; {} event dropped", name);
                }
            }
            Err(e) => warn!("failed to serialize {} event: {}", name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport;

    async fn drain(rx: &mut transport::TransportReceiver) -> Vec<EventEnvelope> {
        let mut out = Vec::new();
        while let Some(raw) = rx.try_recv() {
            out.push(serde_json::from_str(&raw).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_account_change_emits_accounts_changed() {
        let (tx, mut rx) = transport::channel("host->page");
        let sync = StateSyncController::new(tx, ProviderState::new(vec!["0xaaa".into()], "0x1"));

        sync.announce(&ProviderState::new(vec!["0xbbb".into()], "0x1"));
        let events = drain(&mut rx).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name, "accountsChanged");
        assert_eq!(events[0].event_data, json!(["0xbbb"]));
    }

    #[tokio::test]
    async fn test_chain_change_emits_chain_changed_plus_connect() {
        let (tx, mut rx) = transport::channel("host->page");
        let sync = StateSyncController::new(tx, ProviderState::new(vec!["0xaaa".into()], "0x1"));

        sync.announce(&ProviderState::new(vec!["0xaaa".into()], "0x89"));
        let events = drain(&mut rx).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_name, "chainChanged");
        assert_eq!(events[0].event_data, json!("0x89"));
        assert_eq!(events[1].event_name, "connect");
        assert_eq!(events[1].event_data, json!({ "chainId": "0x89" }));
    }

    #[tokio::test]
    async fn test_identical_announcement_suppressed() {
        let (tx, mut rx) = transport::channel("host->page");
        let state = ProviderState::new(vec!["0xaaa".into()], "0x1");
        let sync = StateSyncController::new(tx, state.clone());

        sync.announce(&state);
        sync.announce(&state);
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_account_push_emits_once() {
        let (tx, mut rx) = transport::channel("host->page");
        let sync = StateSyncController::new(tx, ProviderState::new(vec!["0xaaa".into()], "0x1"));

        let next = ProviderState::new(vec!["0xbbb".into()], "0x1");
        sync.announce(&next);
        sync.announce(&next);

        let events = drain(&mut rx).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name, "accountsChanged");
    }

    #[tokio::test]
    async fn test_disconnect_flip() {
        let (tx, mut rx) = transport::channel("host->page");
        let sync = StateSyncController::new(tx, ProviderState::new(vec!["0xaaa".into()], "0x1"));

        let mut down = sync.last_announced();
        down.connected = false;
        sync.announce(&down);

        let events = drain(&mut rx).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name, "disconnect");
        assert_eq!(events[0].event_data["code"], json!(4900));
    }

    #[tokio::test]
    async fn test_combined_change_orders_accounts_then_chain() {
        let (tx, mut rx) = transport::channel("host->page");
        let sync = StateSyncController::new(tx, ProviderState::new(vec!["0xaaa".into()], "0x1"));

        sync.announce(&ProviderState::new(vec!["0xbbb".into()], "0x89"));
        let events = drain(&mut rx).await;

        let names: Vec<&str> = events.iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(names, vec!["accountsChanged", "chainChanged", "connect"]);
    }

    #[tokio::test]
    async fn test_dead_page_drops_events_without_fault() {
        let (tx, rx) = transport::channel("host->page");
        drop(rx);
        let sync = StateSyncController::new(tx, ProviderState::new(vec![], "0x1"));
        sync.announce(&ProviderState::new(vec!["0xaaa".into()], "0x1"));
    }
}

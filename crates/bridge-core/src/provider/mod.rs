//! In-page provider shim.
//!
//! This is the object a dApp talks to: `request()` plus the event
//! subscription surface, backed by a pending-request table keyed by
//! correlation id and a cached read-only state snapshot. It never
//! blocks the page thread — forwarded requests suspend only on the
//! returned future, which is settled from the transport receive loop.

mod inject;

pub use inject::{InjectOutcome, PageBinding};

use crate::config::BridgeConfig;
use crate::emitter::{EventEmitter, ListenerHandle};
use crate::error::{BridgeError, Result};
use crate::protocol::{events, EventEnvelope, HostMessage, RequestEnvelope, RpcErrorObject};
use crate::state::ProviderState;
use crate::transport::TransportChannel;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// Settlement value carried through the pending table.
type Outcome = std::result::Result<Value, RpcErrorObject>;

/// Read-only methods answered synchronously from the cached snapshot,
/// bypassing the transport entirely.
const FAST_PATH_METHODS: [&str; 4] = [
    "eth_accounts",
    "eth_chainId",
    "net_version",
    "web3_clientVersion",
];

/// The EIP-1193-shaped provider living in the page context.
pub struct InPageProvider {
    state: Mutex<ProviderState>,
    pending: Mutex<HashMap<String, tokio::sync::oneshot::Sender<Outcome>>>,
    emitter: EventEmitter,
    outbound: TransportChannel,
    config: BridgeConfig,
}

impl InPageProvider {
    pub fn new(outbound: TransportChannel, initial: ProviderState, config: BridgeConfig) -> Self {
        Self {
            state: Mutex::new(initial),
            pending: Mutex::new(HashMap::new()),
            emitter: EventEmitter::new(),
            outbound,
            config,
        }
    }

    /// Current state snapshot (accounts, chain id, connectivity).
    pub fn state(&self) -> ProviderState {
        self.state.lock().expect("provider state poisoned").clone()
    }

    /// True while the bridge considers itself connected.
    pub fn is_connected(&self) -> bool {
        self.state.lock().expect("provider state poisoned").connected
    }

    /// Primary dApp entry point.
    ///
    /// Read-only methods on the allow-list resolve from the cached
    /// snapshot with zero transport messages. Everything else is
    /// forwarded to the host under a fresh correlation id; the returned
    /// future settles exactly once, when the matching response arrives
    /// (or the configured timeout elapses).
    pub async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        if let Some(value) = self.try_fast_path(method) {
            return Ok(value);
        }

        let id = new_request_id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.pending
            .lock()
            .expect("pending table poisoned")
            .insert(id.clone(), tx);

        let envelope = RequestEnvelope::new(id.clone(), method, params);
        let payload = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(e) => {
                self.forget(&id);
                return Err(e.into());
            }
        };
        if let Err(e) = self.outbound.push(payload) {
            self.forget(&id);
            return Err(e);
        }
        debug!("forwarded {} as request {}", method, id);

        match self.config.request_timeout {
            None => match rx.await {
                Ok(outcome) => outcome.map_err(BridgeError::from),
                Err(_) => Err(BridgeError::ChannelClosed),
            },
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(Ok(outcome)) => outcome.map_err(BridgeError::from),
                Ok(Err(_)) => Err(BridgeError::ChannelClosed),
                Err(_) => {
                    self.forget(&id);
                    warn!("request {} ({}) timed out", id, method);
                    Err(BridgeError::RequestTimeout {
                        elapsed_ms: deadline.as_millis() as u64,
                    })
                }
            },
        }
    }

    /// Legacy calling convention: method string plus positional params.
    /// Reduces to [`request`](Self::request).
    pub async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.request(method, params).await
    }

    /// Legacy callback convention: payload object plus callback.
    ///
    /// The payload's own `id` is not used for correlation — legacy ids
    /// are caller-chosen and not unique — a fresh id is minted inside
    /// `request()` as for every forwarded call.
    pub fn send_async<F>(self: &Arc<Self>, payload: RequestEnvelope, callback: F)
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let provider = self.clone();
        tokio::spawn(async move {
            let outcome = provider.request(&payload.method, payload.params).await;
            callback(outcome);
        });
    }

    /// Subscribe to a provider event (`accountsChanged`, `chainChanged`,
    /// `connect`, `disconnect`, `message`).
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerHandle
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.emitter.on(event, listener)
    }

    /// Remove a previously registered listener.
    pub fn remove_listener(&self, handle: &ListenerHandle) {
        self.emitter.remove_listener(handle)
    }

    /// Feed one raw transport payload from the host into the provider.
    ///
    /// Malformed payloads are dropped with a diagnostic; a response for
    /// an unknown or already-settled id is ignored, never double-applied.
    pub fn handle_incoming(&self, raw: &str) {
        let message: HostMessage = match serde_json::from_str(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!("dropping malformed host payload: {}", e);
                return;
            }
        };
        match message {
            HostMessage::Response(resp) => {
                let entry = self
                    .pending
                    .lock()
                    .expect("pending table poisoned")
                    .remove(&resp.id);
                match entry {
                    Some(tx) => {
                        // The requester may be gone (page context torn
                        // down mid-flight); the send error is expected
                        // then and carries nothing to act on.
                        let _ = tx.send(resp.into_outcome());
                    }
                    None => warn!("response for unknown or settled id {}", resp.id),
                }
            }
            HostMessage::Event(event) => self.handle_event(event),
        }
    }

    /// Number of unsettled forwarded requests.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("pending table poisoned").len()
    }

    pub(crate) fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    fn try_fast_path(&self, method: &str) -> Option<Value> {
        if !FAST_PATH_METHODS.contains(&method) {
            return None;
        }
        let state = self.state.lock().expect("provider state poisoned");
        let value = match method {
            "eth_accounts" => json!(state.accounts),
            "eth_chainId" => json!(state.chain_id),
            "net_version" => json!(state.net_version()),
            "web3_clientVersion" => json!(self.config.client_version),
            _ => unreachable!("method checked against the allow-list"),
        };
        Some(value)
    }

    /// Apply a host-pushed event to the cached snapshot, then re-emit
    /// it to dApp listeners. State mutation happens before emission so
    /// listeners reading back through the provider see the new values.
    fn handle_event(&self, event: EventEnvelope) {
        {
            let mut state = self.state.lock().expect("provider state poisoned");
            match event.event_name.as_str() {
                events::ACCOUNTS_CHANGED => {
                    match serde_json::from_value::<Vec<String>>(event.event_data.clone()) {
                        Ok(accounts) => state.accounts = accounts,
                        Err(e) => warn!("accountsChanged with bad payload: {}", e),
                    }
                }
                events::CHAIN_CHANGED => match event.event_data.as_str() {
                    Some(chain_id) => state.chain_id = chain_id.to_string(),
                    None => warn!("chainChanged with non-string payload"),
                },
                events::CONNECT => state.connected = true,
                events::DISCONNECT => state.connected = false,
                _ => {}
            }
        }
        self.emitter.emit(&event.event_name, &event.event_data);
    }

    fn forget(&self, id: &str) {
        self.pending
            .lock()
            .expect("pending table poisoned")
            .remove(id);
    }
}

/// Mint a correlation id guaranteed not to collide with any outstanding
/// id. UUIDv4 gives 122 bits of entropy, comfortably past the
/// timestamp-plus-random-suffix bar the wire format asks for.
fn new_request_id() -> String {
    Uuid::new_v4().simple().to_string()
}

//! Host-side request router.
//!
//! Parses incoming page traffic, dispatches through the closed method
//! table, and answers every recoverable request with exactly one
//! response envelope. Each message is served on its own task, so a
//! request parked on a user-confirmation prompt never blocks unrelated
//! requests — responses may therefore leave in a different order than
//! their requests arrived, and the page correlates strictly by id.

mod backend;
mod methods;

pub use backend::SigningBackend;
pub use methods::{ChainDescriptor, NativeCurrency, RpcCall, TransactionRequest};

use crate::error::{BridgeError, Result};
use crate::protocol::{recover_id, RequestEnvelope, ResponseEnvelope};
use crate::state::ProviderState;
use crate::sync::StateSyncController;
use crate::transport::{TransportChannel, TransportReceiver};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Host-side wallet-visible state: active accounts, current chain, and
/// the registry of chains the wallet will switch to.
pub struct WalletSession {
    inner: Mutex<SessionState>,
}

struct SessionState {
    accounts: Vec<String>,
    chain_id: String,
    known_chains: HashMap<String, ChainDescriptor>,
    connected: bool,
}

impl WalletSession {
    pub fn new(accounts: Vec<String>, chain_id: impl Into<String>) -> Self {
        let chain_id = chain_id.into();
        let mut known_chains = HashMap::new();
        known_chains.insert(
            chain_id.clone(),
            ChainDescriptor {
                chain_id: chain_id.clone(),
                chain_name: None,
                rpc_urls: Vec::new(),
                native_currency: None,
                block_explorer_urls: Vec::new(),
            },
        );
        Self {
            inner: Mutex::new(SessionState {
                accounts,
                chain_id,
                known_chains,
                connected: true,
            }),
        }
    }

    /// The page-facing view of this session.
    pub fn snapshot(&self) -> ProviderState {
        let inner = self.inner.lock().expect("session state poisoned");
        ProviderState {
            accounts: inner.accounts.clone(),
            chain_id: inner.chain_id.clone(),
            connected: inner.connected,
        }
    }

    pub fn accounts(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("session state poisoned")
            .accounts
            .clone()
    }

    pub fn chain_id(&self) -> String {
        self.inner
            .lock()
            .expect("session state poisoned")
            .chain_id
            .clone()
    }

    pub fn is_known_chain(&self, chain_id: &str) -> bool {
        self.inner
            .lock()
            .expect("session state poisoned")
            .known_chains
            .contains_key(chain_id)
    }

    fn set_accounts(&self, accounts: Vec<String>) {
        self.inner.lock().expect("session state poisoned").accounts = accounts;
    }

    /// Returns false when the chain was already current.
    fn set_chain(&self, chain_id: &str) -> bool {
        let mut inner = self.inner.lock().expect("session state poisoned");
        if inner.chain_id == chain_id {
            return false;
        }
        inner.chain_id = chain_id.to_string();
        true
    }

    fn add_chain(&self, descriptor: ChainDescriptor) {
        let mut inner = self.inner.lock().expect("session state poisoned");
        inner
            .known_chains
            .insert(descriptor.chain_id.clone(), descriptor);
    }

    fn set_connected(&self, connected: bool) {
        self.inner.lock().expect("session state poisoned").connected = connected;
    }
}

/// The host-side request router.
pub struct HostRouter {
    session: Arc<WalletSession>,
    backend: Arc<dyn SigningBackend>,
    sync: StateSyncController,
    outbound: TransportChannel,
}

impl HostRouter {
    pub fn new(
        session: Arc<WalletSession>,
        backend: Arc<dyn SigningBackend>,
        outbound: TransportChannel,
    ) -> Arc<Self> {
        let sync = StateSyncController::new(outbound.clone(), session.snapshot());
        Arc::new(Self {
            session,
            backend,
            sync,
            outbound,
        })
    }

    /// Consume page-to-host traffic, serving each message on its own
    /// task so confirmation waits never block delivery of the rest.
    pub fn spawn_serve(self: &Arc<Self>, mut inbound: TransportReceiver) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            while let Some(raw) = inbound.recv().await {
                let router = router.clone();
                tokio::spawn(async move {
                    router.handle_message(&raw).await;
                });
            }
            debug!("page->host channel drained; router serve loop ending");
        })
    }

    /// Handle one raw transport payload.
    ///
    /// Emits exactly one response per recoverable request id: parse
    /// failures answer a protocol error when an id can be salvaged from
    /// the raw JSON, and drop silently (logged) when it cannot.
    pub async fn handle_message(&self, raw: &str) {
        let envelope: RequestEnvelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                match recover_id(raw) {
                    Some(id) => {
                        warn!("malformed request {}: {}", id, e);
                        let err = BridgeError::Protocol {
                            message: format!("malformed request envelope: {}", e),
                        };
                        self.respond(ResponseEnvelope::error(id, err.into_rpc_error()));
                    }
                    // No id to answer under; the page's future stays
                    // unsettled (its owner decides via timeout policy).
                    None => warn!("dropping unparseable request with no recoverable id: {}", e),
                }
                return;
            }
        };

        let id = envelope.id.clone();
        debug!("dispatching {} (request {})", envelope.method, id);
        let outcome = match RpcCall::parse(&envelope) {
            Ok(call) => self.dispatch(call).await,
            Err(e) => Err(e),
        };

        let response = match outcome {
            Ok(result) => ResponseEnvelope::success(id, result),
            Err(e) => {
                debug!("request {} failed: {} (code {})", envelope.id, e, e.code());
                ResponseEnvelope::error(id, e.into_rpc_error())
            }
        };
        self.respond(response);
    }

    /// Host-originated account change (wallet UI). Mutates the session
    /// and pushes the diff to the page.
    pub fn set_accounts(&self, accounts: Vec<String>) {
        self.session.set_accounts(accounts);
        self.sync.announce(&self.session.snapshot());
    }

    /// Host-originated chain switch (wallet UI). The wallet UI is
    /// authoritative, so an unknown chain is registered on the fly.
    pub fn set_chain(&self, chain_id: &str) {
        if !self.session.is_known_chain(chain_id) {
            self.session.add_chain(ChainDescriptor {
                chain_id: chain_id.to_string(),
                chain_name: None,
                rpc_urls: Vec::new(),
                native_currency: None,
                block_explorer_urls: Vec::new(),
            });
        }
        self.session.set_chain(chain_id);
        self.sync.announce(&self.session.snapshot());
    }

    /// Host-originated connectivity change.
    pub fn set_connected(&self, connected: bool) {
        self.session.set_connected(connected);
        self.sync.announce(&self.session.snapshot());
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    async fn dispatch(&self, call: RpcCall) -> Result<Value> {
        match call {
            RpcCall::RequestAccounts => {
                let accounts = self.session.accounts();
                if accounts.is_empty() {
                    return Err(BridgeError::WalletNotReady);
                }
                Ok(json!(accounts))
            }

            RpcCall::Accounts => Ok(json!(self.session.accounts())),

            RpcCall::ChainId => Ok(json!(self.session.chain_id())),

            RpcCall::NetVersion => Ok(json!(self.session.snapshot().net_version())),

            RpcCall::PersonalSign { message, address } => {
                let account = self.resolve_account("personal_sign", address)?;
                let signature = self.backend.sign_message(&message, &account).await?;
                Ok(json!(signature))
            }

            RpcCall::EthSign { address, message } => {
                let account = self.resolve_account("eth_sign", Some(address))?;
                let signature = self.backend.sign_message(&message, &account).await?;
                Ok(json!(signature))
            }

            RpcCall::SignTypedDataV4 {
                address,
                typed_data,
            } => {
                let account = self.resolve_account("eth_signTypedData_v4", Some(address))?;
                let signature = self.backend.sign_typed_data(&typed_data, &account).await?;
                Ok(json!(signature))
            }

            RpcCall::SendTransaction(tx) => {
                let account = self.resolve_account("eth_sendTransaction", tx.from.clone())?;
                let hash = self.backend.send_transaction(&tx, &account).await?;
                Ok(json!(hash))
            }

            RpcCall::SwitchChain { chain_id } => {
                if !self.session.is_known_chain(&chain_id) {
                    return Err(BridgeError::ChainUnrecognized { chain_id });
                }
                if self.session.set_chain(&chain_id) {
                    // Pages may rely on either the RPC result or the
                    // pushed chainChanged event; both fire.
                    self.sync.announce(&self.session.snapshot());
                }
                // Resolves with null per EIP-3326
                Ok(Value::Null)
            }

            RpcCall::AddChain(descriptor) => {
                self.session.add_chain(descriptor);
                Ok(Value::Null)
            }
        }
    }

    /// Resolve the signing account for a request: the named address
    /// when it belongs to the session, the selected account when no
    /// address was given.
    fn resolve_account(&self, method: &str, address: Option<String>) -> Result<String> {
        let accounts = self.session.accounts();
        let selected = accounts.first().cloned().ok_or(BridgeError::WalletNotReady)?;
        match address {
            None => Ok(selected),
            Some(addr) => {
                if accounts.iter().any(|a| a.eq_ignore_ascii_case(&addr)) {
                    Ok(addr)
                } else {
                    Err(BridgeError::InvalidParams {
                        method: method.to_string(),
                        message: format!("address {} is not an active account", addr),
                    })
                }
            }
        }
    }

    fn respond(&self, response: ResponseEnvelope) {
        match serde_json::to_string(&response) {
            Ok(text) => {
                if self.outbound.push(text).is_err() {
                    warn!("page context gone; response {} dropped", response.id);
                }
            }
            Err(e) => warn!("failed to serialize response {}: {}", response.id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::backend::mock::{ApprovingBackend, RejectingBackend};
    use super::*;
    use crate::protocol::{EventEnvelope, HostMessage};
    use crate::transport;

    fn test_router(
        backend: Arc<dyn SigningBackend>,
    ) -> (Arc<HostRouter>, transport::TransportReceiver) {
        let (host_out, page_in) = transport::channel("host->page");
        let session = Arc::new(WalletSession::new(vec!["0xAAA".into()], "0x4f"));
        (HostRouter::new(session, backend, host_out), page_in)
    }

    async fn roundtrip(
        router: &HostRouter,
        page_in: &mut transport::TransportReceiver,
        request: &str,
    ) -> ResponseEnvelope {
        router.handle_message(request).await;
        let raw = page_in.recv().await.expect("expected a response");
        match serde_json::from_str(&raw).unwrap() {
            HostMessage::Response(resp) => resp,
            HostMessage::Event(e) => panic!("expected response, got event {:?}", e.event_name),
        }
    }

    #[tokio::test]
    async fn test_request_accounts() {
        let (router, mut page_in) = test_router(Arc::new(ApprovingBackend));
        let resp = roundtrip(
            &router,
            &mut page_in,
            r#"{"id":"r1","method":"eth_requestAccounts","params":[]}"#,
        )
        .await;
        assert_eq!(resp.into_outcome().unwrap(), json!(["0xAAA"]));
    }

    #[tokio::test]
    async fn test_request_accounts_without_account_is_not_ready() {
        let (host_out, mut page_in) = transport::channel("host->page");
        let session = Arc::new(WalletSession::new(vec![], "0x1"));
        let router = HostRouter::new(session, Arc::new(ApprovingBackend), host_out);

        let resp = roundtrip(
            &router,
            &mut page_in,
            r#"{"id":"r1","method":"eth_requestAccounts","params":[]}"#,
        )
        .await;
        let err = resp.into_outcome().unwrap_err();
        assert_eq!(err.code, -32000);
    }

    #[tokio::test]
    async fn test_unknown_method_code() {
        let (router, mut page_in) = test_router(Arc::new(ApprovingBackend));
        let resp = roundtrip(
            &router,
            &mut page_in,
            r#"{"id":"r2","method":"eth_mining","params":[]}"#,
        )
        .await;
        assert_eq!(resp.into_outcome().unwrap_err().code, -32601);
    }

    #[tokio::test]
    async fn test_rejected_transaction_maps_to_4001() {
        let (router, mut page_in) = test_router(Arc::new(RejectingBackend));
        let resp = roundtrip(
            &router,
            &mut page_in,
            r#"{"id":"r2","method":"eth_sendTransaction","params":[{"to":"0xabc","value":"0x1"}]}"#,
        )
        .await;
        assert_eq!(resp.id, "r2");
        let err = resp.into_outcome().unwrap_err();
        assert_eq!(err.code, 4001);
        assert_eq!(err.message, "User rejected transaction.");
    }

    #[tokio::test]
    async fn test_sign_for_foreign_address_is_invalid_params() {
        let (router, mut page_in) = test_router(Arc::new(ApprovingBackend));
        let resp = roundtrip(
            &router,
            &mut page_in,
            r#"{"id":"r3","method":"personal_sign","params":["0xdead","0xFFF"]}"#,
        )
        .await;
        assert_eq!(resp.into_outcome().unwrap_err().code, -32602);
    }

    #[tokio::test]
    async fn test_sign_account_match_is_case_insensitive() {
        let (router, mut page_in) = test_router(Arc::new(ApprovingBackend));
        let resp = roundtrip(
            &router,
            &mut page_in,
            r#"{"id":"r4","method":"personal_sign","params":["0xdead","0xaaa"]}"#,
        )
        .await;
        assert_eq!(resp.into_outcome().unwrap(), json!("0xsig:0xdead"));
    }

    #[tokio::test]
    async fn test_switch_to_unknown_chain_is_4902() {
        let (router, mut page_in) = test_router(Arc::new(ApprovingBackend));
        let resp = roundtrip(
            &router,
            &mut page_in,
            r#"{"id":"r5","method":"wallet_switchEthereumChain","params":[{"chainId":"0x89"}]}"#,
        )
        .await;
        assert_eq!(resp.into_outcome().unwrap_err().code, 4902);
    }

    #[tokio::test]
    async fn test_add_then_switch_chain_responds_and_syncs() {
        let (router, mut page_in) = test_router(Arc::new(ApprovingBackend));

        let resp = roundtrip(
            &router,
            &mut page_in,
            r#"{"id":"r6","method":"wallet_addEthereumChain","params":[{"chainId":"0x89","chainName":"Polygon","rpcUrls":["https://polygon-rpc.com"]}]}"#,
        )
        .await;
        assert_eq!(resp.into_outcome().unwrap(), Value::Null);

        router
            .handle_message(
                r#"{"id":"r7","method":"wallet_switchEthereumChain","params":[{"chainId":"0x89"}]}"#,
            )
            .await;

        // Direct RPC result plus the pushed event pair, in some order
        let mut response = None;
        let mut events: Vec<EventEnvelope> = Vec::new();
        for _ in 0..3 {
            let raw = page_in.recv().await.unwrap();
            match serde_json::from_str(&raw).unwrap() {
                HostMessage::Response(r) => response = Some(r),
                HostMessage::Event(e) => events.push(e),
            }
        }
        let resp = response.expect("switch must produce a direct response");
        assert_eq!(resp.id, "r7");
        assert_eq!(resp.into_outcome().unwrap(), Value::Null);

        let names: Vec<&str> = events.iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(names, vec!["chainChanged", "connect"]);
        assert_eq!(router.session().chain_id(), "0x89");
    }

    #[tokio::test]
    async fn test_switch_to_current_chain_is_quiet_success() {
        let (router, mut page_in) = test_router(Arc::new(ApprovingBackend));
        let resp = roundtrip(
            &router,
            &mut page_in,
            r#"{"id":"r8","method":"wallet_switchEthereumChain","params":[{"chainId":"0x4f"}]}"#,
        )
        .await;
        assert_eq!(resp.into_outcome().unwrap(), Value::Null);
        // No sync events for a no-op switch
        assert!(page_in.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_with_recoverable_id_gets_protocol_error() {
        let (router, mut page_in) = test_router(Arc::new(ApprovingBackend));
        // `method` has the wrong type, but `id` is salvageable
        let resp = roundtrip(&router, &mut page_in, r#"{"id":"r9","method":42}"#).await;
        assert_eq!(resp.id, "r9");
        assert_eq!(resp.into_outcome().unwrap_err().code, -32700);
    }

    #[tokio::test]
    async fn test_unrecoverable_payload_is_dropped_silently() {
        let (router, mut page_in) = test_router(Arc::new(ApprovingBackend));
        router.handle_message("{truncated").await;
        router.handle_message(r#"{"method":"eth_accounts"}"#).await;
        assert!(page_in.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_host_account_switch_announces_once() {
        let (router, mut page_in) = test_router(Arc::new(ApprovingBackend));

        router.set_accounts(vec!["0xBBB".into()]);
        router.set_accounts(vec!["0xBBB".into()]);

        let first = page_in.try_recv().expect("one accountsChanged event");
        match serde_json::from_str(&first).unwrap() {
            HostMessage::Event(e) => {
                assert_eq!(e.event_name, "accountsChanged");
                assert_eq!(e.event_data, json!(["0xBBB"]));
            }
            other => panic!("expected event, got {:?}", other),
        }
        assert!(page_in.try_recv().is_none());
    }
}

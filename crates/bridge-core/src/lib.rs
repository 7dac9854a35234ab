//! Provider bridge between an embedded dApp page and its wallet host.
//!
//! The crate is split along the page/host boundary:
//!
//! - [`transport`] — the ordered string-message channel both sides share
//! - [`provider`] — the page side: the EIP-1193-shaped object dApps
//!   call, with its pending-request table and cached state snapshot
//! - [`router`] — the host side: the closed method table, dispatch, and
//!   the signing seam
//! - [`sync`] — host-to-page state push with duplicate suppression
//!
//! Everything on the wire is a JSON string in one of the three envelope
//! shapes defined in [`protocol`]. The two sides never share memory;
//! an in-process pairing for tests and embedding lives in
//! [`in_process`].

pub mod config;
pub mod emitter;
pub mod error;
pub mod protocol;
pub mod provider;
pub mod router;
pub mod state;
pub mod sync;
pub mod transport;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use provider::{InPageProvider, InjectOutcome, PageBinding};
pub use router::{HostRouter, SigningBackend, WalletSession};
pub use state::ProviderState;

use std::sync::Arc;
use tokio::task::JoinHandle;

/// A fully wired in-process bridge: page provider on one end, host
/// router on the other, joined by a duplex transport.
pub struct InProcessBridge {
    pub binding: PageBinding,
    pub router: Arc<HostRouter>,
    provider: Arc<InPageProvider>,
    serve_loop: JoinHandle<()>,
}

impl InProcessBridge {
    /// The installed page provider.
    pub fn provider(&self) -> Arc<InPageProvider> {
        self.provider.clone()
    }

    /// Tear down both ends.
    pub fn shutdown(self) {
        self.binding.teardown();
        self.serve_loop.abort();
    }
}

/// Wire a provider and a router back-to-back in one process.
///
/// Used by the demo host and the integration tests; a real embedding
/// replaces the duplex pair with its webview message channel.
pub fn in_process(
    accounts: Vec<String>,
    chain_id: &str,
    backend: Arc<dyn SigningBackend>,
    config: BridgeConfig,
) -> InProcessBridge {
    let wire = transport::duplex();

    let session = Arc::new(WalletSession::new(accounts, chain_id));
    let initial = session.snapshot();
    let router = HostRouter::new(session, backend, wire.host_out);
    let serve_loop = router.spawn_serve(wire.host_in);

    let binding = PageBinding::new();
    let outcome = binding.inject(wire.page_out, wire.page_in, initial, config);
    let provider = outcome
        .provider()
        .cloned()
        .unwrap_or_else(|| unreachable!("fresh binding cannot hold a foreign provider"));

    InProcessBridge {
        binding,
        router,
        provider,
        serve_loop,
    }
}

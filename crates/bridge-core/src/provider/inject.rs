//! Page-context injection guard.
//!
//! `PageBinding` models the page-global provider slot for one page
//! context. There is no ambient singleton: a binding is constructed
//! per page lifecycle and exposes explicit inject/teardown. Injection
//! is guarded so a canonical extension-provided wallet is never
//! overwritten, and re-injection over our own prior instance is an
//! atomic replacement (old receive loop aborted, no duplicate
//! listeners survive).

use crate::config::BridgeConfig;
use crate::protocol::events;
use crate::provider::InPageProvider;
use crate::state::ProviderState;
use crate::transport::{TransportChannel, TransportReceiver};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What `inject` did with the provider slot.
pub enum InjectOutcome {
    /// Fresh install into an empty (or non-canonical foreign) slot.
    Injected(Arc<InPageProvider>),
    /// Atomic replacement of our own prior instance.
    Replaced(Arc<InPageProvider>),
    /// A canonical extension wallet already owns the slot; untouched.
    SkippedForeignProvider,
}

impl InjectOutcome {
    /// The installed provider, when injection happened.
    pub fn provider(&self) -> Option<&Arc<InPageProvider>> {
        match self {
            InjectOutcome::Injected(p) | InjectOutcome::Replaced(p) => Some(p),
            InjectOutcome::SkippedForeignProvider => None,
        }
    }
}

enum SlotState {
    Empty,
    /// A provider some other party installed before us.
    Foreign { canonical: bool },
    Bridge(InstalledBridge),
}

struct InstalledBridge {
    provider: Arc<InPageProvider>,
    receive_loop: JoinHandle<()>,
}

/// The provider slot for one page context.
pub struct PageBinding {
    slot: Mutex<SlotState>,
}

impl Default for PageBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl PageBinding {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(SlotState::Empty),
        }
    }

    /// Record a provider installed by another party (e.g. a browser
    /// extension). `canonical` marks it as the extension-provided
    /// wallet that injection must not overwrite.
    pub fn register_foreign(&self, canonical: bool) {
        let mut slot = self.slot.lock().expect("provider slot poisoned");
        if let SlotState::Bridge(_) = *slot {
            warn!("register_foreign over an installed bridge; ignoring");
            return;
        }
        *slot = SlotState::Foreign { canonical };
    }

    /// Install the bridge provider into this page context.
    ///
    /// The receive loop consuming `inbound` is spawned here and owned
    /// by the slot; teardown or replacement aborts it.
    pub fn inject(
        &self,
        outbound: TransportChannel,
        inbound: TransportReceiver,
        initial: ProviderState,
        config: BridgeConfig,
    ) -> InjectOutcome {
        let mut slot = self.slot.lock().expect("provider slot poisoned");

        if let SlotState::Foreign { canonical: true } = *slot {
            warn!("canonical wallet provider already present; skipping injection");
            return InjectOutcome::SkippedForeignProvider;
        }

        let chain_id = initial.chain_id.clone();
        let provider = Arc::new(InPageProvider::new(outbound, initial, config));
        let receive_loop = spawn_receive_loop(provider.clone(), inbound);

        let replaced = matches!(*slot, SlotState::Bridge(_));
        if let SlotState::Bridge(old) = std::mem::replace(
            &mut *slot,
            SlotState::Bridge(InstalledBridge {
                provider: provider.clone(),
                receive_loop,
            }),
        ) {
            // In-flight requests of the old instance stay unsettled;
            // their owner is gone with the old page script context.
            old.receive_loop.abort();
            debug!("re-injection: prior bridge instance replaced");
        }
        drop(slot);

        // Signal readiness the way dApps expect from a wallet provider.
        provider
            .emitter()
            .emit(events::CONNECT, &json!({ "chainId": chain_id }));
        info!("provider injected (chain {})", chain_id);

        if replaced {
            InjectOutcome::Replaced(provider)
        } else {
            InjectOutcome::Injected(provider)
        }
    }

    /// The currently installed bridge provider, if any.
    pub fn provider(&self) -> Option<Arc<InPageProvider>> {
        match &*self.slot.lock().expect("provider slot poisoned") {
            SlotState::Bridge(installed) => Some(installed.provider.clone()),
            _ => None,
        }
    }

    /// Explicit teardown for page navigation or reload. Idempotent.
    pub fn teardown(&self) {
        let mut slot = self.slot.lock().expect("provider slot poisoned");
        if let SlotState::Bridge(installed) = std::mem::replace(&mut *slot, SlotState::Empty) {
            installed.receive_loop.abort();
            debug!("provider slot torn down");
        }
    }
}

impl Drop for PageBinding {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn spawn_receive_loop(
    provider: Arc<InPageProvider>,
    mut inbound: TransportReceiver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(raw) = inbound.recv().await {
            provider.handle_incoming(&raw);
        }
        debug!("host->page channel drained; receive loop ending");
    })
}

//! One-directional, push-based, ordered string-message transport.
//!
//! This is the only primitive the two sides share: push a UTF-8 JSON
//! string to the peer, receive strings pushed by the peer. Delivery is
//! FIFO per direction (the underlying mpsc channel's own guarantee);
//! nothing is guaranteed across a torn-down context. The transport has
//! no semantics of its own — envelope parsing and correlation live in
//! the provider and router.

use crate::error::{BridgeError, Result};
use tokio::sync::mpsc;
use tracing::debug;

/// Push side of one direction of the bridge.
#[derive(Debug, Clone)]
pub struct TransportChannel {
    tx: mpsc::UnboundedSender<String>,
    label: &'static str,
}

impl TransportChannel {
    /// Push one message to the peer. Fails soft with `ChannelClosed`
    /// when the peer's context has been torn down.
    pub fn push(&self, payload: String) -> Result<()> {
        self.tx.send(payload).map_err(|_| {
            debug!("transport {}: peer gone, message dropped", self.label);
            BridgeError::ChannelClosed
        })
    }

    /// Direction label, for diagnostics.
    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// Receive side of one direction of the bridge.
#[derive(Debug)]
pub struct TransportReceiver {
    rx: mpsc::UnboundedReceiver<String>,
    label: &'static str,
}

impl TransportReceiver {
    /// Receive the next message in FIFO order, or `None` once the
    /// sending side is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Non-blocking poll; `None` when no message is queued right now.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// Build one direction of the bridge.
pub fn channel(label: &'static str) -> (TransportChannel, TransportReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        TransportChannel { tx, label },
        TransportReceiver { rx, label },
    )
}

/// Both directions of a page<->host bridge.
///
/// `page_out` / `host_in` carry dApp requests; `host_out` / `page_in`
/// carry responses and host-pushed events.
pub struct DuplexTransport {
    pub page_out: TransportChannel,
    pub host_in: TransportReceiver,
    pub host_out: TransportChannel,
    pub page_in: TransportReceiver,
}

/// Build the two directions of an in-process bridge.
pub fn duplex() -> DuplexTransport {
    let (page_out, host_in) = channel("page->host");
    let (host_out, page_in) = channel("host->page");
    DuplexTransport {
        page_out,
        host_in,
        host_out,
        page_in,
    }
}

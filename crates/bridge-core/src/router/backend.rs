//! Signing/broadcast collaborator seam.
//!
//! The router never touches key material. Everything that needs a key
//! or a user confirmation goes through [`SigningBackend`]; a refusal at
//! the confirmation prompt comes back as `UserRejected`, which the
//! router keeps distinct from technical failure.

use crate::error::Result;
use crate::router::methods::TransactionRequest;
use async_trait::async_trait;
use serde_json::Value;

/// External signing/broadcast service consumed by the host router.
///
/// Implementations are expected to block (asynchronously) on user
/// confirmation where their policy requires it; the router serves each
/// request on its own task, so a pending prompt never delays unrelated
/// traffic.
#[async_trait]
pub trait SigningBackend: Send + Sync {
    /// Sign a raw message for `account`, returning the signature hex.
    async fn sign_message(&self, message: &str, account: &str) -> Result<String>;

    /// Sign an EIP-712 typed-data payload for `account`.
    async fn sign_typed_data(&self, typed_data: &Value, account: &str) -> Result<String>;

    /// Sign and broadcast a transaction for `account`, returning the
    /// transaction hash.
    async fn send_transaction(&self, tx: &TransactionRequest, account: &str) -> Result<String>;
}

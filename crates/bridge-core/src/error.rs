//! Error types for the provider bridge.
//!
//! Every failure that can cross the page/host boundary is represented here
//! and carries a stable numeric code, so handler faults always surface as
//! well-formed response envelopes instead of crashing either side.

use crate::protocol::RpcErrorObject;
use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A transport payload or envelope could not be parsed.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Method not supported: {method}")]
    MethodNotSupported { method: String },

    /// Well-formed envelope, wrong parameter shape for the method.
    #[error("Invalid params for {method}: {message}")]
    InvalidParams { method: String, message: String },

    /// The user declined a confirmation prompt. Distinct from technical
    /// failure so dApps can tell "no" apart from "broken".
    #[error("{message}")]
    UserRejected { message: String },

    #[error("Unrecognized chain ID: {chain_id}")]
    ChainUnrecognized { chain_id: String },

    /// No active account in the wallet session.
    #[error("Wallet not initialized.")]
    WalletNotReady,

    /// The other side of the transport is gone.
    #[error("Bridge channel closed")]
    ChannelClosed,

    /// A configured request timeout elapsed before the host answered.
    #[error("Request timed out after {elapsed_ms}ms")]
    RequestTimeout { elapsed_ms: u64 },

    /// An error envelope delivered by the host, surfaced on the page side.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(RpcErrorObject),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Internal {
            message: format!("JSON error: {}", err),
        }
    }
}

impl BridgeError {
    /// Numeric code carried in the wire error object.
    ///
    /// Standard JSON-RPC codes:
    /// - -32700: Parse error (malformed envelope)
    /// - -32601: Method not found
    /// - -32602: Invalid params
    /// - -32603: Internal error
    ///
    /// EIP-1193 provider codes:
    /// - 4001: User rejected the request
    /// - 4902: Unrecognized chain ID
    ///
    /// Application-defined codes (-32000 to -32099):
    /// - -32000: Wallet not ready (no active account)
    /// - -32001: Bridge channel closed
    /// - -32002: Request timed out
    pub fn code(&self) -> i32 {
        match self {
            BridgeError::Protocol { .. } => -32700,
            BridgeError::MethodNotSupported { .. } => -32601,
            BridgeError::InvalidParams { .. } => -32602,
            BridgeError::UserRejected { .. } => 4001,
            BridgeError::ChainUnrecognized { .. } => 4902,
            BridgeError::WalletNotReady => -32000,
            BridgeError::ChannelClosed => -32001,
            BridgeError::RequestTimeout { .. } => -32002,
            BridgeError::Rpc(obj) => obj.code,
            BridgeError::Internal { .. } => -32603,
        }
    }

    /// Convert into the wire error object for a response envelope.
    pub fn into_rpc_error(self) -> RpcErrorObject {
        match self {
            BridgeError::Rpc(obj) => obj,
            other => RpcErrorObject {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}

impl From<RpcErrorObject> for BridgeError {
    fn from(obj: RpcErrorObject) -> Self {
        BridgeError::Rpc(obj)
    }
}

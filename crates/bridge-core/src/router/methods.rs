//! Closed dispatch table of supported RPC methods.
//!
//! Caller-supplied params are untyped JSON on the wire; each supported
//! method declares its own expected parameter shape here as a typed
//! variant, so handlers never trust raw `Value` shapes. Anything not
//! in this table is `-32601`; a known method with a malformed shape is
//! `-32602`.

use crate::error::{BridgeError, Result};
use crate::protocol::RequestEnvelope;
use crate::state::parse_chain_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed, shape-checked RPC call.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcCall {
    RequestAccounts,
    Accounts,
    ChainId,
    NetVersion,
    /// `personal_sign`: params are `[message, address?]`.
    PersonalSign {
        message: String,
        address: Option<String>,
    },
    /// `eth_sign`: params are `[address, message]` (reversed order).
    EthSign { address: String, message: String },
    /// `eth_signTypedData_v4`: params are `[address, typedData]`, where
    /// the typed data may arrive as an object or a JSON string.
    SignTypedDataV4 { address: String, typed_data: Value },
    SendTransaction(TransactionRequest),
    SwitchChain { chain_id: String },
    AddChain(ChainDescriptor),
}

/// Transaction fields a dApp may supply for `eth_sendTransaction`.
/// Quantities stay hex strings; interpretation belongs to the signing
/// collaborator. Unknown fields (fee-market extras and the like) are
/// tolerated and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Chain descriptor accepted by `wallet_addEthereumChain` (EIP-3085).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub chain_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rpc_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_currency: Option<NativeCurrency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub block_explorer_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl RpcCall {
    /// Parse a request envelope against the closed table.
    pub fn parse(envelope: &RequestEnvelope) -> Result<RpcCall> {
        let method = envelope.method.as_str();
        let params = &envelope.params;
        match method {
            "eth_requestAccounts" => Ok(RpcCall::RequestAccounts),
            "eth_accounts" => Ok(RpcCall::Accounts),
            "eth_chainId" => Ok(RpcCall::ChainId),
            "net_version" => Ok(RpcCall::NetVersion),

            "personal_sign" => {
                let message = required_str(method, params, 0, "message")?;
                let address = params.get(1).and_then(Value::as_str).map(String::from);
                Ok(RpcCall::PersonalSign { message, address })
            }

            "eth_sign" => Ok(RpcCall::EthSign {
                address: required_str(method, params, 0, "address")?,
                message: required_str(method, params, 1, "message")?,
            }),

            "eth_signTypedData_v4" => {
                let address = required_str(method, params, 0, "address")?;
                let raw = params.get(1).ok_or_else(|| missing(method, "typedData"))?;
                // Wallets receive the typed data both ways in the wild
                let typed_data = match raw {
                    Value::String(text) => {
                        serde_json::from_str(text).map_err(|e| BridgeError::InvalidParams {
                            method: method.to_string(),
                            message: format!("typedData is not valid JSON: {}", e),
                        })?
                    }
                    Value::Object(_) => raw.clone(),
                    _ => {
                        return Err(BridgeError::InvalidParams {
                            method: method.to_string(),
                            message: "typedData must be an object or JSON string".to_string(),
                        })
                    }
                };
                Ok(RpcCall::SignTypedDataV4 {
                    address,
                    typed_data,
                })
            }

            "eth_sendTransaction" => {
                let raw = params
                    .first()
                    .ok_or_else(|| missing(method, "transaction"))?;
                let tx: TransactionRequest = serde_json::from_value(raw.clone()).map_err(|e| {
                    BridgeError::InvalidParams {
                        method: method.to_string(),
                        message: format!("bad transaction object: {}", e),
                    }
                })?;
                Ok(RpcCall::SendTransaction(tx))
            }

            "wallet_switchEthereumChain" => {
                let chain_id = params
                    .first()
                    .and_then(|p| p.get("chainId"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| missing(method, "chainId"))?;
                validate_chain_id(method, chain_id)?;
                Ok(RpcCall::SwitchChain {
                    chain_id: chain_id.to_string(),
                })
            }

            "wallet_addEthereumChain" => {
                let raw = params
                    .first()
                    .ok_or_else(|| missing(method, "chain descriptor"))?;
                let descriptor: ChainDescriptor =
                    serde_json::from_value(raw.clone()).map_err(|e| BridgeError::InvalidParams {
                        method: method.to_string(),
                        message: format!("bad chain descriptor: {}", e),
                    })?;
                validate_chain_id(method, &descriptor.chain_id)?;
                Ok(RpcCall::AddChain(descriptor))
            }

            _ => Err(BridgeError::MethodNotSupported {
                method: method.to_string(),
            }),
        }
    }
}

fn required_str(method: &str, params: &[Value], index: usize, name: &str) -> Result<String> {
    params
        .get(index)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| missing(method, name))
}

fn missing(method: &str, name: &str) -> BridgeError {
    BridgeError::InvalidParams {
        method: method.to_string(),
        message: format!("missing or malformed parameter: {}", name),
    }
}

fn validate_chain_id(method: &str, chain_id: &str) -> Result<()> {
    if parse_chain_id(chain_id).is_none() {
        return Err(BridgeError::InvalidParams {
            method: method.to_string(),
            message: format!("chainId {:?} is not 0x-prefixed hex", chain_id),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(method: &str, params: Vec<Value>) -> RequestEnvelope {
        RequestEnvelope::new("t1", method, params)
    }

    #[test]
    fn test_parameterless_methods() {
        assert_eq!(
            RpcCall::parse(&envelope("eth_requestAccounts", vec![])).unwrap(),
            RpcCall::RequestAccounts
        );
        assert_eq!(
            RpcCall::parse(&envelope("eth_chainId", vec![])).unwrap(),
            RpcCall::ChainId
        );
    }

    #[test]
    fn test_unknown_method_is_not_supported() {
        let err = RpcCall::parse(&envelope("eth_getBalance", vec![])).unwrap_err();
        assert_eq!(err.code(), -32601);
    }

    #[test]
    fn test_personal_sign_param_order() {
        let call = RpcCall::parse(&envelope(
            "personal_sign",
            vec![json!("0xdeadbeef"), json!("0xaaa")],
        ))
        .unwrap();
        assert_eq!(
            call,
            RpcCall::PersonalSign {
                message: "0xdeadbeef".into(),
                address: Some("0xaaa".into()),
            }
        );
    }

    #[test]
    fn test_eth_sign_reversed_param_order() {
        let call = RpcCall::parse(&envelope(
            "eth_sign",
            vec![json!("0xaaa"), json!("0xdeadbeef")],
        ))
        .unwrap();
        assert_eq!(
            call,
            RpcCall::EthSign {
                address: "0xaaa".into(),
                message: "0xdeadbeef".into(),
            }
        );
    }

    #[test]
    fn test_typed_data_accepts_object_and_string() {
        let object_form = RpcCall::parse(&envelope(
            "eth_signTypedData_v4",
            vec![json!("0xaaa"), json!({"domain": {}})],
        ))
        .unwrap();
        let string_form = RpcCall::parse(&envelope(
            "eth_signTypedData_v4",
            vec![json!("0xaaa"), json!("{\"domain\":{}}")],
        ))
        .unwrap();
        assert_eq!(object_form, string_form);

        let err = RpcCall::parse(&envelope(
            "eth_signTypedData_v4",
            vec![json!("0xaaa"), json!("{not json")],
        ))
        .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[test]
    fn test_send_transaction_shape() {
        let call = RpcCall::parse(&envelope(
            "eth_sendTransaction",
            vec![json!({"to": "0xabc", "value": "0x1", "maxFeePerGas": "0x2"})],
        ))
        .unwrap();
        match call {
            RpcCall::SendTransaction(tx) => {
                assert_eq!(tx.to.as_deref(), Some("0xabc"));
                assert_eq!(tx.value.as_deref(), Some("0x1"));
            }
            other => panic!("expected SendTransaction, got {:?}", other),
        }

        let err =
            RpcCall::parse(&envelope("eth_sendTransaction", vec![json!("0xabc")])).unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[test]
    fn test_switch_chain_requires_hex_chain_id() {
        let call = RpcCall::parse(&envelope(
            "wallet_switchEthereumChain",
            vec![json!({"chainId": "0x89"})],
        ))
        .unwrap();
        assert_eq!(
            call,
            RpcCall::SwitchChain {
                chain_id: "0x89".into()
            }
        );

        let err = RpcCall::parse(&envelope(
            "wallet_switchEthereumChain",
            vec![json!({"chainId": "polygon"})],
        ))
        .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[test]
    fn test_add_chain_descriptor() {
        let call = RpcCall::parse(&envelope(
            "wallet_addEthereumChain",
            vec![json!({
                "chainId": "0x64",
                "chainName": "Gnosis",
                "rpcUrls": ["https://rpc.gnosischain.com"],
                "nativeCurrency": {"name": "xDai", "symbol": "XDAI", "decimals": 18}
            })],
        ))
        .unwrap();
        match call {
            RpcCall::AddChain(desc) => {
                assert_eq!(desc.chain_id, "0x64");
                assert_eq!(desc.native_currency.unwrap().decimals, 18);
            }
            other => panic!("expected AddChain, got {:?}", other),
        }
    }
}

//! Scripted dApp session and a console-approving signing backend.

use anyhow::Result;
use async_trait::async_trait;
use bridge_core::router::TransactionRequest;
use bridge_core::{InProcessBridge, SigningBackend};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

/// Backend that approves everything and logs what it signed. A real
/// host replaces this with its confirmation UI and key store.
pub struct ConsoleBackend;

#[async_trait]
impl SigningBackend for ConsoleBackend {
    async fn sign_message(&self, message: &str, account: &str) -> bridge_core::Result<String> {
        info!("signing message for {}: {}", account, message);
        Ok(format!("0x{:064x}", message.len()))
    }

    async fn sign_typed_data(
        &self,
        typed_data: &Value,
        account: &str,
    ) -> bridge_core::Result<String> {
        info!("signing typed data for {}: {}", account, typed_data);
        Ok(format!("0x{:064x}", 0x712))
    }

    async fn send_transaction(
        &self,
        tx: &TransactionRequest,
        account: &str,
    ) -> bridge_core::Result<String> {
        info!(
            "broadcasting transaction from {} to {:?}",
            account, tx.to
        );
        Ok(format!("0x{:064x}", 0xbeef_u32))
    }
}

/// Drive the request shapes a typical dApp issues, in order.
pub async fn run_session(bridge: &InProcessBridge, address: &str) -> Result<()> {
    let provider = bridge.provider();

    let accounts = provider
        .request("eth_requestAccounts", vec![])
        .await?;
    info!("eth_requestAccounts -> {}", accounts);

    let chain = provider
        .request("eth_chainId", vec![])
        .await?;
    info!("eth_chainId -> {} (served from the local snapshot)", chain);

    let signature = provider
        .request(
            "personal_sign",
            vec![json!("0x68656c6c6f"), json!(address)],
        )
        .await?;
    info!("personal_sign -> {}", signature);

    let hash = provider
        .request(
            "eth_sendTransaction",
            vec![json!({
                "from": address,
                "to": "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
                "value": "0xde0b6b3a7640000"
            })],
        )
        .await?;
    info!("eth_sendTransaction -> {}", hash);

    provider.on("chainChanged", |chain_id| {
        info!("page saw chainChanged -> {}", chain_id);
    });
    provider.on("accountsChanged", |accounts| {
        info!("page saw accountsChanged -> {}", accounts);
    });

    provider
        .request(
            "wallet_addEthereumChain",
            vec![json!({
                "chainId": "0x89",
                "chainName": "Polygon",
                "rpcUrls": ["https://polygon-rpc.com"]
            })],
        )
        .await?;
    provider
        .request(
            "wallet_switchEthereumChain",
            vec![json!({"chainId": "0x89"})],
        )
        .await?;

    // Wallet-UI-originated account switch, pushed to the page
    bridge
        .router
        .set_accounts(vec!["0x70997970c51812dc3a010c7d01b50e0d17dc79c8".into()]);

    // Let the pushed events land before reading the snapshot back
    tokio::time::sleep(Duration::from_millis(50)).await;
    let state = provider.state();
    info!(
        "final page snapshot: chain {} accounts {:?}",
        state.chain_id, state.accounts
    );

    Ok(())
}

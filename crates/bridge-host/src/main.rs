//! Demo wallet host for the provider bridge.
//!
//! Wires an in-process bridge and drives a scripted dApp session
//! against it: connect, read chain state, sign, switch chains, and a
//! host-side account change pushed back to the page. Useful for
//! eyeballing the full message flow with debug logging on.

mod demo;

use anyhow::Result;
use bridge_core::{in_process, BridgeConfig};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "bridge-host")]
#[command(about = "Demo wallet host for the in-page provider bridge")]
struct Args {
    /// Chain id the wallet starts on (0x-prefixed hex)
    #[arg(long, default_value = "0x1")]
    chain_id: String,

    /// Account address the wallet exposes
    #[arg(long, default_value = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")]
    address: String,

    /// Per-request timeout in milliseconds (0 = wait forever)
    #[arg(long, default_value = "0")]
    timeout_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting demo wallet host");

    let mut config = BridgeConfig::default();
    if args.timeout_ms > 0 {
        config = config.with_request_timeout(Duration::from_millis(args.timeout_ms));
    }

    let bridge = in_process(
        vec![args.address.clone()],
        &args.chain_id,
        Arc::new(demo::ConsoleBackend),
        config,
    );

    demo::run_session(&bridge, &args.address).await?;

    bridge.shutdown();
    info!("Session complete, exiting");

    Ok(())
}

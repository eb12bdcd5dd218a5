//! **observer** – command-line frontend for the privacy-pool state observer.
//!
//! Mirrors `cmd/node/main.go` + `cmd/node/start.go`'s Cobra-based structure
//! (usage + exit 1 on missing/invalid arguments, graceful-then-forced
//! shutdown on repeated signals) using `clap`.

mod rpc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use observer_categorizer::chainalysis::ChainalysisCategorizer;
use observer_categorizer::Categorizer;
use observer_core::{ObserveParams, Orchestrator};
use observer_watcher::{Observable, Watcher};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use rpc::JsonRpcBackend;

#[derive(Parser)]
#[command(
    name = "observer",
    version,
    author = "0xBow",
    about = "Streams and records privacy-pool state transitions",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Streams state transitions of one Observable from a starting block,
    /// printing each decoded State's hash and event summary.
    Play {
        /// Registry id of the Observable to play (e.g. `SEPOLIA_ETH_POOL_1`).
        observable_id: String,
        /// HTTP(S) JSON-RPC endpoint to read chain state from.
        rpc_url: String,
        /// First block of the window to watch.
        from_block: u64,
        /// Number of blocks the window spans (default: one block).
        range: Option<u64>,
    },
    /// Runs the full pipeline as a long-lived daemon, configured from the
    /// environment. The first SIGINT/SIGTERM requests a graceful stop;
    /// the second forces immediate exit.
    Start,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Play {
            observable_id,
            rpc_url,
            from_block,
            range,
        } => play(&observable_id, &rpc_url, from_block, range.unwrap_or(1)).await,
        Commands::Start => start().await,
    };

    if let Err(e) = &result {
        error!(error = %e, "observer exited with an error");
        std::process::exit(1);
    }
    Ok(())
}

async fn play(observable_id: &str, rpc_url: &str, from_block: u64, range: u64) -> Result<()> {
    let entries = observer_registry::registry();
    let observable = entries
        .iter()
        .find(|o| o.id() == observable_id)
        .ok_or_else(|| anyhow!("observable {observable_id} not found"))?;

    let backend = JsonRpcBackend::connect(rpc_url).context("failed to connect to rpc endpoint")?;

    let watcher = Watcher::new();
    let states = watcher
        .watch(observable, &backend, from_block, from_block + range)
        .await
        .context("watch failed")?;

    for state in &states {
        match state.event() {
            Some(event) => println!(
                "New State --> hash: {:?}, block: {}, tx_index: {}, log_index: {}",
                state.hash(),
                event.block_number,
                event.tx_index,
                event.log_index
            ),
            None => return Err(anyhow!("failed to extract event from state")),
        }
    }
    Ok(())
}

async fn start() -> Result<()> {
    let config = observer_config::Config::from_env().context("failed to load configuration")?;
    info!(
        chain_id = config.chain_id,
        protocol_id = %config.protocol_id,
        instance_id = %config.instance_id,
        "starting observer"
    );

    let observable = observer_registry::registry()
        .into_iter()
        .find(|o| o.id() == config.instance_id)
        .ok_or_else(|| anyhow!("no registry entry matches instance id {}", config.instance_id))?;
    let start_block = observable.genesis_block();
    let observable: Arc<dyn Observable> = Arc::new(observable);

    let backend: Arc<dyn observer_chain::ChainRpc> =
        Arc::new(JsonRpcBackend::connect(&config.erpc_https).context("failed to connect erpc_https endpoint")?);
    let categorizer: Arc<dyn Categorizer> =
        Arc::new(ChainalysisCategorizer::from_env().context("failed to configure chainalysis client")?);

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("first stop signal received, requesting graceful shutdown");
        shutdown_cancel.cancel();
        wait_for_shutdown_signal().await;
        info!("second stop signal received, forcing immediate exit");
        std::process::exit(130);
    });

    let params = ObserveParams {
        start_block,
        max_window: 5_000,
        wait: Duration::from_secs(3),
    };
    Orchestrator::new()
        .observe(observable, backend, categorizer, params, cancel)
        .await
        .context("observer pipeline failed")?;

    info!("observer stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

//! CREDENCE CLI - runs the trust layer against a stdio message bridge
//!
//! Inbound envelopes are read as one JSON object per line on stdin, outbound
//! envelopes are written one per line to stdout. This makes the binary
//! directly usable behind any transport that can pipe lines.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use credence_core::TrustConfig;
use credence_runtime::{
    AlertProtocol, ChannelQueue, Dispatcher, MemoryThreatIntelStore, MemoryTrustStore,
    MessageHandler, NetworkBridge, PeerListProtocol, RecommendationProtocol, ThreatIntelStore,
    ThreatIntelligenceProtocol, TrustProtocol, TrustStore,
};

#[derive(Parser)]
#[command(name = "credence")]
#[command(about = "CREDENCE - decentralized peer trust for intrusion-detection nodes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trust layer over stdin/stdout
    Run {
        /// Path to the YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Parse and validate a configuration file
    CheckConfig {
        /// Path to the YAML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn load_config(path: &PathBuf) -> Result<TrustConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration from {}", path.display()))?;
    let config: TrustConfig =
        serde_yaml::from_str(&raw).context("configuration is not valid YAML")?;
    config
        .validate()
        .map_err(|violation| anyhow::anyhow!("invalid configuration: {violation}"))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::CheckConfig { config } => {
            let config = load_config(&config)?;
            println!("configuration OK");
            println!("  service history max size: {}", config.service_history_max_size);
            println!("  recommendations enabled:  {}", config.recommendations.enabled);
            println!("  trusted organisations:    {}", config.trusted_organisations.len());
            println!("  aggregation strategy:     {:?}", config.ti_aggregation);
            println!("  evaluation strategy:      {:?}", config.ti_evaluation);
            Ok(())
        }
        Commands::Run { config } => run(load_config(&config)?).await,
    }
}

async fn run(config: TrustConfig) -> Result<()> {
    let config = Arc::new(config);
    let store = Arc::new(MemoryTrustStore::new(
        config.network_opinion_cache_valid_seconds,
    ));
    store.store_config((*config).clone());
    let ti_store = Arc::new(MemoryThreatIntelStore::new());

    let (queue, mut outbound_rx) = ChannelQueue::new();
    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::unbounded_channel();
    let bridge = Arc::new(NetworkBridge::new(Arc::new(queue)));

    let recommendation = Arc::new(RecommendationProtocol::new(
        config.clone(),
        store.clone() as Arc<dyn TrustStore>,
        bridge.clone(),
    ));
    let trust = Arc::new(TrustProtocol::new(
        store.clone() as Arc<dyn TrustStore>,
        config.clone(),
        recommendation.clone(),
    ));
    let intelligence = Arc::new(ThreatIntelligenceProtocol::new(
        store.clone() as Arc<dyn TrustStore>,
        ti_store as Arc<dyn ThreatIntelStore>,
        bridge.clone(),
        config.clone(),
        trust.clone(),
        Arc::new(|opinion| {
            info!(
                target = %opinion.target,
                score = opinion.score,
                confidence = opinion.confidence,
                "network opinion"
            );
        }),
    ));
    let alert = Arc::new(AlertProtocol::new(
        store.clone() as Arc<dyn TrustStore>,
        bridge.clone(),
        config.clone(),
        trust.clone(),
        Arc::new(|opinion| {
            info!(
                target = %opinion.target,
                score = opinion.score,
                confidence = opinion.confidence,
                "alert"
            );
        }),
    ));
    let peer_list = Arc::new(PeerListProtocol::new(
        store.clone() as Arc<dyn TrustStore>,
        bridge,
        trust,
        recommendation.clone(),
    ));

    let handler = MessageHandler::new(peer_list, recommendation, intelligence, alert);

    // outbound envelopes go to stdout, one per line
    let writer = tokio::spawn(async move {
        while let Some(serialized) = outbound_rx.recv().await {
            println!("{serialized}");
        }
    });

    // stdin lines feed the dispatcher; dropping the sender on EOF closes
    // the channel and ends the dispatch loop
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    if inbound_tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(%err, "failed to read stdin");
                    break;
                }
            }
        }
    });

    info!("trust layer running, reading envelopes from stdin");
    Dispatcher::run(inbound_rx, handler).await;

    reader.abort();
    writer.abort();
    Ok(())
}

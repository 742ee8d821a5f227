//! Payment-channel metered call daemon.
//!
//! ```bash
//! # Run with config.json in the current directory
//! cargo run --release
//!
//! # Custom config path
//! CONFIG=/etc/channel-income/config.json cargo run --release
//!
//! # Override the configured log level
//! RUST_LOG=channel_income=debug cargo run
//! ```

use channel_income::{
    config::Config,
    create_router,
    state::{ChainOracle, EscrowContractOracle, InMemoryChannelStore},
    telemetry,
    types::PaymentChannel,
    IncomeValidator,
};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};

#[derive(Parser, Debug)]
#[command(name = "channel-income")]
#[command(about = "Metered call daemon paid through payment channels")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();
    let config_found = args.config.exists();

    let config = match Config::load(&args.config) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    telemetry::init(&config.log);
    if !config_found {
        tracing::warn!(path = %args.config.display(), "config file not found, using defaults");
    }

    if let Err(e) = run(config).await {
        tracing::error!("daemon failed: {e}");
        std::process::exit(1);
    }
}

async fn run(config: Arc<Config>) -> Result<(), Box<dyn std::error::Error>> {
    config.log_config();

    if config.ssl_cert.is_some() {
        tracing::warn!("ssl_cert and ssl_key are set, terminate TLS in front of the daemon");
    }

    let oracle: Option<Arc<dyn ChainOracle>> = match config.escrow_contract_address {
        Some(address) if config.blockchain_enabled => Some(Arc::new(EscrowContractOracle::new(
            &config.ethereum_json_rpc_endpoint,
            address,
            config.average_block_time,
        )?)),
        _ => None,
    };
    if oracle.is_none() && config.channels.is_empty() {
        tracing::warn!("no chain oracle and no seeded channels, every paid call will be rejected");
    }

    // Seeded channels are known up front, the rest are mirrored from the chain
    // on first use.
    let store = Arc::new(InMemoryChannelStore::new());
    for seed in &config.channels {
        store.insert(PaymentChannel::from(seed)).await;
    }
    let validator = IncomeValidator::from_config(&config, store, oracle);

    let listener = tokio::net::TcpListener::bind(config.daemon_end_point.as_str()).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(validator, config.daemon_type))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}

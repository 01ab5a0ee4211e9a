//! `tasksync-store` -- in-memory Task Store server.
//!
//! # Usage
//!
//! ```bash
//! # Run on the default address 127.0.0.1:8080
//! cargo run --bin tasksync-store -- --api-key secret
//!
//! # Or via environment variables
//! TASKSYNC_STORE_API_KEY=secret TASKSYNC_STORE_ADDR=0.0.0.0:8080 cargo run --bin tasksync-store
//! ```

use std::sync::Arc;

use clap::Parser;
use tasksync_store::config::{StoreCliArgs, StoreConfig};
use tasksync_store::server::{self, StoreState};
use tasksync_store::store::TaskStore;

#[tokio::main]
async fn main() {
    let cli = StoreCliArgs::parse();

    let config = match StoreConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if config.api_key.is_none() {
        tracing::warn!("no API key configured; every API call will be refused");
    }
    tracing::info!(addr = %config.bind_addr, ai = config.ai_available, "starting task store");

    let state = Arc::new(StoreState::new(
        TaskStore::new(config.ai_available),
        config.api_key.clone(),
    ));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "task store listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "task store task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start task store");
            std::process::exit(1);
        }
    }
}

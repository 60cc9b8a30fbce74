//! Cloud Clip server
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (port 50979, ./clips, 128 MiB cap, no auth)
//! cclip
//!
//! # Protect the API and move the clip directory
//! CCLIP_PASSWORD=secret CCLIP_DIR=/var/lib/cclip cclip
//!
//! # Same via flags
//! cclip --password secret --dir /var/lib/cclip --max-size 0
//! ```

use anyhow::Context;
use cclip::{Args, ClipStore, HttpServer};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cclip={},info", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cwd = std::env::current_dir().context("could not determine working directory")?;
    let config = args.into_config(&cwd)?;

    info!(
        listen = %config.listen,
        clip_dir = %config.clip_dir.display(),
        guard = %config.guard,
        "Starting cclip"
    );

    if config.max_clip_size > 0 {
        info!("Using maximum clip size of {} bytes", config.max_clip_size);
    } else {
        warn!("No maximum clip size defined");
    }

    if config.token.is_none() {
        warn!("No password defined! Use CCLIP_PASSWORD to set one");
    }

    let store = ClipStore::from_config(&config)
        .await
        .with_context(|| format!("could not open clip directory {}", config.clip_dir.display()))?;
    let server = Arc::new(HttpServer::new(Arc::new(store), &config));

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
                return Err(e.into());
            }
        }
        _ = shutdown => {}
    }

    Ok(())
}

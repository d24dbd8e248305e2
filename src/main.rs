// explanium - cached explanations for selected text, backed by hosted Gemma
// Author: kelexine (https://github.com/kelexine)

use anyhow::{bail, Result};
use clap::Parser;
use explanium::cache::{CacheConfig, ExplanationCache};
use explanium::cli::Args;
use explanium::config::{ApiKey, AppConfig};
use explanium::explainer::Explainer;
use explanium::gemma::GemmaClient;
use explanium::server::create_router;
use explanium::storage;
use explanium::utils::logging;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let mut config = AppConfig::load()?;
    if let Some(key) = args.api_key.as_deref() {
        config.gemma.api_key = ApiKey::new(key);
    }

    if args.print_config {
        let mut printable = config.clone();
        if !printable.gemma.api_key.is_empty() {
            printable.gemma.api_key = ApiKey::new("<redacted>");
        }
        println!("{}", toml::to_string_pretty(&printable)?);
        return Ok(());
    }

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting explanium v{}", env!("CARGO_PKG_VERSION"));

    // Phase 3: Open the store and warm the cache
    let store = storage::open(&config.storage).await?;
    let cache = Arc::new(ExplanationCache::new(
        CacheConfig::from(&config.cache),
        store,
    ));
    cache.initialize().await;

    if args.stats {
        let stats = cache.get_statistics().await;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    // Phase 4: Wire the provider behind the facade
    let provider = Arc::new(GemmaClient::new(&config.gemma)?);
    let explainer = Arc::new(Explainer::new(cache.clone(), provider, &config.explain));

    if args.clear_cache {
        let response = explainer.clear_cache().await;
        println!("{}", serde_json::to_string_pretty(&response)?);
        if !response.success {
            bail!("failed to clear cache");
        }
        return Ok(());
    }

    if let Some(text) = args.explain.as_deref() {
        let response = explainer.explain(text).await;
        match (response.success, response.explanation) {
            (true, Some(explanation)) => {
                println!("{}", explanation);
                if response.from_cache == Some(true) {
                    eprintln!("(served from cache)");
                }
                return Ok(());
            }
            _ => bail!(response
                .error
                .unwrap_or_else(|| "Explanation failed".to_string())),
        }
    }

    // Phase 5: Periodic expiry sweep
    if config.cache.cleanup_interval_seconds > 0 {
        let sweeper = cache.clone();
        let period = Duration::from_secs(config.cache.cleanup_interval_seconds);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately and initialize() already swept.
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = sweeper.cleanup_expired_entries().await;
                debug!("Periodic sweep removed {} expired entries", removed);
            }
        });
    }

    // Phase 6: Build and start HTTP server
    let app = create_router(config.clone(), explainer)?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Phase 7: Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use korekushon::config::Config;
use korekushon::platform::PlatformClient;
use korekushon::prefetch::{PrefetchCache, SnapshotSource};
use korekushon::store::Store;
use korekushon::{watch, web};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    init_tracing()?;

    info!("Starting korekushon");

    // Load and validate configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(platform_url = %config.platform_url, "Configuration loaded");
    if config.admin_email.is_none() {
        info!("No ADMIN_EMAIL configured - category and link management is disabled");
    }

    let config = Arc::new(config);

    // Platform client and typed store
    let platform = PlatformClient::new(&config.platform_url, &config.platform_anon_key);
    let store = Store::new(platform);

    // Prefetch cache over the store; warm it up front so the first page
    // load is served from memory. ensure() cannot fail, only degrade.
    let cache = Arc::new(PrefetchCache::new(
        Arc::new(store.clone()) as Arc<dyn SnapshotSource>
    ));
    let snapshot = cache.ensure().await;
    info!(
        categories = snapshot.categories.len(),
        links = snapshot.links.len(),
        comments = snapshot.comments.len(),
        "Prefetch cache warmed"
    );

    // Start the comment change watcher in the background
    let watch_handle = if config.comment_watch_enabled {
        let watch_store = store.clone();
        let watch_cache = Arc::clone(&cache);
        let interval = config.comment_poll_interval;
        info!(interval_secs = interval.as_secs(), "Comment watcher enabled");
        Some(tokio::spawn(async move {
            watch::watch_comments(watch_store, watch_cache, interval).await;
        }))
    } else {
        info!("Comment watcher disabled");
        None
    };

    // Start the web server in the background
    let web_config = Arc::clone(&config);
    let web_store = store;
    let web_cache = Arc::clone(&cache);
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web::serve(web_config, web_store, web_cache).await {
            error!("Web server error: {e:#}");
        }
    });

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down...");

    web_handle.abort();
    if let Some(handle) = watch_handle {
        handle.abort();
    }

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,korekushon=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        // Pretty-printed logging for development
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

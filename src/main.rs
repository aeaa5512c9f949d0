//! thumbserve - An image gallery server with an on-disk thumbnail cache.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thumbserve::{
    config::Config,
    content::ContentService,
    dirs::DirectoryTracker,
    server::{create_router, load_template, AppState, ListingService},
    thumb::{ThumbFormat, ThumbService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();
    log_configuration(&config);

    // Load the listing template before anything starts watching
    let template = match load_template(config.template.as_deref()) {
        Ok(template) => template,
        Err(e) => {
            error!("Failed to read listing template: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // The cache must exist before the tracker can recognize it under the root
    if let Err(e) = std::fs::create_dir_all(&config.thumbs) {
        error!(
            "Failed to create thumbnail cache {}: {}",
            config.thumbs.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let excluded = [config.thumbs.clone()];
    let tracker = match DirectoryTracker::watch_excluding(&config.images, &excluded) {
        Ok(tracker) => Arc::new(tracker),
        Err(e) => {
            error!("Failed to watch {}: {}", config.images.display(), e);
            return ExitCode::FAILURE;
        }
    };
    if tracker.excludes(&config.thumbs) {
        warn!(
            "Thumbnail cache {} is inside the image root; it is hidden from listings \
             but its files can still be fetched directly",
            config.thumbs.display()
        );
    }

    let listing = match ListingService::new(
        &config.images,
        tracker.clone(),
        &template,
        config.format.clone(),
    ) {
        Ok(listing) => listing,
        Err(e) => {
            error!("Failed to parse listing template: {}", e);
            tracker.shutdown().await;
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(
        ThumbService::new(config.thumb_settings()),
        ContentService::new(&config.images),
        listing,
    );
    let router = create_router(state, tracker.clone(), config.router_config());

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    open http://{}/", addr);
    info!("    curl http://{}/thumb/<image>.{}", addr, config.format);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            tracker.shutdown().await;
            return ExitCode::FAILURE;
        }
    };

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    tracker.shutdown().await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("▀█▀ █ █ █ █ █▀▄▀█ █▀▄ █▀ █▀▀ █▀█ █ █ █▀▀");
    info!(" █  █▀█ █▄█ █ ▀ █ █▀▄ ▄█ ██▄ █▀▄ ▀▄▀ ██▄");
    info!("");
    info!("                                  v{}", version);
}

fn log_configuration(config: &Config) {
    info!("Configuration:");
    info!("  Images: {}", config.images.display());
    info!("  Thumbnail cache: {}", config.thumbs.display());
    info!(
        "  Thumbnails: {}x{} {} (jpeg quality {})",
        config.width, config.height, config.format, config.jpeg_quality
    );
    if ThumbFormat::from_symbol(&config.format).is_err() {
        warn!(
            "  Format '{}' has no encoder; every thumbnail request will fail",
            config.format
        );
    }
    if config.revalidate_thumbs {
        info!("  Revalidation: thumbnails older than their source are regenerated");
    }
    info!(
        "  Browser cache: {} to {} days",
        config.cache_min,
        config.cache_min.saturating_add(config.cache_variation)
    );
    match &config.static_dir {
        Some(dir) => info!("  Static assets: {}", dir.display()),
        None => info!("  Static assets: embedded"),
    }
    if let Some(template) = &config.template {
        info!("  Listing template: {}", template.display());
    }
    if let Some(canonical) = config.canonical_host() {
        let scheme = config.force_scheme.as_deref().unwrap_or("http");
        info!("  Canonical origin: {}://{}", scheme, canonical.authority(scheme));
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "thumbserve=debug,tower_http=debug"
    } else {
        "thumbserve=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolve when the process is asked to stop.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

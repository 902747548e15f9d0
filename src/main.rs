use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Router};
use http::HeaderValue;
use tower::ServiceBuilder;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nl_calendar::config::{Config, LogFormat};
use nl_calendar::{middleware, routes, AppState};

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nl_calendar=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration decides the log format, so it is loaded first.
    let config = Config::from_env()?;
    init_tracing(config.logging.format);

    tracing::info!("Starting NL Calendar Service");
    tracing::info!(
        "Completion service: {} (model {}, timeout {}s)",
        config.completion.base_url,
        config.completion.model,
        config.completion.timeout_seconds
    );

    let app_state = Arc::new(AppState::from_config(&config)?);

    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    // Per-IP limiter in front of the API. Every submission costs one
    // completion request.
    let mut api_builder = GovernorConfigBuilder::default().key_extractor(SmartIpKeyExtractor);
    api_builder
        .per_second(config.rate_limit.api_per_second.into())
        .burst_size(config.rate_limit.api_burst)
        .error_handler(middleware::rate_limit::rejection_response);
    let api_gov_conf = Arc::new(
        api_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build API governor config"))?,
    );

    // Periodic cleanup of limiter state for clients that went quiet.
    let limiter_cleaner = {
        let limiter = api_gov_conf.limiter().clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Rate limiter cleanup task exiting");
                        break;
                    }
                    _ = ticker.tick() => {
                        tracing::debug!("api rate limiter size: {}", limiter.len());
                        limiter.retain_recent();
                    }
                }
            }
        })
    };

    let cors_origin = config
        .server
        .frontend_url
        .parse::<HeaderValue>()
        .context("Invalid FRONTEND_URL for CORS")?;

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest(
            "/api",
            routes::api_router().layer(GovernorLayer {
                config: api_gov_conf.clone(),
            }),
        )
        .with_state(app_state);

    if let Some(dir) = &config.server.static_dir {
        tracing::info!("Serving front end from {}", dir);
        let index = Path::new(dir).join("index.html");
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    let app = app
        .layer(axum::middleware::from_fn(middleware::csp::csp_middleware))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(cors_origin)
                    .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
                    .allow_headers([http::header::CONTENT_TYPE, http::header::ACCEPT]),
            ),
        );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await?;

    if tokio::time::timeout(Duration::from_secs(5), limiter_cleaner)
        .await
        .is_err()
    {
        tracing::warn!("Rate limiter cleanup task did not exit in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM and tells background tasks to stop.
async fn shutdown_signal(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to bind SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server");
    let _ = shutdown_tx.send(());
}

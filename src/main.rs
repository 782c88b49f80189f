use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snapgram::config::{AppConfig, BrokerBackend};
use snapgram::http;
use snapgram::infra::{broker::Broker, cache::RedisCache, db::Db, storage::ObjectStorage};
use snapgram::AppState;

const RELAY_RETRY_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snapgram=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    let cache = RedisCache::connect(&config.redis_url).await?;
    let storage = ObjectStorage::new(&config).await?;

    let broker = match config.broker_backend {
        BrokerBackend::Memory => Broker::in_memory(),
        BrokerBackend::Redis => Broker::redis(cache.clone()),
    };
    if broker.uses_relay() {
        tokio::spawn(run_relay(broker.clone()));
    }

    let state = AppState {
        db,
        cache,
        storage,
        broker,
        upload_max_bytes: config.upload_max_bytes,
        paseto_access_key: config.paseto_access_key,
        paseto_refresh_key: config.paseto_refresh_key,
        access_ttl_minutes: config.access_ttl_minutes,
        refresh_ttl_days: config.refresh_ttl_days,
        auth_throttle: config.auth_throttle,
        cookie_secure: config.cookie_secure,
    };

    let app: Router = http::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(backend = ?config.broker_backend, "listening on {}", config.http_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Keeps the cross-process relay alive for the lifetime of the server.
async fn run_relay(broker: Broker) {
    loop {
        match broker.run_relay().await {
            Ok(()) => tracing::warn!("group relay stream ended, reconnecting"),
            Err(err) => tracing::error!(error = ?err, "group relay failed, reconnecting"),
        }
        tokio::time::sleep(RELAY_RETRY_DELAY).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

use sarkari_portal::{
    AppState, ConnectorState, HttpConnector, InMemoryBackend,
    config::{AppConfig, Env},
    create_router,
    models::{Principal, UserRole},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, picks the remote service (HTTP or the in-memory
/// backend for local runs) and serves the BFF.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("FATAL: {}", err);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins; otherwise debug for this crate so cache hits and misses show up.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sarkari_portal=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let connector: ConnectorState = match &config.service_url {
        Some(url) => {
            tracing::info!(service_url = %url, "using remote data service");
            Arc::new(HttpConnector::new(url))
        }
        None => {
            let backend = InMemoryBackend::new();
            backend
                .grant_role(Principal::new(config.local_admin.as_str()), UserRole::Admin)
                .await;
            tracing::warn!(
                admin = %config.local_admin,
                "SERVICE_URL not set, serving from the in-memory backend"
            );
            Arc::new(backend)
        }
    };

    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(connector, config));

    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, bind_addr = %bind_addr, "could not bind listener");
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "server terminated");
    }
}

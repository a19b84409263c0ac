//! SWITCHBOARD API Server Entry Point
//!
//! Bootstraps configuration, selects the datastore, and starts the Axum HTTP
//! server.

use std::net::SocketAddr;
use std::sync::Arc;

use switchboard_api::telemetry::{init_tracing, TelemetryConfig};
use switchboard_api::{
    create_api_router, ApiError, ApiResult, AppState, DbConfig, LeadConnectorClient, PgStore,
    RelayConfig, StoreKind,
};
use switchboard_core::{InMemorySessionStore, InMemoryTenantDirectory, SessionStore, TenantDirectory};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let config = RelayConfig::from_env();
    let (directory, sessions) = open_store(&config)?;

    let crm = LeadConnectorClient::from_config(&config).map_err(|e| {
        ApiError::internal_error(format!("Failed to build upstream client: {}", e))
    })?;

    let state = AppState::new(&config, directory, sessions, Arc::new(crm));
    let app = create_api_router(state);

    let addr = resolve_bind_addr()?;
    tracing::info!(
        %addr,
        store = ?config.store,
        crm_base_url = %config.crm_base_url,
        webhook_auth = config.webhook_auth_enabled(),
        "Starting switchboard relay"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            // Spawned webhook work still in flight is abandoned here.
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

type Stores = (Arc<dyn TenantDirectory>, Arc<dyn SessionStore>);

fn open_store(config: &RelayConfig) -> ApiResult<Stores> {
    match config.store {
        StoreKind::Postgres => {
            let store = Arc::new(PgStore::from_config(&DbConfig::from_env())?);
            let directory: Arc<dyn TenantDirectory> = store.clone();
            let sessions: Arc<dyn SessionStore> = store;
            Ok((directory, sessions))
        }
        StoreKind::Memory => {
            let directory = match &config.tenants_file {
                Some(path) => {
                    let json = std::fs::read_to_string(path).map_err(|e| {
                        ApiError::internal_error(format!("Failed to read {}: {}", path, e))
                    })?;
                    InMemoryTenantDirectory::from_json(&json)?
                }
                None => {
                    tracing::warn!("In-memory store without SWITCHBOARD_TENANTS_FILE; no tenants configured");
                    InMemoryTenantDirectory::new()
                }
            };
            let directory: Arc<dyn TenantDirectory> = Arc::new(directory);
            let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
            Ok((directory, sessions))
        }
    }
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("SWITCHBOARD_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("SWITCHBOARD_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}

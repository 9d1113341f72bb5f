// Framework bootstrap for the relay runtime.

use crate::domain::CommentStore;
use crate::frameworks::{config, db};
use crate::interface_adapters::routes::app;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::store::{MemoryStore, MySqlCommentStore};
use crate::use_cases::{Hub, HubSettings};

use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Wires the hub over `store` with the given admin identity.
pub fn build_state(store: Arc<dyn CommentStore>, admin_id: Option<String>) -> Arc<AppState> {
    let hub = Hub::new(
        store,
        HubSettings {
            admin_id,
            conflict_retries: config::CONFLICT_RETRIES,
        },
    );
    Arc::new(AppState {
        hub: Arc::new(hub),
        echo_frames: config::echo_frames(),
        outbound_capacity: config::OUTBOUND_QUEUE_CAPACITY,
    })
}

/// Serves the relay on `listener` until ctrl-c or SIGTERM, then drains the hub.
pub async fn run(listener: tokio::net::TcpListener, state: Arc<AppState>) -> Result<()> {
    let address = listener.local_addr()?;
    let hub = state.hub.clone();
    let app = app(state);

    tracing::info!(%address, "listening");

    // Closing the sockets lets the server's own drain finish.
    let signal_hub = hub.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received");
            signal_hub.close_all().await;
        })
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        });

    hub.shutdown(config::SHUTDOWN_GRACE).await;
    served
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let store = open_store().await?;
    let admin_id = config::admin_id();
    if admin_id.is_none() {
        tracing::warn!("ADMIN_ID not set; admin and full deletions are disabled");
    }
    let state = build_state(store, admin_id);

    let address = SocketAddr::new(config::bind_addr(), config::http_port());

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener, state).await
}

async fn open_store() -> Result<Arc<dyn CommentStore>> {
    let Some(database_url) = config::database_url() else {
        tracing::warn!("DSN not set; using the in-memory store, nothing will be persisted");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let max_connections = config::db_max_connections();
    let pool = db::connect_pool(&database_url, max_connections)
        .await
        .map_err(|e| std::io::Error::other(format!("failed to connect to database: {e}")))?;
    tracing::debug!(max_connections, "database pool ready");

    Ok(Arc::new(MySqlCommentStore::new(pool)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
}

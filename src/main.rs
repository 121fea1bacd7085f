//! Reunite HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use reunite::config::Config;
use reunite::embedding::{Encoder, MiniLmConfig, MiniLmEncoder};
use reunite::engine::{EngineConfig, MatchEngine};
use reunite::gateway::{HandlerState, check_health, create_router_with_state};
use reunite::store::{MemoryStore, SqliteStore};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> anyhow::Result<()> {
    // Checked before any runtime exists; the check builds its own.
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve())
}

async fn serve() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        threshold = config.match_threshold,
        embedding_dim = config.embedding_dim,
        "Reunite starting"
    );

    let minilm_config = if let Some(path) = &config.model_path {
        MiniLmConfig::new(path.clone())
    } else {
        tracing::warn!("No REUNITE_MODEL_PATH configured, running encoder in stub mode");
        MiniLmConfig::stub()
    }
    .with_embedding_dim(config.embedding_dim);

    let encoder = MiniLmEncoder::load(minilm_config)?;
    let embedder_mode = if encoder.is_stub() { "stub" } else { "model" };
    let encoder: Arc<dyn Encoder> = Arc::new(encoder);

    let engine_config = EngineConfig::from_config(&config)?;

    let (engine, storage_mode) = match &config.database_path {
        Some(path) => {
            let store = Arc::new(SqliteStore::open(path)?.with_dimension(config.embedding_dim));
            (MatchEngine::with_store(encoder, store, engine_config)?, "sqlite")
        }
        None => {
            tracing::warn!("No REUNITE_DATABASE_PATH configured, records are kept in memory");
            let store = Arc::new(MemoryStore::with_dimension(config.embedding_dim));
            (MatchEngine::with_store(encoder, store, engine_config)?, "memory")
        }
    };
    let engine = Arc::new(engine);

    let state = HandlerState::new(engine.clone()).with_modes(embedder_mode, storage_mode);
    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, embedder_mode, storage_mode, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = engine.close().await {
        tracing::error!("Failed to close engine cleanly: {}", e);
    }

    tracing::info!("Reunite shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var("REUNITE_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return 1;
    };

    if rt.block_on(check_health(port, Duration::from_secs(1))) {
        0
    } else {
        1
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

//! Test server harness.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reunite::embedding::{Encoder, ScriptedEncoder};
use reunite::engine::{EngineConfig, MatchEngine};
use reunite::gateway::{HandlerState, create_router_with_state};
use reunite::store::SqliteStore;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::fixtures::{DIM, phone_encoder};

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;

pub struct TestServer {
    pub addr: SocketAddr,
    pub engine: Arc<MatchEngine>,
    pub encoder: Arc<ScriptedEncoder>,
    pub database_path: PathBuf,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _temp_dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerStartupError {
    #[error("Server failed to start within timeout")]
    Timeout,
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Server startup failed: {0}")]
    StartupFailed(String),
}

pub async fn wait_for_server_ready(
    addr: SocketAddr,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ServerStartupError> {
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(ServerStartupError::Timeout);
        }

        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return Ok(()),
            Err(_) => tokio::time::sleep(interval).await,
        }
    }
}

/// Spawns a server on an ephemeral port over a scripted encoder and a
/// SQLite database in a fresh temp dir.
pub async fn spawn_test_server() -> Result<TestServer, ServerStartupError> {
    let temp_dir = TempDir::new()?;
    let database_path = temp_dir.path().join("reunite.db");

    let store = SqliteStore::open(&database_path)
        .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?
        .with_dimension(DIM);

    let encoder = phone_encoder();
    let dyn_encoder: Arc<dyn Encoder> = encoder.clone();
    let engine = MatchEngine::with_store(
        dyn_encoder,
        Arc::new(store),
        EngineConfig::default().with_embedding_dim(DIM),
    )
    .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;
    let engine = Arc::new(engine);

    let state = HandlerState::new(engine.clone()).with_modes("scripted", "sqlite");
    let app = create_router_with_state(state);

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    wait_for_server_ready(
        addr,
        Duration::from_secs(STARTUP_WAIT_TIMEOUT_SECS),
        Duration::from_millis(STARTUP_POLL_INTERVAL_MS),
    )
    .await?;

    Ok(TestServer {
        addr,
        engine,
        encoder,
        database_path,
        _server_handle: server_handle,
        shutdown_tx: Some(shutdown_tx),
        _temp_dir: temp_dir,
    })
}

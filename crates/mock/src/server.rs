//! Serving the mock backend on a local socket

use crate::routes::router;
use crate::state::MockState;
use otherlink_core::MockConfig;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A mock backend running on a background task
///
/// Dropping the handle stops the server.
#[derive(Debug)]
pub struct MockServer {
    addr: SocketAddr,
    state: MockState,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Bind `config.bind` and start serving seeded data
    pub async fn spawn(config: MockConfig) -> std::io::Result<Self> {
        Self::spawn_with_state(MockState::seeded(config)).await
    }

    /// Deterministic server on an ephemeral port, for tests
    pub async fn start() -> std::io::Result<Self> {
        Self::spawn(MockConfig::deterministic()).await
    }

    pub async fn spawn_with_state(state: MockState) -> std::io::Result<Self> {
        let listener = TcpListener::bind(state.config().bind.as_str()).await?;
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();
        let app = router(state.clone());

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await;
            if let Err(e) = result {
                warn!("Mock backend stopped with error: {e}");
            }
        });

        info!(%addr, "Mock backend listening");
        Ok(Self {
            addr,
            state,
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL to configure the client with, including `/api`
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn state(&self) -> &MockState {
        &self.state
    }

    /// Stop serving and wait for in-flight requests to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("Mock backend task failed: {e}");
        }
    }

    /// Serve until the process receives Ctrl-C
    pub async fn run_until_ctrl_c(self) -> std::io::Result<()> {
        tokio::signal::ctrl_c().await?;
        info!("Shutting down mock backend");
        self.shutdown().await;
        Ok(())
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

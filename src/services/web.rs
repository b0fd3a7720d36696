use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use super::Service;
use crate::state::AppState;
use crate::web::create_router;

/// HTTP API server.
pub struct WebService {
    port: u16,
    app_state: AppState,
    request_timeout: Duration,
}

impl WebService {
    pub fn new(port: u16, app_state: AppState, request_timeout: Duration) -> Self {
        Self {
            port,
            app_state,
            request_timeout,
        }
    }
}

#[async_trait]
impl Service for WebService {
    fn name(&self) -> &'static str {
        "web"
    }

    async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let router = create_router(self.app_state.clone(), self.request_timeout);
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        info!(
            service = "web",
            address = %addr,
            link = format!("http://localhost:{}", addr.port()),
            "Web server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!(service = "web", "Draining connections");
            })
            .await?;

        info!(service = "web", "Web server stopped");
        Ok(())
    }
}

//! Long-running services and their lifecycle.

use async_trait::async_trait;
use tokio::sync::broadcast;

pub mod manager;
pub mod signals;
pub mod web;

/// A background component that runs until told to stop.
#[async_trait]
pub trait Service: Send {
    fn name(&self) -> &'static str;

    /// Run until `shutdown_rx` fires or the service fails.
    async fn run(&mut self, shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()>;
}

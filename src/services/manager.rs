use std::time::Duration;

use futures::future::select_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::Service;
use crate::utils::fmt_duration;

/// How a single service task ended.
#[derive(Debug)]
pub enum ServiceOutcome {
    Completed,
    Failed(anyhow::Error),
    Panicked,
}

/// Owns every registered service and the shared shutdown broadcast.
pub struct ServiceManager {
    pending: Vec<(&'static str, Box<dyn Service>)>,
    running: Vec<(&'static str, JoinHandle<anyhow::Result<()>>)>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            pending: Vec::new(),
            running: Vec::new(),
            shutdown_tx,
        }
    }

    pub fn register_service(&mut self, name: &'static str, service: Box<dyn Service>) {
        debug!(service = name, "Service registered");
        self.pending.push((name, service));
    }

    /// Spawn every registered service onto the runtime.
    pub fn spawn_all(&mut self) {
        for (name, mut service) in self.pending.drain(..) {
            let shutdown_rx = self.shutdown_tx.subscribe();
            let handle = tokio::spawn(async move { service.run(shutdown_rx).await });
            info!(service = name, "Service started");
            self.running.push((name, handle));
        }
    }

    /// Wait until any service exits, returning its name and outcome.
    ///
    /// Pends forever when nothing is running so it can sit in a `select!`.
    pub async fn run(&mut self) -> (&'static str, ServiceOutcome) {
        if self.running.is_empty() {
            return futures::future::pending().await;
        }

        let handles = self.running.iter_mut().map(|(_, handle)| handle);
        let (result, index, _) = select_all(handles).await;
        let (name, _) = self.running.remove(index);

        let outcome = match result {
            Ok(Ok(())) => ServiceOutcome::Completed,
            Ok(Err(e)) => ServiceOutcome::Failed(e),
            Err(_) => ServiceOutcome::Panicked,
        };
        (name, outcome)
    }

    /// Broadcast shutdown and wait up to `timeout` for the remaining services.
    ///
    /// Returns the names of services that did not stop in time.
    pub async fn shutdown(&mut self, timeout: Duration) -> Vec<&'static str> {
        let _ = self.shutdown_tx.send(());
        let mut stragglers = Vec::new();

        let deadline = tokio::time::Instant::now() + timeout;
        for (name, handle) in self.running.drain(..) {
            let abort = handle.abort_handle();
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(Ok(()))) => debug!(service = name, "Service stopped"),
                Ok(Ok(Err(e))) => warn!(service = name, error = ?e, "Service stopped with error"),
                Ok(Err(e)) => error!(service = name, error = ?e, "Service task panicked"),
                Err(_) => {
                    warn!(
                        service = name,
                        timeout = fmt_duration(timeout),
                        "Service did not stop in time, aborting"
                    );
                    abort.abort();
                    stragglers.push(name);
                }
            }
        }
        stragglers
    }
}

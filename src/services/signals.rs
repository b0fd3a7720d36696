use std::process::ExitCode;
use std::time::Duration;

use tracing::{error, info, warn};

use super::manager::{ServiceManager, ServiceOutcome};

/// Run until a service exits or the process is signalled, then shut everything down.
pub async fn handle_shutdown_signals(
    mut service_manager: ServiceManager,
    shutdown_timeout: Duration,
) -> ExitCode {
    let exit_code = tokio::select! {
        (name, outcome) = service_manager.run() => match outcome {
            ServiceOutcome::Completed => {
                warn!(service = name, "Service exited unexpectedly");
                ExitCode::FAILURE
            }
            ServiceOutcome::Failed(e) => {
                error!(service = name, error = ?e, "Service failed");
                ExitCode::FAILURE
            }
            ServiceOutcome::Panicked => {
                error!(service = name, "Service panicked");
                ExitCode::FAILURE
            }
        },
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            ExitCode::SUCCESS
        }
    };

    let stragglers = service_manager.shutdown(shutdown_timeout).await;
    if stragglers.is_empty() {
        info!("All services stopped");
        exit_code
    } else {
        warn!(services = ?stragglers, "Forced shutdown");
        ExitCode::FAILURE
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = ?e, "Failed to listen for Ctrl+C");
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to listen for SIGTERM");
                futures::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

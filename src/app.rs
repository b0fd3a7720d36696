use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::FutureExt;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::{error, info, warn};

use crate::auth::{PermissionGate, PgRoleDirectory};
use crate::cases::{CaseService, CaseServiceSettings};
use crate::config::Config;
use crate::data::PgCorrelationStore;
use crate::reconcile::RefreshPipeline;
use crate::services::manager::ServiceManager;
use crate::services::web::WebService;
use crate::services::{Service, signals::handle_shutdown_signals};
use crate::state::AppState;
use crate::sync::{BackfillError, BackfillJob, DailyJob, DailyScheduler, Scheduler};
use crate::upstream::StatusClient;
use crate::utils::fmt_duration;

pub const BACKFILL_JOB_NAME: &str = "correlation-backfill";

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
    backfill: Arc<BackfillJob>,
    service_manager: ServiceManager,
}

impl App {
    /// Connect to the database, run migrations, and wire every component.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = connect(&config).await?;

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        let client = Arc::new(
            StatusClient::new(&config.upstream_user_agent)
                .context("Failed to create upstream status client")?,
        );
        let pipeline = RefreshPipeline::new(client.clone(), config.pipeline_settings());

        let gate = PermissionGate::new(
            Arc::new(PgRoleDirectory::new(db_pool.clone())),
            config.editor_role_ids.iter().copied(),
        );

        let store = PgCorrelationStore::new(
            db_pool.clone(),
            config.backfill_channel.clone(),
            config.backfill_window_months,
        );
        let backfill = Arc::new(BackfillJob::new(
            Arc::new(store),
            config.backfill_settings(),
        ));

        let cases = CaseService::new(
            db_pool.clone(),
            pipeline,
            client,
            gate,
            backfill.clone(),
            CaseServiceSettings {
                refresh_timeout: config.refresh_fetch_timeout,
                status_url_template: config.status_url_template.clone(),
            },
        );

        info!(
            wave_size = config.refresh_wave_size,
            wave_pause = fmt_duration(config.refresh_wave_pause),
            list_fetch_timeout = fmt_duration(config.list_fetch_timeout),
            backfill_chunk_size = config.backfill_chunk_size,
            backfill_limit = config.backfill_limit,
            editor_roles = ?config.editor_role_ids,
            "Case engine configured"
        );

        Ok(App {
            app_state: AppState::new(db_pool, Arc::new(cases)),
            config,
            backfill,
            service_manager: ServiceManager::new(),
        })
    }

    /// Register the HTTP server and the daily backfill scheduler.
    pub fn setup_services(&mut self) {
        let web = WebService::new(
            self.config.port,
            self.app_state.clone(),
            self.config.request_timeout(),
        );
        self.service_manager
            .register_service(web.name(), Box::new(web));

        let mut scheduler = DailyScheduler::new();
        scheduler.register_daily(
            BACKFILL_JOB_NAME,
            self.config.backfill_at,
            self.config.backfill_timezone,
            backfill_trigger(self.backfill.clone()),
        );
        self.service_manager
            .register_service(scheduler.name(), Box::new(scheduler));
    }

    /// Start all registered services
    pub fn start_services(&mut self) {
        self.service_manager.spawn_all();
    }

    /// Run until a service exits or a shutdown signal arrives.
    pub async fn run(self) -> ExitCode {
        handle_shutdown_signals(self.service_manager, self.config.shutdown_timeout).await
    }
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let connect_options = PgConnectOptions::from_str(&config.database_url)
        .context("Failed to parse database URL")?
        .log_statements(tracing::log::LevelFilter::Debug)
        .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

    let db_pool = PgPoolOptions::new()
        .min_connections(0)
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(4))
        .idle_timeout(Duration::from_secs(60 * 2))
        .max_lifetime(Duration::from_secs(60 * 30))
        .connect_with(connect_options)
        .await
        .context("Failed to create database pool")?;

    info!(
        max_connections = 8,
        acquire_timeout = "4s",
        idle_timeout = "2m",
        max_lifetime = "30m",
        "database pool established"
    );
    Ok(db_pool)
}

/// Daily job body for the correlation backfill. An overlapping run is skipped.
pub fn backfill_trigger(job: Arc<BackfillJob>) -> DailyJob {
    Arc::new(move || {
        let job = job.clone();
        async move {
            match job.run().await {
                Ok(report) if report.failed_chunks.is_empty() => {
                    info!(
                        selected = report.selected,
                        updated = report.updated,
                        "Scheduled backfill finished"
                    );
                }
                Ok(report) => {
                    warn!(
                        selected = report.selected,
                        updated = report.updated,
                        failed_chunks = report.failed_chunks.len(),
                        "Scheduled backfill finished with failed chunks"
                    );
                }
                Err(BackfillError::AlreadyRunning) => {
                    warn!("Previous backfill still running, skipping scheduled run");
                }
                Err(e) => {
                    error!(error = ?e, "Scheduled backfill failed");
                }
            }
        }
        .boxed()
    })
}

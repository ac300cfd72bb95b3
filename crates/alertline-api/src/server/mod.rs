//! HTTP server.

mod router;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;

use alertline_engine::IntakeService;
use alertline_notifiers::{build_notifiers, Dispatcher};
use alertline_storage::{RedbReportStore, ReportStore};

pub use router::{create_router, RouterLimits, MAX_REQUEST_BODY_SIZE};
pub use state::ServerState;

use crate::auth::Authenticator;
use crate::config::Config;

/// A started service: state for the router and the self-report worker.
pub struct Service {
    pub state: ServerState,
    pub worker: JoinHandle<()>,
}

impl Service {
    /// Open storage, build notifiers and start the intake pipeline.
    pub async fn start(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn ReportStore> = Arc::new(
            RedbReportStore::open(&config.data_dir)
                .with_context(|| format!("opening store in {}", config.data_dir.display()))?,
        );
        Self::with_store(config, store).await
    }

    /// Start the pipeline on an already opened store.
    pub async fn with_store(config: &Config, store: Arc<dyn ReportStore>) -> anyhow::Result<Self> {
        let notifiers = build_notifiers(&config.notifier_configs())?;
        for notifier in &notifiers {
            tracing::info!(
                category = "notify",
                name = %notifier.name(),
                notifier_type = %notifier.notifier_type(),
                "Registered notifier"
            );
        }
        let dispatcher = Dispatcher::with_notifiers(notifiers);
        let clock = Arc::new(config.clock()?);

        let (intake, worker) =
            IntakeService::start(store, dispatcher, clock, config.self_report_config()).await?;
        let state = ServerState::new(intake, Authenticator::new(config.auth.clone()));
        if !state.auth.is_enabled() {
            tracing::warn!(category = "auth", "No [auth] section, all requests are anonymous");
        }

        Ok(Self { state, worker })
    }

    pub fn limits(config: &Config) -> RouterLimits {
        RouterLimits {
            request_timeout: Duration::from_secs(config.server_write_timeout_secs),
            body_timeout: Duration::from_secs(config.server_read_timeout_secs),
        }
    }

    /// Close the self-report queue and wait for the worker to drain it.
    pub async fn shutdown(self) {
        self.state.intake.close();
        if let Err(e) = self.worker.await {
            tracing::error!(category = "server", error = %e, "Self-report worker failed");
        }
    }
}

/// Run the server until a shutdown signal arrives.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let bind = config.socket_addr()?;
    let service = Service::start(&config).await?;
    let app = create_router(service.state.clone(), Service::limits(&config));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    tracing::info!(
        category = "server",
        address = %bind,
        time_zone = %config.time_zone,
        "Alertline listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(crate::shutdown::shutdown_signal())
        .await?;

    service.shutdown().await;
    tracing::info!(category = "server", "Server shutdown complete");
    Ok(())
}

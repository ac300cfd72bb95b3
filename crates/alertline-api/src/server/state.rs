//! Shared server state.

use std::sync::Arc;

use alertline_engine::IntakeService;
use alertline_notifiers::Dispatcher;
use alertline_storage::ReportStore;

use crate::auth::Authenticator;

/// Cloned into every handler.
#[derive(Clone)]
pub struct ServerState {
    pub intake: Arc<IntakeService>,
    pub store: Arc<dyn ReportStore>,
    pub dispatcher: Dispatcher,
    pub auth: Arc<Authenticator>,
    /// Unix timestamp of server start.
    pub started_at: i64,
}

impl ServerState {
    pub fn new(intake: Arc<IntakeService>, auth: Authenticator) -> Self {
        Self {
            store: intake.store().clone(),
            dispatcher: intake.dispatcher().clone(),
            intake,
            auth: Arc::new(auth),
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}

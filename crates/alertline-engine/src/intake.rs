//! The report intake pipeline.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use alertline_core::{
    Clock, Error, GroupId, IncomingReport, Report, Result, Severity, UserId, ValidatedReport,
};
use alertline_notifiers::Dispatcher;
use alertline_storage::ReportStore;

use crate::escalation::EscalationEngine;
use crate::self_report::{spawn_worker, SelfReport, SelfReportConfig, SelfReporter};

/// Where a report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOrigin {
    Client,
    /// Generated by the self-report worker. Failures are only logged.
    SelfReport,
}

/// A persisted report plus the errors of the steps after persisting it.
#[derive(Debug)]
pub struct Ingested {
    pub report: Report,
    pub escalation_error: Option<Error>,
    pub dispatch_error: Option<Error>,
}

impl Ingested {
    pub fn is_complete(&self) -> bool {
        self.escalation_error.is_none() && self.dispatch_error.is_none()
    }

    /// Human readable descriptions of the failed steps.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(e) = &self.escalation_error {
            warnings.push(format!("escalation: {}", e));
        }
        if let Some(e) = &self.dispatch_error {
            warnings.push(format!("dispatch: {}", e));
        }
        warnings
    }
}

/// Validates, persists, escalates and dispatches reports.
pub struct IntakeService {
    store: Arc<dyn ReportStore>,
    engine: Arc<EscalationEngine>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    self_reports: SelfReporter,
    self_config: SelfReportConfig,
}

impl IntakeService {
    pub fn new(
        store: Arc<dyn ReportStore>,
        engine: Arc<EscalationEngine>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
        self_reports: SelfReporter,
        self_config: SelfReportConfig,
    ) -> Self {
        Self {
            store,
            engine,
            dispatcher,
            clock,
            self_reports,
            self_config,
        }
    }

    /// Build the engine from the store, then start the service together
    /// with its self-report worker.
    pub async fn start(
        store: Arc<dyn ReportStore>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
        self_config: SelfReportConfig,
    ) -> Result<(Arc<Self>, JoinHandle<()>)> {
        let engine = Arc::new(EscalationEngine::new(store.clone(), dispatcher.clone()).await?);
        let (self_reports, rx) = SelfReporter::channel();
        let intake = Arc::new(Self::new(
            store,
            engine,
            dispatcher,
            clock,
            self_reports,
            self_config,
        ));
        let worker = Self::spawn_self_report_worker(intake.clone(), rx);
        Ok((intake, worker))
    }

    pub fn spawn_self_report_worker(
        intake: Arc<Self>,
        rx: UnboundedReceiver<SelfReport>,
    ) -> JoinHandle<()> {
        spawn_worker(intake, rx)
    }

    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<EscalationEngine> {
        &self.engine
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn self_reports(&self) -> &SelfReporter {
        &self.self_reports
    }

    /// Accept a report from a client acting as `user`.
    ///
    /// Fails only when validation or persisting fails. Escalation and
    /// dispatch errors are carried in the returned [`Ingested`].
    pub async fn submit(&self, incoming: IncomingReport, user: Option<UserId>) -> Result<Ingested> {
        self.submit_from(incoming, user, ReportOrigin::Client).await
    }

    /// Like [`submit`](Self::submit) for a caller of the given origin.
    /// Failures of self-generated reports are logged but never queued.
    pub async fn submit_from(
        &self,
        incoming: IncomingReport,
        user: Option<UserId>,
        origin: ReportOrigin,
    ) -> Result<Ingested> {
        let source = incoming.source_id.clone();
        let validated = match incoming.validate() {
            Ok(validated) => validated,
            Err(e) => {
                tracing::warn!(
                    category = "intake",
                    source = %source,
                    error = %e,
                    "Rejected report"
                );
                if origin == ReportOrigin::Client {
                    self.self_reports.push(SelfReport::rejected(&source, &e));
                }
                return Err(e);
            }
        };
        self.process(validated, user, origin).await
    }

    /// Turn a queued failure into a warning report about this service.
    pub async fn ingest_self_report(&self, item: SelfReport) {
        let report = ValidatedReport::new(
            self.self_config.source.clone(),
            Severity::Warning,
            item.subject,
        )
        .with_body(item.body)
        .with_arg("kind", item.kind.as_str())
        .with_arg("origin", item.origin.label());

        match self
            .process(report, self.self_config.user_id, ReportOrigin::SelfReport)
            .await
        {
            Ok(ingested) => {
                for warning in ingested.warnings() {
                    tracing::warn!(
                        category = "intake",
                        report_id = ingested.report.id,
                        "Self-report incomplete: {}",
                        warning
                    );
                }
            }
            Err(e) => {
                tracing::error!(category = "intake", error = %e, "Failed to store self-report");
            }
        }
    }

    /// Resolve a group on behalf of `user` and refresh the escalation counts.
    pub async fn resolve_group(&self, group_id: GroupId, user: Option<UserId>) -> Result<u64> {
        let user_id = user.ok_or_else(|| {
            Error::Unauthenticated("resolving a group requires a user id".to_string())
        })?;
        let affected = self.store.resolve_group(group_id, user_id)?;
        self.engine.reload().await?;

        tracing::info!(
            category = "intake",
            group_id,
            user_id,
            affected,
            "Resolved incident group"
        );
        Ok(affected)
    }

    /// Stop accepting self-reports. The worker finishes the queue and exits.
    pub fn close(&self) {
        self.self_reports.close();
    }

    async fn process(
        &self,
        validated: ValidatedReport,
        user: Option<UserId>,
        origin: ReportOrigin,
    ) -> Result<Ingested> {
        let new = validated.stamp(self.clock.now());

        let (report, escalation_error) = if new.severity == Severity::Recovery {
            let (id, group_id) = self.store.insert_report(&new)?;
            let mut report = new.into_report(id, group_id);
            self.log_stored(&report);
            self.recover(&mut report, user, origin).await;
            let error = self.engine.handle_escalation(&mut report).await.err();
            (report, error)
        } else {
            let (report, error) = self.engine.insert_and_handle(new).await?;
            self.log_stored(&report);
            (report, error)
        };
        if let Some(e) = &escalation_error {
            tracing::warn!(
                category = "escalation",
                report_id = report.id,
                error = %e,
                "Escalation failed"
            );
        }

        let dispatch_error = self
            .dispatcher
            .dispatch(&report)
            .await
            .err()
            .map(Error::from);

        Ok(Ingested {
            report,
            escalation_error,
            dispatch_error,
        })
    }

    fn log_stored(&self, report: &Report) {
        tracing::debug!(
            category = "intake",
            report_id = report.id,
            group_id = report.group_id,
            source = %report.source_id,
            severity = %report.severity,
            "Stored report"
        );
    }

    /// Resolve the group of a recovery report. Failures never fail the
    /// request; client failures are queued as self-reports.
    async fn recover(&self, report: &mut Report, user: Option<UserId>, origin: ReportOrigin) {
        let group_id = report.group_id;
        match self.auto_resolve(group_id, user).await {
            Ok(affected) => {
                if affected > 0 {
                    report.resolved_by_user_id = user;
                }
            }
            Err(e) => {
                tracing::error!(
                    category = "intake",
                    group_id,
                    source = %report.source_id,
                    error = %e,
                    "Auto-resolve failed"
                );
                match origin {
                    ReportOrigin::Client => {
                        self.self_reports.push(SelfReport::auto_resolve_failed(
                            &report.source_id,
                            group_id,
                            &e,
                        ));
                    }
                    ReportOrigin::SelfReport => {}
                }
            }
        }
    }

    async fn auto_resolve(&self, group_id: GroupId, user: Option<UserId>) -> Result<u64> {
        self.resolve_group(group_id, user)
            .await
            .map_err(|e| Error::AutoResolve(format!("group {}: {}", group_id, e)))
    }
}

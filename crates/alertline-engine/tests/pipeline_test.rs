//! Tests for the intake pipeline.
//!
//! Tests cover:
//! - Escalation thresholds observed through `submit`
//! - Resolution and recovery resetting a source
//! - Self-reports for rejected reports and failed auto-resolves
//! - Partial success when escalation or dispatch fails
//! - Escalation state under concurrent ingestion and reloads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alertline_core::{
    Error, FixedClock, GroupId, IncidentGroup, IncomingReport, NewReport, Report, ReportFilter,
    ReportId, ReportOverview, Result, Severity, SourceId, UserId,
};
use alertline_engine::{
    EscalationEngine, IntakeService, ReportOrigin, SelfReportConfig, SelfReportKind,
    SelfReporter,
};
use alertline_notifiers::{Dispatcher, MemoryNotifier, NotifierFilter};
use alertline_storage::{RedbReportStore, ReportStore};
use chrono::{DateTime, FixedOffset, TimeZone};
use tokio::sync::mpsc::UnboundedReceiver;

/// Store wrapper that can be told to fail selected operations.
struct FlakyStore {
    inner: RedbReportStore,
    fail_resolve: AtomicBool,
    fail_escalate: AtomicBool,
    /// Stall `get_overview` after reading, to widen reload races.
    slow_overview: AtomicBool,
    overview_read: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: RedbReportStore::memory().unwrap(),
            fail_resolve: AtomicBool::new(false),
            fail_escalate: AtomicBool::new(false),
            slow_overview: AtomicBool::new(false),
            overview_read: AtomicBool::new(false),
        }
    }
}

impl ReportStore for FlakyStore {
    fn find_or_create_active_group(
        &self,
        source: &SourceId,
        created: DateTime<FixedOffset>,
    ) -> Result<GroupId> {
        self.inner.find_or_create_active_group(source, created)
    }

    fn insert_report(&self, report: &NewReport) -> Result<(ReportId, GroupId)> {
        self.inner.insert_report(report)
    }

    fn get_report(&self, id: ReportId) -> Result<Report> {
        self.inner.get_report(id)
    }

    fn get_group(&self, id: GroupId) -> Result<IncidentGroup> {
        self.inner.get_group(id)
    }

    fn list_reports(&self, filter: &ReportFilter, include_resolved: bool) -> Result<Vec<Report>> {
        self.inner.list_reports(filter, include_resolved)
    }

    fn resolve_group(&self, id: GroupId, user_id: UserId) -> Result<u64> {
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(Error::Storage("resolve unavailable".to_string()));
        }
        self.inner.resolve_group(id, user_id)
    }

    fn escalate_group(&self, id: GroupId) -> Result<()> {
        if self.fail_escalate.load(Ordering::SeqCst) {
            return Err(Error::Storage("escalate unavailable".to_string()));
        }
        self.inner.escalate_group(id)
    }

    fn get_overview(&self) -> Result<Vec<ReportOverview>> {
        let overview = self.inner.get_overview();
        if self.slow_overview.load(Ordering::SeqCst) {
            self.overview_read.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
        }
        overview
    }

    fn get_sources(&self) -> Result<Vec<SourceId>> {
        self.inner.get_sources()
    }
}

struct Harness {
    store: Arc<FlakyStore>,
    intake: Arc<IntakeService>,
    sink: MemoryNotifier,
    /// Only accepts critical reports.
    pager: MemoryNotifier,
    queue: UnboundedReceiver<alertline_engine::SelfReport>,
}

async fn harness(self_config: SelfReportConfig) -> Harness {
    let store = Arc::new(FlakyStore::new());
    let sink = MemoryNotifier::new("sink");
    let pager = MemoryNotifier::new("pager")
        .with_filter(NotifierFilter::allow_all().with_levels(vec![Severity::Critical]));
    let dispatcher =
        Dispatcher::with_notifiers(vec![Arc::new(sink.clone()), Arc::new(pager.clone())]);
    let engine = Arc::new(
        EscalationEngine::new(store.clone(), dispatcher.clone())
            .await
            .unwrap(),
    );
    let start = FixedOffset::east_opt(7200)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 1, 8, 0, 0)
        .unwrap();
    let (reporter, queue) = SelfReporter::channel();
    let intake = Arc::new(IntakeService::new(
        store.clone(),
        engine,
        dispatcher,
        Arc::new(FixedClock::new(start)),
        reporter,
        self_config,
    ));
    Harness {
        store,
        intake,
        sink,
        pager,
        queue,
    }
}

fn warning(app: &str) -> IncomingReport {
    IncomingReport::new(SourceId::new(app), "warning", "queue backlog")
}

const USER: Option<UserId> = Some(7);

#[tokio::test]
async fn test_eleventh_warning_is_first_escalated() {
    let h = harness(SelfReportConfig::default()).await;

    for i in 1..=11 {
        let ingested = h.intake.submit(warning("svc1"), USER).await.unwrap();
        assert!(ingested.is_complete());
        assert_eq!(ingested.report.escalated, i == 11, "report {}", i);
    }

    let overview = h.store.get_overview().unwrap();
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].warning, 11);
    assert!(overview[0].escalated);

    // 11 reports plus the escalation notice.
    let delivered = h.sink.get_reports().await;
    assert_eq!(delivered.len(), 12);
    assert_eq!(
        delivered.iter().filter(|r| r.subject == "escalated").count(),
        1
    );
}

#[tokio::test]
async fn test_escalated_warnings_reach_critical_notifiers() {
    let h = harness(SelfReportConfig::default()).await;
    for _ in 0..10 {
        h.intake.submit(warning("svc1"), USER).await.unwrap();
    }
    assert_eq!(h.pager.count().await, 0);

    for _ in 0..2 {
        let report = h.intake.submit(warning("svc1"), USER).await.unwrap().report;
        assert!(report.escalated);
        assert_eq!(report.severity, Severity::Warning);
    }

    // The escalation notice plus the 11th and 12th warnings.
    let paged = h.pager.get_reports().await;
    assert_eq!(paged.len(), 3);
    assert_eq!(paged.iter().filter(|r| r.subject == "escalated").count(), 1);
    assert!(paged
        .iter()
        .filter(|r| r.subject != "escalated")
        .all(|r| r.severity == Severity::Warning && r.escalated));
}

#[tokio::test]
async fn test_resolution_resets_counts() {
    let h = harness(SelfReportConfig::default()).await;
    let first = h.intake.submit(warning("svc1"), USER).await.unwrap().report;
    for _ in 0..10 {
        h.intake.submit(warning("svc1"), USER).await.unwrap();
    }

    assert_eq!(h.intake.resolve_group(first.group_id, USER).await.unwrap(), 1);
    assert_eq!(h.intake.resolve_group(first.group_id, USER).await.unwrap(), 0);
    assert!(h.store.get_sources().unwrap().is_empty());

    for _ in 0..10 {
        let report = h.intake.submit(warning("svc1"), USER).await.unwrap().report;
        assert!(!report.escalated);
        assert_ne!(report.group_id, first.group_id);
    }
}

#[tokio::test]
async fn test_resolve_requires_user() {
    let h = harness(SelfReportConfig::default()).await;
    let report = h.intake.submit(warning("svc1"), USER).await.unwrap().report;
    let err = h.intake.resolve_group(report.group_id, None).await.unwrap_err();
    assert!(matches!(err, Error::Unauthenticated(_)));
    assert!(h.store.get_group(report.group_id).unwrap().is_open());
}

#[tokio::test]
async fn test_recovery_auto_resolves_without_counting() {
    let h = harness(SelfReportConfig::default()).await;
    h.intake.submit(warning("svc1"), USER).await.unwrap();

    let recovery = IncomingReport::new(SourceId::new("svc1"), "recovery", "back to normal");
    let ingested = h.intake.submit(recovery, USER).await.unwrap();
    assert_eq!(ingested.report.resolved_by_user_id, USER);
    assert!(!ingested.report.escalated);

    let group = h.store.get_group(ingested.report.group_id).unwrap();
    assert_eq!(group.resolved_by_user_id, USER);
    assert!(h.store.get_sources().unwrap().is_empty());

    let counts = h
        .intake
        .engine()
        .counts_for(&SourceId::new("svc1"))
        .await
        .unwrap();
    assert_eq!((counts.critical, counts.warning, counts.info), (0, 0, 0));
}

#[tokio::test]
async fn test_recovery_without_user_is_self_reported() {
    let mut h = harness(SelfReportConfig::default()).await;
    let recovery = IncomingReport::new(SourceId::new("svc1"), "recovery", "ok");
    let ingested = h.intake.submit(recovery, None).await.unwrap();

    assert!(ingested.report.resolved_by_user_id.is_none());
    assert!(h.store.get_group(ingested.report.group_id).unwrap().is_open());

    let item = h.queue.try_recv().unwrap();
    assert_eq!(item.kind, SelfReportKind::AutoResolveFailed);
    assert_eq!(item.origin, SourceId::new("svc1"));
}

#[tokio::test]
async fn test_rejected_report_is_self_reported() {
    let mut h = harness(SelfReportConfig::default()).await;
    let bad = IncomingReport::new(SourceId::new("svc1"), "fatal", "x");

    let err = h.intake.submit(bad, USER).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(err.to_string().contains("recovery"));
    assert_eq!(h.queue.try_recv().unwrap().kind, SelfReportKind::RejectedReport);
    assert!(h.store.get_sources().unwrap().is_empty());
}

#[tokio::test]
async fn test_self_report_failures_are_not_requeued() {
    let mut h = harness(SelfReportConfig::default()).await;
    h.store.fail_resolve.store(true, Ordering::SeqCst);

    let recovery = IncomingReport::new(SourceId::new("svc1"), "recovery", "ok");
    h.intake.submit(recovery, USER).await.unwrap();
    let item = h.queue.try_recv().unwrap();
    assert_eq!(h.intake.self_reports().enqueued(), 1);

    h.intake.ingest_self_report(item).await;
    assert_eq!(h.intake.self_reports().enqueued(), 1);
    assert!(h.queue.try_recv().is_err());

    let own = h
        .store
        .list_reports(&ReportFilter::app("alertline"), false)
        .unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].subject, "auto-resolve failed");
    assert_eq!(own[0].args["kind"], "auto_resolve_failed");
}

#[tokio::test]
async fn test_self_generated_recovery_failure_is_not_queued() {
    let mut h = harness(SelfReportConfig::default()).await;
    h.store.fail_resolve.store(true, Ordering::SeqCst);

    let source = SelfReportConfig::default().source;
    h.intake
        .submit_from(
            IncomingReport::new(source.clone(), "warning", "disk almost full"),
            USER,
            ReportOrigin::SelfReport,
        )
        .await
        .unwrap();
    let recovery = IncomingReport::new(source, "recovery", "disk cleaned");
    let ingested = h
        .intake
        .submit_from(recovery, USER, ReportOrigin::SelfReport)
        .await
        .unwrap();

    assert!(ingested.report.resolved_by_user_id.is_none());
    assert!(h.store.get_group(ingested.report.group_id).unwrap().is_open());
    assert_eq!(h.intake.self_reports().enqueued(), 0);
    assert!(h.queue.try_recv().is_err());

    let bad = IncomingReport::new(SourceId::new("alertline"), "fatal", "x");
    assert!(h
        .intake
        .submit_from(bad, USER, ReportOrigin::SelfReport)
        .await
        .is_err());
    assert_eq!(h.intake.self_reports().enqueued(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingestion_escalates_once() {
    let h = harness(SelfReportConfig::default()).await;

    let mut tasks = Vec::new();
    for i in 0..40 {
        let intake = h.intake.clone();
        tasks.push(tokio::spawn(async move {
            let severity = if i % 8 == 0 { "critical" } else { "warning" };
            let report = IncomingReport::new(SourceId::new("svc1"), severity, "flapping");
            intake.submit(report, USER).await.unwrap()
        }));
    }
    let mut groups = Vec::new();
    for task in tasks {
        let ingested = task.await.unwrap();
        assert!(ingested.is_complete());
        groups.push(ingested.report.group_id);
    }
    groups.dedup();
    assert_eq!(groups.len(), 1);

    let delivered = h.sink.get_reports().await;
    assert_eq!(
        delivered.iter().filter(|r| r.subject == "escalated").count(),
        1
    );
    assert!(h.store.get_group(groups[0]).unwrap().escalated);

    let overview = h.store.get_overview().unwrap();
    let counts = h
        .intake
        .engine()
        .counts_for(&SourceId::new("svc1"))
        .await
        .unwrap();
    assert_eq!(overview.len(), 1);
    assert_eq!((counts.critical, counts.warning), (5, 35));
    assert_eq!(
        (counts.critical, counts.warning, counts.info, counts.escalated),
        (
            overview[0].critical,
            overview[0].warning,
            overview[0].info,
            overview[0].escalated
        )
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reload_does_not_lose_concurrent_counts() {
    let h = harness(SelfReportConfig::default()).await;
    for _ in 0..10 {
        h.intake.submit(warning("svc1"), USER).await.unwrap();
    }
    let other = h.intake.submit(warning("other"), USER).await.unwrap().report;

    h.store.slow_overview.store(true, Ordering::SeqCst);
    let intake = h.intake.clone();
    let resolver =
        tokio::spawn(async move { intake.resolve_group(other.group_id, USER).await.unwrap() });
    while !h.store.overview_read.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let eleventh = h.intake.submit(warning("svc1"), USER).await.unwrap();
    assert_eq!(resolver.await.unwrap(), 1);
    h.store.slow_overview.store(false, Ordering::SeqCst);
    assert!(eleventh.report.escalated);

    let counts = h
        .intake
        .engine()
        .counts_for(&SourceId::new("svc1"))
        .await
        .unwrap();
    assert_eq!(counts.warning, 11);
    assert!(counts.escalated);

    let twelfth = h.intake.submit(warning("svc1"), USER).await.unwrap();
    assert!(twelfth.report.escalated);
    let delivered = h.sink.get_reports().await;
    assert_eq!(
        delivered.iter().filter(|r| r.subject == "escalated").count(),
        1
    );
}

#[tokio::test]
async fn test_escalation_failure_is_partial_success() {
    let h = harness(SelfReportConfig::default()).await;
    h.store.fail_escalate.store(true, Ordering::SeqCst);

    let critical = IncomingReport::new(SourceId::new("db"), "critical", "down");
    let ingested = h.intake.submit(critical, USER).await.unwrap();
    assert!(ingested.escalation_error.is_some());
    assert!(ingested.dispatch_error.is_none());
    assert_eq!(h.store.get_report(ingested.report.id).unwrap().subject, "down");

    // The transition is retried by the next report once the store recovers.
    h.store.fail_escalate.store(false, Ordering::SeqCst);
    let next = h
        .intake
        .submit(IncomingReport::new(SourceId::new("db"), "info", "still down"), USER)
        .await
        .unwrap();
    assert!(next.is_complete());
    assert!(h.store.get_group(next.report.group_id).unwrap().escalated);
}

#[tokio::test]
async fn test_dispatch_failure_is_partial_success() {
    let h = harness(SelfReportConfig::default()).await;
    h.sink.set_failing(true);

    let ingested = h.intake.submit(warning("svc1"), USER).await.unwrap();
    assert!(matches!(ingested.dispatch_error, Some(Error::Dispatch(_))));
    assert_eq!(ingested.warnings().len(), 1);
    assert!(h.store.get_report(ingested.report.id).is_ok());
}

#[tokio::test]
async fn test_worker_drains_queue_on_close() {
    let store: Arc<dyn ReportStore> = Arc::new(RedbReportStore::memory().unwrap());
    let start = FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .unwrap();
    let config = SelfReportConfig {
        source: SourceId::new("alertline").with_instance("node-1"),
        user_id: Some(0),
    };
    let (intake, worker) = IntakeService::start(
        store.clone(),
        Dispatcher::new(),
        Arc::new(FixedClock::new(start)),
        config.clone(),
    )
    .await
    .unwrap();

    for _ in 0..3 {
        let bad = IncomingReport::new(SourceId::new(""), "warning", "no app");
        assert!(intake.submit(bad, None).await.is_err());
    }
    intake.close();
    worker.await.unwrap();

    let own = store
        .list_reports(&ReportFilter::app("alertline"), false)
        .unwrap();
    assert_eq!(own.len(), 3);
    assert!(own.iter().all(|r| r.source_id == config.source));
}

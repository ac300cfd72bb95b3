//! Escalation of incident groups.
//!
//! The engine keeps a rolling count of critical, warning and info reports for
//! every source with an open group. A group escalates once it has seen a
//! critical report or more than [`ESCALATION_WARNING_THRESHOLD`] warnings.
//! The counts are a cache over the store; [`EscalationEngine::reload`]
//! rebuilds them from [`ReportStore::get_overview`]. Store calls that must
//! agree with the cache run under the counts lock; notifier dispatch never
//! does.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use alertline_core::config::{ESCALATED_SUBJECT, ESCALATION_WARNING_THRESHOLD};
use alertline_core::{Error, NewReport, Report, ReportOverview, Result, Severity, SourceId};
use alertline_notifiers::Dispatcher;
use alertline_storage::ReportStore;

/// Counts for the open group of one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingCount {
    pub critical: u64,
    pub warning: u64,
    pub info: u64,
    pub escalated: bool,
}

impl RollingCount {
    /// Add one report. Recovery reports are not counted.
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
            Severity::Recovery => {}
        }
    }

    /// Whether the counts alone call for escalation.
    pub fn exceeds_threshold(&self) -> bool {
        self.critical > 0 || self.warning > ESCALATION_WARNING_THRESHOLD
    }
}

impl From<&ReportOverview> for RollingCount {
    fn from(overview: &ReportOverview) -> Self {
        Self {
            critical: overview.critical,
            warning: overview.warning,
            info: overview.info,
            escalated: overview.escalated,
        }
    }
}

/// Per-source escalation state shared by all intake tasks.
pub struct EscalationEngine {
    store: Arc<dyn ReportStore>,
    dispatcher: Dispatcher,
    counts: Mutex<HashMap<String, RollingCount>>,
}

/// Result of counting one report under the lock.
struct Counted {
    key: String,
    transitioned: bool,
    snapshot: RollingCount,
}

impl EscalationEngine {
    /// Create the engine and load the counts of all open groups.
    pub async fn new(store: Arc<dyn ReportStore>, dispatcher: Dispatcher) -> Result<Self> {
        let engine = Self {
            store,
            dispatcher,
            counts: Mutex::new(HashMap::new()),
        };
        engine.reload().await?;
        Ok(engine)
    }

    /// Replace the cached counts with the store's aggregate.
    ///
    /// The overview is read while the lock is held, so no increment made by
    /// a concurrent [`handle_escalation`](Self::handle_escalation) is lost.
    pub async fn reload(&self) -> Result<()> {
        let mut counts = self.counts.lock().await;
        let fresh: HashMap<String, RollingCount> = self
            .store
            .get_overview()?
            .iter()
            .map(|o| (o.source_id.key(), RollingCount::from(o)))
            .collect();

        tracing::debug!(
            category = "escalation",
            sources = fresh.len(),
            "Reloaded escalation counts"
        );
        *counts = fresh;
        Ok(())
    }

    /// Persist `new` and count it in one critical section, so a concurrent
    /// reload sees both the stored report and its increment or neither.
    ///
    /// Fails only when persisting fails. Escalation errors come back as the
    /// second element while the report stays persisted.
    pub async fn insert_and_handle(&self, new: NewReport) -> Result<(Report, Option<Error>)> {
        let (mut report, counted) = {
            let mut counts = self.counts.lock().await;
            let (id, group_id) = self.store.insert_report(&new)?;
            let mut report = new.into_report(id, group_id);
            let counted = self.count(&mut counts, &mut report);
            (report, counted)
        };
        let error = self.announce(&report, counted).await.err();
        Ok((report, error))
    }

    /// Count an already persisted `report` and escalate its group when the
    /// threshold is crossed.
    ///
    /// Sets `report.escalated` whenever the source is in escalated state.
    /// On the transition the group is flagged in the store and a synthetic
    /// critical "escalated" report is dispatched; errors from either are
    /// returned while the report itself stays persisted.
    pub async fn handle_escalation(&self, report: &mut Report) -> Result<()> {
        let counted = {
            let mut counts = self.counts.lock().await;
            self.count(&mut counts, report)
        };
        self.announce(report, counted).await
    }

    /// Increment, evaluate and on a transition flag the group in the store.
    /// A failed flag leaves the source unescalated so the next report
    /// retries the transition.
    fn count(
        &self,
        counts: &mut HashMap<String, RollingCount>,
        report: &mut Report,
    ) -> Result<Counted> {
        let key = report.source_id.key();
        let entry = counts.entry(key.clone()).or_default();
        entry.record(report.severity);
        let transitioned = !entry.escalated && entry.exceeds_threshold();

        if transitioned {
            tracing::info!(
                category = "escalation",
                source = %report.source_id,
                group_id = report.group_id,
                critical = entry.critical,
                warning = entry.warning,
                "Escalating incident group"
            );
            self.store.escalate_group(report.group_id)?;
            entry.escalated = true;
        }

        if entry.escalated {
            report.escalated = true;
        }
        Ok(Counted {
            key,
            transitioned,
            snapshot: entry.clone(),
        })
    }

    /// Dispatch the escalation notice outside the lock.
    async fn announce(&self, report: &Report, counted: Result<Counted>) -> Result<()> {
        let counted = counted?;
        if !counted.transitioned {
            return Ok(());
        }
        tracing::debug!(category = "escalation", key = %counted.key, "Sending escalation notice");
        let notice = escalation_notice(report, &counted.snapshot);
        self.dispatcher.dispatch(&notice).await?;
        Ok(())
    }

    /// Current counts for one source.
    pub async fn counts_for(&self, source: &SourceId) -> Option<RollingCount> {
        self.counts.lock().await.get(&source.key()).cloned()
    }

    /// Number of sources with cached counts.
    pub async fn tracked_sources(&self) -> usize {
        self.counts.lock().await.len()
    }
}

/// The internal report announcing that a group escalated. Not persisted.
fn escalation_notice(trigger: &Report, counts: &RollingCount) -> Report {
    let mut notice = trigger.clone();
    notice.severity = Severity::Critical;
    notice.subject = ESCALATED_SUBJECT.to_string();
    notice.body = format!(
        "{} escalated after {} critical and {} warning reports. Last report: {}",
        trigger.source_id.label(),
        counts.critical,
        counts.warning,
        trigger.subject
    );
    notice.args = serde_json::Map::new();
    notice.escalated = true;
    notice.resolved_by_user_id = None;
    notice
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertline_core::{Clock, FixedClock, ValidatedReport};
    use alertline_notifiers::MemoryNotifier;
    use alertline_storage::RedbReportStore;
    use chrono::{FixedOffset, TimeZone};

    struct Fixture {
        store: Arc<RedbReportStore>,
        engine: EscalationEngine,
        sink: MemoryNotifier,
        clock: FixedClock,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(RedbReportStore::memory().unwrap());
        let sink = MemoryNotifier::new("sink");
        let dispatcher = Dispatcher::with_notifiers(vec![Arc::new(sink.clone())]);
        let engine = EscalationEngine::new(store.clone(), dispatcher).await.unwrap();
        let start = FixedOffset::east_opt(7200)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 8, 0, 0)
            .unwrap();
        Fixture {
            store,
            engine,
            sink,
            clock: FixedClock::new(start),
        }
    }

    impl Fixture {
        async fn report(&self, app: &str, severity: Severity) -> Report {
            let new = ValidatedReport::new(SourceId::new(app), severity, "health check failed")
                .stamp(self.clock.now());
            let (id, group_id) = self.store.insert_report(&new).unwrap();
            let mut report = new.into_report(id, group_id);
            self.engine.handle_escalation(&mut report).await.unwrap();
            report
        }
    }

    #[tokio::test]
    async fn test_eleventh_warning_escalates() {
        let f = fixture().await;
        for _ in 0..10 {
            assert!(!f.report("svc1", Severity::Warning).await.escalated);
        }
        let eleventh = f.report("svc1", Severity::Warning).await;
        assert!(eleventh.escalated);
        assert_eq!(eleventh.severity, Severity::Warning);

        let notices = f.sink.get_reports().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].subject, ESCALATED_SUBJECT);
        assert_eq!(notices[0].severity, Severity::Critical);
        assert_eq!(notices[0].group_id, eleventh.group_id);
        assert!(f.store.get_group(eleventh.group_id).unwrap().escalated);
    }

    #[tokio::test]
    async fn test_single_critical_escalates() {
        let f = fixture().await;
        let report = f.report("db", Severity::Critical).await;
        assert!(report.escalated);
        assert_eq!(f.sink.count().await, 1);
    }

    #[tokio::test]
    async fn test_escalation_is_monotonic() {
        let f = fixture().await;
        f.report("db", Severity::Critical).await;
        for severity in [Severity::Info, Severity::Warning, Severity::Recovery] {
            assert!(f.report("db", severity).await.escalated);
        }
        // One notice for the transition only.
        assert_eq!(f.sink.count().await, 1);
    }

    #[tokio::test]
    async fn test_info_never_escalates() {
        let f = fixture().await;
        for _ in 0..50 {
            assert!(!f.report("web", Severity::Info).await.escalated);
        }
        let counts = f.engine.counts_for(&SourceId::new("web")).await.unwrap();
        assert_eq!(counts.info, 50);
        assert!(!counts.escalated);
    }

    #[tokio::test]
    async fn test_recovery_is_not_counted() {
        let f = fixture().await;
        f.report("svc1", Severity::Warning).await;
        f.report("svc1", Severity::Recovery).await;
        let counts = f.engine.counts_for(&SourceId::new("svc1")).await.unwrap();
        assert_eq!(
            counts,
            RollingCount {
                warning: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_reload_after_resolve_resets_counts() {
        let f = fixture().await;
        let first = f.report("svc1", Severity::Critical).await;
        assert_eq!(f.store.resolve_group(first.group_id, 7).unwrap(), 1);
        f.engine.reload().await.unwrap();
        assert!(f.engine.counts_for(&SourceId::new("svc1")).await.is_none());

        for _ in 0..10 {
            let report = f.report("svc1", Severity::Warning).await;
            assert!(!report.escalated);
            assert_ne!(report.group_id, first.group_id);
        }
    }

    #[tokio::test]
    async fn test_reload_restores_state_from_store() {
        let f = fixture().await;
        for _ in 0..11 {
            f.report("svc1", Severity::Warning).await;
        }
        let restarted = EscalationEngine::new(f.store.clone(), Dispatcher::new())
            .await
            .unwrap();
        let counts = restarted.counts_for(&SourceId::new("svc1")).await.unwrap();
        assert_eq!(counts.warning, 11);
        assert!(counts.escalated);
        assert_eq!(restarted.tracked_sources().await, 1);
    }

    #[tokio::test]
    async fn test_sources_are_independent() {
        let f = fixture().await;
        f.report("a", Severity::Critical).await;
        let other = f.report("b", Severity::Warning).await;
        assert!(!other.escalated);

        let tagged = SourceId::new("a").with_tag("nightly");
        let new = ValidatedReport::new(tagged, Severity::Info, "x").stamp(f.clock.now());
        let (id, group_id) = f.store.insert_report(&new).unwrap();
        let mut report = new.into_report(id, group_id);
        f.engine.handle_escalation(&mut report).await.unwrap();
        assert!(!report.escalated);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_returned_after_escalating() {
        let f = fixture().await;
        f.sink.set_failing(true);
        let new = ValidatedReport::new(SourceId::new("db"), Severity::Critical, "down")
            .stamp(f.clock.now());
        let (id, group_id) = f.store.insert_report(&new).unwrap();
        let mut report = new.into_report(id, group_id);

        let err = f.engine.handle_escalation(&mut report).await.unwrap_err();
        assert_eq!(err.code(), "DISPATCH_ERROR");
        assert!(report.escalated);
        assert!(f.store.get_group(group_id).unwrap().escalated);
    }
}

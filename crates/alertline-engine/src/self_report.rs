//! Reports the service files about its own failures.
//!
//! Failures that cannot be returned to a client (a recovery report that could
//! not resolve its group) or that operators should hear about (rejected
//! reports) are queued here. A single worker turns each item into a warning
//! report for the configured self-report source and runs it through the
//! normal pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use alertline_core::config::defaults;
use alertline_core::{Error, GroupId, SourceId, UserId};

use crate::intake::IntakeService;

/// Identity used for self-generated reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfReportConfig {
    pub source: SourceId,
    /// User recorded when a self-generated recovery resolves a group.
    pub user_id: Option<UserId>,
}

impl Default for SelfReportConfig {
    fn default() -> Self {
        Self {
            source: SourceId::new(defaults::SELF_REPORT_APP),
            user_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfReportKind {
    RejectedReport,
    AutoResolveFailed,
}

impl SelfReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RejectedReport => "rejected_report",
            Self::AutoResolveFailed => "auto_resolve_failed",
        }
    }
}

/// One queued failure.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfReport {
    pub kind: SelfReportKind,
    pub subject: String,
    pub body: String,
    /// Source of the report that failed.
    pub origin: SourceId,
}

impl SelfReport {
    pub fn rejected(origin: &SourceId, error: &Error) -> Self {
        Self {
            kind: SelfReportKind::RejectedReport,
            subject: "report rejected".to_string(),
            body: format!("report from {} rejected: {}", origin.label(), error),
            origin: origin.clone(),
        }
    }

    pub fn auto_resolve_failed(origin: &SourceId, group_id: GroupId, error: &Error) -> Self {
        Self {
            kind: SelfReportKind::AutoResolveFailed,
            subject: "auto-resolve failed".to_string(),
            body: format!(
                "failed to resolve group {} of {}: {}",
                group_id,
                origin.label(),
                error
            ),
            origin: origin.clone(),
        }
    }
}

/// Producer side of the self-report queue. Pushing never blocks.
#[derive(Debug, Clone)]
pub struct SelfReporter {
    tx: Arc<Mutex<Option<UnboundedSender<SelfReport>>>>,
    enqueued: Arc<AtomicU64>,
}

impl SelfReporter {
    pub fn channel() -> (Self, UnboundedReceiver<SelfReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = Self {
            tx: Arc::new(Mutex::new(Some(tx))),
            enqueued: Arc::new(AtomicU64::new(0)),
        };
        (reporter, rx)
    }

    /// Queue an item. Returns false once the queue is closed.
    pub fn push(&self, item: SelfReport) -> bool {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            tracing::warn!(
                category = "intake",
                kind = item.kind.as_str(),
                "Self-report queue closed, dropping item"
            );
            return false;
        };
        if tx.send(item).is_err() {
            return false;
        }
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Drop the sender. The worker drains what is queued and stops.
    pub fn close(&self) {
        self.tx.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Items queued since creation.
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }
}

/// Start the single consumer of the queue.
pub fn spawn_worker(
    intake: Arc<IntakeService>,
    mut rx: UnboundedReceiver<SelfReport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(category = "intake", "Self-report worker started");
        while let Some(item) = rx.recv().await {
            intake.ingest_self_report(item).await;
        }
        tracing::info!(category = "intake", "Self-report worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_close() {
        let (reporter, mut rx) = SelfReporter::channel();
        let origin = SourceId::new("svc1");
        let err = Error::Validation("bad".to_string());

        assert!(reporter.push(SelfReport::rejected(&origin, &err)));
        assert_eq!(reporter.enqueued(), 1);
        let item = rx.try_recv().unwrap();
        assert_eq!(item.kind, SelfReportKind::RejectedReport);
        assert!(item.body.contains("svc1"));

        reporter.clone().close();
        assert!(reporter.is_closed());
        assert!(!reporter.push(SelfReport::auto_resolve_failed(&origin, 4, &err)));
        assert_eq!(reporter.enqueued(), 1);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_worker_exits_when_closed_and_drained() {
        let (reporter, mut rx) = SelfReporter::channel();
        let origin = SourceId::new("svc1");
        let err = Error::NotFound("group 9".to_string());
        reporter.push(SelfReport::auto_resolve_failed(&origin, 9, &err));
        reporter.close();

        let drained = tokio_test::block_on(async {
            let mut items = Vec::new();
            while let Some(item) = rx.recv().await {
                items.push(item);
            }
            items
        });
        assert_eq!(drained.len(), 1);
        assert!(drained[0].body.contains("group 9"));
    }

    #[test]
    fn test_default_config() {
        let config = SelfReportConfig::default();
        assert_eq!(config.source.app, "alertline");
        assert!(config.user_id.is_none());
    }
}

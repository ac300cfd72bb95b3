//! In-memory notifier (for testing).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use alertline_core::Report;

use super::{Notifier, NotifierFactory};
use crate::{Error, NotifierFilter, Result};

/// Collects delivered reports. Can be switched into a failing mode to
/// exercise dispatch errors.
#[derive(Debug, Clone)]
pub struct MemoryNotifier {
    name: String,
    filter: NotifierFilter,
    reports: Arc<Mutex<Vec<Report>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: NotifierFilter::allow_all(),
            reports: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_filter(mut self, filter: NotifierFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Make every following send fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn get_reports(&self) -> Vec<Report> {
        self.reports.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.reports.lock().await.clear();
    }

    pub async fn count(&self) -> usize {
        self.reports.lock().await.len()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn notifier_type(&self) -> &str {
        "memory"
    }

    fn should_be_sent(&self, report: &Report) -> bool {
        self.filter.accepts(report)
    }

    async fn send_notification(&self, report: &Report) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::SendFailed(format!("{} is failing", self.name)));
        }
        self.reports.lock().await.push(report.clone());
        Ok(())
    }
}

/// Factory for creating memory notifiers.
pub struct MemoryNotifierFactory;

impl NotifierFactory for MemoryNotifierFactory {
    fn notifier_type(&self) -> &str {
        "memory"
    }

    fn create(
        &self,
        name: &str,
        _args: &serde_json::Value,
        filter: NotifierFilter,
    ) -> Result<Arc<dyn Notifier>> {
        Ok(Arc::new(MemoryNotifier::new(name).with_filter(filter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertline_core::{Severity, SourceId, ValidatedReport};
    use chrono::{FixedOffset, TimeZone};

    fn report(severity: Severity) -> Report {
        let created = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap();
        ValidatedReport::new(SourceId::new("svc"), severity, "Test")
            .stamp(created)
            .into_report(1, 1)
    }

    #[tokio::test]
    async fn test_memory_notifier() {
        let notifier = MemoryNotifier::new("test");
        notifier.send_notification(&report(Severity::Warning)).await.unwrap();
        assert_eq!(notifier.count().await, 1);

        let reports = notifier.get_reports().await;
        assert_eq!(reports[0].subject, "Test");

        notifier.clear().await;
        assert_eq!(notifier.count().await, 0);
    }

    #[tokio::test]
    async fn test_memory_notifier_failing() {
        let notifier = MemoryNotifier::new("test");
        notifier.set_failing(true);
        let result = notifier.send_notification(&report(Severity::Info)).await;
        assert!(matches!(result, Err(Error::SendFailed(_))));
        assert_eq!(notifier.count().await, 0);
    }

    #[test]
    fn test_memory_notifier_factory() {
        let filter = NotifierFilter::allow_all().with_levels(vec![Severity::Critical]);
        let notifier = MemoryNotifierFactory
            .create("test_memory", &serde_json::Value::Null, filter)
            .unwrap();
        assert_eq!(notifier.name(), "test_memory");
        assert_eq!(notifier.notifier_type(), "memory");
        assert!(notifier.should_be_sent(&report(Severity::Critical)));
        assert!(!notifier.should_be_sent(&report(Severity::Info)));
    }
}

//! Console notifier.

use std::sync::Arc;

use async_trait::async_trait;

use alertline_core::Report;

use super::{Notifier, NotifierFactory};
use crate::format::{markdown, summary_line};
use crate::{NotifierFilter, Result};

/// Prints notifications to stdout.
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    name: String,
    filter: NotifierFilter,
    include_details: bool,
}

impl ConsoleNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: NotifierFilter::allow_all(),
            include_details: true,
        }
    }

    pub fn with_filter(mut self, filter: NotifierFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_details(mut self, include: bool) -> Self {
        self.include_details = include;
        self
    }

    fn render(&self, report: &Report) -> String {
        if self.include_details {
            markdown(report, &self.name, None)
        } else {
            summary_line(report)
        }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn notifier_type(&self) -> &str {
        "console"
    }

    fn should_be_sent(&self, report: &Report) -> bool {
        self.filter.accepts(report)
    }

    async fn send_notification(&self, report: &Report) -> Result<()> {
        println!("{}", self.render(report));
        Ok(())
    }
}

/// Factory for creating console notifiers.
pub struct ConsoleNotifierFactory;

impl NotifierFactory for ConsoleNotifierFactory {
    fn notifier_type(&self) -> &str {
        "console"
    }

    fn create(
        &self,
        name: &str,
        args: &serde_json::Value,
        filter: NotifierFilter,
    ) -> Result<Arc<dyn Notifier>> {
        let include_details = args
            .get("include_details")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        Ok(Arc::new(
            ConsoleNotifier::new(name)
                .with_filter(filter)
                .with_details(include_details),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertline_core::{Severity, SourceId, ValidatedReport};
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_render_summary_only() {
        let created = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap();
        let report = ValidatedReport::new(SourceId::new("svc"), Severity::Critical, "down")
            .with_body("details")
            .stamp(created)
            .into_report(1, 1);

        let notifier = ConsoleNotifier::new("console").with_details(false);
        assert_eq!(notifier.render(&report), ":siren: CRITICAL svc: down");
        assert!(ConsoleNotifier::new("console").render(&report).contains("details"));
    }

    #[tokio::test]
    async fn test_console_factory() {
        let notifier = ConsoleNotifierFactory
            .create(
                "stdout",
                &serde_json::json!({"include_details": false}),
                NotifierFilter::allow_all(),
            )
            .unwrap();
        assert_eq!(notifier.name(), "stdout");
        assert_eq!(notifier.notifier_type(), "console");
    }
}

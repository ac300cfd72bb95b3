//! Fan-out of reports to the configured notifiers.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;

use alertline_core::Report;

use crate::channels::{Notifier, NotifierInfo};
use crate::{Error, Result};

/// Holds the notifier set and delivers reports to every notifier that
/// accepts them.
#[derive(Clone, Default)]
pub struct Dispatcher {
    notifiers: Arc<RwLock<Vec<Arc<dyn Notifier>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifiers(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self {
            notifiers: Arc::new(RwLock::new(notifiers)),
        }
    }

    /// Register a notifier, replacing any notifier with the same name.
    pub async fn register(&self, notifier: Arc<dyn Notifier>) {
        let mut notifiers = self.notifiers.write().await;
        notifiers.retain(|n| n.name() != notifier.name());
        notifiers.push(notifier);
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let mut notifiers = self.notifiers.write().await;
        let before = notifiers.len();
        notifiers.retain(|n| n.name() != name);
        notifiers.len() != before
    }

    pub async fn list_info(&self) -> Vec<NotifierInfo> {
        self.notifiers
            .read()
            .await
            .iter()
            .map(|n| NotifierInfo {
                name: n.name().to_string(),
                notifier_type: n.notifier_type().to_string(),
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.notifiers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notifiers.read().await.is_empty()
    }

    /// Send the report to every notifier whose filter accepts it.
    ///
    /// All selected notifiers are tried even if some fail. Returns the
    /// number of successful deliveries, or `SendFailed` naming the failed
    /// notifiers.
    pub async fn dispatch(&self, report: &Report) -> Result<usize> {
        let selected: Vec<Arc<dyn Notifier>> = self
            .notifiers
            .read()
            .await
            .iter()
            .filter(|n| n.should_be_sent(report))
            .cloned()
            .collect();

        let results = join_all(selected.iter().map(|n| n.send_notification(report))).await;

        let mut failures = Vec::new();
        for (notifier, result) in selected.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(
                    category = "notify",
                    notifier = %notifier.name(),
                    report_id = report.id,
                    error = %e,
                    "Failed to send notification"
                );
                failures.push(format!("{}: {}", notifier.name(), e));
            }
        }

        if failures.is_empty() {
            Ok(selected.len())
        } else {
            Err(Error::SendFailed(format!(
                "{} of {} notifiers failed ({})",
                failures.len(),
                selected.len(),
                failures.join("; ")
            )))
        }
    }
}

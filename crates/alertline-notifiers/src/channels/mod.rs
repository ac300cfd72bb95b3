//! Notification channels.

pub mod console;
pub mod memory;

#[cfg(feature = "webhook")]
pub mod webhook;

#[cfg(feature = "zulip")]
pub mod zulip;

#[cfg(feature = "email")]
pub mod email;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use alertline_core::Report;

use crate::{Error, NotifierFilter, Result};

pub use console::{ConsoleNotifier, ConsoleNotifierFactory};
pub use memory::{MemoryNotifier, MemoryNotifierFactory};

#[cfg(feature = "webhook")]
pub use webhook::{WebhookNotifier, WebhookNotifierFactory};

#[cfg(feature = "zulip")]
pub use zulip::{ZulipNotifier, ZulipNotifierFactory, ZulipTarget};

#[cfg(feature = "email")]
pub use email::{EmailNotifier, EmailNotifierFactory};

/// A destination reports are delivered to.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Configured notifier name.
    fn name(&self) -> &str;

    /// Notifier type, e.g. `email` or `zulip`.
    fn notifier_type(&self) -> &str;

    /// Whether this notifier wants the report.
    fn should_be_sent(&self, report: &Report) -> bool;

    /// Deliver the report. Failures are not retried.
    async fn send_notification(&self, report: &Report) -> Result<()>;
}

/// Builds notifiers of one type from their `args` table.
pub trait NotifierFactory: Send + Sync {
    fn notifier_type(&self) -> &str;

    fn create(
        &self,
        name: &str,
        args: &serde_json::Value,
        filter: NotifierFilter,
    ) -> Result<Arc<dyn Notifier>>;
}

/// Notifier description returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotifierInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub notifier_type: String,
}

#[cfg(any(feature = "email", feature = "zulip", feature = "webhook", test))]
pub(crate) fn required_str<'a>(args: &'a serde_json::Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidConfiguration(format!("Missing {}", key)))
}

#[cfg(any(feature = "email", feature = "zulip", feature = "webhook", test))]
pub(crate) fn optional_str<'a>(args: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str()).filter(|v| !v.is_empty())
}

#[cfg(any(feature = "email", feature = "zulip", feature = "webhook", test))]
pub(crate) fn string_list(args: &serde_json::Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

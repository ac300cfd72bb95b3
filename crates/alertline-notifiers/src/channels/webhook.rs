//! Webhook notifier.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use alertline_core::Report;

use super::{optional_str, required_str, Notifier, NotifierFactory};
use crate::format::summary_line;
use crate::{Error, NotifierFilter, Result};

/// JSON body posted to the webhook.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    notifier: &'a str,
    text: String,
    report: &'a Report,
}

/// Posts reports as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    name: String,
    url: String,
    headers: HashMap<String, String>,
    filter: NotifierFilter,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: HashMap::new(),
            filter: NotifierFilter::allow_all(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_filter(mut self, filter: NotifierFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn notifier_type(&self) -> &str {
        "webhook"
    }

    fn should_be_sent(&self, report: &Report) -> bool {
        self.filter.accepts(report)
    }

    async fn send_notification(&self, report: &Report) -> Result<()> {
        let mut request = self.client.post(&self.url);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let payload = WebhookPayload {
            notifier: &self.name,
            text: summary_line(report),
            report,
        };
        let response = request
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::SendFailed(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::SendFailed(format!(
                "Webhook returned error: {}",
                response.status()
            )));
        }

        tracing::debug!(category = "notify", notifier = %self.name, report_id = report.id, "Webhook delivered");
        Ok(())
    }
}

/// Factory for creating webhook notifiers.
pub struct WebhookNotifierFactory;

impl NotifierFactory for WebhookNotifierFactory {
    fn notifier_type(&self) -> &str {
        "webhook"
    }

    fn create(
        &self,
        name: &str,
        args: &serde_json::Value,
        filter: NotifierFilter,
    ) -> Result<Arc<dyn Notifier>> {
        let url = required_str(args, "url")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::InvalidConfiguration(format!(
                "webhook url must be http(s): {}",
                url
            )));
        }

        let mut notifier = WebhookNotifier::new(name, url).with_filter(filter);
        if let Some(headers) = args.get("headers").and_then(|v| v.as_object()) {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    notifier = notifier.with_header(key.clone(), value.to_string());
                }
            }
        }
        if let Some(token) = optional_str(args, "bearer_token") {
            notifier = notifier.with_header("Authorization".to_string(), format!("Bearer {}", token));
        }

        Ok(Arc::new(notifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_webhook_factory() {
        let notifier = WebhookNotifierFactory
            .create(
                "hook",
                &json!({"url": "https://hooks.example.com/x", "headers": {"X-Env": "prod"}}),
                NotifierFilter::allow_all(),
            )
            .unwrap();
        assert_eq!(notifier.name(), "hook");
        assert_eq!(notifier.notifier_type(), "webhook");
    }

    #[test]
    fn test_webhook_factory_rejects_bad_url() {
        let missing = WebhookNotifierFactory.create("hook", &json!({}), NotifierFilter::allow_all());
        assert!(matches!(missing, Err(Error::InvalidConfiguration(_))));

        let not_http = WebhookNotifierFactory.create(
            "hook",
            &json!({"url": "ftp://example.com"}),
            NotifierFilter::allow_all(),
        );
        assert!(matches!(not_http, Err(Error::InvalidConfiguration(_))));
    }
}

//! Zulip chat notifier.

use std::sync::Arc;

use async_trait::async_trait;

use alertline_core::Report;

use super::{optional_str, required_str, string_list, Notifier, NotifierFactory};
use crate::format::markdown;
use crate::{Error, NotifierFilter, Result};

/// Where a Zulip message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZulipTarget {
    /// A stream and topic.
    Stream { stream: String, topic: String },
    /// Private message to one or more users.
    Direct { recipients: Vec<String> },
}

impl ZulipTarget {
    /// Build a target from the `type`, `recipients` and `topic` args.
    pub fn from_parts(kind: &str, recipients: Vec<String>, topic: Option<&str>) -> Result<Self> {
        match kind {
            "direct" => {
                if recipients.is_empty() {
                    return Err(Error::InvalidConfiguration(
                        "zulip `direct` type requires at least one recipient".to_string(),
                    ));
                }
                Ok(ZulipTarget::Direct { recipients })
            }
            "stream" => {
                if recipients.len() != 1 {
                    return Err(Error::InvalidConfiguration(
                        "zulip `stream` type requires exactly one recipient".to_string(),
                    ));
                }
                let topic = topic.ok_or_else(|| {
                    Error::InvalidConfiguration("zulip `stream` type requires specified topic".to_string())
                })?;
                Ok(ZulipTarget::Stream {
                    stream: recipients[0].clone(),
                    topic: topic.to_string(),
                })
            }
            other => Err(Error::InvalidConfiguration(format!(
                "unknown zulip type `{}`, use `direct` or `stream`",
                other
            ))),
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            ZulipTarget::Stream { stream, topic } => vec![
                ("type", "stream".to_string()),
                ("to", stream.clone()),
                ("topic", topic.clone()),
            ],
            ZulipTarget::Direct { recipients } => vec![
                ("type", "direct".to_string()),
                ("to", recipients.join(",")),
            ],
        }
    }
}

/// Sends reports as Zulip messages through the REST API.
#[derive(Debug, Clone)]
pub struct ZulipNotifier {
    name: String,
    server: String,
    sender: String,
    token: String,
    target: ZulipTarget,
    public_url: Option<String>,
    filter: NotifierFilter,
    client: reqwest::Client,
}

impl ZulipNotifier {
    pub fn new(
        name: impl Into<String>,
        server: impl Into<String>,
        sender: impl Into<String>,
        token: impl Into<String>,
        target: ZulipTarget,
    ) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            sender: sender.into(),
            token: token.into(),
            target,
            public_url: None,
            filter: NotifierFilter::allow_all(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_filter(mut self, filter: NotifierFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }

    pub fn messages_url(&self) -> String {
        format!("{}/api/v1/messages", self.server.trim_end_matches('/'))
    }

    pub fn target(&self) -> &ZulipTarget {
        &self.target
    }
}

#[async_trait]
impl Notifier for ZulipNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn notifier_type(&self) -> &str {
        "zulip"
    }

    fn should_be_sent(&self, report: &Report) -> bool {
        self.filter.accepts(report)
    }

    async fn send_notification(&self, report: &Report) -> Result<()> {
        let mut params = self.target.params();
        params.push(("content", markdown(report, &self.name, self.public_url.as_deref())));

        let response = self
            .client
            .post(self.messages_url())
            .header(
                reqwest::header::USER_AGENT,
                format!("alertline/{}", alertline_core::VERSION),
            )
            .basic_auth(&self.sender, Some(&self.token))
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::SendFailed(format!("Zulip request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::SendFailed(format!(
                "Zulip returned error: {} {}",
                status, body
            )));
        }

        tracing::debug!(category = "notify", notifier = %self.name, response = %body, "Performed zulip post");
        Ok(())
    }
}

/// Factory for creating Zulip notifiers.
pub struct ZulipNotifierFactory;

impl NotifierFactory for ZulipNotifierFactory {
    fn notifier_type(&self) -> &str {
        "zulip"
    }

    fn create(
        &self,
        name: &str,
        args: &serde_json::Value,
        filter: NotifierFilter,
    ) -> Result<Arc<dyn Notifier>> {
        let server = required_str(args, "server")?;
        let sender = required_str(args, "sender")?;
        let token = required_str(args, "token")?;
        let kind = required_str(args, "type")?;
        let target = ZulipTarget::from_parts(
            kind,
            string_list(args, "recipients"),
            optional_str(args, "topic"),
        )?;

        tracing::info!(
            category = "notify",
            "Creating zulip notifier `{}` of type `{}` with target {:?}",
            name,
            kind,
            target
        );

        let mut notifier = ZulipNotifier::new(name, server, sender, token, target).with_filter(filter);
        if let Some(url) = optional_str(args, "public_url") {
            notifier = notifier.with_public_url(url);
        }
        Ok(Arc::new(notifier))
    }
}

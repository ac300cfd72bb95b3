//! Email notifier.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;

use alertline_core::Report;

use super::{optional_str, required_str, string_list, Notifier, NotifierFactory};
use crate::format::{html, plain_text};
use crate::{Error, NotifierFilter, Result};

/// Sends reports by SMTP.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    name: String,
    smtp_server: String,
    smtp_port: u16,
    credentials: Option<(String, String)>,
    sender: Mailbox,
    recipients: Vec<Mailbox>,
    use_tls: bool,
    public_url: Option<String>,
    filter: NotifierFilter,
}

impl EmailNotifier {
    /// Create a notifier; addresses are validated here rather than on send.
    pub fn new(
        name: impl Into<String>,
        smtp_server: impl Into<String>,
        smtp_port: u16,
        sender: &str,
        recipients: &[String],
    ) -> Result<Self> {
        let sender = parse_mailbox(sender)?;
        let recipients = recipients
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>>>()?;
        if recipients.is_empty() {
            return Err(Error::InvalidConfiguration(
                "No recipients configured".to_string(),
            ));
        }

        Ok(Self {
            name: name.into(),
            smtp_server: smtp_server.into(),
            smtp_port,
            credentials: None,
            sender,
            recipients,
            use_tls: true,
            public_url: None,
            filter: NotifierFilter::allow_all(),
        })
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.credentials = Some((username, password));
        self
    }

    pub fn without_tls(mut self) -> Self {
        self.use_tls = false;
        self
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }

    pub fn with_filter(mut self, filter: NotifierFilter) -> Self {
        self.filter = filter;
        self
    }

    fn build_message(&self, report: &Report) -> Result<lettre::Message> {
        let mut builder = lettre::Message::builder()
            .from(self.sender.clone())
            .subject(report.notification_subject());
        for to in &self.recipients {
            builder = builder.to(to.clone());
        }

        let public_url = self.public_url.as_deref();
        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_text(report, public_url)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html(report, public_url)),
                    ),
            )
            .map_err(|e| Error::SendFailed(format!("Failed to build email: {}", e)))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| Error::InvalidConfiguration(format!("incorrect e-mail address {}: {}", address, e)))
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn notifier_type(&self) -> &str {
        "email"
    }

    fn should_be_sent(&self, report: &Report) -> bool {
        self.filter.accepts(report)
    }

    async fn send_notification(&self, report: &Report) -> Result<()> {
        let email = self.build_message(report)?;

        let smtp_server = self.smtp_server.clone();
        let smtp_port = self.smtp_port;
        let credentials = self.credentials.clone();
        let use_tls = self.use_tls;

        tokio::task::spawn_blocking(move || {
            let builder = if use_tls {
                lettre::SmtpTransport::relay(&smtp_server)
                    .map_err(|e| Error::SendFailed(format!("Invalid SMTP server: {}", e)))?
            } else {
                lettre::SmtpTransport::builder_dangerous(&smtp_server)
            };
            let mut transport = builder.port(smtp_port);
            if let Some((username, password)) = credentials {
                transport = transport.credentials(Credentials::new(username, password));
            }
            let mailer = transport.build();

            lettre::Transport::send(&mailer, &email)
                .map_err(|e| Error::SendFailed(format!("Failed to send email: {}", e)))?;

            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::SendFailed(format!("Task join error: {}", e)))?
    }
}

/// Factory for creating email notifiers.
pub struct EmailNotifierFactory;

impl NotifierFactory for EmailNotifierFactory {
    fn notifier_type(&self) -> &str {
        "email"
    }

    fn create(
        &self,
        name: &str,
        args: &serde_json::Value,
        filter: NotifierFilter,
    ) -> Result<Arc<dyn Notifier>> {
        let smtp_server = required_str(args, "smtp_server")?;
        let smtp_port = args
            .get("smtp_port")
            .and_then(|v| v.as_u64())
            .map(u16::try_from)
            .transpose()
            .map_err(|_| Error::InvalidConfiguration("smtp_port out of range".to_string()))?
            .unwrap_or(587);
        let sender = required_str(args, "sender")?;
        let recipients = string_list(args, "recipients");

        let mut notifier =
            EmailNotifier::new(name, smtp_server, smtp_port, sender, &recipients)?.with_filter(filter);

        if let Some(username) = optional_str(args, "username") {
            let password = optional_str(args, "password").unwrap_or_default();
            notifier = notifier.with_credentials(username.to_string(), password.to_string());
        }
        if !args.get("use_tls").and_then(|v| v.as_bool()).unwrap_or(true) {
            notifier = notifier.without_tls();
        }
        if let Some(url) = optional_str(args, "public_url") {
            notifier = notifier.with_public_url(url);
        }

        tracing::info!(
            category = "notify",
            "Creating e-mail notifier `{}` with recipient(s) {:?}",
            name,
            recipients
        );
        Ok(Arc::new(notifier))
    }
}

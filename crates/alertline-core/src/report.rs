//! Reports, incident groups and per-source overviews.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::UNRESOLVED_USER_ID;
use crate::{Error, Result, Severity, SourceId};

pub type ReportId = u64;
pub type GroupId = u64;
pub type UserId = i64;

/// Report payload as sent by clients.
///
/// Severity stays a plain string until [`IncomingReport::validate`] so the
/// rejection can name the accepted values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingReport {
    pub source_id: SourceId,
    pub severity: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl IncomingReport {
    pub fn new(source_id: SourceId, severity: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            source_id,
            severity: severity.into(),
            subject: subject.into(),
            body: String::new(),
            args: Map::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Check severity and app, normalizing empty source parts to absent.
    pub fn validate(self) -> Result<ValidatedReport> {
        let severity = Severity::parse(&self.severity)?;
        let source_id = self.source_id.normalized();
        if source_id.app.trim().is_empty() {
            return Err(Error::Validation("sourceId.app is required".to_string()));
        }
        Ok(ValidatedReport {
            source_id,
            severity,
            subject: self.subject,
            body: self.body,
            args: self.args,
        })
    }
}

/// A report that passed validation but has not been timestamped yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReport {
    pub source_id: SourceId,
    pub severity: Severity,
    pub subject: String,
    pub body: String,
    pub args: Map<String, Value>,
}

impl ValidatedReport {
    pub fn new(source_id: SourceId, severity: Severity, subject: impl Into<String>) -> Self {
        Self {
            source_id,
            severity,
            subject: subject.into(),
            body: String::new(),
            args: Map::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn stamp(self, created: DateTime<FixedOffset>) -> NewReport {
        NewReport {
            source_id: self.source_id,
            severity: self.severity,
            subject: self.subject,
            body: self.body,
            args: self.args,
            created,
        }
    }
}

/// A report ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub source_id: SourceId,
    pub severity: Severity,
    pub subject: String,
    pub body: String,
    pub args: Map<String, Value>,
    pub created: DateTime<FixedOffset>,
}

impl NewReport {
    /// Build the full report once the store assigned ids.
    pub fn into_report(self, id: ReportId, group_id: GroupId) -> Report {
        Report {
            id,
            group_id,
            source_id: self.source_id,
            severity: self.severity,
            subject: self.subject,
            body: self.body,
            args: self.args,
            created: self.created,
            escalated: false,
            resolved_by_user_id: None,
        }
    }
}

/// A persisted report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: ReportId,
    pub group_id: GroupId,
    pub source_id: SourceId,
    pub severity: Severity,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    pub created: DateTime<FixedOffset>,
    pub escalated: bool,
    /// `-1` on the wire while the group is open.
    #[serde(with = "resolved_by")]
    pub resolved_by_user_id: Option<UserId>,
}

impl Report {
    /// Severity used for notifier routing. Escalated reports route as
    /// critical while keeping their stored severity.
    pub fn routing_severity(&self) -> Severity {
        if self.escalated {
            Severity::Critical
        } else {
            self.severity
        }
    }

    /// Subject line used by mail-like notifiers.
    pub fn notification_subject(&self) -> String {
        let mut subject = format!("{}: {}", self.severity.as_str().to_uppercase(), self.subject);
        if self.escalated {
            subject = format!("[ESCALATED] {}", subject);
        }
        match self.source_id.instance.as_deref().filter(|i| !i.is_empty()) {
            Some(instance) => format!("{} ({}/{})", subject, self.source_id.app, instance),
            None => format!("{} ({})", subject, self.source_id.app),
        }
    }
}

/// One incident: the bucket successive reports of a source accumulate into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentGroup {
    pub id: GroupId,
    pub source_id: SourceId,
    pub created: DateTime<FixedOffset>,
    pub escalated: bool,
    #[serde(with = "resolved_by")]
    pub resolved_by_user_id: Option<UserId>,
}

impl IncidentGroup {
    pub fn is_open(&self) -> bool {
        self.resolved_by_user_id.is_none()
    }
}

/// Report counts of a source's open group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOverview {
    pub source_id: SourceId,
    pub critical: u64,
    pub warning: u64,
    pub info: u64,
    pub escalated: bool,
}

impl ReportOverview {
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            ..Default::default()
        }
    }

    /// Count one more report. Recovery reports are not counted.
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
            Severity::Recovery => {}
        }
    }
}

/// Report listing filter. Set fields are ANDed; unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl ReportFilter {
    pub fn app(app: impl Into<String>) -> Self {
        Self {
            app: Some(app.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, source: &SourceId) -> bool {
        fn part(filter: &Option<String>, value: &Option<String>) -> bool {
            match filter {
                Some(expected) => value.as_deref() == Some(expected.as_str()),
                None => true,
            }
        }

        self.app.as_deref().map_or(true, |app| source.app == app)
            && part(&self.instance, &source.instance)
            && part(&self.tag, &source.tag)
    }
}

mod resolved_by {
    use super::{UserId, UNRESOLVED_USER_ID};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<UserId>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(value.unwrap_or(UNRESOLVED_USER_ID))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<UserId>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<i64>::deserialize(deserializer)?;
        Ok(value.filter(|id| *id != UNRESOLVED_USER_ID))
    }
}

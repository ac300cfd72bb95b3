//! Report source identifiers.

use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

/// Origin of a report: an application, optionally narrowed down to an
/// instance and a tag.
///
/// `None` is a distinct value: it equals only another `None`, never an
/// empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId {
    pub app: String,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl SourceId {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            instance: None,
            tag: None,
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Treat empty `instance`/`tag` strings sent by clients as absent.
    pub fn normalized(mut self) -> Self {
        if self.instance.as_deref() == Some("") {
            self.instance = None;
        }
        if self.tag.as_deref() == Some("") {
            self.tag = None;
        }
        self
    }

    /// Composite key used to index open groups and escalation counters.
    ///
    /// Each part is length-prefixed (`3:svc`) and an absent part is `-`, so
    /// no choice of part contents can make two sources share a key.
    pub fn key(&self) -> String {
        fn push_part(key: &mut String, value: Option<&str>) {
            match value {
                Some(v) => {
                    let _ = write!(key, "{}:{}", v.len(), v);
                }
                None => key.push('-'),
            }
        }

        let mut key = String::new();
        push_part(&mut key, Some(&self.app));
        push_part(&mut key, self.instance.as_deref());
        push_part(&mut key, self.tag.as_deref());
        key
    }

    /// Human readable label, `app/instance[tag]`.
    pub fn label(&self) -> String {
        let mut label = self.app.clone();
        if let Some(instance) = self.instance.as_deref().filter(|i| !i.is_empty()) {
            label.push('/');
            label.push_str(instance);
        }
        if let Some(tag) = self.tag.as_deref().filter(|t| !t.is_empty()) {
            label.push('[');
            label.push_str(tag);
            label.push(']');
        }
        label
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

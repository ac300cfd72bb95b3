//! Building notifiers from configuration.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::channels::{ConsoleNotifierFactory, MemoryNotifierFactory, Notifier, NotifierFactory};
use crate::{Error, NotifierFilter, Result};

/// One `[[notifiers]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(rename = "type")]
    pub notifier_type: String,
    pub name: String,
    /// Type specific settings.
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub filter: NotifierFilter,
}

impl NotifierConfig {
    pub fn new(notifier_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            notifier_type: notifier_type.into(),
            name: name.into(),
            args: serde_json::Value::Null,
            filter: NotifierFilter::allow_all(),
        }
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_filter(mut self, filter: NotifierFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Factories for every notifier type compiled into this build.
pub fn default_factories() -> Vec<Box<dyn NotifierFactory>> {
    #[allow(unused_mut)]
    let mut factories: Vec<Box<dyn NotifierFactory>> =
        vec![Box::new(ConsoleNotifierFactory), Box::new(MemoryNotifierFactory)];

    #[cfg(feature = "email")]
    factories.push(Box::new(crate::channels::EmailNotifierFactory));
    #[cfg(feature = "zulip")]
    factories.push(Box::new(crate::channels::ZulipNotifierFactory));
    #[cfg(feature = "webhook")]
    factories.push(Box::new(crate::channels::WebhookNotifierFactory));

    factories
}

/// Build one notifier per config entry. Names must be unique.
pub fn build_notifiers(configs: &[NotifierConfig]) -> Result<Vec<Arc<dyn Notifier>>> {
    let factories = default_factories();
    let mut names = HashSet::new();
    let mut notifiers = Vec::with_capacity(configs.len());

    for config in configs {
        if config.name.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "{} notifier without a name",
                config.notifier_type
            )));
        }
        if !names.insert(config.name.as_str()) {
            return Err(Error::InvalidConfiguration(format!(
                "duplicate notifier name `{}`",
                config.name
            )));
        }

        let factory = factories
            .iter()
            .find(|f| f.notifier_type() == config.notifier_type)
            .ok_or_else(|| {
                Error::InvalidConfiguration(format!("unknown notifier type {}", config.notifier_type))
            })?;
        let notifier = factory
            .create(&config.name, &config.args, config.filter.clone())
            .map_err(|e| match e {
                Error::InvalidConfiguration(msg) => Error::InvalidConfiguration(format!(
                    "invalid {} notifier `{}`: {}",
                    config.notifier_type, config.name, msg
                )),
                other => other,
            })?;
        notifiers.push(notifier);
    }

    Ok(notifiers)
}

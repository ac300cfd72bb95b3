//! Report severity levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Severity of a report.
///
/// Ordered by urgency: `Recovery < Info < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The reported problem is gone; resolves the open group.
    Recovery,
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// All recognized severities.
    pub const ALL: [Severity; 4] = [
        Severity::Info,
        Severity::Warning,
        Severity::Critical,
        Severity::Recovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Recovery => "recovery",
        }
    }

    /// Parse a severity, rejecting anything but the four known values.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            "recovery" => Ok(Severity::Recovery),
            other => Err(Error::Validation(format!(
                "invalid level `{}`, use: `info`, `warning`, `critical` or `recovery`",
                other
            ))),
        }
    }

    /// Emoji shortcode used by chat notifiers.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Info => ":info:",
            Severity::Warning => ":warning:",
            Severity::Critical => ":siren:",
            Severity::Recovery => ":orange_circle:",
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Severity::parse(s)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

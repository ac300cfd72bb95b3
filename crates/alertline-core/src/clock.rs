//! Time source used to stamp incoming reports.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use chrono_tz::Tz;

use crate::{Error, Result};

/// Supplies "now" in the service's configured zone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock shifted into a named IANA zone.
#[derive(Debug, Clone, Copy)]
pub struct ZonedClock {
    tz: Tz,
}

impl ZonedClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Build a clock from a zone name such as `Europe/Prague`.
    pub fn from_name(name: &str) -> Result<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|e| Error::InvalidConfiguration(format!("invalid time zone `{}`: {}", name, e)))?;
        Ok(Self::new(tz))
    }

    pub fn zone(&self) -> Tz {
        self.tz
    }
}

impl Clock for ZonedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz).fixed_offset()
    }
}

/// Manually driven clock for tests. Each call to `now` advances it by `step`.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<DateTime<FixedOffset>>,
    step: Duration,
}

impl FixedClock {
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            current: Mutex::new(start),
            step: Duration::seconds(1),
        }
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = *current;
        *current = now + self.step;
        now
    }
}

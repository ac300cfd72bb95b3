//! Core types for Alertline.
//!
//! This crate defines the domain shared by every other crate in the
//! workspace: report sources, severities, reports, incident groups and the
//! per-source overview counts, plus the common error type and the clock
//! abstraction used to timestamp incoming reports.
//!
//! ## Example
//!
//! ```rust
//! use alertline_core::{IncomingReport, SourceId};
//!
//! let incoming = IncomingReport::new(SourceId::new("svc1"), "warning", "disk almost full");
//! let validated = incoming.validate().unwrap();
//! assert_eq!(validated.severity.as_str(), "warning");
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod report;
pub mod severity;
pub mod source;

pub use clock::{Clock, FixedClock, ZonedClock};
pub use error::{Error, Result};
pub use report::{
    GroupId, IncidentGroup, IncomingReport, NewReport, Report, ReportFilter, ReportId,
    ReportOverview, UserId, ValidatedReport,
};
pub use severity::Severity;
pub use source::SourceId;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

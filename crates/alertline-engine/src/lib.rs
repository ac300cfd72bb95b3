//! Report intake and escalation for Alertline.
//!
//! [`IntakeService`] runs every accepted report through the same steps:
//! persist it under its source's open group, auto-resolve on recovery,
//! count it in the [`EscalationEngine`] and dispatch it to the notifiers.
//! Failures that cannot be returned to a client are queued on the
//! [`SelfReporter`] and filed as reports about the service itself.

pub mod escalation;
pub mod intake;
pub mod self_report;

pub use escalation::{EscalationEngine, RollingCount};
pub use intake::{Ingested, IntakeService, ReportOrigin};
pub use self_report::{SelfReport, SelfReportConfig, SelfReportKind, SelfReporter};

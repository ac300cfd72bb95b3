//! Persistence for Alertline reports and incident groups.
//!
//! [`ReportStore`] is the contract the intake pipeline and the escalation
//! engine rely on; [`RedbReportStore`] implements it on an embedded redb
//! database.

pub mod error;
pub mod redb_store;
pub mod store;

pub use error::{Error, Result};
pub use redb_store::RedbReportStore;
pub use store::ReportStore;

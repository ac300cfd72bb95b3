//! Storage contract for reports and incident groups.

use chrono::{DateTime, FixedOffset};

use alertline_core::{
    GroupId, IncidentGroup, NewReport, Report, ReportFilter, ReportId, ReportOverview, Result,
    SourceId, UserId,
};

/// Persistence operations required by the intake pipeline and the
/// escalation engine.
///
/// Implementations must be safe for concurrent use. At most one unresolved
/// group may exist per source.
pub trait ReportStore: Send + Sync {
    /// Return the open group of `source`, creating one when none exists.
    fn find_or_create_active_group(
        &self,
        source: &SourceId,
        created: DateTime<FixedOffset>,
    ) -> Result<GroupId>;

    /// Persist a report under its source's open group.
    ///
    /// The stored `escalated` flag is the group's state at insertion time.
    fn insert_report(&self, report: &NewReport) -> Result<(ReportId, GroupId)>;

    fn get_report(&self, id: ReportId) -> Result<Report>;

    fn get_group(&self, id: GroupId) -> Result<IncidentGroup>;

    /// Reports matching `filter`, newest first.
    fn list_reports(&self, filter: &ReportFilter, include_resolved: bool) -> Result<Vec<Report>>;

    /// Mark a group resolved. Returns the number of groups changed, 0 when
    /// the group is unknown or already resolved.
    fn resolve_group(&self, id: GroupId, user_id: UserId) -> Result<u64>;

    /// Set the escalated flag of an open group.
    fn escalate_group(&self, id: GroupId) -> Result<()>;

    /// Per-source counts over all unresolved groups.
    fn get_overview(&self) -> Result<Vec<ReportOverview>>;

    /// Sources that currently have an open group.
    fn get_sources(&self) -> Result<Vec<SourceId>>;
}

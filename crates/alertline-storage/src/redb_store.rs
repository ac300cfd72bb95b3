//! Report storage using redb.
//!
//! Groups and reports are stored as JSON documents keyed by numeric id.
//! The `open_groups` index maps a source key to its unresolved group and is
//! only ever touched inside write transactions, which redb serializes. That
//! makes find-or-create a transactional upsert: two concurrent first reports
//! of the same source always land in one group.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use alertline_core::{
    GroupId, IncidentGroup, NewReport, Report, ReportFilter, ReportId, ReportOverview, Severity,
    SourceId, UserId,
};

use crate::error::{Error, Result};
use crate::store::ReportStore;

// Groups table: key = group id, value = StoredGroup (JSON)
const GROUPS_TABLE: TableDefinition<u64, &str> = TableDefinition::new("report_groups");

// Reports table: key = report id, value = StoredReport (JSON)
const REPORTS_TABLE: TableDefinition<u64, &str> = TableDefinition::new("reports");

// Open groups index: key = source key, value = group id
const OPEN_GROUPS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("open_groups");

// Id sequences: key = sequence name, value = last issued id
const SEQUENCES_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequences");

const GROUP_SEQUENCE: &str = "report_group";
const REPORT_SEQUENCE: &str = "report";

const DB_FILE: &str = "reports.redb";

/// Stored group representation. Counts are maintained on insert so the
/// overview never has to scan reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredGroup {
    id: GroupId,
    source_id: SourceId,
    created: DateTime<FixedOffset>,
    escalated: bool,
    resolved_by_user_id: Option<UserId>,
    #[serde(default)]
    critical: u64,
    #[serde(default)]
    warning: u64,
    #[serde(default)]
    info: u64,
}

impl StoredGroup {
    fn new(id: GroupId, source_id: SourceId, created: DateTime<FixedOffset>) -> Self {
        Self {
            id,
            source_id,
            created,
            escalated: false,
            resolved_by_user_id: None,
            critical: 0,
            warning: 0,
            info: 0,
        }
    }

    fn is_open(&self) -> bool {
        self.resolved_by_user_id.is_none()
    }

    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
            Severity::Recovery => {}
        }
    }

    fn to_group(&self) -> IncidentGroup {
        IncidentGroup {
            id: self.id,
            source_id: self.source_id.clone(),
            created: self.created,
            escalated: self.escalated,
            resolved_by_user_id: self.resolved_by_user_id,
        }
    }
}

/// Stored report representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredReport {
    id: ReportId,
    group_id: GroupId,
    source_id: SourceId,
    severity: Severity,
    subject: String,
    body: String,
    #[serde(default)]
    args: Map<String, Value>,
    created: DateTime<FixedOffset>,
    escalated: bool,
}

impl StoredReport {
    fn to_report(&self, resolved_by_user_id: Option<UserId>) -> Report {
        Report {
            id: self.id,
            group_id: self.group_id,
            source_id: self.source_id.clone(),
            severity: self.severity,
            subject: self.subject.clone(),
            body: self.body.clone(),
            args: self.args.clone(),
            created: self.created,
            escalated: self.escalated,
            resolved_by_user_id,
        }
    }
}

/// redb backed [`ReportStore`].
#[derive(Clone)]
pub struct RedbReportStore {
    db: Arc<Database>,
}

impl RedbReportStore {
    /// Open (or create) the report database inside `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let db = Database::create(dir.join(DB_FILE))?;
        tracing::debug!(category = "storage", path = %dir.display(), "Opened report database");
        Self::init(db)
    }

    /// Create a store that lives only in memory.
    pub fn memory() -> Result<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self> {
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(GROUPS_TABLE)?;
            write_txn.open_table(REPORTS_TABLE)?;
            write_txn.open_table(OPEN_GROUPS_TABLE)?;
            write_txn.open_table(SEQUENCES_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn next_id(txn: &WriteTransaction, sequence: &str) -> Result<u64> {
        let mut table = txn.open_table(SEQUENCES_TABLE)?;
        let next = table.get(sequence)?.map(|v| v.value()).unwrap_or(0) + 1;
        table.insert(sequence, next)?;
        Ok(next)
    }

    fn load_group(txn: &WriteTransaction, id: GroupId) -> Result<Option<StoredGroup>> {
        let table = txn.open_table(GROUPS_TABLE)?;
        let stored = match table.get(id)? {
            Some(value) => Some(serde_json::from_str(value.value())?),
            None => None,
        };
        Ok(stored)
    }

    fn save_group(txn: &WriteTransaction, group: &StoredGroup) -> Result<()> {
        let json = serde_json::to_string(group)?;
        let mut table = txn.open_table(GROUPS_TABLE)?;
        table.insert(group.id, json.as_str())?;
        Ok(())
    }

    /// Find-or-create inside an already open write transaction.
    fn active_group_in(
        txn: &WriteTransaction,
        source: &SourceId,
        created: DateTime<FixedOffset>,
    ) -> Result<GroupId> {
        let key = source.key();
        let existing = {
            let open = txn.open_table(OPEN_GROUPS_TABLE)?;
            let id = open.get(key.as_str())?.map(|v| v.value());
            id
        };
        if let Some(id) = existing {
            return Ok(id);
        }

        let id = Self::next_id(txn, GROUP_SEQUENCE)?;
        Self::save_group(txn, &StoredGroup::new(id, source.clone(), created))?;
        txn.open_table(OPEN_GROUPS_TABLE)?.insert(key.as_str(), id)?;

        tracing::debug!(category = "storage", group_id = id, source = %source, "Created incident group");
        Ok(id)
    }

    fn active_group(&self, source: &SourceId, created: DateTime<FixedOffset>) -> Result<GroupId> {
        let write_txn = self.db.begin_write()?;
        let id = Self::active_group_in(&write_txn, source, created)?;
        write_txn.commit()?;
        Ok(id)
    }

    fn insert(&self, report: &NewReport) -> Result<(ReportId, GroupId)> {
        let write_txn = self.db.begin_write()?;

        let group_id = Self::active_group_in(&write_txn, &report.source_id, report.created)?;
        let mut group = Self::load_group(&write_txn, group_id)?.ok_or_else(|| {
            Error::NotFound(format!("open group {} of {}", group_id, report.source_id))
        })?;
        group.record(report.severity);
        Self::save_group(&write_txn, &group)?;

        let report_id = Self::next_id(&write_txn, REPORT_SEQUENCE)?;
        let stored = StoredReport {
            id: report_id,
            group_id,
            source_id: report.source_id.clone(),
            severity: report.severity,
            subject: report.subject.clone(),
            body: report.body.clone(),
            args: report.args.clone(),
            created: report.created,
            escalated: group.escalated,
        };
        let json = serde_json::to_string(&stored)?;
        write_txn
            .open_table(REPORTS_TABLE)?
            .insert(report_id, json.as_str())?;

        write_txn.commit()?;
        Ok((report_id, group_id))
    }

    fn report(&self, id: ReportId) -> Result<Report> {
        let read_txn = self.db.begin_read()?;
        let reports = read_txn.open_table(REPORTS_TABLE)?;
        let stored: StoredReport = match reports.get(id)? {
            Some(value) => serde_json::from_str(value.value())?,
            None => return Err(Error::NotFound(format!("report {}", id))),
        };

        let groups = read_txn.open_table(GROUPS_TABLE)?;
        let resolved_by = match groups.get(stored.group_id)? {
            Some(value) => serde_json::from_str::<StoredGroup>(value.value())?.resolved_by_user_id,
            None => None,
        };
        Ok(stored.to_report(resolved_by))
    }

    fn group(&self, id: GroupId) -> Result<IncidentGroup> {
        let read_txn = self.db.begin_read()?;
        let groups = read_txn.open_table(GROUPS_TABLE)?;
        let group = match groups.get(id)? {
            Some(value) => serde_json::from_str::<StoredGroup>(value.value())?.to_group(),
            None => return Err(Error::NotFound(format!("group {}", id))),
        };
        Ok(group)
    }

    fn list(&self, filter: &ReportFilter, include_resolved: bool) -> Result<Vec<Report>> {
        let read_txn = self.db.begin_read()?;
        let groups_table = read_txn.open_table(GROUPS_TABLE)?;
        let reports_table = read_txn.open_table(REPORTS_TABLE)?;

        let mut groups: HashMap<GroupId, Option<UserId>> = HashMap::new();
        for item in groups_table.iter()? {
            let (_, value) = item?;
            let group: StoredGroup = serde_json::from_str(value.value())?;
            groups.insert(group.id, group.resolved_by_user_id);
        }

        let mut reports = Vec::new();
        for item in reports_table.iter()? {
            let (_, value) = item?;
            let stored: StoredReport = serde_json::from_str(value.value())?;
            if !filter.matches(&stored.source_id) {
                continue;
            }
            let resolved_by = groups.get(&stored.group_id).copied().flatten();
            if resolved_by.is_some() && !include_resolved {
                continue;
            }
            reports.push(stored.to_report(resolved_by));
        }

        reports.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        Ok(reports)
    }

    fn resolve(&self, id: GroupId, user_id: UserId) -> Result<u64> {
        let write_txn = self.db.begin_write()?;

        let mut group = match Self::load_group(&write_txn, id)? {
            Some(group) if group.is_open() => group,
            _ => return Ok(0),
        };
        group.resolved_by_user_id = Some(user_id);
        Self::save_group(&write_txn, &group)?;

        {
            let key = group.source_id.key();
            let mut open = write_txn.open_table(OPEN_GROUPS_TABLE)?;
            let indexed = open.get(key.as_str())?.map(|v| v.value());
            if indexed == Some(id) {
                open.remove(key.as_str())?;
            }
        }

        write_txn.commit()?;
        tracing::info!(category = "storage", group_id = id, user_id, "Resolved incident group");
        Ok(1)
    }

    fn escalate(&self, id: GroupId) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        let mut group = Self::load_group(&write_txn, id)?
            .ok_or_else(|| Error::NotFound(format!("group {}", id)))?;
        if group.is_open() && !group.escalated {
            group.escalated = true;
            Self::save_group(&write_txn, &group)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn open_groups(&self) -> Result<Vec<StoredGroup>> {
        let read_txn = self.db.begin_read()?;
        let open = read_txn.open_table(OPEN_GROUPS_TABLE)?;
        let groups_table = read_txn.open_table(GROUPS_TABLE)?;

        let mut groups = Vec::new();
        for item in open.iter()? {
            let (_, id) = item?;
            if let Some(value) = groups_table.get(id.value())? {
                let group: StoredGroup = serde_json::from_str(value.value())?;
                if group.is_open() {
                    groups.push(group);
                }
            }
        }
        Ok(groups)
    }

    fn overview(&self) -> Result<Vec<ReportOverview>> {
        let mut by_source: BTreeMap<SourceId, ReportOverview> = BTreeMap::new();
        for group in self.open_groups()? {
            let entry = by_source
                .entry(group.source_id.clone())
                .or_insert_with(|| ReportOverview::new(group.source_id.clone()));
            entry.critical += group.critical;
            entry.warning += group.warning;
            entry.info += group.info;
            entry.escalated |= group.escalated;
        }
        Ok(by_source.into_values().collect())
    }

    fn sources(&self) -> Result<Vec<SourceId>> {
        let mut sources: Vec<SourceId> = self
            .open_groups()?
            .into_iter()
            .map(|group| group.source_id)
            .collect();
        sources.sort();
        sources.dedup();
        Ok(sources)
    }
}

impl ReportStore for RedbReportStore {
    fn find_or_create_active_group(
        &self,
        source: &SourceId,
        created: DateTime<FixedOffset>,
    ) -> alertline_core::Result<GroupId> {
        Ok(self.active_group(source, created)?)
    }

    fn insert_report(&self, report: &NewReport) -> alertline_core::Result<(ReportId, GroupId)> {
        Ok(self.insert(report)?)
    }

    fn get_report(&self, id: ReportId) -> alertline_core::Result<Report> {
        Ok(self.report(id)?)
    }

    fn get_group(&self, id: GroupId) -> alertline_core::Result<IncidentGroup> {
        Ok(self.group(id)?)
    }

    fn list_reports(
        &self,
        filter: &ReportFilter,
        include_resolved: bool,
    ) -> alertline_core::Result<Vec<Report>> {
        Ok(self.list(filter, include_resolved)?)
    }

    fn resolve_group(&self, id: GroupId, user_id: UserId) -> alertline_core::Result<u64> {
        Ok(self.resolve(id, user_id)?)
    }

    fn escalate_group(&self, id: GroupId) -> alertline_core::Result<()> {
        Ok(self.escalate(id)?)
    }

    fn get_overview(&self) -> alertline_core::Result<Vec<ReportOverview>> {
        Ok(self.overview()?)
    }

    fn get_sources(&self) -> alertline_core::Result<Vec<SourceId>> {
        Ok(self.sources()?)
    }
}

//! Per-notifier routing filter.

use serde::{Deserialize, Serialize};

use alertline_core::{Report, Severity};

/// Allow-lists deciding which reports a notifier receives.
///
/// An absent list accepts everything; an empty list accepts nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<Severity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apps: Option<Vec<String>>,
}

impl NotifierFilter {
    /// Filter that lets every report through.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn with_levels(mut self, levels: Vec<Severity>) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn with_apps(mut self, apps: Vec<String>) -> Self {
        self.apps = Some(apps);
        self
    }

    /// Levels are matched against [`Report::routing_severity`], so escalated
    /// reports reach critical-only notifiers.
    pub fn accepts(&self, report: &Report) -> bool {
        let severity = report.routing_severity();
        let level_ok = self
            .levels
            .as_ref()
            .map_or(true, |levels| levels.contains(&severity));
        let app_ok = self
            .apps
            .as_ref()
            .map_or(true, |apps| apps.iter().any(|app| *app == report.source_id.app));
        level_ok && app_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertline_core::{SourceId, ValidatedReport};
    use chrono::{FixedOffset, TimeZone};

    fn report(app: &str, severity: Severity) -> Report {
        let created = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap();
        ValidatedReport::new(SourceId::new(app), severity, "s")
            .stamp(created)
            .into_report(1, 1)
    }

    #[test]
    fn test_allow_all() {
        let filter = NotifierFilter::allow_all();
        assert!(filter.accepts(&report("svc", Severity::Info)));
        assert!(filter.accepts(&report("other", Severity::Recovery)));
    }

    #[test]
    fn test_levels_and_apps_are_anded() {
        let filter = NotifierFilter::allow_all()
            .with_levels(vec![Severity::Critical, Severity::Warning])
            .with_apps(vec!["svc".to_string()]);

        assert!(filter.accepts(&report("svc", Severity::Critical)));
        assert!(!filter.accepts(&report("svc", Severity::Info)));
        assert!(!filter.accepts(&report("other", Severity::Critical)));
    }

    #[test]
    fn test_escalated_reports_route_as_critical() {
        let pager = NotifierFilter::allow_all().with_levels(vec![Severity::Critical]);
        let mut warning = report("svc", Severity::Warning);
        assert!(!pager.accepts(&warning));

        warning.escalated = true;
        assert!(pager.accepts(&warning));
        assert_eq!(warning.severity, Severity::Warning);

        let chat = NotifierFilter::allow_all().with_levels(vec![Severity::Warning]);
        assert!(!chat.accepts(&warning));
    }

    #[test]
    fn test_empty_list_rejects() {
        let filter = NotifierFilter::allow_all().with_apps(Vec::new());
        assert!(!filter.accepts(&report("svc", Severity::Critical)));
    }

    #[test]
    fn test_deserialize() {
        let filter: NotifierFilter =
            serde_json::from_str(r#"{"levels":["critical"],"apps":["a","b"]}"#).unwrap();
        assert_eq!(filter.levels, Some(vec![Severity::Critical]));
        assert!(serde_json::from_str::<NotifierFilter>(r#"{"levels":["fatal"]}"#).is_err());
    }
}

//! Report intake, lookup and resolution.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use alertline_core::{
    GroupId, IncomingReport, Report, ReportFilter, ReportId, ReportOverview, SourceId,
};
use alertline_notifiers::{format, NotifierInfo};

use super::{ok, HandlerResult, ServerState};
use crate::auth::AuthUser;
use crate::models::ErrorResponse;

/// A stored report and the steps after storing it that failed.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    #[serde(flatten)]
    pub report: Report,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListReportsQuery {
    pub app: Option<String>,
    pub instance: Option<String>,
    pub tag: Option<String>,
    /// Include reports of resolved groups.
    #[serde(default)]
    pub resolved: bool,
}

impl ListReportsQuery {
    fn filter(&self) -> ReportFilter {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        ReportFilter {
            app: non_empty(&self.app),
            instance: non_empty(&self.instance),
            tag: non_empty(&self.tag),
        }
    }
}

/// POST /api/report
///
/// Stores the report and runs escalation and dispatch. Failures of those
/// steps are listed in `warnings`; the report stays stored.
pub async fn submit_report_handler(
    State(state): State<ServerState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<IncomingReport>, JsonRejection>,
) -> HandlerResult<SubmitResponse> {
    let Json(incoming) =
        payload.map_err(|e| ErrorResponse::bad_request(format!("invalid report: {}", e)))?;

    let ingested = state.intake.submit(incoming, user.user_id).await?;
    let warnings = ingested.warnings();
    if !warnings.is_empty() {
        tracing::warn!(
            category = "intake",
            report_id = ingested.report.id,
            warnings = ?warnings,
            "Report stored with warnings"
        );
    }

    ok(SubmitResponse {
        report: ingested.report,
        warnings,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetReportQuery {
    /// `1` renders the markdown body as HTML.
    #[serde(rename = "md-to-html", default)]
    pub md_to_html: Option<String>,
}

/// GET /api/report/:report_id
pub async fn get_report_handler(
    State(state): State<ServerState>,
    Path(report_id): Path<ReportId>,
    Query(query): Query<GetReportQuery>,
) -> HandlerResult<Report> {
    let mut report = state.store.get_report(report_id)?;
    if query.md_to_html.as_deref() == Some("1") {
        report.body = format::markdown_to_html(&report.body);
    }
    ok(report)
}

/// GET /api/reports
///
/// Newest first. `resolved=true` includes reports of resolved groups.
pub async fn list_reports_handler(
    State(state): State<ServerState>,
    Query(query): Query<ListReportsQuery>,
) -> HandlerResult<Vec<Report>> {
    ok(state.store.list_reports(&query.filter(), query.resolved)?)
}

/// POST /api/resolve/:group_id
///
/// Requires a caller with a user id.
pub async fn resolve_group_handler(
    State(state): State<ServerState>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<GroupId>,
) -> HandlerResult<Value> {
    let affected = state.intake.resolve_group(group_id, user.user_id).await?;
    ok(json!({ "ok": true, "affected": affected }))
}

/// GET /api/sources
pub async fn sources_handler(State(state): State<ServerState>) -> HandlerResult<Vec<SourceId>> {
    ok(state.store.get_sources()?)
}

/// GET /api/overview
pub async fn overview_handler(
    State(state): State<ServerState>,
) -> HandlerResult<Vec<ReportOverview>> {
    ok(state.store.get_overview()?)
}

/// GET /api/notifiers
pub async fn notifiers_handler(
    State(state): State<ServerState>,
) -> HandlerResult<Vec<NotifierInfo>> {
    ok(state.dispatcher.list_info().await)
}

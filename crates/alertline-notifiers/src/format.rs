//! Text rendering shared by the notifiers.

use pulldown_cmark::{Event, Options, Parser};

use alertline_core::Report;

/// Link to the report detail page below `public_url`.
pub fn report_link(public_url: &str, report: &Report) -> String {
    format!("{}/report/{}", public_url.trim_end_matches('/'), report.id)
}

/// One-line summary: `:warning: WARNING svc/n1[disk]: subject`.
pub fn summary_line(report: &Report) -> String {
    let escalated = if report.escalated { "[ESCALATED] " } else { "" };
    format!(
        "{} {}{} {}: {}",
        report.severity.emoji(),
        escalated,
        report.severity.as_str().to_uppercase(),
        report.source_id.label(),
        report.subject
    )
}

/// Markdown message for chat notifiers.
pub fn markdown(report: &Report, notifier: &str, public_url: Option<&str>) -> String {
    let mut out = format!("**{}**\n", summary_line(report));
    if !report.body.is_empty() {
        out.push('\n');
        out.push_str(&report.body);
        out.push('\n');
    }
    if !report.args.is_empty() {
        out.push('\n');
        for (key, value) in &report.args {
            out.push_str(&format!("- `{}`: {}\n", key, value));
        }
    }
    out.push_str(&format!(
        "\n_{} | group {} | {}_",
        notifier,
        report.group_id,
        report.created.format("%Y-%m-%d %H:%M:%S %:z")
    ));
    if let Some(url) = public_url {
        out.push_str(&format!("\n{}", report_link(url, report)));
    }
    out
}

/// Plain text mail body.
pub fn plain_text(report: &Report, public_url: Option<&str>) -> String {
    let mut out = format!(
        "{}\n\nSource: {}\nTime: {}\nGroup: {}\n",
        report.subject,
        report.source_id.label(),
        report.created.format("%Y-%m-%d %H:%M:%S %:z"),
        report.group_id
    );
    if !report.body.is_empty() {
        out.push('\n');
        out.push_str(&report.body);
        out.push('\n');
    }
    for (key, value) in &report.args {
        out.push_str(&format!("{}: {}\n", key, value));
    }
    if let Some(url) = public_url {
        out.push_str(&format!("\n{}\n", report_link(url, report)));
    }
    out
}

/// HTML mail body.
pub fn html(report: &Report, public_url: Option<&str>) -> String {
    let args: String = report
        .args
        .iter()
        .map(|(key, value)| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(key),
                escape_html(&value.to_string())
            )
        })
        .collect();
    let link = public_url
        .map(|url| {
            let href = report_link(url, report);
            format!(r#"<p><a href="{}">{}</a></p>"#, escape_html(&href), escape_html(&href))
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; }}
        .report {{ padding: 20px; border-radius: 5px; }}
        .severity-info {{ background-color: #d4edda; border-left: 4px solid #28a745; }}
        .severity-warning {{ background-color: #fff3cd; border-left: 4px solid #ffc107; }}
        .severity-critical {{ background-color: #f8d7da; border-left: 4px solid #dc3545; }}
        .severity-recovery {{ background-color: #d1ecf1; border-left: 4px solid #17a2b8; }}
        .timestamp {{ color: #6c757d; font-size: 0.9em; }}
    </style>
</head>
<body>
    <div class="report severity-{}">
        <h2>{}</h2>
        <p class="timestamp">{}</p>
        <p><strong>Source:</strong> {}</p>
        <pre>{}</pre>
        <table>{}</table>
        {}
    </div>
</body>
</html>"#,
        report.severity.as_str(),
        escape_html(&report.subject),
        report.created.format("%Y-%m-%d %H:%M:%S %:z"),
        escape_html(&report.source_id.label()),
        escape_html(&report.body),
        args,
        link
    )
}

/// Render a markdown report body as an HTML fragment. Raw HTML in the
/// body is escaped, not passed through.
pub fn markdown_to_html(body: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let events = Parser::new_ext(body, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut rendered = String::with_capacity(body.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut rendered, events);
    rendered
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertline_core::{Severity, SourceId, ValidatedReport};
    use chrono::{FixedOffset, TimeZone};

    fn report() -> Report {
        let created = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 2, 3, 4, 5, 6)
            .unwrap();
        ValidatedReport::new(
            SourceId::new("svc").with_instance("n1").with_tag("disk"),
            Severity::Warning,
            "disk <90%>",
        )
        .with_body("usage high")
        .with_arg("mount", "/var")
        .stamp(created)
        .into_report(17, 4)
    }

    #[test]
    fn test_summary_line() {
        let mut r = report();
        assert_eq!(summary_line(&r), ":warning: WARNING svc/n1[disk]: disk <90%>");
        r.escalated = true;
        assert_eq!(
            summary_line(&r),
            ":warning: [ESCALATED] WARNING svc/n1[disk]: disk <90%>"
        );
    }

    #[test]
    fn test_markdown_contains_parts() {
        let text = markdown(&report(), "ops", Some("https://alerts.example.com/"));
        assert!(text.contains("usage high"));
        assert!(text.contains("`mount`"));
        assert!(text.contains("group 4"));
        assert!(text.contains("https://alerts.example.com/report/17"));
    }

    #[test]
    fn test_html_escapes() {
        let body = html(&report(), None);
        assert!(body.contains("disk &lt;90%&gt;"));
        assert!(body.contains("severity-warning"));
    }

    #[test]
    fn test_markdown_to_html() {
        let rendered = markdown_to_html("# Disk\n\n* **/var** at 91%\n* `/tmp` ok");
        assert!(rendered.contains("<h1>Disk</h1>"));
        assert!(rendered.contains("<li><strong>/var</strong> at 91%</li>"));
        assert!(rendered.contains("<code>/tmp</code>"));

        let rendered = markdown_to_html("<script>alert(1)</script>");
        assert!(!rendered.contains("<script>"));
        assert!(rendered.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_plain_text() {
        let text = plain_text(&report(), None);
        assert!(text.starts_with("disk <90%>"));
        assert!(text.contains("Source: svc/n1[disk]"));
    }
}

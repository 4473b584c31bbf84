use std::fmt::Write;

use crate::domain::{AggregatedReport, HealthStatus, Severity, ERROR_KEY};

use super::{format_age, format_timestamp, format_value, RenderContext};

const STYLE: &str = "body{font-family:-apple-system,Segoe UI,Helvetica,Arial,sans-serif;margin:2em;color:#1f2328}\
table{border-collapse:collapse;width:100%;margin-bottom:1.5em}\
th,td{border:1px solid #d0d7de;padding:6px 10px;text-align:left;vertical-align:top}\
th{background:#f6f8fa}\
.status{font-weight:600;border-radius:4px;padding:2px 8px;white-space:nowrap}\
.status-healthy{background:#dafbe1;color:#1a7f37}\
.status-degraded{background:#fff8c5;color:#9a6700}\
.status-unhealthy{background:#ffebe9;color:#cf222e}\
.status-no-data{background:#eaeef2;color:#57606a;border:1px dashed #8c959f}\
.alert-critical{color:#cf222e}\
.alert-warning{color:#9a6700}\
.muted{color:#57606a}";

/// Escape text for element content and quoted attributes
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn status_class(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "status-healthy",
        HealthStatus::Degraded => "status-degraded",
        HealthStatus::Unhealthy => "status-unhealthy",
        HealthStatus::NoData | HealthStatus::Unclassified => "status-no-data",
    }
}

fn badge(status: HealthStatus) -> String {
    format!(
        "<span class=\"status {}\">{}</span>",
        status_class(status),
        status.label()
    )
}

pub fn render(report: &AggregatedReport, ctx: &RenderContext) -> String {
    let mut out = String::new();
    let counts = report.counts();

    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html lang=\"en\">");
    let _ = writeln!(out, "<head>");
    let _ = writeln!(out, "<meta charset=\"utf-8\">");
    let _ = writeln!(
        out,
        "<title>Sentinel Health Report {}</title>",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(out, "<style>{STYLE}</style>");
    let _ = writeln!(out, "</head>");
    let _ = writeln!(out, "<body>");
    let _ = writeln!(out, "<h1>Sentinel Health Report</h1>");
    let _ = writeln!(
        out,
        "<p>Overall: {} &middot; {} healthy, {} degraded, {} unhealthy, {} no data</p>",
        badge(report.overall_status()),
        counts.healthy,
        counts.degraded,
        counts.unhealthy,
        counts.no_data
    );
    let _ = writeln!(
        out,
        "<p class=\"muted\">Generated {} &middot; rendered {} &middot; pass {}</p>",
        format_timestamp(Some(report.generated_at)),
        format_timestamp(Some(ctx.rendered_at)),
        report.pass_id
    );

    let _ = writeln!(out, "<h2>Alerts</h2>");
    if report.alerts.is_empty() {
        let _ = writeln!(out, "<p class=\"muted\">No alerts.</p>");
    } else {
        let _ = writeln!(out, "<ul>");
        for alert in &report.alerts {
            let class = match alert.severity {
                Severity::Critical => "alert-critical",
                Severity::Warning => "alert-warning",
            };
            let _ = writeln!(
                out,
                "<li class=\"{}\"><strong>{}</strong> {}: {}</li>",
                class,
                alert.severity.as_str().to_uppercase(),
                escape(&alert.source_id),
                escape(&alert.message)
            );
        }
        let _ = writeln!(out, "</ul>");
    }

    let _ = writeln!(out, "<h2>Sources</h2>");
    let _ = writeln!(out, "<table>");
    let _ = writeln!(
        out,
        "<tr><th>Source</th><th>Status</th><th>Last activity</th><th>Age</th><th>Details</th></tr>"
    );
    for snap in report.snapshots.values() {
        let details = if snap.status == HealthStatus::NoData {
            format!(
                "<em>No data: {}</em>",
                escape(snap.error().unwrap_or("provider returned nothing"))
            )
        } else {
            snap.payload
                .iter()
                .filter(|(k, _)| k.as_str() != ERROR_KEY)
                .map(|(k, v)| format!("{}: {}", escape(k), escape(&format_value(v))))
                .collect::<Vec<_>>()
                .join("<br>")
        };

        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&snap.source_id),
            badge(snap.status),
            format_timestamp(snap.last_activity),
            snap.staleness_seconds.map(format_age).unwrap_or_else(|| "-".to_string()),
            details
        );
    }
    let _ = writeln!(out, "</table>");
    let _ = writeln!(out, "</body>");
    let _ = writeln!(out, "</html>");

    out
}

use std::fmt::Write;

use crate::domain::{AggregatedReport, HealthStatus, MetricSnapshot, ERROR_KEY};

use super::{format_age, format_timestamp, format_value, status_icon, RenderContext};

pub fn render(report: &AggregatedReport, ctx: &RenderContext) -> String {
    let mut out = String::new();
    let overall = report.overall_status();
    let counts = report.counts();

    // writeln! into a String cannot fail
    let _ = writeln!(out, "# Sentinel Health Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Generated:** {}", format_timestamp(Some(report.generated_at)));
    let _ = writeln!(out, "- **Rendered:** {}", format_timestamp(Some(ctx.rendered_at)));
    let _ = writeln!(out, "- **Pass:** `{}`", report.pass_id);
    let _ = writeln!(out, "- **Overall:** {} **{}**", status_icon(overall), overall.label());
    let _ = writeln!(
        out,
        "- **Sources:** {} healthy, {} degraded, {} unhealthy, {} no data",
        counts.healthy, counts.degraded, counts.unhealthy, counts.no_data
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "## Sources");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Source | Status | Last activity | Age |");
    let _ = writeln!(out, "|---|---|---|---|");
    for snap in report.snapshots.values() {
        let _ = writeln!(
            out,
            "| {} | {} {} | {} | {} |",
            inline(&snap.source_id),
            status_icon(snap.status),
            snap.status.label(),
            format_timestamp(snap.last_activity),
            snap.staleness_seconds.map(format_age).unwrap_or_else(|| "-".to_string()),
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Alerts");
    let _ = writeln!(out);
    if report.alerts.is_empty() {
        let _ = writeln!(out, "_No alerts._");
    } else {
        for alert in &report.alerts {
            let _ = writeln!(
                out,
                "- {} **{}** `{}`: {}",
                alert.severity.emoji(),
                alert.severity.as_str().to_uppercase(),
                inline(&alert.source_id),
                inline(&alert.message)
            );
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Details");
    for snap in report.snapshots.values() {
        let _ = writeln!(out);
        write_details(&mut out, snap);
    }

    out
}

fn write_details(out: &mut String, snap: &MetricSnapshot) {
    let _ = writeln!(out, "### {}", inline(&snap.source_id));
    let _ = writeln!(out);

    if snap.status == HealthStatus::NoData {
        let _ = writeln!(
            out,
            "> **NO DATA**: {}",
            inline(snap.error().unwrap_or("provider returned nothing"))
        );
        return;
    }

    for (key, value) in snap.payload.iter().filter(|(k, _)| k.as_str() != ERROR_KEY) {
        let _ = writeln!(out, "- {}: {}", inline(key), inline(&format_value(value)));
    }
}

/// Provider text on one line, with pipes escaped so tables and lists stay intact
fn inline(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

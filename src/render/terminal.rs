//! Plain-text panel layout for terminals and log files

use std::fmt::Write;

use crate::domain::{AggregatedReport, HealthStatus, ERROR_KEY};

use super::{format_age, format_value, RenderContext};

const WIDTH: usize = 72;

fn rule(out: &mut String, ch: char) {
    let _ = writeln!(out, "{}", ch.to_string().repeat(WIDTH));
}

/// Panel header, e.g. `+-- market ------...+`
fn panel_top(out: &mut String, title: &str) {
    let head = format!("+-- {} ", title);
    let fill = WIDTH.saturating_sub(head.chars().count() + 1);
    let _ = writeln!(out, "{}{}+", head, "-".repeat(fill));
}

fn panel_line(out: &mut String, text: &str) {
    let inner = WIDTH - 4;
    let mut line: String = text.chars().take(inner).collect();
    let pad = inner.saturating_sub(line.chars().count());
    line.push_str(&" ".repeat(pad));
    let _ = writeln!(out, "| {} |", line);
}

fn panel_bottom(out: &mut String) {
    let _ = writeln!(out, "+{}+", "-".repeat(WIDTH - 2));
}

pub fn render(report: &AggregatedReport, ctx: &RenderContext) -> String {
    let mut out = String::new();
    let counts = report.counts();

    rule(&mut out, '=');
    let _ = writeln!(
        out,
        "SENTINEL  {}  overall: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.overall_status().label()
    );
    let _ = writeln!(
        out,
        "sources: {} healthy / {} degraded / {} unhealthy / {} no data   (rendered {})",
        counts.healthy,
        counts.degraded,
        counts.unhealthy,
        counts.no_data,
        ctx.rendered_at.format("%H:%M:%S")
    );
    rule(&mut out, '=');

    for snap in report.snapshots.values() {
        panel_top(&mut out, &snap.source_id);
        let age = snap
            .staleness_seconds
            .map(|s| format!("age {}", format_age(s)))
            .unwrap_or_else(|| "age -".to_string());
        panel_line(&mut out, &format!("[{:^11}] {}", snap.status.label(), age));

        if snap.status == HealthStatus::NoData {
            panel_line(
                &mut out,
                &format!(
                    "no data: {}",
                    snap.error().unwrap_or("provider returned nothing")
                ),
            );
        } else {
            for (key, value) in snap.payload.iter().filter(|(k, _)| k.as_str() != ERROR_KEY) {
                panel_line(&mut out, &format!("{:<20} {}", key, format_value(value)));
            }
        }
        panel_bottom(&mut out);
    }

    panel_top(&mut out, &format!("alerts ({})", report.alerts.len()));
    if report.alerts.is_empty() {
        panel_line(&mut out, "none");
    } else {
        for alert in &report.alerts {
            panel_line(&mut out, &alert.headline());
        }
    }
    panel_bottom(&mut out);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::fixtures;

    #[test]
    fn test_panels_are_fixed_width() {
        let out = render(&fixtures::report(), &fixtures::ctx());
        for line in out.lines().filter(|l| l.starts_with('+') || l.starts_with('|')) {
            assert_eq!(line.chars().count(), WIDTH, "{line}");
        }
    }

    #[test]
    fn test_no_data_panel() {
        let out = render(&fixtures::report(), &fixtures::ctx());
        assert!(out.contains("[  NO DATA  ] age -"));
        assert!(out.contains("no data: table 'positions' does not exist"));
        assert!(out.contains("[  HEALTHY  ] age 5m"));
    }

    #[test]
    fn test_alert_panel() {
        let out = render(&fixtures::report(), &fixtures::ctx());
        assert!(out.contains("+-- alerts (1) "));
        assert!(out.contains("[WARNING] research: source degraded"));
    }
}

//! Report renderers
//!
//! Pure functions from an [`AggregatedReport`] to text. Renderers never fetch
//! anything; the only clock they see is the injected [`RenderContext`].

pub mod html;
pub mod json;
pub mod markdown;
pub mod terminal;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{AggregatedReport, HealthStatus};
use crate::error::RenderError;

/// Output format of a rendered report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Markdown,
    Json,
    Html,
    Terminal,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Markdown, Format::Json, Format::Html, Format::Terminal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Markdown => "markdown",
            Format::Json => "json",
            Format::Html => "html",
            Format::Terminal => "terminal",
        }
    }

    /// File extension used by the file sink
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Markdown => "md",
            Format::Json => "json",
            Format::Html => "html",
            Format::Terminal => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Markdown => "text/markdown; charset=utf-8",
            Format::Json => "application/json",
            Format::Html => "text/html; charset=utf-8",
            Format::Terminal => "text/plain; charset=utf-8",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Format::Markdown),
            "json" => Ok(Format::Json),
            "html" => Ok(Format::Html),
            "terminal" | "text" | "txt" => Ok(Format::Terminal),
            other => Err(format!(
                "unknown format '{other}' (expected markdown, json, html or terminal)"
            )),
        }
    }
}

/// Inputs a renderer may not derive from the report itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderContext {
    pub rendered_at: DateTime<Utc>,
}

impl RenderContext {
    pub fn at(rendered_at: DateTime<Utc>) -> Self {
        Self { rendered_at }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}

/// A report rendered into one format
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub format: Format,
    pub pass_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub rendered_at: DateTime<Utc>,
    /// Worst status in the report, for subjects and headers
    pub overall: HealthStatus,
    pub critical_alerts: usize,
    pub content: String,
}

impl RenderedDocument {
    /// Short title, e.g. `Sentinel report 2026-03-10 12:00 UTC: DEGRADED`
    pub fn title(&self) -> String {
        format!(
            "Sentinel report {}: {}",
            self.generated_at.format("%Y-%m-%d %H:%M UTC"),
            self.overall.label()
        )
    }
}

/// Render `report` into `format`.
///
/// Output is byte-identical for the same report, format and context.
pub fn render(
    report: &AggregatedReport,
    format: Format,
    ctx: &RenderContext,
) -> Result<RenderedDocument, RenderError> {
    report.check_invariants().map_err(RenderError::Malformed)?;

    let content = match format {
        Format::Markdown => markdown::render(report, ctx),
        Format::Json => json::render(report)?,
        Format::Html => html::render(report, ctx),
        Format::Terminal => terminal::render(report, ctx),
    };

    Ok(RenderedDocument {
        format,
        pass_id: report.pass_id,
        generated_at: report.generated_at,
        rendered_at: ctx.rendered_at,
        overall: report.overall_status(),
        critical_alerts: report.critical_count(),
        content,
    })
}

/// Render several formats; a failure affects only its own format
pub fn render_all(
    report: &AggregatedReport,
    formats: &[Format],
    ctx: &RenderContext,
) -> Vec<(Format, Result<RenderedDocument, RenderError>)> {
    formats
        .iter()
        .map(|&format| {
            let result = render(report, format, ctx);
            if let Err(ref e) = result {
                warn!(%format, error = %e, "render failed");
            }
            (format, result)
        })
        .collect()
}

/// Compact age, e.g. `45s`, `12m`, `3h 5m`, `4d 2h`
pub fn format_age(seconds: i64) -> String {
    let s = seconds.max(0);
    if s < 60 {
        format!("{s}s")
    } else if s < 3_600 {
        format!("{}m", s / 60)
    } else if s < 86_400 {
        format!("{}h {}m", s / 3_600, (s % 3_600) / 60)
    } else {
        format!("{}d {}h", s / 86_400, (s % 86_400) / 3_600)
    }
}

/// One-line form of a payload value
pub(crate) fn format_value(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}={}", format_value(v)))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

pub(crate) fn format_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn status_icon(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "\u{1f7e2}",   // green circle
        HealthStatus::Degraded => "\u{1f7e1}",  // yellow circle
        HealthStatus::Unhealthy => "\u{1f534}", // red circle
        HealthStatus::NoData | HealthStatus::Unclassified => "\u{26aa}",
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(-5), "0s");
        assert_eq!(format_age(45), "45s");
        assert_eq!(format_age(12 * 60 + 3), "12m");
        assert_eq!(format_age(3 * 3_600 + 5 * 60), "3h 5m");
        assert_eq!(format_age(4 * 86_400 + 2 * 3_600), "4d 2h");
    }

    #[test]
    fn test_render_rejects_unclassified() {
        let mut report = fixtures::report();
        if let Some(snap) = report.snapshots.get_mut("market") {
            snap.status = HealthStatus::Unclassified;
        }
        for format in Format::ALL {
            assert!(matches!(
                render(&report, format, &fixtures::ctx()),
                Err(RenderError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_render_all_keeps_order() {
        let report = fixtures::report();
        let docs = render_all(&report, &[Format::Html, Format::Json], &fixtures::ctx());
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].0, Format::Html);
        assert!(docs.iter().all(|(_, r)| r.is_ok()));
    }

    #[test]
    fn test_document_metadata() {
        let doc = render(&fixtures::report(), Format::Markdown, &fixtures::ctx()).unwrap();
        assert_eq!(doc.overall, HealthStatus::Degraded);
        assert_eq!(doc.critical_alerts, 0);
        assert_eq!(doc.title(), "Sentinel report 2026-03-10 12:00 UTC: DEGRADED");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&serde_json::json!(["AAPL", "MSFT"])), "AAPL, MSFT");
        assert_eq!(format_value(&serde_json::json!({"AAPL": 190.5})), "AAPL=190.5");
        assert_eq!(format_value(&serde_json::json!("x")), "x");
    }
}

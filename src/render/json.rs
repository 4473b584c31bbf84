use crate::domain::AggregatedReport;
use crate::error::RenderError;

/// Serialized report; parses back into an identical [`AggregatedReport`]
pub fn render(report: &AggregatedReport) -> Result<String, RenderError> {
    serde_json::to_string_pretty(report).map_err(|e| RenderError::Encoding {
        format: "json".to_string(),
        reason: e.to_string(),
    })
}

/// Parse a document produced by [`render`]
pub fn parse(content: &str) -> Result<AggregatedReport, RenderError> {
    serde_json::from_str(content).map_err(|e| RenderError::Encoding {
        format: "json".to_string(),
        reason: e.to_string(),
    })
}

//! Alerts panel widget

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tui::app::TuiApp;
use crate::tui::theme::THEME;

pub fn render_alerts(f: &mut Frame, area: Rect, app: &TuiApp) {
    let alerts = app.report.as_ref().map(|r| r.alerts.as_slice()).unwrap_or_default();
    let block = Block::default()
        .title(format!(" ALERTS ({}) ", alerts.len()))
        .title_style(THEME.title_style())
        .borders(Borders::ALL)
        .border_style(THEME.border_style());

    if alerts.is_empty() {
        let none = Paragraph::new("No alerts").style(THEME.inactive_style()).block(block);
        f.render_widget(none, area);
        return;
    }

    // Critical first, then in detection order
    let mut ordered: Vec<_> = alerts.iter().collect();
    ordered.sort_by(|a, b| b.severity.cmp(&a.severity));

    let lines: Vec<Line> = ordered
        .into_iter()
        .map(|alert| {
            Line::from(vec![
                Span::styled(
                    format!("{:<9}", alert.severity.as_str().to_uppercase()),
                    THEME.severity_style(alert.severity),
                ),
                Span::styled(format!("{:<14}", alert.source_id), THEME.highlight_style()),
                Span::raw(alert.message.clone()),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

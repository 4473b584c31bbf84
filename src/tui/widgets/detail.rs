//! Detail panel for the selected source

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::domain::{MetricSnapshot, ERROR_KEY};
use crate::render::{format_timestamp, format_value};
use crate::tui::app::TuiApp;
use crate::tui::theme::THEME;

pub fn render_detail(f: &mut Frame, area: Rect, app: &TuiApp) {
    let title = match app.selected_snapshot() {
        Some(snap) => format!(" {} ", snap.source_id.to_uppercase()),
        None => " DETAIL ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .title_style(THEME.title_style())
        .borders(Borders::ALL)
        .border_style(THEME.border_style());

    let lines = match app.selected_snapshot() {
        Some(snap) => detail_lines(snap),
        None => vec![Line::styled("No source selected", THEME.inactive_style())],
    };

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0));
    f.render_widget(paragraph, area);
}

fn detail_lines(snap: &MetricSnapshot) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            Span::raw("Status:   "),
            Span::styled(snap.status.label(), THEME.status_style(snap.status)),
        ]),
        Line::from(format!("Captured: {}", format_timestamp(snap.captured_at))),
        Line::from(format!("Activity: {}", format_timestamp(snap.last_activity))),
    ];

    if let Some(reason) = snap.error() {
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            format!("No data: {reason}"),
            THEME.status_style(snap.status),
        ));
    }

    let readings: Vec<_> = snap.payload.iter().filter(|(k, _)| k.as_str() != ERROR_KEY).collect();
    if !readings.is_empty() {
        lines.push(Line::raw(""));
        for (key, value) in readings {
            lines.push(Line::from(vec![
                Span::styled(format!("{key}: "), THEME.highlight_style()),
                Span::styled(format_value(value), THEME.text_style()),
            ]));
        }
    }
    lines
}

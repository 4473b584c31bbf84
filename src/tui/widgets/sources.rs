//! Sources table widget
//!
//! One row per source in report order; the selected row drives the detail panel.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::render::{format_age, format_timestamp};
use crate::tui::app::TuiApp;
use crate::tui::theme::THEME;

pub fn render_sources(f: &mut Frame, area: Rect, app: &TuiApp) {
    let block = Block::default()
        .title(" SOURCES ")
        .title_style(THEME.title_style())
        .borders(Borders::ALL)
        .border_style(THEME.border_style());

    let Some(report) = app.report.as_ref() else {
        f.render_widget(Paragraph::new("").block(block), area);
        return;
    };

    let header = Row::new(["SOURCE", "STATUS", "LAST", "AGE"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = report.snapshots.values().map(|snap| {
        let age = snap
            .staleness_seconds
            .map(format_age)
            .unwrap_or_else(|| "-".to_string());
        Row::new(vec![
            Cell::from(snap.source_id.clone()),
            Cell::from(Span::styled(snap.status.label(), THEME.status_style(snap.status))),
            Cell::from(format_timestamp(snap.reference_time())),
            Cell::from(age),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Min(12),
            Constraint::Length(11),
            Constraint::Length(23),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(THEME.selected_style())
    .highlight_symbol("> ");

    let mut state = TableState::default().with_selected(Some(app.selected));
    f.render_stateful_widget(table, area, &mut state);
}

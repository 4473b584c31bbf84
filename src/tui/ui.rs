//! Main UI rendering logic
//!
//! Orchestrates the layout and renders all widgets.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::tui::app::TuiApp;
use crate::tui::theme::THEME;
use crate::tui::widgets;

/// Render the entire UI
pub fn render(f: &mut Frame, app: &TuiApp) {
    let chunks = Layout::vertical([
        Constraint::Length(3), // Overall banner
        Constraint::Min(8),    // Sources + detail
        Constraint::Length(8), // Alerts
        Constraint::Length(1), // Footer
    ])
    .split(f.area());

    let body = Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);

    widgets::render_header(f, chunks[0], app);
    widgets::render_sources(f, body[0], app);
    widgets::render_detail(f, body[1], app);
    widgets::render_alerts(f, chunks[2], app);
    widgets::render_footer(f, chunks[3], app);

    if app.show_help {
        render_help(f);
    }
}

fn render_help(f: &mut Frame) {
    let area = centered(f.area(), 44, 10);
    let lines = vec![
        Line::raw("q / Esc     quit"),
        Line::raw("j / Down    next source"),
        Line::raw("k / Up      previous source"),
        Line::raw("PgDn / PgUp scroll detail"),
        Line::raw("r           run a pass now"),
        Line::raw("?           toggle this help"),
    ];
    let block = Block::default()
        .title(" HELP ")
        .title_style(THEME.title_style())
        .borders(Borders::ALL)
        .border_style(THEME.border_style());
    f.render_widget(Clear, area);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

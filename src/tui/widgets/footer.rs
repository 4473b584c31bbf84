//! Footer status bar widget

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::tui::app::TuiApp;
use crate::tui::theme::THEME;

pub fn render_footer(f: &mut Frame, area: Rect, app: &TuiApp) {
    let mut spans = vec![
        Span::styled(" q", THEME.highlight_style()),
        Span::raw(" quit  "),
        Span::styled("j/k", THEME.highlight_style()),
        Span::raw(" select  "),
        Span::styled("PgUp/PgDn", THEME.highlight_style()),
        Span::raw(" scroll  "),
        Span::styled("r", THEME.highlight_style()),
        Span::raw(" refresh  "),
        Span::styled("?", THEME.highlight_style()),
        Span::raw(" help  "),
    ];

    if let Some(updated) = app.last_update {
        spans.push(Span::styled(
            format!("  updated {}", updated.format("%H:%M:%S")),
            THEME.inactive_style(),
        ));
    }
    if let Some(notice) = &app.notice {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(format!("[{notice}]"), THEME.border_style()));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

//! Overall status banner

use chrono::Utc;
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::domain::HealthStatus;
use crate::render::format_age;
use crate::tui::app::TuiApp;
use crate::tui::theme::THEME;

pub fn render_header(f: &mut Frame, area: Rect, app: &TuiApp) {
    let block = Block::default()
        .title(" SENTINEL ")
        .title_style(THEME.title_style())
        .borders(Borders::ALL)
        .border_style(THEME.border_style());

    let Some(report) = app.report.as_ref() else {
        let waiting = Paragraph::new("Waiting for first aggregation pass...")
            .style(THEME.inactive_style())
            .block(block);
        f.render_widget(waiting, area);
        return;
    };

    let overall = report.overall_status();
    let counts = report.counts();
    let age = (Utc::now() - report.generated_at).num_seconds();

    let line = Line::from(vec![
        Span::raw(" Overall: "),
        Span::styled(overall.label(), THEME.status_style(overall)),
        Span::raw("   "),
        Span::styled(format!("{} healthy", counts.healthy), THEME.status_style(HealthStatus::Healthy)),
        Span::raw("  "),
        Span::styled(format!("{} degraded", counts.degraded), THEME.status_style(HealthStatus::Degraded)),
        Span::raw("  "),
        Span::styled(format!("{} unhealthy", counts.unhealthy), THEME.status_style(HealthStatus::Unhealthy)),
        Span::raw("  "),
        Span::styled(format!("{} no data", counts.no_data), THEME.status_style(HealthStatus::NoData)),
        Span::raw("   "),
        Span::styled(
            format!(
                "generated {} ({} ago)",
                report.generated_at.format("%H:%M:%S UTC"),
                format_age(age)
            ),
            THEME.inactive_style(),
        ),
    ]);

    f.render_widget(Paragraph::new(line).block(block), area);
}

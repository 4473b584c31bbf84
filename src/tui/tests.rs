#[cfg(test)]
mod tests {
    use crate::render::fixtures;
    use crate::tui::{ui, DashboardTerminal, TuiApp};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_tui_app_new() {
        let app = TuiApp::new();
        assert!(app.is_running());
        assert!(app.report.is_none());
        assert!(app.selected_snapshot().is_none());
        assert!(!app.show_help);
    }

    #[test]
    fn test_selection_wraps() {
        let mut app = TuiApp::new();
        app.select_next();
        assert_eq!(app.selected, 0); // No report

        app.set_report(Arc::new(fixtures::report()));
        assert_eq!(app.source_count(), 3);

        app.select_prev();
        assert_eq!(app.selected, 2);
        app.select_next();
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn test_selection_follows_source_across_reports() {
        let mut app = TuiApp::new();
        app.set_report(Arc::new(fixtures::report()));
        app.select_next();
        let chosen = app.selected_snapshot().unwrap().source_id.clone();

        let mut next = fixtures::report();
        next.snapshots.retain(|id, _| *id != "market");
        app.set_report(Arc::new(next));

        assert_eq!(app.selected_snapshot().unwrap().source_id, chosen);
    }

    #[test]
    fn test_toggle_help_and_quit() {
        let mut app = TuiApp::new();
        app.toggle_help();
        assert!(app.show_help);
        app.toggle_help();
        assert!(!app.show_help);

        app.quit();
        assert!(!app.is_running());
    }

    #[test]
    fn test_render_waiting_for_first_pass() {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        let app = TuiApp::new();
        terminal.draw(|f| ui::render(f, &app)).unwrap();
        assert!(buffer_text(&terminal).contains("Waiting for first aggregation pass"));
    }

    #[test]
    fn test_render_shows_no_data_distinctly() {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        let mut app = TuiApp::new();
        app.set_report(Arc::new(fixtures::report()));
        terminal.draw(|f| ui::render(f, &app)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("NO DATA"));
        assert!(text.contains("DEGRADED"));
        assert!(text.contains("positions"));
        assert!(text.contains("research"));
    }

    #[test]
    fn test_unmanaged_terminal_is_left_alone() {
        let mut screen = DashboardTerminal::unmanaged(Terminal::new(TestBackend::new(100, 30)).unwrap());
        assert!(!screen.is_raw());

        let mut app = TuiApp::new();
        app.set_report(Arc::new(fixtures::report()));
        screen.terminal().draw(|f| ui::render(f, &app)).unwrap();

        screen.leave().unwrap();
        screen.leave().unwrap();
        assert!(buffer_text(screen.terminal()).contains("research"));
    }
}

//! TUI Application state management

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::{AggregatedReport, MetricSnapshot};

/// TUI Application state
pub struct TuiApp {
    /// Latest complete report, if any pass has finished
    pub report: Option<Arc<AggregatedReport>>,
    /// Index of the selected source in report order
    pub selected: usize,
    /// Scroll offset for the detail panel
    pub detail_scroll: u16,
    /// Is the app running
    pub running: bool,
    /// When the last report arrived
    pub last_update: Option<DateTime<Utc>>,
    /// Show help overlay
    pub show_help: bool,
    /// Transient footer message
    pub notice: Option<String>,
}

impl Default for TuiApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiApp {
    pub fn new() -> Self {
        Self {
            report: None,
            selected: 0,
            detail_scroll: 0,
            running: true,
            last_update: None,
            show_help: false,
            notice: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Replace the report, keeping the selection on the same source when it still exists
    pub fn set_report(&mut self, report: Arc<AggregatedReport>) {
        let previous = self.selected_snapshot().map(|s| s.source_id.clone());
        self.selected = previous
            .and_then(|id| report.snapshots.keys().position(|k| *k == id))
            .unwrap_or(0);
        self.report = Some(report);
        self.last_update = Some(Utc::now());
        self.notice = None;
    }

    pub fn source_count(&self) -> usize {
        self.report.as_ref().map_or(0, |r| r.snapshots.len())
    }

    pub fn selected_snapshot(&self) -> Option<&MetricSnapshot> {
        self.report
            .as_ref()
            .and_then(|r| r.snapshots.values().nth(self.selected))
    }

    pub fn select_next(&mut self) {
        let count = self.source_count();
        if count > 0 {
            self.selected = (self.selected + 1) % count;
            self.detail_scroll = 0;
        }
    }

    pub fn select_prev(&mut self) {
        let count = self.source_count();
        if count > 0 {
            self.selected = if self.selected == 0 {
                count - 1
            } else {
                self.selected - 1
            };
            self.detail_scroll = 0;
        }
    }

    pub fn scroll_detail_down(&mut self) {
        self.detail_scroll = self.detail_scroll.saturating_add(1);
    }

    pub fn scroll_detail_up(&mut self) {
        self.detail_scroll = self.detail_scroll.saturating_sub(1);
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }
}

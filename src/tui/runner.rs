//! Dashboard runner
//!
//! Redraws on every new report, key press and once a second so ages keep moving.

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Result, SentinelError};
use crate::service::{LatestReport, Shutdown, ShutdownSignal};
use crate::tui::app::TuiApp;
use crate::tui::event::KeyAction;
use crate::tui::{ui, DashboardTerminal};

/// Dashboard runner bound to a running aggregation service
pub struct DashboardRunner {
    app: TuiApp,
    latest: LatestReport,
    trigger: mpsc::Sender<()>,
    shutdown: Arc<Shutdown>,
}

impl DashboardRunner {
    pub fn new(latest: LatestReport, trigger: mpsc::Sender<()>, shutdown: Arc<Shutdown>) -> Self {
        Self {
            app: TuiApp::new(),
            latest,
            trigger,
            shutdown,
        }
    }

    /// Run until the user quits or shutdown is requested elsewhere.
    ///
    /// Quitting the dashboard requests a graceful shutdown of the whole process.
    pub async fn run(mut self) -> Result<()> {
        info!("Starting dashboard...");

        let mut screen = DashboardTerminal::enter()
            .map_err(|e| SentinelError::Internal(format!("Failed to init terminal: {}", e)))?;

        let result = self.event_loop(screen.terminal()).await;

        screen
            .leave()
            .map_err(|e| SentinelError::Internal(format!("Failed to restore terminal: {}", e)))?;

        info!("Dashboard stopped");
        result
    }

    async fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut ratatui::Terminal<B>,
    ) -> Result<()> {
        let mut shutdown = self.shutdown.token();
        let mut events = EventStream::new();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));

        if let Some(report) = self.latest.borrow_and_update().clone() {
            self.app.set_report(report);
        }

        loop {
            terminal
                .draw(|f| ui::render(f, &self.app))
                .map_err(|e| SentinelError::Internal(format!("Failed to render: {}", e)))?;

            tokio::select! {
                _ = shutdown.wait() => break,

                changed = self.latest.changed() => {
                    if changed.is_err() {
                        warn!("report channel closed");
                        break;
                    }
                    if let Some(report) = self.latest.borrow_and_update().clone() {
                        debug!(pass_id = %report.pass_id, "dashboard received report");
                        self.app.set_report(report);
                    }
                }

                event = events.next() => match event {
                    Some(Ok(Event::Key(key))) => self.handle_key(KeyAction::from(key)),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("terminal event error: {}", e);
                    }
                    None => break,
                },

                _ = ticker.tick() => {}
            }

            if !self.app.is_running() {
                self.shutdown.request(ShutdownSignal::Graceful);
                break;
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, action: KeyAction) {
        match action {
            KeyAction::Quit => self.app.quit(),
            KeyAction::Up => self.app.select_prev(),
            KeyAction::Down => self.app.select_next(),
            KeyAction::DetailUp => self.app.scroll_detail_up(),
            KeyAction::DetailDown => self.app.scroll_detail_down(),
            KeyAction::Help => self.app.toggle_help(),
            KeyAction::Refresh => match self.trigger.try_send(()) {
                Ok(()) => self.app.set_notice("refresh requested"),
                Err(mpsc::error::TrySendError::Full(())) => self.app.set_notice("refresh already queued"),
                Err(mpsc::error::TrySendError::Closed(())) => self.app.set_notice("service stopped"),
            },
            KeyAction::None => {}
        }
    }
}

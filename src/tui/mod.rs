//! Terminal User Interface module
//!
//! Live dashboard over the latest aggregated report.

pub mod app;
pub mod event;
pub mod runner;
pub mod theme;
pub mod ui;
pub mod widgets;

#[cfg(test)]
mod tests;

pub use app::TuiApp;
pub use event::KeyAction;
pub use runner::DashboardRunner;
pub use theme::Theme;

use std::io;
use std::sync::Once;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

static PANIC_HOOK: Once = Once::new();

/// Terminal owned by the dashboard.
///
/// Raw mode and the alternate screen are undone on drop, so a dashboard future
/// dropped by a shutdown signal or unwound by a panic still hands back a usable
/// shell.
pub struct DashboardTerminal<B: Backend = CrosstermBackend<io::Stdout>> {
    terminal: Terminal<B>,
    raw: bool,
}

impl DashboardTerminal {
    /// Switch stdout into raw mode on the alternate screen
    pub fn enter() -> io::Result<Self> {
        PANIC_HOOK.call_once(|| {
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                let _ = leave_raw_mode();
                previous(info);
            }));
        });

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        Ok(Self {
            terminal: Terminal::new(CrosstermBackend::new(stdout))?,
            raw: true,
        })
    }
}

impl<B: Backend> DashboardTerminal<B> {
    /// Wrap a terminal whose mode this process does not manage
    pub fn unmanaged(terminal: Terminal<B>) -> Self {
        Self {
            terminal,
            raw: false,
        }
    }

    pub fn terminal(&mut self) -> &mut Terminal<B> {
        &mut self.terminal
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    /// Restore the shell; later calls (and drop) are no-ops
    pub fn leave(&mut self) -> io::Result<()> {
        if std::mem::take(&mut self.raw) {
            let _ = self.terminal.show_cursor();
            leave_raw_mode()?;
        }
        Ok(())
    }
}

impl<B: Backend> Drop for DashboardTerminal<B> {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

fn leave_raw_mode() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)
}

//! Theme and color definitions for the TUI dashboard
//!
//! Cyan borders, status colours on a dark terminal. NO DATA gets its own
//! magenta so it never reads as green or grey.

use ratatui::style::{Color, Modifier, Style};

use crate::domain::{HealthStatus, Severity};

/// Theme configuration for the dashboard
#[derive(Debug, Clone)]
pub struct Theme {
    /// Border color (cyan)
    pub border: Color,
    pub title: Color,
    pub healthy: Color,
    pub degraded: Color,
    pub unhealthy: Color,
    pub no_data: Color,
    /// Highlight/accent color (yellow)
    pub highlight: Color,
    /// Inactive/dim color
    pub inactive: Color,
    pub text: Color,
    /// Selected row background
    pub selection: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            border: Color::Cyan,
            title: Color::Cyan,
            healthy: Color::Green,
            degraded: Color::Yellow,
            unhealthy: Color::Red,
            no_data: Color::Magenta,
            highlight: Color::Yellow,
            inactive: Color::DarkGray,
            text: Color::White,
            selection: Color::DarkGray,
        }
    }
}

impl Theme {
    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn title_style(&self) -> Style {
        Style::default().fg(self.title).add_modifier(Modifier::BOLD)
    }

    pub fn highlight_style(&self) -> Style {
        Style::default().fg(self.highlight)
    }

    pub fn inactive_style(&self) -> Style {
        Style::default().fg(self.inactive)
    }

    pub fn text_style(&self) -> Style {
        Style::default().fg(self.text)
    }

    pub fn selected_style(&self) -> Style {
        Style::default().bg(self.selection).add_modifier(Modifier::BOLD)
    }

    pub fn status_color(&self, status: HealthStatus) -> Color {
        match status {
            HealthStatus::Healthy => self.healthy,
            HealthStatus::Degraded => self.degraded,
            HealthStatus::Unhealthy => self.unhealthy,
            HealthStatus::NoData | HealthStatus::Unclassified => self.no_data,
        }
    }

    /// Style for a status label. NO DATA is also italic.
    pub fn status_style(&self, status: HealthStatus) -> Style {
        let style = Style::default()
            .fg(self.status_color(status))
            .add_modifier(Modifier::BOLD);
        match status {
            HealthStatus::NoData | HealthStatus::Unclassified => style.add_modifier(Modifier::ITALIC),
            _ => style,
        }
    }

    pub fn severity_style(&self, severity: Severity) -> Style {
        match severity {
            Severity::Warning => Style::default().fg(self.degraded),
            Severity::Critical => Style::default()
                .fg(self.unhealthy)
                .add_modifier(Modifier::BOLD),
        }
    }
}

/// Global theme instance
pub static THEME: std::sync::LazyLock<Theme> = std::sync::LazyLock::new(Theme::default);

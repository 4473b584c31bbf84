//! Keyboard handling for the dashboard

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Key action derived from key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Quit the dashboard (and the process)
    Quit,
    /// Select the previous source
    Up,
    /// Select the next source
    Down,
    /// Scroll the detail panel
    DetailUp,
    DetailDown,
    /// Request an on-demand pass
    Refresh,
    /// Show help
    Help,
    /// No action
    None,
}

impl From<KeyEvent> for KeyAction {
    fn from(key: KeyEvent) -> Self {
        // Windows reports both press and release
        if key.kind == KeyEventKind::Release {
            return KeyAction::None;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
            KeyCode::Up | KeyCode::Char('k') => KeyAction::Up,
            KeyCode::Down | KeyCode::Char('j') => KeyAction::Down,
            KeyCode::PageUp => KeyAction::DetailUp,
            KeyCode::PageDown => KeyAction::DetailDown,
            KeyCode::Char('r') => KeyAction::Refresh,
            KeyCode::Char('?') => KeyAction::Help,
            _ => KeyAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(KeyAction::from(key(KeyCode::Char('q'))), KeyAction::Quit);
        assert_eq!(KeyAction::from(key(KeyCode::Char('j'))), KeyAction::Down);
        assert_eq!(KeyAction::from(key(KeyCode::Up)), KeyAction::Up);
        assert_eq!(KeyAction::from(key(KeyCode::Char('r'))), KeyAction::Refresh);
        assert_eq!(KeyAction::from(key(KeyCode::Char('x'))), KeyAction::None);
        assert_eq!(
            KeyAction::from(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyAction::Quit
        );
    }

    #[test]
    fn test_release_ignored() {
        let mut release = key(KeyCode::Char('q'));
        release.kind = KeyEventKind::Release;
        assert_eq!(KeyAction::from(release), KeyAction::None);
    }
}

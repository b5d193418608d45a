//! Type definitions for the TUI

use ratatui::prelude::Stylize;
use ratatui::style::{Color, Style};

use meshrc_core::{ConnectionState, Direction, Severity};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Sidebar width as a share of the screen
pub const SIDEBAR_PERCENT: u16 = 28;
/// Favorite marker shown in the roster
pub const FAVORITE_MARK: &str = "★";

// ----------------------------------------------------------------------------
// Focus
// ----------------------------------------------------------------------------

/// Which widget receives plain keystrokes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Input,
    Roster,
    Search,
}

impl Focus {
    pub fn title(&self) -> &'static str {
        match self {
            Focus::Input => "Message (Enter to send, Tab for list)",
            Focus::Roster => "List (Enter to open, Tab back to input)",
            Focus::Search => "Search (Enter or Esc to finish)",
        }
    }
}

// ----------------------------------------------------------------------------
// Actions
// ----------------------------------------------------------------------------

/// What a keystroke asks the engine or client to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    Submit(String),
    /// Open the roster entry at this position
    ActivateEntry(usize),
    NextTab,
    PreviousTab,
    NextUnread,
    CloseTab,
    ToggleFavorite,
    SearchChanged(String),
    /// Raw `name [key]` text for a new channel
    AddChannel(String),
    /// Raw `name [key]` text for the active channel
    EditChannel(String),
    DeleteChannel,
}

// ----------------------------------------------------------------------------
// Styles
// ----------------------------------------------------------------------------

pub fn direction_style(direction: Direction) -> Style {
    match direction {
        Direction::Inbound => Style::default().fg(Color::Cyan),
        Direction::Outbound => Style::default().fg(Color::Green),
    }
}

pub fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Error => Style::default().fg(Color::Red).bold(),
        Severity::Warning => Style::default().fg(Color::Yellow),
        Severity::Info => Style::default().fg(Color::Gray),
    }
}

pub fn connection_style(state: ConnectionState) -> Style {
    match state {
        ConnectionState::Connecting => Style::default().fg(Color::Yellow),
        ConnectionState::Connected => Style::default().fg(Color::Green).bold(),
        ConnectionState::Disconnected => Style::default().fg(Color::Red).bold(),
    }
}

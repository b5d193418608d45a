//! TUI Application State

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::ListState;

use super::types::{Focus, UiAction};

// ----------------------------------------------------------------------------
// TUI Application State
// ----------------------------------------------------------------------------

/// Everything the terminal owns that the engine does not: the input line,
/// the search line, focus and the roster cursor.
#[derive(Debug, Default)]
pub struct TuiApp {
    /// Current input buffer
    pub(crate) input_buffer: String,
    /// Input cursor position, in characters
    pub(crate) input_cursor: usize,
    pub(crate) search_buffer: String,
    pub(crate) focus: Focus,
    pub(crate) roster_state: ListState,
    roster_len: usize,
    /// Show help overlay
    pub(crate) show_help: bool,
    should_quit: bool,
}

impl TuiApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle keyboard input
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        // Global keybindings
        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), KeyModifiers::CONTROL)
            | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                self.should_quit = true;
                return None;
            }
            (KeyCode::F(1), _) => {
                self.show_help = !self.show_help;
                return None;
            }
            (KeyCode::Esc, _) if self.show_help => {
                self.show_help = false;
                return None;
            }
            (KeyCode::Char('n'), KeyModifiers::CONTROL) => return Some(UiAction::NextTab),
            (KeyCode::Char('p'), KeyModifiers::CONTROL) => return Some(UiAction::PreviousTab),
            (KeyCode::Char('a'), KeyModifiers::ALT) => return Some(UiAction::NextUnread),
            (KeyCode::Char('w'), KeyModifiers::CONTROL) => return Some(UiAction::CloseTab),
            (KeyCode::Char('f'), KeyModifiers::CONTROL) => return Some(UiAction::ToggleFavorite),
            // Channel management reads `name [key]` from the input line
            (KeyCode::Char('a'), KeyModifiers::CONTROL) => {
                return Some(UiAction::AddChannel(self.take_input()));
            }
            (KeyCode::Char('e'), KeyModifiers::CONTROL) => {
                return Some(UiAction::EditChannel(self.take_input()));
            }
            (KeyCode::Char('d'), KeyModifiers::CONTROL) => return Some(UiAction::DeleteChannel),
            (KeyCode::Char('s'), KeyModifiers::CONTROL) => {
                self.focus = Focus::Search;
                return None;
            }
            (KeyCode::Tab, _) => {
                self.focus = match self.focus {
                    Focus::Roster => Focus::Input,
                    Focus::Input | Focus::Search => Focus::Roster,
                };
                if self.focus == Focus::Roster && self.roster_state.selected().is_none() {
                    self.select_first();
                }
                return None;
            }
            _ => {}
        }

        match self.focus {
            Focus::Input => self.handle_input_key(key),
            Focus::Roster => self.handle_roster_key(key),
            Focus::Search => self.handle_search_key(key),
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        match key.code {
            KeyCode::Enter => {
                if self.input_buffer.trim().is_empty() {
                    return None;
                }
                return Some(UiAction::Submit(self.take_input()));
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let at = self.byte_index(self.input_cursor);
                self.input_buffer.insert(at, c);
                self.input_cursor += 1;
            }
            KeyCode::Backspace => {
                if self.input_cursor > 0 {
                    self.input_cursor -= 1;
                    let at = self.byte_index(self.input_cursor);
                    self.input_buffer.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.input_cursor < self.input_len() {
                    let at = self.byte_index(self.input_cursor);
                    self.input_buffer.remove(at);
                }
            }
            KeyCode::Left => {
                self.input_cursor = self.input_cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.input_cursor < self.input_len() {
                    self.input_cursor += 1;
                }
            }
            KeyCode::Home => {
                self.input_cursor = 0;
            }
            KeyCode::End => {
                self.input_cursor = self.input_len();
            }
            _ => {}
        }
        None
    }

    fn handle_roster_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        match key.code {
            KeyCode::Up => {
                if let Some(selected) = self.roster_state.selected() {
                    self.roster_state.select(Some(selected.saturating_sub(1)));
                } else {
                    self.select_first();
                }
            }
            KeyCode::Down => match self.roster_state.selected() {
                Some(selected) if selected + 1 < self.roster_len => {
                    self.roster_state.select(Some(selected + 1));
                }
                None => self.select_first(),
                _ => {}
            },
            KeyCode::Enter => {
                let selected = self.roster_state.selected()?;
                self.focus = Focus::Input;
                return Some(UiAction::ActivateEntry(selected));
            }
            KeyCode::Esc => {
                self.focus = Focus::Input;
            }
            _ => {}
        }
        None
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                self.focus = Focus::Input;
                None
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.search_buffer.push(c);
                self.roster_state.select(None);
                Some(UiAction::SearchChanged(self.search_buffer.clone()))
            }
            KeyCode::Backspace => {
                self.search_buffer.pop()?;
                self.roster_state.select(None);
                Some(UiAction::SearchChanged(self.search_buffer.clone()))
            }
            _ => None,
        }
    }

    /// Keep the roster cursor inside a list that may have shrunk
    pub fn set_roster_len(&mut self, len: usize) {
        self.roster_len = len;
        match self.roster_state.selected() {
            Some(_) if len == 0 => self.roster_state.select(None),
            Some(selected) if selected >= len => self.roster_state.select(Some(len - 1)),
            _ => {}
        }
    }

    fn take_input(&mut self) -> String {
        self.input_cursor = 0;
        std::mem::take(&mut self.input_buffer)
    }

    fn select_first(&mut self) {
        if self.roster_len > 0 {
            self.roster_state.select(Some(0));
        }
    }

    fn input_len(&self) -> usize {
        self.input_buffer.chars().count()
    }

    fn byte_index(&self, chars: usize) -> usize {
        self.input_buffer
            .char_indices()
            .nth(chars)
            .map(|(i, _)| i)
            .unwrap_or(self.input_buffer.len())
    }

    /// Check if should quit
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn input(&self) -> &str {
        &self.input_buffer
    }

    pub fn search(&self) -> &str {
        &self.search_buffer
    }

    pub fn selected_entry(&self) -> Option<usize> {
        self.roster_state.selected()
    }
}

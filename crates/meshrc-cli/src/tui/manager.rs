//! TUI Manager - handles terminal and rendering

use std::io::Stdout;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use tracing::{debug, info};

use meshrc_core::{ChannelSpec, ConversationEngine, DeviceGateway, MeshClient, Severity};

use crate::error::{CliError, Result};

use super::app::TuiApp;
use super::types::{
    connection_style, direction_style, severity_style, Focus, UiAction, FAVORITE_MARK,
    SIDEBAR_PERCENT,
};

const CHANNEL_NAME_FIRST: &str = "Type a channel name, optionally followed by a 32-digit hex key";

// ----------------------------------------------------------------------------
// TUI Manager
// ----------------------------------------------------------------------------

pub struct TuiManager<G: DeviceGateway> {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    tui_app: TuiApp,
    client: MeshClient<G>,
    tick_rate: Duration,
}

impl<G: DeviceGateway> TuiManager<G> {
    /// Take over the terminal
    pub fn new(client: MeshClient<G>, tick_rate: Duration) -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = std::io::stdout();
        stdout
            .execute(EnterAlternateScreen)
            .context("Failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).context("Failed to create terminal")?;

        Ok(Self {
            terminal,
            tui_app: TuiApp::new(),
            client,
            tick_rate,
        })
    }

    /// Run the TUI main loop
    pub async fn run(&mut self) -> Result<()> {
        let mut last_tick = Instant::now();
        info!("Starting TUI main loop");

        loop {
            // Handle terminal events
            let timeout = self.tick_rate.saturating_sub(last_tick.elapsed());
            if event::poll(timeout).map_err(|e| CliError::UI(format!("Event poll failed: {}", e)))? {
                if let Event::Key(key) = event::read()
                    .map_err(|e| CliError::UI(format!("Failed to read event: {}", e)))?
                {
                    if key.kind == KeyEventKind::Press {
                        if let Some(action) = self.tui_app.handle_key(key) {
                            self.perform(action).await;
                        }
                    }
                }
            }

            // Apply device events delivered since the last pass
            let handled = self.client.poll_events();
            if handled > 0 {
                debug!("Applied {} device events", handled);
            }

            if self.tui_app.should_quit() {
                break;
            }

            if last_tick.elapsed() >= self.tick_rate {
                let roster_len = self.client.engine().roster_view().len();
                self.tui_app.set_roster_len(roster_len);

                let tui_app = &self.tui_app;
                let engine = self.client.engine();
                self.terminal
                    .draw(|f| Self::render_ui_static(f, tui_app, engine))
                    .map_err(|e| CliError::UI(format!("Failed to draw terminal: {}", e)))?;
                last_tick = Instant::now();
            }
        }

        info!("TUI main loop finished");
        Ok(())
    }

    /// Apply one key action to the client
    async fn perform(&mut self, action: UiAction) {
        match action {
            UiAction::Submit(line) => self.client.submit(&line).await,
            UiAction::ActivateEntry(index) => {
                let entry = self.client.engine().roster_view().into_iter().nth(index);
                if let Some(entry) = entry {
                    self.client.engine_mut().activate(&entry.context);
                }
            }
            UiAction::NextTab => {
                self.client.engine_mut().next();
            }
            UiAction::PreviousTab => {
                self.client.engine_mut().previous();
            }
            UiAction::NextUnread => {
                if self.client.engine_mut().next_with_unread().is_none() {
                    self.client
                        .engine_mut()
                        .notify(Severity::Info, "No unread messages");
                }
            }
            UiAction::CloseTab => {
                let engine = self.client.engine_mut();
                if let Some(active) = engine.active().cloned() {
                    engine.close(&active);
                }
            }
            UiAction::ToggleFavorite => {
                let engine = self.client.engine_mut();
                let active = engine.active().cloned();
                let toggled = match active {
                    Some(context) => engine.toggle_favorite(&context),
                    None => None,
                };
                if toggled.is_none() {
                    engine.notify(Severity::Warning, "Select a contact first");
                }
            }
            UiAction::SearchChanged(query) => self.client.engine_mut().set_search(query),
            UiAction::AddChannel(input) => match ChannelSpec::parse(&input) {
                Some(spec) => self.client.add_channel(&spec).await,
                None => self.warn(CHANNEL_NAME_FIRST),
            },
            UiAction::EditChannel(input) => {
                match (self.client.engine().active_channel(), ChannelSpec::parse(&input)) {
                    (None, _) => self.warn("Select a channel to edit"),
                    (Some(_), None) => self.warn(CHANNEL_NAME_FIRST),
                    (Some(idx), Some(spec)) => self.client.edit_channel(idx, &spec).await,
                }
            }
            UiAction::DeleteChannel => match self.client.engine().active_channel() {
                Some(idx) => self.client.delete_channel(idx).await,
                None => self.warn("Select a channel to delete"),
            },
        }
    }

    fn warn(&mut self, message: &str) {
        self.client.engine_mut().notify(Severity::Warning, message);
    }

    // ----- Rendering -----

    /// Render the complete UI
    fn render_ui_static(frame: &mut Frame, tui_app: &TuiApp, engine: &ConversationEngine) {
        let main_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(0),    // Sidebar and conversation
                Constraint::Length(3), // Input
                Constraint::Length(1), // Status
            ])
            .split(frame.area());

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(SIDEBAR_PERCENT),
                Constraint::Percentage(100 - SIDEBAR_PERCENT),
            ])
            .split(main_layout[0]);

        let conversation = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(body[1]);

        Self::render_sidebar_static(frame, body[0], tui_app, engine);
        Self::render_tab_strip_static(frame, conversation[0], engine);
        Self::render_timeline_static(frame, conversation[1], engine);
        Self::render_input_static(frame, main_layout[1], tui_app);
        Self::render_status_bar_static(frame, main_layout[2], engine);

        if tui_app.show_help {
            Self::render_help_overlay_static(frame);
        }
    }

    /// Render the search line and the channel/contact list
    fn render_sidebar_static(
        frame: &mut Frame,
        area: Rect,
        tui_app: &TuiApp,
        engine: &ConversationEngine,
    ) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let search_style = if tui_app.focus == Focus::Search {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::Gray)
        };
        let search = Paragraph::new(format!("/ {}", tui_app.search_buffer))
            .style(search_style)
            .block(Block::default().borders(Borders::ALL).title("Search"));
        frame.render_widget(search, layout[0]);

        let items: Vec<ListItem> = engine
            .roster_view()
            .into_iter()
            .map(|entry| {
                let mark = if entry.favorite { FAVORITE_MARK } else { " " };
                let mut spans = vec![
                    Span::styled(mark, Style::default().fg(Color::Yellow)),
                    Span::raw(" "),
                    Span::raw(entry.label),
                ];
                if entry.badge > 0 {
                    spans.push(Span::styled(
                        format!(" ({})", entry.badge),
                        Style::default().fg(Color::Magenta).bold(),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let border_style = if tui_app.focus == Focus::Roster {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title("Channels & Contacts")
                    .title_style(Style::default().fg(Color::Green)),
            )
            .highlight_style(Style::default().bg(Color::DarkGray));

        let mut roster_state = tui_app.roster_state.clone();
        frame.render_stateful_widget(list, layout[1], &mut roster_state);
    }

    /// Render the open tabs with their unread badges
    fn render_tab_strip_static(frame: &mut Frame, area: Rect, engine: &ConversationEngine) {
        let tabs = engine.tab_strip();
        let selected = tabs.iter().position(|tab| tab.active).unwrap_or(tabs.len());
        let titles: Vec<Line> = tabs
            .into_iter()
            .map(|tab| {
                if tab.badge > 0 {
                    Line::from(format!("{} ({})", tab.label, tab.badge))
                } else {
                    Line::from(tab.label)
                }
            })
            .collect();

        let strip = Tabs::new(titles)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("meshrc")
                    .title_style(Style::default().fg(Color::Cyan).bold()),
            )
            .select(selected)
            .style(Style::default().fg(Color::White))
            .highlight_style(Style::default().bg(Color::Blue).fg(Color::White).bold());

        frame.render_widget(strip, area);
    }

    /// Render the grouped timeline, newest lines at the bottom
    fn render_timeline_static(frame: &mut Frame, area: Rect, engine: &ConversationEngine) {
        let lines = engine.view_lines();
        let visible = area.height.saturating_sub(2) as usize;
        let skip = lines.len().saturating_sub(visible);

        let items: Vec<ListItem> = lines[skip..]
            .iter()
            .map(|line| {
                let sender_style = direction_style(line.direction).bold();
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<5} ", line.time.as_deref().unwrap_or("")),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(
                        format!("{:>10}", line.sender.as_deref().unwrap_or("")),
                        sender_style,
                    ),
                    Span::styled(" │ ", Style::default().fg(Color::DarkGray)),
                    Span::raw(line.text.clone()),
                ]))
            })
            .collect();

        let title = engine
            .active()
            .map(|context| engine.label_for(context))
            .unwrap_or_else(|| "No conversation selected".to_string());
        let timeline = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_style(Style::default().fg(Color::Yellow)),
        );

        frame.render_widget(timeline, area);
    }

    /// Render input area
    fn render_input_static(frame: &mut Frame, area: Rect, tui_app: &TuiApp) {
        let input_style = match tui_app.focus {
            Focus::Input => Style::default().fg(Color::White),
            _ => Style::default().fg(Color::Gray),
        };

        let input = Paragraph::new(format!("> {}", tui_app.input_buffer))
            .style(input_style)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(tui_app.focus.title())
                    .title_style(Style::default().fg(Color::Yellow)),
            );

        frame.render_widget(input, area);

        if tui_app.focus == Focus::Input {
            frame.set_cursor_position((area.x + tui_app.input_cursor as u16 + 3, area.y + 1));
        }
    }

    /// Render connection state and the latest notification
    fn render_status_bar_static(frame: &mut Frame, area: Rect, engine: &ConversationEngine) {
        let state = engine.connection_state();
        let mut spans = vec![
            Span::styled(format!("[{}]", state.as_str()), connection_style(state)),
            Span::raw(" "),
        ];
        match engine.latest_notification() {
            Some(notification) => spans.push(Span::styled(
                notification.message.clone(),
                severity_style(notification.severity),
            )),
            None => spans.push(Span::styled(
                "F1: Help | Ctrl+Q: Quit",
                Style::default().fg(Color::Gray),
            )),
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    /// Render help overlay
    fn render_help_overlay_static(frame: &mut Frame) {
        let area = centered_rect(70, 70, frame.area());

        let help_text = "meshrc Help\n\n\
            Navigation:\n\
            • Ctrl+N / Ctrl+P: Next / previous tab\n\
            • Alt+A: Next tab with unread messages\n\
            • Ctrl+W: Close the current tab\n\
            • Tab: Move between input and the list\n\
            • ↑/↓ and Enter: Pick a channel or contact\n\
            • Ctrl+S: Search contacts\n\
            • Ctrl+F: Star or unstar the current contact\n\
            • Ctrl+A: Add a channel named by the input line (name [key])\n\
            • Ctrl+E: Rename the current channel to the input line\n\
            • Ctrl+D: Delete the current channel\n\
            • F1: Toggle this help\n\
            • Ctrl+Q: Quit\n\n\
            Commands:\n\
            • /status or /rs: Request status from the contact\n\
            • /login <password>: Log in to a repeater\n\
            • /logout: Log out of a repeater\n\
            • /trace [a1,0f,...]: Trace a path of hops";

        let help_paragraph = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help")
                    .title_style(Style::default().fg(Color::Cyan).bold()),
            )
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));

        frame.render_widget(Clear, area);
        frame.render_widget(help_paragraph, area);
    }
}

impl<G: DeviceGateway> Drop for TuiManager<G> {
    fn drop(&mut self) {
        // Restore the terminal even when the loop exits with an error
        let _ = disable_raw_mode();
        let _ = self.terminal.backend_mut().execute(LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// A rectangle centered in `r` taking the given percentages of its size
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

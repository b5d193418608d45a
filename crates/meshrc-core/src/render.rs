//! Timeline rendering with sender/time grouping
//!
//! Consecutive messages from the same sender within [`GROUPING_WINDOW_SECS`]
//! omit the repeated sender label, and within such a run the time label is
//! printed once per minute. The grouping decision always compares against the
//! truly previous message, not the previous visible label.

use std::sync::Arc;

use chrono::{FixedOffset, Local, Offset, TimeZone, Utc};

use crate::types::{Direction, Message, SystemTimeSource, TimeSource, UnixSeconds};

/// Same-sender messages closer than this share one sender label
pub const GROUPING_WINDOW_SECS: i64 = 300;
/// Sender labels are cut to this many characters
pub const SENDER_LABEL_WIDTH: usize = 10;

const TIME_FORMAT: &str = "%H:%M";

// ----------------------------------------------------------------------------
// Display Types
// ----------------------------------------------------------------------------

/// One rendered timeline row; `None` columns are left blank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub time: Option<String>,
    pub sender: Option<String>,
    pub text: String,
    pub direction: Direction,
}

impl DisplayLine {
    /// Fixed-width plain text form: time, right-aligned sender, separator, text
    pub fn to_plain(&self) -> String {
        format!(
            "{:<5} {:>width$} │ {}",
            self.time.as_deref().unwrap_or(""),
            self.sender.as_deref().unwrap_or(""),
            self.text,
            width = SENDER_LABEL_WIDTH
        )
    }
}

/// Grouping memory for incremental rendering of one context's view.
///
/// Empty whenever the view is rebuilt from scratch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderState {
    last: Option<(Option<String>, UnixSeconds)>,
}

impl RenderState {
    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    pub fn last_sender(&self) -> Option<&str> {
        self.last.as_ref().and_then(|(sender, _)| sender.as_deref())
    }

    pub fn last_timestamp(&self) -> Option<UnixSeconds> {
        self.last.as_ref().map(|(_, ts)| *ts)
    }
}

// ----------------------------------------------------------------------------
// Display Zone
// ----------------------------------------------------------------------------

/// Time zone used for `HH:MM` labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    /// Wall-clock local time of the machine running the client
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl DisplayZone {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    pub fn format_minute(&self, timestamp: UnixSeconds) -> String {
        let formatted = match self {
            Self::Local => Local
                .timestamp_opt(timestamp, 0)
                .earliest()
                .map(|dt| dt.format(TIME_FORMAT).to_string()),
            Self::Fixed(offset) => offset
                .timestamp_opt(timestamp, 0)
                .earliest()
                .map(|dt| dt.format(TIME_FORMAT).to_string()),
        };
        formatted.unwrap_or_else(|| "--:--".to_string())
    }
}

// ----------------------------------------------------------------------------
// Log Renderer
// ----------------------------------------------------------------------------

/// Turns message sequences into grouped display lines
#[derive(Clone)]
pub struct LogRenderer {
    zone: DisplayZone,
    clock: Arc<dyn TimeSource>,
}

impl Default for LogRenderer {
    fn default() -> Self {
        Self::new(DisplayZone::Local, Arc::new(SystemTimeSource))
    }
}

impl std::fmt::Debug for LogRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogRenderer").field("zone", &self.zone).finish()
    }
}

impl LogRenderer {
    /// `clock` stands in for messages that carry no timestamp
    pub fn new(zone: DisplayZone, clock: Arc<dyn TimeSource>) -> Self {
        Self { zone, clock }
    }

    /// Render one message after `state`, returning the line and the next state
    pub fn append_one(&self, message: &Message, state: &RenderState) -> (DisplayLine, RenderState) {
        let timestamp = message.timestamp.unwrap_or_else(|| self.clock.now());
        let time_label = self.zone.format_minute(timestamp);

        let (show_sender, show_time) = match &state.last {
            Some((last_sender, last_ts))
                if *last_sender == message.display_sender
                    && timestamp.saturating_sub(*last_ts) < GROUPING_WINDOW_SECS =>
            {
                (false, time_label != self.zone.format_minute(*last_ts))
            }
            _ => (true, true),
        };

        let line = DisplayLine {
            time: show_time.then_some(time_label),
            sender: if show_sender {
                message
                    .display_sender
                    .as_ref()
                    .map(|sender| sender.chars().take(SENDER_LABEL_WIDTH).collect())
            } else {
                None
            },
            text: message.text.clone(),
            direction: message.direction,
        };

        let next = RenderState {
            last: Some((message.display_sender.clone(), timestamp)),
        };
        (line, next)
    }

    /// Render a full sequence from an empty state
    pub fn render<'a, I>(&self, messages: I) -> Vec<DisplayLine>
    where
        I: IntoIterator<Item = &'a Message>,
    {
        self.render_with_state(messages).0
    }

    /// Render a full sequence and keep the final state for later appends
    pub fn render_with_state<'a, I>(&self, messages: I) -> (Vec<DisplayLine>, RenderState)
    where
        I: IntoIterator<Item = &'a Message>,
    {
        messages.into_iter().fold(
            (Vec::new(), RenderState::default()),
            |(mut lines, state), message| {
                let (line, next) = self.append_one(message, &state);
                lines.push(line);
                (lines, next)
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContextId, Enrichment, MessageKind};

    struct FixedClock(UnixSeconds);

    impl TimeSource for FixedClock {
        fn now(&self) -> UnixSeconds {
            self.0
        }
    }

    fn renderer() -> LogRenderer {
        LogRenderer::new(DisplayZone::utc(), Arc::new(FixedClock(7200)))
    }

    fn msg(sender: Option<&str>, text: &str, timestamp: Option<i64>) -> Message {
        Message {
            context: ContextId::Channel(0),
            direction: Direction::Inbound,
            display_sender: sender.map(str::to_string),
            text: text.to_string(),
            timestamp,
            kind: MessageKind::Channel,
            channel_idx: Some(0),
            pubkey_prefix: None,
            enrichment: Enrichment::default(),
        }
    }

    #[test]
    fn test_first_message_shows_everything() {
        let (line, state) = renderer().append_one(
            &msg(Some("Alice"), "hi", Some(0)),
            &RenderState::default(),
        );
        assert_eq!(line.time.as_deref(), Some("00:00"));
        assert_eq!(line.sender.as_deref(), Some("Alice"));
        assert_eq!(state.last_sender(), Some("Alice"));
        assert_eq!(state.last_timestamp(), Some(0));
    }

    #[test]
    fn test_utc_zone_has_zero_offset() {
        let zone = DisplayZone::utc();
        assert_eq!(zone, DisplayZone::Fixed(Utc.fix()));
        if let DisplayZone::Fixed(offset) = zone {
            assert_eq!(offset.local_minus_utc(), 0);
        }
        assert_eq!(zone.format_minute(3600 * 13 + 60 * 7), "13:07");
    }

    #[test]
    fn test_grouping_boundary() {
        let r = renderer();
        let lines = r.render(&[
            msg(Some("Alice"), "a", Some(1000)),
            msg(Some("Alice"), "b", Some(1299)),
        ]);
        assert_eq!(lines[1].sender, None);

        let lines = r.render(&[
            msg(Some("Alice"), "a", Some(1000)),
            msg(Some("Alice"), "b", Some(1300)),
        ]);
        assert_eq!(lines[1].sender.as_deref(), Some("Alice"));
        assert!(lines[1].time.is_some());
    }

    #[test]
    fn test_time_shown_once_per_minute_in_a_run() {
        let lines = renderer().render(&[
            msg(Some("Alice"), "a", Some(60)),
            msg(Some("Alice"), "b", Some(90)),
            msg(Some("Alice"), "c", Some(125)),
        ]);
        assert_eq!(lines[0].time.as_deref(), Some("00:01"));
        assert_eq!(lines[1].time, None);
        assert_eq!(lines[2].time.as_deref(), Some("00:02"));
        assert_eq!(lines[2].sender, None);
    }

    #[test]
    fn test_sender_change_shows_time_even_in_same_minute() {
        let lines = renderer().render(&[
            msg(Some("Alice"), "a", Some(60)),
            msg(Some("Bob"), "b", Some(61)),
        ]);
        assert_eq!(lines[1].time.as_deref(), Some("00:01"));
        assert_eq!(lines[1].sender.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_sender_label_truncated() {
        let lines = renderer().render(&[msg(Some("Bartholomew the Great"), "x", Some(0))]);
        assert_eq!(lines[0].sender.as_deref(), Some("Bartholome"));
    }

    #[test]
    fn test_missing_timestamp_uses_render_clock() {
        let lines = renderer().render(&[msg(None, "x", None)]);
        assert_eq!(lines[0].time.as_deref(), Some("02:00"));
        assert_eq!(lines[0].sender, None);
    }

    #[test]
    fn test_grouping_compares_against_previous_not_visible() {
        // third message is 400s after the first but only 200s after the second
        let lines = renderer().render(&[
            msg(Some("Alice"), "a", Some(0)),
            msg(Some("Alice"), "b", Some(200)),
            msg(Some("Alice"), "c", Some(400)),
        ]);
        assert_eq!(lines[2].sender, None);
    }

    #[test]
    fn test_plain_layout() {
        let line = DisplayLine {
            time: Some("12:34".to_string()),
            sender: Some("Alice".to_string()),
            text: "hello".to_string(),
            direction: Direction::Inbound,
        };
        assert_eq!(line.to_plain(), "12:34      Alice │ hello");
    }
}

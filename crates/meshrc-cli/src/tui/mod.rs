//! Terminal User Interface using ratatui
//!
//! A thin view over the conversation engine: a sidebar with the channel and
//! contact list, a tab strip, the grouped timeline of the active context, an
//! input line and a status line.
//!
//! - [`types`] - Focus, key actions and styles
//! - [`app`] - Input and selection state, key handling
//! - [`manager`] - Terminal setup, event loop and rendering

pub mod app;
pub mod manager;
pub mod types;

pub use app::TuiApp;
pub use manager::TuiManager;

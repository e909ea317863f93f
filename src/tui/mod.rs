//! Terminal monitor for a running session.
//!
//! Layout, top to bottom:
//! - **Top bar**: current blocker and status
//! - **Body**: file tree of the working directory next to an editor
//! - **Bottom bar**: target, editor status and elapsed time
//!
//! The monitor runs in the supervisor process; everything it shows comes
//! from worker messages.

mod app;
mod editor;
mod events;
mod runner;
mod tree;
mod views;

pub use app::{App, Focus};
pub use editor::Editor;
pub use events::{Event, EventHandler};
pub use runner::TuiRunner;
pub use tree::{FileTree, TreeEntry};

use crossterm::{
    ExecutableCommand,
    event::{DisableBracketedPaste, EnableBracketedPaste},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use eyre::Result;
use ratatui::prelude::*;
use std::io::{Stdout, stdout};

/// Type alias for our terminal backend.
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Initialize the terminal for TUI mode.
///
/// Enables raw mode, bracketed paste and switches to the alternate screen.
pub fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to its original state.
pub fn restore_terminal() -> Result<()> {
    stdout().execute(DisableBracketedPaste)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

pub mod colors {
    use ratatui::style::Color;

    pub const BLOCKER: Color = Color::Rgb(255, 215, 0); // Gold
    pub const STATUS: Color = Color::Rgb(0, 255, 127); // Spring green
    pub const FAILED: Color = Color::Rgb(220, 20, 60); // Crimson
    pub const HEADER: Color = Color::Rgb(0, 255, 255); // Cyan
    pub const KEYBIND: Color = Color::Rgb(0, 255, 255); // Cyan
    pub const FOCUS: Color = Color::Rgb(0, 255, 255); // Cyan
    pub const DIM: Color = Color::DarkGray;
}

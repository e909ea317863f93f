//! Event handling for the TUI.
//!
//! Terminal events are read on a blocking task and forwarded over a
//! channel, so `next()` can sit in a `select!` without losing input.

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use eyre::{Result, eyre};
use log::debug;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Unified event type for the TUI.
#[derive(Debug, Clone)]
pub enum Event {
    /// Keyboard input event
    Key(KeyEvent),
    /// Bracketed paste
    Paste(String),
    /// Poll timeout without input
    Tick,
    /// Terminal resize
    Resize(u16, u16),
}

pub struct EventHandler {
    tick_rate: Duration,
    rx: Option<UnboundedReceiver<Event>>,
}

impl EventHandler {
    pub fn new(tick_rate_ms: u64) -> Self {
        Self {
            tick_rate: Duration::from_millis(tick_rate_ms),
            rx: None,
        }
    }

    /// Start the reader task. It exits once the handler is dropped.
    pub fn start(&mut self) {
        if self.rx.is_some() {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let tick_rate = self.tick_rate;

        tokio::task::spawn_blocking(move || {
            loop {
                let event = match read_event(tick_rate) {
                    Ok(event) => event,
                    Err(e) => {
                        debug!("Terminal event reader stopped: {}", e);
                        return;
                    }
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
        });
        self.rx = Some(rx);
    }

    /// Get the next event.
    pub async fn next(&mut self) -> Result<Event> {
        self.start();
        let rx = self.rx.as_mut().ok_or_else(|| eyre!("event reader not started"))?;
        rx.recv().await.ok_or_else(|| eyre!("terminal event stream closed"))
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new(250)
    }
}

fn read_event(tick_rate: Duration) -> Result<Event> {
    if !event::poll(tick_rate)? {
        return Ok(Event::Tick);
    }
    Ok(match event::read()? {
        // Only handle key press events, not release
        CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Event::Key(key),
        CrosstermEvent::Paste(text) => Event::Paste(text),
        CrosstermEvent::Resize(w, h) => Event::Resize(w, h),
        _ => Event::Tick,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_handler_creation() {
        let handler = EventHandler::new(100);
        assert_eq!(handler.tick_rate, Duration::from_millis(100));
        assert!(handler.rx.is_none());
    }

    #[test]
    fn test_event_handler_default() {
        let handler = EventHandler::default();
        assert_eq!(handler.tick_rate, Duration::from_millis(250));
    }
}

//! TUI Runner - main event loop.
//!
//! The `TuiRunner` owns the terminal, app, event handler and the worker
//! supervisor. Each pass renders, then waits for whichever comes first: a
//! terminal event, the message poll, the clock, or a termination signal.

use std::time::Duration;

use eyre::Result;
use log::info;

use super::Tui;
use super::app::App;
use super::events::{Event, EventHandler};
use super::views::render;
use crate::config::SupervisorConfig;
use crate::supervisor::{MonitorState, Signals, Supervisor};

pub struct TuiRunner {
    terminal: Tui,
    app: App,
    event_handler: EventHandler,
    supervisor: Supervisor,
    signals: Signals,
    message_poll: Duration,
    clock: Duration,
}

impl TuiRunner {
    pub fn new(terminal: Tui, supervisor: Supervisor, signals: Signals, config: &SupervisorConfig) -> Self {
        Self {
            terminal,
            app: App::new(),
            event_handler: EventHandler::new(config.message_poll_ms),
            supervisor,
            signals,
            message_poll: Duration::from_millis(config.message_poll_ms),
            clock: Duration::from_millis(config.clock_ms),
        }
    }

    /// Run until the operator quits, a signal arrives, or the worker asks to
    /// shut down. The worker is stopped before this returns.
    pub async fn run(mut self) -> Result<MonitorState> {
        info!("Starting TUI main loop");
        let mut poll = tokio::time::interval(self.message_poll);
        let mut clock = tokio::time::interval(self.clock);

        loop {
            self.terminal.draw(|f| render(&mut self.app, f))?;

            tokio::select! {
                event = self.event_handler.next() => match event? {
                    Event::Key(key) => {
                        self.app.handle_key(key);
                    }
                    Event::Paste(text) => self.app.handle_paste(&text),
                    Event::Tick | Event::Resize(_, _) => {}
                },
                _ = poll.tick() => {
                    if self.supervisor.drain(&mut self.app.monitor) {
                        self.app.sync();
                    }
                }
                _ = clock.tick() => self.app.tick(),
                _ = self.signals.recv() => {
                    self.app.should_quit = true;
                }
            }

            if self.app.should_quit || self.app.monitor.shutdown {
                break;
            }
        }

        info!("TUI main loop ended");
        let exit = self.supervisor.stop(&mut self.app.monitor).await?;
        info!("Worker stopped: {:?}", exit);
        Ok(self.app.monitor)
    }
}

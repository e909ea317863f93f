//! Supervisor side of the process split.
//!
//! The supervisor owns the terminal. It spawns the worker, folds the
//! worker's messages into a `MonitorState`, and on shutdown raises the
//! cancellation signal before joining (or killing) the worker.

mod process;
mod signals;
mod state;

pub use process::{WorkerExit, WorkerHandle};
pub use signals::Signals;
pub use state::{EditorLoad, MonitorState, format_elapsed};

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

use crate::config::SupervisorConfig;
use crate::coordination::CancellationSignal;
use crate::error::Result;
use crate::ipc::Message;

pub struct Supervisor {
    worker: WorkerHandle,
    messages: UnboundedReceiver<Message>,
    cancel: CancellationSignal,
    join_timeout: Duration,
    disconnected: bool,
}

impl Supervisor {
    pub fn start<I, S>(program: &Path, args: I, cancel: CancellationSignal, config: &SupervisorConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let (worker, messages) = WorkerHandle::spawn(program, args)?;
        Ok(Self {
            worker,
            messages,
            cancel,
            join_timeout: Duration::from_millis(config.join_timeout_ms),
            disconnected: false,
        })
    }

    /// Apply every queued message to `state`. Returns true if any arrived.
    pub fn drain(&mut self, state: &mut MonitorState) -> bool {
        let mut changed = false;
        loop {
            match self.messages.try_recv() {
                Ok(message) => {
                    state.apply(message);
                    changed = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        self.disconnected = true;
                        state.mark_worker_exited();
                        changed = true;
                    }
                    break;
                }
            }
        }
        changed
    }

    /// Cancel the worker and wait for it to go away.
    pub async fn stop(self, state: &mut MonitorState) -> Result<WorkerExit> {
        info!("Stopping worker");
        if let Err(e) = self.cancel.cancel() {
            warn!("Could not raise cancellation signal: {}", e);
        }
        state.apply(Message::Shutdown);
        self.worker.join_or_kill(self.join_timeout).await
    }
}

//! Terminal signals observed by the supervisor.

use log::info;
use tokio::signal::unix::{SignalKind, signal};

use crate::error::Result;

/// SIGINT and SIGTERM streams
pub struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    pub fn install() -> Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Resolves on the next SIGINT or SIGTERM
    pub async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => info!("Received SIGINT"),
            _ = self.terminate.recv() => info!("Received SIGTERM"),
        }
    }
}

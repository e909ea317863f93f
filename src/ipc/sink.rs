//! Message sinks: where the worker sends its messages.
//!
//! Sending never blocks on the receiver and never fails the caller; a closed
//! channel only loses messages.

use std::io::Write;
use std::sync::Mutex;

use log::{error, info};

use super::codec::encode_line;
use super::messages::Message;

pub trait MessageSink: Send + Sync {
    fn send(&self, message: Message);
}

/// JSON lines on stdout, read by the supervisor
#[derive(Debug, Default)]
pub struct StdoutSink;

impl MessageSink for StdoutSink {
    fn send(&self, message: Message) {
        let line = match encode_line(&message) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode {} message: {}", message.kind(), e);
                return;
            }
        };

        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(line.as_bytes()).and_then(|_| stdout.flush()) {
            error!("Failed to write {} message: {}", message.kind(), e);
        }
    }
}

/// Logs messages instead of displaying them (headless mode)
#[derive(Debug, Default)]
pub struct LogSink;

impl MessageSink for LogSink {
    fn send(&self, message: Message) {
        match &message {
            Message::FileUpdate { file_path, .. } => {
                info!("[file_update] {}", file_path.as_deref().unwrap_or("<editor>"))
            }
            Message::Shutdown => info!("[shutdown]"),
            Message::Status { data }
            | Message::Blocker { data }
            | Message::EditorStatus { data }
            | Message::NetworkInfo { data }
            | Message::ChangeDirectory { data }
            | Message::OpenModal { data } => info!("[{}] {}", message.kind(), data),
        }
    }
}

/// Keeps every message in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<Message>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Payloads of every message of `kind`
    pub fn data_of(&self, kind: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.kind() == kind)
            .filter_map(|m| match m {
                Message::Status { data }
                | Message::Blocker { data }
                | Message::EditorStatus { data }
                | Message::NetworkInfo { data }
                | Message::ChangeDirectory { data }
                | Message::OpenModal { data } => Some(data),
                Message::FileUpdate { content, .. } => Some(content),
                Message::Shutdown => None,
            })
            .collect()
    }
}

impl MessageSink for CollectingSink {
    fn send(&self, message: Message) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.send(Message::status("a"));
        sink.send(Message::blocker("b"));
        sink.send(Message::status("c"));
        sink.send(Message::Shutdown);

        assert_eq!(sink.messages().len(), 4);
        assert_eq!(sink.data_of("status"), vec!["a".to_string(), "c".to_string()]);
        assert_eq!(sink.messages().last(), Some(&Message::Shutdown));
    }

    #[test]
    fn test_log_sink_accepts_everything() {
        let sink = LogSink;
        sink.send(Message::file_update(None, "x"));
        sink.send(Message::Shutdown);
        sink.send(Message::open_modal("done"));
    }
}

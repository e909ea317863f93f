//! What the monitor shows, folded from worker messages.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::ipc::Message;

/// Content the editor should load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorLoad {
    /// File to edit and save back to; `None` sets the buffer only
    pub path: Option<PathBuf>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct MonitorState {
    pub status: String,
    pub blocker: String,
    pub editor_status: String,
    pub network_info: String,
    pub directory: Option<PathBuf>,
    pub modal: Option<String>,
    /// A shutdown message arrived (or was raised locally)
    pub shutdown: bool,
    /// The worker's message channel closed
    pub worker_exited: bool,
    pending_editor: Option<EditorLoad>,
    started: Instant,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            status: "Waiting".to_string(),
            blocker: "None".to_string(),
            editor_status: "Starting..".to_string(),
            network_info: "No network info".to_string(),
            directory: None,
            modal: None,
            shutdown: false,
            worker_exited: false,
            pending_editor: None,
            started: Instant::now(),
        }
    }

    pub fn apply(&mut self, message: Message) {
        match message {
            Message::Status { data } => self.status = data,
            Message::Blocker { data } => self.blocker = data,
            Message::EditorStatus { data } => self.editor_status = data,
            Message::NetworkInfo { data } => self.network_info = data,
            Message::ChangeDirectory { data } => self.directory = Some(PathBuf::from(data)),
            Message::OpenModal { data } => self.modal = Some(data),
            Message::FileUpdate { file_path, content } => {
                self.pending_editor = Some(EditorLoad {
                    path: file_path.map(PathBuf::from),
                    content,
                })
            }
            Message::Shutdown => self.shutdown = true,
        }
    }

    /// Channel closed without a shutdown message
    pub fn mark_worker_exited(&mut self) {
        if !self.worker_exited && !self.shutdown {
            self.worker_exited = true;
            self.editor_status = "Worker exited".to_string();
        }
    }

    pub fn take_editor_load(&mut self) -> Option<EditorLoad> {
        self.pending_editor.take()
    }

    pub fn dismiss_modal(&mut self) {
        self.modal = None;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// `HH:MM:SS` since the monitor started
    pub fn elapsed_text(&self) -> String {
        format_elapsed(self.elapsed())
    }

    /// Lines printed to the terminal after the monitor closes
    pub fn farewell(&self) -> Vec<String> {
        vec![
            format!("STATUS: {}", self.status),
            format!("BLOCKER: {}", self.blocker),
        ]
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, remainder) = (total / 3600, total % 3600);
    let (minutes, seconds) = (remainder / 60, remainder % 60);
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

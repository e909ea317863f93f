//! Worker → supervisor message envelope.
//!
//! Serialized as one JSON object per line: `{"kind": ..., "data": ...}`, or
//! `{"kind": "file_update", "filePath": ..., "content": ...}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Progress line shown in the status bar
    Status { data: String },
    /// What the session is currently waiting on
    Blocker { data: String },
    EditorStatus { data: String },
    NetworkInfo { data: String },
    /// Directory the file tree should show
    ChangeDirectory { data: String },
    /// Popup text the operator must dismiss
    OpenModal { data: String },
    /// Open `file_path` in the editor with `content`, or just set the content
    FileUpdate {
        #[serde(rename = "filePath", default)]
        file_path: Option<String>,
        content: String,
    },
    /// The worker is done; the supervisor should wind down
    Shutdown,
}

impl Message {
    pub fn status(data: impl Into<String>) -> Self {
        Message::Status { data: data.into() }
    }

    pub fn blocker(data: impl Into<String>) -> Self {
        Message::Blocker { data: data.into() }
    }

    pub fn editor_status(data: impl Into<String>) -> Self {
        Message::EditorStatus { data: data.into() }
    }

    pub fn network_info(data: impl Into<String>) -> Self {
        Message::NetworkInfo { data: data.into() }
    }

    pub fn change_directory(data: impl Into<String>) -> Self {
        Message::ChangeDirectory { data: data.into() }
    }

    pub fn open_modal(data: impl Into<String>) -> Self {
        Message::OpenModal { data: data.into() }
    }

    pub fn file_update(file_path: Option<String>, content: impl Into<String>) -> Self {
        Message::FileUpdate {
            file_path,
            content: content.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Status { .. } => "status",
            Message::Blocker { .. } => "blocker",
            Message::EditorStatus { .. } => "editor_status",
            Message::NetworkInfo { .. } => "network_info",
            Message::ChangeDirectory { .. } => "change_directory",
            Message::OpenModal { .. } => "open_modal",
            Message::FileUpdate { .. } => "file_update",
            Message::Shutdown => "shutdown",
        }
    }
}

//! Manual generation: the operator runs the prompt elsewhere and pastes the
//! answer back through the monitor's editor.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::fs;

use super::{GenerationBackend, GenerationError};
use crate::coordination::CancellationSignal;
use crate::ipc::{Message, MessageSink};

pub const PROMPT_FILE: &str = "quimera.prompt.txt";
pub const ANSWER_FILE: &str = "quimera.answer.txt";

/// Placeholder written into the answer file; anything else counts as an answer
pub const ANSWER_INSTRUCTIONS: &str = "Your current prompt is in quimera.prompt.txt. Run it with your model of choice, \
replace all of this text with the full response (ctrl+l clears, paste, then ctrl+s saves).";

pub struct ManualBackend {
    dir: PathBuf,
    sink: Arc<dyn MessageSink>,
    cancel: CancellationSignal,
    poll_interval: Duration,
}

impl ManualBackend {
    pub fn new(dir: impl Into<PathBuf>, sink: Arc<dyn MessageSink>, cancel: CancellationSignal) -> Self {
        Self {
            dir: dir.into(),
            sink,
            cancel,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn prompt_path(&self) -> PathBuf {
        self.dir.join(PROMPT_FILE)
    }

    pub fn answer_path(&self) -> PathBuf {
        self.dir.join(ANSWER_FILE)
    }

    async fn hand_off(&self, prompt: &str) -> Result<(), GenerationError> {
        fs::create_dir_all(&self.dir).await.map_err(io_fatal)?;
        fs::write(self.prompt_path(), prompt).await.map_err(io_fatal)?;
        fs::write(self.answer_path(), ANSWER_INSTRUCTIONS).await.map_err(io_fatal)?;

        let answer = self.answer_path().to_string_lossy().to_string();
        self.sink.send(Message::change_directory(self.dir.to_string_lossy()));
        self.sink.send(Message::blocker(format!(
            "Waiting for a response: prompt in {}, answer in {}",
            self.prompt_path().display(),
            answer
        )));
        self.sink.send(Message::file_update(Some(answer), ANSWER_INSTRUCTIONS));
        Ok(())
    }

    /// Poll the answer file until it holds something other than the
    /// instructions.
    async fn await_answer(&self, path: &Path) -> Result<String, GenerationError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }

            match fs::read_to_string(path).await {
                // An empty read is a save in progress
                Ok(content) if content != ANSWER_INSTRUCTIONS && !content.trim().is_empty() => {
                    return Ok(content);
                }
                Ok(_) => {}
                Err(e) => debug!("Answer file not readable yet: {}", e),
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn io_fatal(err: std::io::Error) -> GenerationError {
    GenerationError::Fatal(format!("Manual handoff failed: {}", err))
}

#[async_trait]
impl GenerationBackend for ManualBackend {
    async fn request(&mut self, prompt: &str) -> Result<String, GenerationError> {
        self.hand_off(prompt).await?;
        info!("Prompt written to {}, waiting for answer", self.prompt_path().display());

        let answer = self.await_answer(&self.answer_path()).await;
        match &answer {
            Ok(content) => {
                info!("Answer received ({} bytes)", content.len());
                self.sink.send(Message::blocker("Running the generated test"));
            }
            Err(e) => warn!("Manual handoff ended: {}", e),
        }
        answer
    }

    fn name(&self) -> &str {
        "manual"
    }
}

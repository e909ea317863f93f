//! Per-iteration prompt/response records.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::debug;

use crate::domain::Session;
use crate::error::{QuimeraError, Result};

pub const PROMPT_FILE: &str = "prompt.txt";
pub const RESPONSE_FILE: &str = "response.txt";
pub const TIMESTAMP_FILE: &str = "timestamp.txt";

/// One persisted iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub index: u32,
    /// Prompt that produced `response` (for iteration 0, the first prompt)
    pub prompt: String,
    pub response: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl IterationRecord {
    pub fn new(index: u32, prompt: impl Into<String>, response: Option<String>) -> Self {
        Self {
            index,
            prompt: prompt.into(),
            response,
            timestamp: Local::now(),
        }
    }

    /// Write the record's files into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(PROMPT_FILE), &self.prompt)?;
        if let Some(response) = &self.response {
            fs::write(dir.join(RESPONSE_FILE), response)?;
        }
        fs::write(dir.join(TIMESTAMP_FILE), self.timestamp.to_rfc3339())?;
        debug!("Persisted iteration {} to {}", self.index, dir.display());
        Ok(())
    }

    /// Read a record back from `dir`.
    pub fn read_from(index: u32, dir: &Path) -> Result<Self> {
        let prompt = fs::read_to_string(dir.join(PROMPT_FILE))?;

        let response_path = dir.join(RESPONSE_FILE);
        let response = if response_path.exists() {
            Some(fs::read_to_string(response_path)?)
        } else {
            None
        };

        let raw = fs::read_to_string(dir.join(TIMESTAMP_FILE))?;
        let timestamp = DateTime::parse_from_rfc3339(raw.trim())
            .map_err(|e| QuimeraError::Storage(format!("Invalid timestamp in {}: {}", dir.display(), e)))?
            .with_timezone(&Local);

        Ok(Self {
            index,
            prompt,
            response,
            timestamp,
        })
    }
}

/// Where a session's records live.
///
/// On-chain sessions share each iteration directory with that iteration's
/// scratch forge project; local sessions log under `test/quimera/log/`.
#[derive(Debug, Clone)]
pub struct IterationLog {
    session: Session,
}

impl IterationLog {
    pub fn new(session: &Session) -> Self {
        Self {
            session: session.clone(),
        }
    }

    pub fn dir(&self, index: u32) -> PathBuf {
        self.session.iteration_dir(index)
    }

    pub fn append(&self, record: &IterationRecord) -> Result<PathBuf> {
        let dir = self.dir(record.index);
        record.write_to(&dir)?;
        Ok(dir)
    }

    pub fn read(&self, index: u32) -> Result<IterationRecord> {
        IterationRecord::read_from(index, &self.dir(index))
    }
}

//! Run-scoped, append-only activity log.
//!
//! Every entry is echoed to the `log` facade as it is recorded and the whole
//! sequence is written to disk once, as a JSON array, when the run ends.

use chrono::{DateTime, Local};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub sender: Option<String>,
}

#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    entries: Vec<ActivityLogEntry>,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ActivityLog {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, message: impl Into<String>, sender: Option<&str>) {
        let entry = Self::entry(message.into(), sender);
        info!("[{}] {}", entry.timestamp.to_rfc3339(), entry.message);
        self.entries.push(entry);
    }

    /// Same as [`record`](Self::record) but surfaced at warning level.
    pub fn record_failure(&mut self, message: impl Into<String>, sender: Option<&str>) {
        let entry = Self::entry(message.into(), sender);
        warn!("[{}] {}", entry.timestamp.to_rfc3339(), entry.message);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ActivityLogEntry] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the full sequence to disk, replacing any previous file.
    pub fn flush(self) -> Result<PathBuf> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json)?;

        info!("Activity log saved to {:?} ({} entries)", self.path, self.entries.len());
        Ok(self.path)
    }

    fn entry(message: String, sender: Option<&str>) -> ActivityLogEntry {
        ActivityLogEntry {
            timestamp: Local::now(),
            message,
            sender: sender.map(str::to_string),
        }
    }
}

//! Task status board used by the `healthcheck` command.
//!
//! Every deck session writes its own file under the status directory, so
//! concurrently running session processes never touch the same file.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::{load_json, save_json};
use crate::types::{sanitize_file_stem, TaskState, TaskStatus};

pub struct StatusBoard {
    dir: PathBuf,
}

impl StatusBoard {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, deck: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_file_stem(deck)))
    }

    /// Record the current state of a deck session.
    pub fn update(&self, deck: &str, state: TaskState) -> Result<()> {
        let status = TaskStatus {
            deck: deck.to_string(),
            state,
            updated_at: Utc::now(),
        };
        save_json(&status, &self.file_for(deck))?;
        debug!(deck, state = ?state, "Task status updated");
        Ok(())
    }

    /// Like `update`, but a failed write is only logged.
    pub fn record(&self, deck: &str, state: TaskState) {
        if let Err(e) = self.update(deck, state) {
            warn!(deck, error = %e, "Failed to record task status");
        }
    }

    /// All recorded statuses. Unreadable files are skipped.
    pub fn statuses(&self) -> Result<Vec<TaskStatus>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_json::<TaskStatus>(&path) {
                Ok(Some(status)) => out.push(status),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable status"),
            }
        }
        out.sort_by(|a, b| a.deck.cmp(&b.deck));
        Ok(out)
    }

    /// True when at least one deck session reports `running`.
    pub fn any_running(&self) -> Result<bool> {
        Ok(self
            .statuses()?
            .iter()
            .any(|s| s.state == TaskState::Running))
    }

}

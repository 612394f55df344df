//! Shared types for DECKWATCH.
//!
//! These types form the data model used across the engine, the
//! storage layer, and the menu.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Deck
// ---------------------------------------------------------------------------

/// A deck tracked by the registry. The name is the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub name: String,
    pub url: String,
}

impl Deck {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Build a deck for a bare URL, naming it after the last path segment.
    pub fn from_url(url: &str) -> Self {
        let name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty() && !s.contains(':'))
            .unwrap_or("deck");
        Self::new(name, url)
    }

    /// Name safe to use as a file stem (logs, status files).
    pub fn file_stem(&self) -> String {
        sanitize_file_stem(&self.name)
    }
}

/// Replace characters that are awkward in file names.
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() {
        "deck".to_string()
    } else {
        stem
    }
}

/// Title and author as shown on the deck page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeckHeader {
    pub title: String,
    pub author: String,
}

impl fmt::Display for DeckHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] by [{}]", self.title, self.author)
    }
}

// ---------------------------------------------------------------------------
// Convergence session
// ---------------------------------------------------------------------------

/// Mutable state of one price-convergence run.
#[derive(Debug, Clone)]
pub struct ConvergenceSession {
    pub deck_title: String,
    pub deck_author: String,
    pub target_price: Decimal,
    pub poll_interval: Duration,
    pub current_price: Decimal,
    pub attempt_count: u32,
}

impl ConvergenceSession {
    pub fn new(header: &DeckHeader, target_price: Decimal, poll_interval: Duration) -> Self {
        Self {
            deck_title: header.title.clone(),
            deck_author: header.author.clone(),
            target_price,
            poll_interval,
            current_price: Decimal::ZERO,
            attempt_count: 0,
        }
    }

    /// Whether the observed price has reached the target.
    pub fn is_converged(&self) -> bool {
        self.current_price <= self.target_price
    }
}

/// Summary of a finished deck session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub deck: Deck,
    pub header: DeckHeader,
    pub final_price: Decimal,
    pub attempts: u32,
    pub proof_path: PathBuf,
    pub notified: bool,
}

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

/// Lifecycle state of a deck session, as seen by the healthcheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Running => write!(f, "🟢 RUNNING"),
            TaskState::Completed => write!(f, "✅ COMPLETED"),
            TaskState::Failed => write!(f, "🔴 FAILED"),
            TaskState::Cancelled => write!(f, "🟡 CANCELLED"),
        }
    }
}

/// One persisted status entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub deck: String,
    pub state: TaskState,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

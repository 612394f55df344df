//! Error types for deck sessions and the deck registry.
//!
//! Session errors are fatal for the session that raised them; registry
//! errors are shown to the user by the menu, which keeps running.

use std::time::Duration;

use thiserror::Error;

/// Everything that can end a deck session early.
#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Element `{selector}` not available after {timeout:?}")]
    ElementNotFound { selector: String, timeout: Duration },

    #[error("Could not parse a price from {raw:?}")]
    PriceParse { raw: String },

    #[error("WebDriver error: {0}")]
    Driver(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Session cancelled")]
    Cancelled,

    #[error("Target price not reached after {0} attempts")]
    AttemptLimit(u32),
}

impl ScraperError {
    /// True for the element-wait failure, which some optional steps tolerate.
    pub fn is_element_not_found(&self) -> bool {
        matches!(self, ScraperError::ElementNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;

/// Recoverable failures of deck registry edits.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Decklist already contains a deck named [{0}]")]
    Duplicate(String),

    #[error("A deck named [{0}] was not found")]
    NotFound(String),

    #[error("Deck name and URL must not be empty")]
    Blank,

    #[error("Failed to persist decklist: {0:#}")]
    Persist(#[from] anyhow::Error),
}

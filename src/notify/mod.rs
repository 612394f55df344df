//! Price alerts.
//!
//! Defines the `Notifier` trait and the message template shared by all
//! implementations. The production notifier sends email over SMTP.

pub mod email;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::errors::Result;

/// Everything a notification needs to say.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlert {
    pub deck_title: String,
    pub price: Decimal,
    /// Screenshot of the deck page at the converged price.
    pub proof_path: PathBuf,
}

impl PriceAlert {
    pub fn subject(&self) -> String {
        format!("Moxfield Scraper Success on {}!", self.deck_title)
    }

    pub fn body(&self) -> String {
        format!(
            "Optimal price found for {}: €{}! See attachment proof...",
            self.deck_title, self.price
        )
    }

    /// File name used for the attached proof image.
    pub fn attachment_name(&self) -> String {
        proof_file_name(&self.deck_title)
    }
}

/// Name of the proof screenshot for a deck title.
pub fn proof_file_name(deck_title: &str) -> String {
    format!("{deck_title}_proof.png")
}

/// Delivers a price alert to the user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &PriceAlert) -> Result<()>;
}

//! Price convergence loop.
//!
//! Repeatedly applies "set to lowest price" to the deck and re-reads the
//! total until it is at or below the target. The loop has no attempt cap
//! unless one is configured, and stops early when the session is
//! cancelled. Cancellation is checked at each iteration boundary and
//! interrupts the sleep between rounds.

use rust_decimal::Decimal;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::driver::SessionDriver;
use crate::engine::setup::PageSteps;
use crate::errors::{Result, ScraperError};
use crate::types::ConvergenceSession;

/// The two page capabilities the loop needs.
///
/// Kept separate from `SessionDriver` so the loop can be exercised against
/// a scripted price source.
#[async_trait::async_trait]
pub trait PriceSource: Send {
    async fn read_price(&mut self) -> Result<Decimal>;

    /// Refresh the page and apply the reprice action.
    async fn reprice(&mut self) -> Result<()>;
}

/// A `PriceSource` backed by a browser session and the deck page steps.
pub struct PagePriceSource<'d, 's> {
    driver: &'d mut dyn SessionDriver,
    steps: &'s PageSteps<'s>,
}

impl<'d, 's> PagePriceSource<'d, 's> {
    pub fn new(driver: &'d mut dyn SessionDriver, steps: &'s PageSteps<'s>) -> Self {
        Self { driver, steps }
    }
}

#[async_trait::async_trait]
impl PriceSource for PagePriceSource<'_, '_> {
    async fn read_price(&mut self) -> Result<Decimal> {
        self.steps.read_price(self.driver).await
    }

    async fn reprice(&mut self) -> Result<()> {
        self.driver.refresh().await?;
        self.steps.set_price_to_lowest(self.driver).await
    }
}

/// Drive the price down until it reaches `session.target_price`.
///
/// Returns the converged price. `session` carries the latest observed
/// price and the number of reprice rounds even when an error is returned.
pub async fn converge(
    source: &mut dyn PriceSource,
    session: &mut ConvergenceSession,
    max_attempts: Option<u32>,
    cancel: &CancellationToken,
) -> Result<Decimal> {
    info!(
        deck = %session.deck_title,
        target = %session.target_price,
        interval_secs = session.poll_interval.as_secs(),
        "Beginning price-checking phase"
    );
    session.current_price = source.read_price().await?;

    while !session.is_converged() {
        if cancel.is_cancelled() {
            return Err(ScraperError::Cancelled);
        }
        if let Some(limit) = max_attempts {
            if session.attempt_count >= limit {
                return Err(ScraperError::AttemptLimit(limit));
            }
        }

        source.reprice().await?;
        session.attempt_count += 1;
        let before = session.current_price;
        session.current_price = source.read_price().await?;
        info!(
            deck = %session.deck_title,
            attempt = session.attempt_count,
            "Price before: [€{}]\tNow: [€{}]",
            before,
            session.current_price
        );

        if !session.is_converged() {
            pause(session.poll_interval, cancel).await?;
        }
    }

    info!(deck = %session.deck_title, price = %session.current_price, "Optimal price found");
    Ok(session.current_price)
}

/// Sleep between rounds unless cancelled first.
async fn pause(interval: Duration, cancel: &CancellationToken) -> Result<()> {
    if interval.is_zero() {
        return Ok(());
    }
    debug!(secs = interval.as_secs(), "Waiting before next round");
    tokio::select! {
        _ = cancel.cancelled() => Err(ScraperError::Cancelled),
        _ = tokio::time::sleep(interval) => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Deck session runner.
//!
//! Composes the page steps and the convergence loop for one deck:
//! open deck → read header → log in → normalise currency → converge →
//! save proof → notify. The browser driver is moved into the session
//! and released exactly once, whatever the outcome.

use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::driver::SessionDriver;
use crate::engine::convergence::{converge, PagePriceSource};
use crate::engine::setup::PageSteps;
use crate::errors::{Result, ScraperError};
use crate::notify::{proof_file_name, Notifier, PriceAlert};
use crate::storage::status::StatusBoard;
use crate::types::{sanitize_file_stem, ConvergenceSession, Deck, SessionReport, TaskState};

pub struct DeckSession<'a> {
    deck: Deck,
    settings: &'a Settings,
    notifier: Option<&'a dyn Notifier>,
}

impl<'a> DeckSession<'a> {
    pub fn new(deck: Deck, settings: &'a Settings, notifier: Option<&'a dyn Notifier>) -> Self {
        Self {
            deck,
            settings,
            notifier,
        }
    }

    /// Run the session to completion and release the driver.
    pub async fn run(
        &self,
        mut driver: Box<dyn SessionDriver>,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        info!(deck = %self.deck.name, url = %self.deck.url, driver = driver.name(), "Session starting");
        let outcome = self.drive(driver.as_mut(), cancel).await;

        if let Err(e) = driver.quit().await {
            warn!(deck = %self.deck.name, error = %e, "Failed to release browser session");
        }

        match &outcome {
            Ok(report) => info!(
                deck = %self.deck.name,
                price = %report.final_price,
                attempts = report.attempts,
                notified = report.notified,
                "Session finished"
            ),
            Err(e) => error!(deck = %self.deck.name, error = %e, "Session failed"),
        }
        outcome
    }

    /// `run`, bracketed by status board updates: `running` before,
    /// then `completed`, `cancelled` or `failed`.
    pub async fn run_tracked(
        &self,
        board: &StatusBoard,
        driver: Box<dyn SessionDriver>,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        board.record(&self.deck.name, TaskState::Running);
        let outcome = self.run(driver, cancel).await;
        let state = match &outcome {
            Ok(_) => TaskState::Completed,
            Err(ScraperError::Cancelled) => TaskState::Cancelled,
            Err(_) => TaskState::Failed,
        };
        board.record(&self.deck.name, state);
        outcome
    }

    async fn drive(
        &self,
        driver: &mut dyn SessionDriver,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        let settings = self.settings;
        let steps = PageSteps::from_settings(settings);

        driver.navigate(&self.deck.url).await?;
        let header = steps.read_header(driver).await?;

        steps
            .login(
                driver,
                settings.site.username.as_ref(),
                settings.site.password.as_ref(),
            )
            .await?;

        if steps
            .normalize_currency(driver, &settings.site.affiliate_settings_url())
            .await?
        {
            info!(deck = %self.deck.name, "Display currency changed");
        }

        driver.navigate(&self.deck.url).await?;

        let mut session = ConvergenceSession::new(
            &header,
            settings.watch.price_target,
            settings.watch.poll_interval(),
        );
        let final_price = {
            let mut source = PagePriceSource::new(driver, &steps);
            converge(&mut source, &mut session, settings.watch.max_attempts, cancel).await?
        };

        let proof_path = self.proof_path(&header.title);
        driver.screenshot(&proof_path).await?;

        let alert = PriceAlert {
            deck_title: header.title.clone(),
            price: final_price,
            proof_path: proof_path.clone(),
        };
        let notified = self.send_alert(&alert).await?;

        Ok(SessionReport {
            deck: self.deck.clone(),
            header,
            final_price,
            attempts: session.attempt_count,
            proof_path,
            notified,
        })
    }

    async fn send_alert(&self, alert: &PriceAlert) -> Result<bool> {
        let mail = &self.settings.mail;
        if !mail.enabled {
            return Ok(false);
        }
        if !mail.is_complete() {
            warn!("Email notification settings are not fully configured");
            return Ok(false);
        }
        let Some(notifier) = self.notifier else {
            warn!("Email notification enabled but no notifier available");
            return Ok(false);
        };
        notifier.notify(alert).await?;
        Ok(true)
    }

    /// Where the proof screenshot for a deck title is written.
    pub fn proof_path(&self, deck_title: &str) -> PathBuf {
        self.settings
            .paths
            .data_dir
            .join(proof_file_name(&sanitize_file_stem(deck_title)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! One-shot page action sequences: deck header, login, currency
//! normalisation, and the "set to lowest" reprice action.
//!
//! Each step waits (bounded) for the element it needs and fails the
//! session if it never shows up. Nothing here retries.

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::driver::selectors::Selectors;
use crate::driver::SessionDriver;
use crate::engine::price::{is_canonical, parse_price};
use crate::errors::{Result, ScraperError};
use crate::types::DeckHeader;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The cookie banner is optional; do not wait long for it.
const COOKIE_BANNER_WAIT: Duration = Duration::from_secs(3);

/// Wait for the affiliate "move up" arrow before assuming it is gone.
const AFFILIATE_ARROW_WAIT: Duration = Duration::from_secs(2);

/// Upper bound on "move up" clicks; the affiliate list is short.
const MAX_AFFILIATE_MOVES: u32 = 20;

/// Re-read interval while the price field is still empty.
const PRICE_TEXT_POLL: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Page steps
// ---------------------------------------------------------------------------

/// Page action sequences bound to one set of selectors and timeouts.
pub struct PageSteps<'a> {
    selectors: &'a Selectors,
    timeout: Duration,
    settle_delay: Duration,
}

impl<'a> PageSteps<'a> {
    pub fn new(selectors: &'a Selectors, timeout: Duration, settle_delay: Duration) -> Self {
        Self {
            selectors,
            timeout,
            settle_delay,
        }
    }

    pub fn from_settings(settings: &'a Settings) -> Self {
        Self::new(
            &settings.selectors,
            settings.watch.element_timeout(),
            settings.watch.settle_delay(),
        )
    }

    async fn click_when_ready(&self, driver: &mut dyn SessionDriver, selector: &str) -> Result<()> {
        let element = driver.locate(selector, self.timeout).await?;
        driver.click(&element).await
    }

    async fn read_when_ready(&self, driver: &mut dyn SessionDriver, selector: &str) -> Result<String> {
        let element = driver.locate(selector, self.timeout).await?;
        driver.read_text(&element).await
    }

    /// Read the deck title and author from the deck page.
    pub async fn read_header(&self, driver: &mut dyn SessionDriver) -> Result<DeckHeader> {
        let title = self.read_when_ready(driver, &self.selectors.deck_title).await?;
        let author = self.read_when_ready(driver, &self.selectors.deck_author).await?;
        let header = DeckHeader {
            title: title.trim().to_string(),
            author: author.trim().to_string(),
        };
        info!(deck = %header.title, author = %header.author, "Deck loaded");
        Ok(header)
    }

    /// Sign in with the configured credentials.
    ///
    /// Missing or empty credentials are a configuration error and fail
    /// before the page is touched.
    pub async fn login(
        &self,
        driver: &mut dyn SessionDriver,
        username: Option<&SecretString>,
        password: Option<&SecretString>,
    ) -> Result<()> {
        let (username, password) = match (non_empty(username), non_empty(password)) {
            (Some(u), Some(p)) => (u, p),
            _ => {
                return Err(ScraperError::Config(
                    "Moxfield credentials are not fully configured".into(),
                ))
            }
        };

        debug!("Initiating login");
        self.click_when_ready(driver, &self.selectors.login_link).await?;
        self.accept_cookies(driver).await?;

        let field = driver.locate(&self.selectors.username, self.timeout).await?;
        driver.type_text(&field, username).await?;
        debug!("Entered username");

        let field = driver.locate(&self.selectors.password, self.timeout).await?;
        driver.type_text(&field, password).await?;
        debug!("Entered password");

        self.click_when_ready(driver, &self.selectors.sign_in).await?;
        driver
            .locate(&self.selectors.logged_in_marker, self.timeout)
            .await?;
        info!("Logged in");
        Ok(())
    }

    /// Dismiss the cookie consent banner if it is shown.
    async fn accept_cookies(&self, driver: &mut dyn SessionDriver) -> Result<()> {
        let wait = self.timeout.min(COOKIE_BANNER_WAIT);
        match driver.locate(&self.selectors.accept_cookies, wait).await {
            Ok(button) => {
                driver.click(&button).await?;
                debug!("Accepted cookies");
                Ok(())
            }
            Err(e) if e.is_element_not_found() => {
                debug!("No cookie banner, continuing");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Raw text of the price field, once it is non-empty.
    pub async fn read_price_text(&self, driver: &mut dyn SessionDriver) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let text = self.read_when_ready(driver, &self.selectors.price).await?;
            if !text.trim().is_empty() {
                return Ok(text);
            }
            if Instant::now() >= deadline {
                return Err(ScraperError::ElementNotFound {
                    selector: self.selectors.price.clone(),
                    timeout: self.timeout,
                });
            }
            tokio::time::sleep(PRICE_TEXT_POLL).await;
        }
    }

    pub async fn read_price(&self, driver: &mut dyn SessionDriver) -> Result<Decimal> {
        let text = self.read_price_text(driver).await?;
        parse_price(&text)
    }

    /// Switch the displayed currency to euros if it is not already.
    ///
    /// Moves the Cardmarket affiliate to the top of the provider list and
    /// saves. Returns whether a change was made. Leaves the browser on the
    /// settings page when it does; the caller navigates back.
    pub async fn normalize_currency(
        &self,
        driver: &mut dyn SessionDriver,
        settings_url: &str,
    ) -> Result<bool> {
        let text = self.read_price_text(driver).await?;
        if is_canonical(&text) {
            debug!("Currency is already euros");
            return Ok(false);
        }

        info!(price = %text.trim(), "Currency is not euros, changing provider");
        driver.navigate(settings_url).await?;

        let wait = self.timeout.min(AFFILIATE_ARROW_WAIT);
        let mut moves = 0;
        loop {
            match driver.locate(&self.selectors.affiliate_move_up, wait).await {
                Ok(arrow) => {
                    if moves == MAX_AFFILIATE_MOVES {
                        return Err(ScraperError::Driver(format!(
                            "Cardmarket affiliate still movable after {MAX_AFFILIATE_MOVES} moves"
                        )));
                    }
                    driver.click(&arrow).await?;
                    moves += 1;
                    tokio::time::sleep(self.settle_delay.min(Duration::from_secs(1))).await;
                }
                Err(e) if e.is_element_not_found() => break,
                Err(e) => return Err(e),
            }
        }
        debug!(moves, "Cardmarket affiliate is listed at the top");

        self.click_when_ready(driver, &self.selectors.save_settings)
            .await?;
        tokio::time::sleep(self.settle_delay).await;
        info!("Currency set to euros");
        Ok(true)
    }

    /// Open the deck menu and apply "set to lowest price".
    pub async fn set_price_to_lowest(&self, driver: &mut dyn SessionDriver) -> Result<()> {
        self.click_when_ready(driver, &self.selectors.more_menu).await?;
        self.click_when_ready(driver, &self.selectors.set_to_lowest)
            .await?;
        self.click_when_ready(driver, &self.selectors.confirm_reprice)
            .await?;
        // The menu trigger comes back once the modal has closed.
        driver.locate(&self.selectors.more_menu, self.timeout).await?;
        debug!("Price set to lowest");
        Ok(())
    }
}

fn non_empty(secret: Option<&SecretString>) -> Option<&str> {
    let value = secret?.expose_secret().as_str();
    if value.trim().is_empty() {
        warn!("Ignoring blank credential");
        None
    } else {
        Some(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Fake browser for integration testing.
//!
//! Provides a deterministic `SessionDriver` that serves a Moxfield-like
//! deck page from memory. Each confirmed "set to lowest price" advances
//! the deck total to the next scripted value.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use deckwatch::driver::selectors::Selectors;
use deckwatch::driver::{Element, SessionDriver};
use deckwatch::errors::{Result, ScraperError};
use deckwatch::notify::{Notifier, PriceAlert};

#[derive(Debug, Default)]
struct PageState {
    prices: VecDeque<String>,
    current: String,
    euros: bool,
    cookie_banner: bool,
    affiliate_moves_left: u32,
    fail_on: Option<String>,
    fail_screenshot: bool,
    cancel_on_reprice: Option<CancellationToken>,
    visited: Vec<String>,
    reprices: u32,
    quits: u32,
    screenshots: Vec<PathBuf>,
}

/// In-memory deck page. Clones share state, so a test keeps one handle
/// for assertions after the session consumed the other.
#[derive(Clone)]
pub struct FakeBrowser {
    selectors: Selectors,
    state: Arc<Mutex<PageState>>,
}

impl FakeBrowser {
    /// A page showing euro prices that step through `prices` on each reprice.
    pub fn new(prices: &[&str]) -> Self {
        let mut prices: VecDeque<String> = prices.iter().map(|p| p.to_string()).collect();
        let current = prices.pop_front().unwrap_or_default();
        Self {
            selectors: Selectors::default(),
            state: Arc::new(Mutex::new(PageState {
                prices,
                current,
                euros: true,
                ..Default::default()
            })),
        }
    }

    /// Show dollar prices until the affiliate order has been saved.
    pub fn in_dollars(self, affiliate_moves: u32) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            s.euros = false;
            s.affiliate_moves_left = affiliate_moves;
        }
        self
    }

    pub fn with_cookie_banner(self) -> Self {
        self.state.lock().unwrap().cookie_banner = true;
        self
    }

    /// Make every lookup of `selector` time out.
    pub fn fail_on(self, selector: &str) -> Self {
        self.state.lock().unwrap().fail_on = Some(selector.to_string());
        self
    }

    pub fn fail_screenshot(self) -> Self {
        self.state.lock().unwrap().fail_screenshot = true;
        self
    }

    /// Cancel `token` when a reprice is confirmed.
    pub fn cancel_on_reprice(self, token: CancellationToken) -> Self {
        self.state.lock().unwrap().cancel_on_reprice = Some(token);
        self
    }

    pub fn selectors(&self) -> &Selectors {
        &self.selectors
    }

    pub fn quits(&self) -> u32 {
        self.state.lock().unwrap().quits
    }

    pub fn reprices(&self) -> u32 {
        self.state.lock().unwrap().reprices
    }

    pub fn euros(&self) -> bool {
        self.state.lock().unwrap().euros
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().screenshots.clone()
    }

    fn price_text(&self, s: &PageState) -> String {
        if s.euros {
            format!("€{}", s.current)
        } else {
            format!("${} (≈ €{})", s.current, s.current)
        }
    }
}

fn not_found(selector: &str, timeout: Duration) -> ScraperError {
    ScraperError::ElementNotFound {
        selector: selector.to_string(),
        timeout,
    }
}

#[async_trait]
impl SessionDriver for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.state.lock().unwrap().visited.push(url.to_string());
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        Ok(())
    }

    async fn locate(&mut self, selector: &str, timeout: Duration) -> Result<Element> {
        let s = self.state.lock().unwrap();
        if s.fail_on.as_deref() == Some(selector) {
            return Err(not_found(selector, timeout));
        }
        if selector == self.selectors.accept_cookies && !s.cookie_banner {
            return Err(not_found(selector, timeout));
        }
        if selector == self.selectors.affiliate_move_up && s.affiliate_moves_left == 0 {
            return Err(not_found(selector, timeout));
        }
        Ok(Element {
            id: format!("el-{selector}"),
            selector: selector.to_string(),
        })
    }

    async fn click(&mut self, element: &Element) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        let sel = &self.selectors;
        if element.selector == sel.confirm_reprice {
            s.reprices += 1;
            if let Some(next) = s.prices.pop_front() {
                s.current = next;
            }
            if let Some(token) = &s.cancel_on_reprice {
                token.cancel();
            }
        } else if element.selector == sel.affiliate_move_up {
            s.affiliate_moves_left -= 1;
        } else if element.selector == sel.save_settings {
            s.euros = true;
        } else if element.selector == sel.accept_cookies {
            s.cookie_banner = false;
        }
        Ok(())
    }

    async fn type_text(&mut self, _element: &Element, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn read_text(&mut self, element: &Element) -> Result<String> {
        let s = self.state.lock().unwrap();
        let sel = &self.selectors;
        let text = if element.selector == sel.deck_title {
            "Krenko Tokens".to_string()
        } else if element.selector == sel.deck_author {
            "goblin_fan".to_string()
        } else if element.selector == sel.price {
            self.price_text(&s)
        } else {
            String::new()
        };
        Ok(text)
    }

    async fn screenshot(&mut self, path: &Path) -> Result<()> {
        if self.state.lock().unwrap().fail_screenshot {
            return Err(ScraperError::Driver("screenshot failed".into()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"\x89PNG fake")?;
        self.state.lock().unwrap().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        self.state.lock().unwrap().quits += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Notifier that records every alert it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<PriceAlert>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<PriceAlert> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &PriceAlert) -> Result<()> {
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `settings.toml` and deserializes into strongly-typed structs.
//! Every section is optional. After the file is parsed, well-known
//! environment variables (usually supplied through a `.env` file) take
//! precedence, so credentials never have to live in the TOML file.
//! Secrets are wrapped in `SecretString` and only exposed at the point
//! of use.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::driver::selectors::Selectors;

/// Default settings file, relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub selectors: Selectors,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WatchConfig {
    /// Stop once the deck price is at or below this value.
    pub price_target: Decimal,
    /// Seconds to wait between reprice rounds.
    pub poll_interval_secs: u64,
    /// Optional cap on reprice rounds. `None` polls until cancelled.
    pub max_attempts: Option<u32>,
    /// How long to wait for a page element before giving up.
    pub element_timeout_secs: u64,
    /// Pause after actions the page applies asynchronously (saving settings).
    pub settle_delay_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            price_target: dec!(25.00),
            poll_interval_secs: 300,
            max_attempts: None,
            element_timeout_secs: 10,
            settle_delay_ms: 3000,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub username: Option<SecretString>,
    pub password: Option<SecretString>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.moxfield.com".to_string(),
            username: None,
            password: None,
        }
    }
}

impl SiteConfig {
    /// Page where the preferred price provider (and thus currency) is chosen.
    pub fn affiliate_settings_url(&self) -> String {
        format!(
            "{}/account/settings/affiliates",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DriverConfig {
    /// Location of the `chromedriver` executable.
    pub path: PathBuf,
    /// Driver port. `0` gives every session its own free port.
    pub port: u16,
    pub headless: bool,
    /// Browser binary, when it is not on the default search path.
    pub browser_binary: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
    /// Seconds to wait for the driver process to accept connections.
    pub startup_timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chromedriver"),
            port: 0,
            headless: true,
            browser_binary: None,
            window_width: 2560,
            window_height: 1440,
            startup_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub enabled: bool,
    pub sender: Option<String>,
    pub password: Option<SecretString>,
    pub receiver: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sender: None,
            password: None,
            receiver: None,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
        }
    }
}

impl MailConfig {
    /// Sender, password and receiver are all present and non-empty.
    pub fn is_complete(&self) -> bool {
        let filled = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        filled(&self.sender)
            && filled(&self.receiver)
            && self
                .password
                .as_ref()
                .is_some_and(|p| !p.expose_secret().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Echo session logs to the console as well as the log file.
    pub tail: bool,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// Proof screenshots and task status files go here.
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub decks_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Data"),
            logs_dir: PathBuf::from("Data/Logs"),
            decks_file: PathBuf::from("Data/decks.json"),
        }
    }
}

impl PathsConfig {
    pub fn status_dir(&self) -> PathBuf {
        self.data_dir.join("status")
    }
}

impl Settings {
    /// Load settings from a TOML file, then apply process environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let mut settings = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides using the flat key names of the `.env` file.
    ///
    /// Empty values are ignored so that a blank line in `.env` does not
    /// wipe out a value from the settings file.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TARGET_PRICE").or_else(|| get("PRICE_TARGET")) {
            self.watch.price_target = Decimal::from_str(v.trim())
                .with_context(|| format!("TARGET_PRICE is not a decimal: {v}"))?;
        }
        if let Some(v) = get("UPDATE_FREQUENCY") {
            self.watch.poll_interval_secs = v
                .trim()
                .parse()
                .with_context(|| format!("UPDATE_FREQUENCY is not a whole number of seconds: {v}"))?;
        }
        if let Some(v) = get("MOXFIELD_USERNAME") {
            self.site.username = Some(SecretString::new(v));
        }
        if let Some(v) = get("MOXFIELD_PASSWORD") {
            self.site.password = Some(SecretString::new(v));
        }
        if let Some(v) = get("WEBDRIVER_PATH") {
            self.driver.path = PathBuf::from(v);
        }
        if let Some(v) = get("SEND_EMAIL_NOTIFICATION").or_else(|| get("SEND_MAILS")) {
            self.mail.enabled = parse_bool("SEND_EMAIL_NOTIFICATION", &v)?;
        }
        if let Some(v) = get("SENDER_EMAIL_ADDRESS") {
            self.mail.sender = Some(v);
        }
        if let Some(v) = get("SENDER_EMAIL_PASSWORD") {
            self.mail.password = Some(SecretString::new(v));
        }
        if let Some(v) = get("RECEIVER_EMAIL_ADDRESS") {
            self.mail.receiver = Some(v);
        }
        if let Some(v) = get("TAIL_LOGS") {
            self.logging.tail = parse_bool("TAIL_LOGS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.watch.price_target <= Decimal::ZERO {
            bail!(
                "watch.price_target must be positive, got {}",
                self.watch.price_target
            );
        }
        if self.watch.max_attempts == Some(0) {
            bail!("watch.max_attempts must be at least 1 when set");
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("{key} is not a boolean: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! W3C WebDriver session over HTTP.
//!
//! Spawns a local `chromedriver`, opens one Chrome session and speaks the
//! WebDriver JSON protocol to it with `reqwest`.
//!
//! Protocol: https://www.w3.org/TR/webdriver2/
//! Endpoint: http://127.0.0.1:{port}/session/{id}/...

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Element, SessionDriver};
use crate::config::DriverConfig;
use crate::errors::{Result, ScraperError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const DRIVER_NAME: &str = "chromedriver";

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// How often `locate` re-queries the page while waiting.
const LOCATE_POLL: Duration = Duration::from_millis(250);

/// Upper bound on any single HTTP round-trip (page loads can be slow).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

/// Returns the full document size so the screenshot has no scrollbars.
const PAGE_SIZE_SCRIPT: &str =
    "return [document.body.parentNode.scrollWidth, document.body.parentNode.scrollHeight];";

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct WindowRect {
    width: i64,
    height: i64,
}

#[derive(Debug, Deserialize)]
struct DriverStatus {
    #[serde(default)]
    ready: bool,
}

/// Outcome of one WebDriver call that reached the server.
type Reply = std::result::Result<Value, WireError>;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct WebDriverSession {
    http: Client,
    server: String,
    session_id: Option<String>,
    process: Option<Child>,
}

impl WebDriverSession {
    /// Start `chromedriver`, wait until it is ready and open a browser session.
    pub async fn launch(cfg: &DriverConfig) -> Result<Self> {
        let port = driver_port(cfg.port)?;
        info!(path = %cfg.path.display(), port, "Starting WebDriver");
        let child = Command::new(&cfg.path)
            .arg(format!("--port={port}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ScraperError::Config(format!(
                    "Failed to start driver at {}: {e}",
                    cfg.path.display()
                ))
            })?;

        let mut session = Self::attach(format!("http://127.0.0.1:{port}"), Some(child))?;
        session
            .wait_until_ready(Duration::from_secs(cfg.startup_timeout_secs))
            .await?;
        session.open(cfg).await?;
        Ok(session)
    }

    /// Connect to an already running WebDriver server without a session.
    pub fn attach(server: String, process: Option<Child>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            server: server.trim_end_matches('/').to_string(),
            session_id: None,
            process,
        })
    }

    /// Poll `/status` until the driver is ready. Fails as soon as the
    /// spawned driver process has exited, so a server left on the port by
    /// someone else is never mistaken for ours.
    async fn wait_until_ready(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let url = format!("{}/status", self.server);
        loop {
            let ready = match self.http.get(&url).send().await {
                Ok(resp) => resp
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|v| serde_json::from_value::<DriverStatus>(v["value"].clone()).ok())
                    .is_some_and(|s| s.ready),
                Err(_) => false,
            };
            if let Some(child) = self.process.as_mut() {
                if let Some(status) = child.try_wait()? {
                    return Err(ScraperError::Driver(format!(
                        "{DRIVER_NAME} exited before becoming ready ({status})"
                    )));
                }
            }
            if ready {
                debug!(server = %self.server, "WebDriver ready");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScraperError::Driver(format!(
                    "{} did not become ready within {timeout:?}",
                    self.server
                )));
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    async fn open(&mut self, cfg: &DriverConfig) -> Result<()> {
        let url = format!("{}/session", self.server);
        let resp = self
            .http
            .post(&url)
            .json(&capabilities(cfg))
            .send()
            .await?;
        let reply = decode(resp).await?;
        let value = reply.map_err(protocol_error)?;
        let created: NewSession = serde_json::from_value(value)
            .map_err(|e| ScraperError::Driver(format!("Unexpected new-session reply: {e}")))?;
        info!(session_id = %created.session_id, "Browser session opened");
        self.session_id = Some(created.session_id);
        Ok(())
    }

    fn session_url(&self, path: &str) -> Result<String> {
        let id = self
            .session_id
            .as_deref()
            .ok_or_else(|| ScraperError::Driver("No open browser session".into()))?;
        Ok(format!("{}/session/{id}{path}", self.server))
    }

    /// Send one command; protocol errors are returned, not raised.
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Reply> {
        let url = self.session_url(path)?;
        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await?;
        decode(resp).await
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.send(method, path, body).await?.map_err(protocol_error)
    }

    async fn find(&self, selector: &str) -> Result<Option<String>> {
        let body = json!({ "using": "css selector", "value": selector });
        match self.send(Method::POST, "/element", Some(body)).await? {
            Ok(value) => element_id(&value)
                .map(Some)
                .ok_or_else(|| ScraperError::Driver(format!("Malformed element reply: {value}"))),
            Err(e) if e.error == "no such element" => Ok(None),
            Err(e) => Err(protocol_error(e)),
        }
    }

    async fn is_interactable(&self, id: &str) -> Result<bool> {
        let displayed = self
            .command(Method::GET, &format!("/element/{id}/displayed"), None)
            .await?;
        let enabled = self
            .command(Method::GET, &format!("/element/{id}/enabled"), None)
            .await?;
        Ok(displayed.as_bool() == Some(true) && enabled.as_bool() == Some(true))
    }

    async fn window_rect(&self) -> Result<WindowRect> {
        let value = self.command(Method::GET, "/window/rect", None).await?;
        serde_json::from_value(value)
            .map_err(|e| ScraperError::Driver(format!("Unexpected window rect: {e}")))
    }

    async fn set_window_size(&self, width: i64, height: i64) -> Result<()> {
        self.command(
            Method::POST,
            "/window/rect",
            Some(json!({ "width": width, "height": height })),
        )
        .await?;
        Ok(())
    }

    async fn capture_body(&self) -> Result<Vec<u8>> {
        let body = self
            .find("body")
            .await?
            .ok_or_else(|| ScraperError::Driver("Page has no body element".into()))?;
        let encoded = self
            .command(Method::GET, &format!("/element/{body}/screenshot"), None)
            .await?;
        let encoded = encoded
            .as_str()
            .ok_or_else(|| ScraperError::Driver("Screenshot reply is not a string".into()))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| ScraperError::Driver(format!("Screenshot is not valid base64: {e}")))
    }
}

#[async_trait]
impl SessionDriver for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        debug!(url, "Navigated");
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        self.command(Method::POST, "/refresh", Some(json!({}))).await?;
        Ok(())
    }

    async fn locate(&mut self, selector: &str, timeout: Duration) -> Result<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(id) = self.find(selector).await? {
                // A stale reference between find and the checks just means "try again".
                if self.is_interactable(&id).await.unwrap_or(false) {
                    return Ok(Element {
                        id,
                        selector: selector.to_string(),
                    });
                }
            }
            if Instant::now() >= deadline {
                return Err(ScraperError::ElementNotFound {
                    selector: selector.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(LOCATE_POLL).await;
        }
    }

    async fn click(&mut self, element: &Element) -> Result<()> {
        self.command(
            Method::POST,
            &format!("/element/{}/click", element.id),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn type_text(&mut self, element: &Element, text: &str) -> Result<()> {
        self.command(
            Method::POST,
            &format!("/element/{}/value", element.id),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn read_text(&mut self, element: &Element) -> Result<String> {
        let value = self
            .command(Method::GET, &format!("/element/{}/text", element.id), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<()> {
        let original = self.window_rect().await?;
        let size = self
            .command(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": PAGE_SIZE_SCRIPT, "args": [] })),
            )
            .await?;
        let (width, height) = match (size[0].as_i64(), size[1].as_i64()) {
            (Some(w), Some(h)) => (w, h),
            _ => (original.width, original.height),
        };
        debug!(width, height, "Resizing window for full-page screenshot");
        self.set_window_size(width, height).await?;

        let captured = self.capture_body().await;
        self.set_window_size(original.width, original.height).await?;
        let png = captured?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &png).await?;
        info!(path = %path.display(), bytes = png.len(), "Screenshot saved");
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        let mut outcome = Ok(());
        if self.session_id.is_some() {
            outcome = self.command(Method::DELETE, "", None).await.map(|_| ());
            self.session_id = None;
        }
        if let Some(mut child) = self.process.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Driver process did not stop cleanly");
            }
        }
        debug!("Browser session released");
        outcome
    }

    fn name(&self) -> &'static str {
        DRIVER_NAME
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// New-session payload for a stripped-down, automation-friendly Chrome.
pub fn capabilities(cfg: &DriverConfig) -> Value {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-gpu".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-extensions".to_string(),
        "--disable-crash-reporter".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--log-level=3".to_string(),
        format!("--window-size={},{}", cfg.window_width, cfg.window_height),
        format!("--user-agent={USER_AGENT}"),
    ];
    if cfg.headless {
        args.push("--headless=new".to_string());
    }

    let mut chrome = json!({
        "args": args,
        "excludeSwitches": ["enable-logging", "enable-automation"],
        "prefs": { "profile.managed_default_content_settings.images": 2 },
    });
    if let Some(binary) = &cfg.browser_binary {
        chrome["binary"] = json!(binary.to_string_lossy());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "timeouts": { "pageLoad": 300_000 },
                "goog:chromeOptions": chrome,
            }
        }
    })
}

/// Port for a new driver process. `0` picks a free port; any other value
/// must not already be in use.
pub fn driver_port(configured: u16) -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", configured)).map_err(|e| {
        ScraperError::Driver(format!("Port {configured} is not available for {DRIVER_NAME}: {e}"))
    })?;
    Ok(listener.local_addr()?.port())
}

/// Extract the element reference from a find-element reply.
fn element_id(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
}

async fn decode(resp: reqwest::Response) -> Result<Reply> {
    let ok = resp.status().is_success();
    let mut body: Value = resp.json().await?;
    let value = body["value"].take();
    if ok {
        return Ok(Ok(value));
    }
    match serde_json::from_value::<WireError>(value.clone()) {
        Ok(err) => Ok(Err(err)),
        Err(_) => Err(ScraperError::Driver(format!("Unexpected error reply: {value}"))),
    }
}

fn protocol_error(err: WireError) -> ScraperError {
    ScraperError::Driver(format!("{}: {}", err.error, err.message))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

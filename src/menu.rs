//! Interactive menu.
//!
//! Lists the registered decks, starts one `watch` process per deck, shows
//! the session logs and edits the deck registry. Registry errors are shown
//! to the user and the menu keeps going.

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Input, Select};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::logging::collect_logs;
use crate::storage::registry::DeckRegistry;
use crate::types::Deck;

/// How long a stopping session gets to release its browser.
const STOP_GRACE: Duration = Duration::from_secs(15);
const STOP_POLL: Duration = Duration::from_millis(100);

const LOGO: &str = r#"
 █▄ ▄█ ▄▀▄ ▀▄▀ █▀ █ ██▀ █   █▀▄   █▀▄ ██▀ ▄▀▀ █▄▀ █   █ ▄▀▄ ▀█▀ ▄▀▀ █▄█
 █ ▀ █ ▀▄▀ █ █ █▀ █ █▄▄ █▄▄ █▄▀   █▄▀ █▄▄ ▀▄▄ █ █ ▀▄▀▄▀ █▀█  █  ▀▄▄ █ █
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Start,
    TailLogs,
    AddDeck,
    RemoveDeck,
    Quit,
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuAction::Start => "Start scraping",
            MenuAction::TailLogs => "Tail logs",
            MenuAction::AddDeck => "Add deck",
            MenuAction::RemoveDeck => "Remove deck",
            MenuAction::Quit => "Quit",
        };
        write!(f, "{label}")
    }
}

/// The options offered for the current state.
pub fn available_actions(has_decks: bool, running: bool) -> Vec<MenuAction> {
    use MenuAction::*;
    match (has_decks, running) {
        (true, false) => vec![Start, TailLogs, AddDeck, RemoveDeck, Quit],
        (_, true) => vec![TailLogs, AddDeck, RemoveDeck, Quit],
        (false, false) => vec![TailLogs, AddDeck, Quit],
    }
}

/// Arguments for a `watch` child process.
pub fn watch_args(settings_path: &Path, deck: &Deck) -> Vec<String> {
    vec![
        "--settings".into(),
        settings_path.display().to_string(),
        "watch".into(),
        "--name".into(),
        deck.name.clone(),
        deck.url.clone(),
    ]
}

pub struct Menu {
    settings_path: PathBuf,
    logs_dir: PathBuf,
    registry: DeckRegistry,
    sessions: Vec<Child>,
    running: bool,
}

impl Menu {
    pub fn new(settings_path: PathBuf, logs_dir: PathBuf, registry: DeckRegistry) -> Self {
        Self {
            settings_path,
            logs_dir,
            registry,
            sessions: Vec::new(),
            running: false,
        }
    }

    /// Run until the user quits.
    pub fn run(mut self) -> Result<()> {
        let theme = ColorfulTheme::default();
        loop {
            println!("{LOGO}");
            if self.running {
                println!("SCRAPER IS RUNNING\n");
            }
            self.print_decks();

            let actions = available_actions(!self.registry.is_empty(), self.running);
            let choice = Select::with_theme(&theme)
                .with_prompt("Options")
                .items(&actions)
                .default(0)
                .interact()
                .context("Failed to read menu choice")?;

            match actions[choice] {
                MenuAction::Start => self.start()?,
                MenuAction::TailLogs => self.tail_logs()?,
                MenuAction::AddDeck => self.add_deck(&theme)?,
                MenuAction::RemoveDeck => self.remove_deck(&theme)?,
                MenuAction::Quit => {
                    self.stop_sessions();
                    return Ok(());
                }
            }
        }
    }

    fn print_decks(&self) {
        if self.registry.is_empty() {
            return;
        }
        println!("Loaded decks:\n");
        for deck in self.registry.decks() {
            println!("  {} - {}", deck.name, deck.url);
        }
        println!();
    }

    fn start(&mut self) -> Result<()> {
        let exe = std::env::current_exe().context("Failed to locate own executable")?;
        for deck in self.registry.decks() {
            let child = Command::new(&exe)
                .args(watch_args(&self.settings_path, &deck))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .with_context(|| format!("Failed to start session for {}", deck.name))?;
            info!(deck = %deck.name, pid = child.id(), "Session process started");
            self.sessions.push(child);
        }
        self.running = true;
        Ok(())
    }

    fn tail_logs(&self) -> Result<()> {
        let logs = collect_logs(&self.logs_dir)?;
        if logs.is_empty() {
            println!("No logs yet.");
        }
        for (name, body) in logs {
            println!("==> {name} <==");
            println!("{body}");
        }
        Ok(())
    }

    fn add_deck(&mut self, theme: &ColorfulTheme) -> Result<()> {
        let name: String = Input::with_theme(theme)
            .with_prompt("Deck name")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read deck name")?;
        let url: String = Input::with_theme(theme)
            .with_prompt("Deck URL")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read deck URL")?;

        match self.registry.add(&name, &url) {
            Ok(deck) => println!("{} added to decklist.", deck.name),
            Err(e) => println!("Error: {e}"),
        }
        Ok(())
    }

    fn remove_deck(&mut self, theme: &ColorfulTheme) -> Result<()> {
        let name: String = Input::with_theme(theme)
            .with_prompt("Name the deck which should be removed")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read deck name")?;

        match self.registry.remove(&name) {
            Ok(deck) => println!("{} was removed from the decklist.", deck.name),
            Err(e) => println!("Error: {e}"),
        }
        Ok(())
    }

    /// Ask every session to stop, then kill the ones still running after
    /// the grace period.
    fn stop_sessions(&mut self) {
        let requested: Vec<bool> = self.sessions.iter().map(request_stop).collect();
        let deadline = Instant::now() + STOP_GRACE;
        for (mut child, requested) in self.sessions.drain(..).zip(requested) {
            let pid = child.id();
            let deadline = if requested { deadline } else { Instant::now() };
            if wait_or_kill(&mut child, deadline) {
                info!(pid, "Session process stopped");
            } else {
                warn!(pid, "Session process killed after grace period");
            }
        }
        self.running = false;
    }
}

/// Send SIGTERM so the session can release its browser and record its
/// final status. Returns false when no stop request could be sent.
fn request_stop(child: &Child) -> bool {
    #[cfg(unix)]
    {
        let pid = child.id().to_string();
        match Command::new("kill").args(["-TERM", pid.as_str()]).status() {
            Ok(status) if status.success() => return true,
            Ok(status) => warn!(pid = %pid, %status, "kill -TERM failed"),
            Err(e) => warn!(pid = %pid, error = %e, "Failed to run kill"),
        }
    }
    #[cfg(not(unix))]
    let _ = child;
    false
}

/// Wait for `child` to exit until `deadline`, then kill it. Returns true
/// when it exited on its own.
fn wait_or_kill(child: &mut Child, deadline: Instant) -> bool {
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) if Instant::now() < deadline => std::thread::sleep(STOP_POLL),
            Ok(None) => break,
            Err(e) => {
                warn!(pid = child.id(), error = %e, "Failed to poll session process");
                break;
            }
        }
    }
    if let Err(e) = child.kill() {
        warn!(pid = child.id(), error = %e, "Failed to kill session process");
    }
    let _ = child.wait();
    false
}

impl Drop for Menu {
    fn drop(&mut self) {
        self.stop_sessions();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

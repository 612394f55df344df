//! DECKWATCH: Moxfield deck price watcher
//!
//! Entry point. Loads settings, then either runs the interactive menu,
//! watches a single deck until its price converges, or reports whether
//! any deck session is running.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::info;

use deckwatch::config::{LoggingConfig, Settings, DEFAULT_SETTINGS_FILE};
use deckwatch::driver::webdriver::WebDriverSession;
use deckwatch::engine::DeckSession;
use deckwatch::errors::ScraperError;
use deckwatch::logging::{self, MENU_LOG_STEM};
use deckwatch::menu::Menu;
use deckwatch::notify::email::EmailNotifier;
use deckwatch::notify::Notifier;
use deckwatch::shutdown;
use deckwatch::storage::registry::DeckRegistry;
use deckwatch::storage::status::StatusBoard;
use deckwatch::types::{Deck, TaskState};

const BANNER: &str = r#"
 ___  ___ ___ _  ____      ___ _____ ___ _  _
|   \| __/ __| |/ /\ \    / /_\_   _/ __| || |
| |) | _| (__| ' <  \ \/\/ / _ \| || (__| __ |
|___/|___\___|_|\_\  \_/\_/_/ \_\_| \___|_||_|

  Moxfield deck price watcher
  v0.1.0
"#;

#[derive(Parser)]
#[command(name = "deckwatch", version, about = "Watch Moxfield decks until they hit a target price")]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive deck menu (default)
    Menu,
    /// Watch one deck until its price reaches the target
    Watch {
        /// Deck URL
        url: String,
        /// Deck name used for log and status files
        #[arg(long)]
        name: Option<String>,
    },
    /// Exit 0 when any deck session is running, 1 otherwise
    Healthcheck,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.settings)?;

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => run_menu(settings, cli.settings).await,
        Commands::Watch { url, name } => {
            let deck = match name {
                Some(name) => Deck::new(name, url),
                None => Deck::from_url(&url),
            };
            watch(settings, deck).await
        }
        Commands::Healthcheck => healthcheck(&settings),
    }
}

async fn run_menu(settings: Settings, settings_path: PathBuf) -> Result<ExitCode> {
    let log_cfg = LoggingConfig {
        tail: false,
        json: settings.logging.json,
    };
    let _guard = logging::init(&settings.paths.logs_dir, MENU_LOG_STEM, &log_cfg)?;

    let registry = DeckRegistry::load(&settings.paths.decks_file)?;
    info!(decks = registry.len(), "Menu starting");

    let menu = Menu::new(settings_path, settings.paths.logs_dir.clone(), registry);
    tokio::task::spawn_blocking(move || menu.run())
        .await
        .context("Menu task panicked")??;
    Ok(ExitCode::SUCCESS)
}

async fn watch(settings: Settings, deck: Deck) -> Result<ExitCode> {
    let _guard = logging::init(&settings.paths.logs_dir, &deck.file_stem(), &settings.logging)?;

    if settings.logging.tail {
        println!("{BANNER}");
    }
    info!(
        deck = %deck.name,
        url = %deck.url,
        target = %settings.watch.price_target,
        poll_interval_secs = settings.watch.poll_interval_secs,
        "DECKWATCH starting up"
    );

    let cancel = CancellationToken::new();
    shutdown::cancel_on_shutdown(cancel.clone()).context("Failed to install signal handlers")?;

    let board = StatusBoard::new(settings.paths.status_dir());
    let result = match prepare(&settings).await {
        Ok((driver, notifier)) => {
            let session = DeckSession::new(
                deck.clone(),
                &settings,
                notifier.as_ref().map(|n| n as &dyn Notifier),
            );
            session.run_tracked(&board, Box::new(driver), &cancel).await
        }
        Err(e) => {
            board.record(&deck.name, TaskState::Failed);
            Err(e)
        }
    };
    info!(deck = %deck.name, ok = result.is_ok(), "DECKWATCH stopped");

    Ok(match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(ScraperError::Cancelled) => ExitCode::from(130),
        Err(e) => {
            eprintln!("{}: {e}", deck.name);
            ExitCode::FAILURE
        }
    })
}

/// Build the notifier and start the browser for one session.
async fn prepare(
    settings: &Settings,
) -> Result<(WebDriverSession, Option<EmailNotifier>), ScraperError> {
    let notifier = if settings.mail.enabled && settings.mail.is_complete() {
        Some(EmailNotifier::from_config(&settings.mail)?)
    } else {
        None
    };
    let driver = WebDriverSession::launch(&settings.driver).await?;
    Ok((driver, notifier))
}

fn healthcheck(settings: &Settings) -> Result<ExitCode> {
    let board = StatusBoard::new(settings.paths.status_dir());
    for status in board.statuses()? {
        println!(
            "{} {} (updated {})",
            status.state,
            status.deck,
            status.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(if board.any_running()? {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

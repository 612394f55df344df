//! A session stopped with SIGTERM, as the menu does on quit.

#![cfg(unix)]

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use deckwatch::engine::DeckSession;
use deckwatch::errors::ScraperError;
use deckwatch::shutdown::cancel_on_shutdown;
use deckwatch::storage::status::StatusBoard;
use deckwatch::types::{Deck, TaskState};

use crate::fake_driver::FakeBrowser;
use crate::scenarios::settings;

#[tokio::test]
async fn test_sigterm_cancels_session_and_records_status() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path());
    settings.mail.enabled = false;
    settings.watch.poll_interval_secs = 3600;
    let board = StatusBoard::new(settings.paths.status_dir());

    let cancel = CancellationToken::new();
    cancel_on_shutdown(cancel.clone()).unwrap();

    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
    tokio::time::timeout(Duration::from_secs(5), cancel.cancelled())
        .await
        .expect("SIGTERM should cancel the session token");

    let browser = FakeBrowser::new(&["45.00", "40.00"]);
    let session = DeckSession::new(Deck::new("Krenko", "https://x"), &settings, None);
    let err = session
        .run_tracked(&board, Box::new(browser.clone()), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ScraperError::Cancelled));
    assert_eq!(browser.quits(), 1);
    assert_eq!(browser.reprices(), 0);

    let statuses = board.statuses().unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].state, TaskState::Cancelled);
    assert!(!board.any_running().unwrap());
}

//! End-to-end deck session scenarios against the fake browser.

use rust_decimal_macros::dec;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use deckwatch::config::Settings;
use deckwatch::engine::DeckSession;
use deckwatch::errors::ScraperError;
use deckwatch::notify::Notifier;
use deckwatch::types::Deck;

use crate::fake_driver::{FakeBrowser, RecordingNotifier};

const DECK_URL: &str = "https://www.moxfield.com/decks/krenko";

pub(crate) fn settings(data_dir: &std::path::Path) -> Settings {
    let mut s = Settings::default();
    s.watch.price_target = dec!(20.00);
    s.watch.poll_interval_secs = 0;
    s.watch.settle_delay_ms = 0;
    s.site.username = Some(SecretString::new("alice".into()));
    s.site.password = Some(SecretString::new("hunter2".into()));
    s.mail.enabled = true;
    s.mail.sender = Some("bot@example.com".into());
    s.mail.password = Some(SecretString::new("app-password".into()));
    s.mail.receiver = Some("me@example.com".into());
    s.paths.data_dir = data_dir.to_path_buf();
    s
}

async fn run(
    settings: &Settings,
    browser: &FakeBrowser,
    notifier: &RecordingNotifier,
    cancel: &CancellationToken,
) -> Result<deckwatch::types::SessionReport, ScraperError> {
    let session = DeckSession::new(
        Deck::new("Krenko", DECK_URL),
        settings,
        Some(notifier as &dyn Notifier),
    );
    session.run(Box::new(browser.clone()), cancel).await
}

#[tokio::test]
async fn test_converges_and_notifies_once() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let browser = FakeBrowser::new(&["45.00", "30.00", "18.50"]);
    let notifier = RecordingNotifier::default();

    let report = run(&settings, &browser, &notifier, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.final_price, dec!(18.50));
    assert_eq!(report.attempts, 2);
    assert_eq!(browser.reprices(), 2);
    assert_eq!(report.header.title, "Krenko Tokens");
    assert_eq!(report.header.author, "goblin_fan");
    assert!(report.notified);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].price, dec!(18.50));
    assert_eq!(sent[0].subject(), "Moxfield Scraper Success on Krenko Tokens!");

    let proof = dir.path().join("Krenko Tokens_proof.png");
    assert_eq!(report.proof_path, proof);
    assert!(proof.exists());
    assert_eq!(browser.screenshots(), vec![proof]);
    assert_eq!(browser.quits(), 1);
}

#[tokio::test]
async fn test_already_below_target_skips_reprice() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let browser = FakeBrowser::new(&["12.00"]).with_cookie_banner();
    let notifier = RecordingNotifier::default();

    let report = run(&settings, &browser, &notifier, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.final_price, dec!(12.00));
    assert_eq!(browser.reprices(), 0);
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(browser.quits(), 1);
}

#[tokio::test]
async fn test_switches_currency_to_euros() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let browser = FakeBrowser::new(&["30.00", "19.00"]).in_dollars(3);
    let notifier = RecordingNotifier::default();

    let report = run(&settings, &browser, &notifier, &CancellationToken::new())
        .await
        .unwrap();

    assert!(browser.euros());
    assert_eq!(report.final_price, dec!(19.00));
    assert_eq!(
        browser.visited(),
        vec![
            DECK_URL.to_string(),
            settings.site.affiliate_settings_url(),
            DECK_URL.to_string(),
        ]
    );
    assert_eq!(browser.quits(), 1);
}

#[tokio::test]
async fn test_attempt_limit_fails_after_one_round() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path());
    settings.watch.max_attempts = Some(1);
    let browser = FakeBrowser::new(&["45.00", "44.00", "43.00"]);
    let notifier = RecordingNotifier::default();

    let err = run(&settings, &browser, &notifier, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ScraperError::AttemptLimit(1)));
    assert_eq!(browser.reprices(), 1);
    assert!(notifier.sent().is_empty());
    assert_eq!(browser.quits(), 1);
}

#[tokio::test]
async fn test_mail_disabled_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path());
    settings.mail.enabled = false;
    let browser = FakeBrowser::new(&["10.00"]);
    let notifier = RecordingNotifier::default();

    let report = run(&settings, &browser, &notifier, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!report.notified);
    assert!(notifier.sent().is_empty());
}

// -- Driver release on every exit path -----------------------------------

async fn assert_fails_and_releases(
    settings: &Settings,
    browser: FakeBrowser,
    cancel: CancellationToken,
    check: fn(&ScraperError) -> bool,
) {
    let notifier = RecordingNotifier::default();
    let err = run(settings, &browser, &notifier, &cancel).await.unwrap_err();
    assert!(check(&err), "unexpected error: {err}");
    assert_eq!(browser.quits(), 1, "driver must be released exactly once");
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_header_failure_releases_driver() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(&["45.00"]);
    let sel = browser.selectors().deck_title.clone();
    assert_fails_and_releases(
        &settings(dir.path()),
        browser.fail_on(&sel),
        CancellationToken::new(),
        ScraperError::is_element_not_found,
    )
    .await;
}

#[tokio::test]
async fn test_login_failure_releases_driver() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(&["45.00"]);
    let sel = browser.selectors().sign_in.clone();
    assert_fails_and_releases(
        &settings(dir.path()),
        browser.fail_on(&sel),
        CancellationToken::new(),
        ScraperError::is_element_not_found,
    )
    .await;
}

#[tokio::test]
async fn test_missing_credentials_release_driver() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path());
    settings.site.username = None;
    assert_fails_and_releases(
        &settings,
        FakeBrowser::new(&["45.00"]),
        CancellationToken::new(),
        |e| matches!(e, ScraperError::Config(_)),
    )
    .await;
}

#[tokio::test]
async fn test_currency_failure_releases_driver() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(&["45.00"]).in_dollars(1);
    let sel = browser.selectors().save_settings.clone();
    assert_fails_and_releases(
        &settings(dir.path()),
        browser.fail_on(&sel),
        CancellationToken::new(),
        ScraperError::is_element_not_found,
    )
    .await;
}

#[tokio::test]
async fn test_reprice_failure_releases_driver() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new(&["45.00", "18.00"]);
    let sel = browser.selectors().set_to_lowest.clone();
    assert_fails_and_releases(
        &settings(dir.path()),
        browser.fail_on(&sel),
        CancellationToken::new(),
        ScraperError::is_element_not_found,
    )
    .await;
}

#[tokio::test]
async fn test_bad_price_releases_driver() {
    let dir = tempfile::tempdir().unwrap();
    assert_fails_and_releases(
        &settings(dir.path()),
        FakeBrowser::new(&["45.00", "n/a"]),
        CancellationToken::new(),
        |e| matches!(e, ScraperError::PriceParse { .. }),
    )
    .await;
}

#[tokio::test]
async fn test_screenshot_failure_releases_driver() {
    let dir = tempfile::tempdir().unwrap();
    assert_fails_and_releases(
        &settings(dir.path()),
        FakeBrowser::new(&["10.00"]).fail_screenshot(),
        CancellationToken::new(),
        |e| matches!(e, ScraperError::Driver(_)),
    )
    .await;
}

#[tokio::test]
async fn test_cancellation_releases_driver() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path());
    settings.watch.poll_interval_secs = 3600;
    let cancel = CancellationToken::new();
    let browser = FakeBrowser::new(&["45.00", "40.00", "35.00"]).cancel_on_reprice(cancel.clone());
    assert_fails_and_releases(&settings, browser, cancel, |e| {
        matches!(e, ScraperError::Cancelled)
    })
    .await;
}

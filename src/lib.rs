//! DECKWATCH: Moxfield deck price watcher
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod driver;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod menu;
pub mod notify;
pub mod shutdown;
pub mod storage;
pub mod types;

//! Integration tests: full deck sessions driven through a fake browser.

mod fake_driver;
mod scenarios;
mod shutdown;

//! Deck session engine: page steps, price parsing, the convergence loop
//! and the session runner that ties them together.

pub mod convergence;
pub mod price;
pub mod session;
pub mod setup;

pub use convergence::{converge, PagePriceSource, PriceSource};
pub use session::DeckSession;
pub use setup::PageSteps;

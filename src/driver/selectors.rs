//! CSS selectors for the Moxfield deck and settings pages.
//!
//! The page structure is outside our control, so every selector lives
//! here as data and can be overridden from the `[selectors]` section of
//! the settings file without touching the engine.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Selectors {
    pub deck_title: String,
    pub deck_author: String,
    pub login_link: String,
    pub accept_cookies: String,
    pub username: String,
    pub password: String,
    pub sign_in: String,
    pub logged_in_marker: String,
    pub more_menu: String,
    pub set_to_lowest: String,
    pub confirm_reprice: String,
    pub price: String,
    pub affiliate_move_up: String,
    pub save_settings: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            deck_title: "#menu-deckname > span".into(),
            deck_author: "#userhover-popup-2 > a".into(),
            login_link: "#js-reactroot > header > nav > div > div > ul.navbar-nav.me-0 > li:nth-child(1) > a"
                .into(),
            accept_cookies: "#ncmp__tool > div > div > div.ncmp__banner-actions > div.ncmp__banner-btns > button:nth-child(2)"
                .into(),
            username: "#username".into(),
            password: "#password".into(),
            sign_in: "#maincontent > div > div.flex-grow-1 > div > div.card.border-0 > div > form > div:nth-child(3) > button"
                .into(),
            logged_in_marker: "#mainmenu-user".into(),
            more_menu: "#subheader-more > span".into(),
            set_to_lowest: "body > div.dropdown-menu.show > div > div > div.d-inline-block.dropdown-column-divider > a:nth-child(7)"
                .into(),
            confirm_reprice: "body > div.modal.zoom.show.d-block.text-start > div > div > div.modal-footer > button.btn-primary"
                .into(),
            price: "#shoppingcart".into(),
            affiliate_move_up: "#affiliate-control-cardmarket-up".into(),
            save_settings: "#maincontent > div > div.row > div.col-lg-8.pe-lg-5.order-2.order-lg-1 > form > div:nth-child(3) > button"
                .into(),
        }
    }
}

//! Deck registry: the user's name → URL list of decks to watch.
//!
//! Stored as a JSON object. Every successful edit is written back
//! immediately; a failed write rolls the edit back.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{load_json, save_json};
use crate::errors::RegistryError;
use crate::types::Deck;

#[derive(Debug)]
pub struct DeckRegistry {
    path: PathBuf,
    decks: BTreeMap<String, String>,
}

impl DeckRegistry {
    /// Load the registry. A missing file is an empty registry.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let decks = load_json(&path)?.unwrap_or_default();
        Ok(Self { path, decks })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.decks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decks.len()
    }

    /// All decks, ordered by name.
    pub fn decks(&self) -> Vec<Deck> {
        self.decks
            .iter()
            .map(|(name, url)| Deck::new(name, url))
            .collect()
    }

    /// Add a deck. Names are unique; the registry is unchanged on error.
    pub fn add(&mut self, name: &str, url: &str) -> std::result::Result<Deck, RegistryError> {
        let (name, url) = (name.trim(), url.trim());
        if name.is_empty() || url.is_empty() {
            return Err(RegistryError::Blank);
        }
        if self.decks.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        self.decks.insert(name.to_string(), url.to_string());
        if let Err(e) = self.save() {
            self.decks.remove(name);
            return Err(RegistryError::Persist(e));
        }
        info!(deck = name, url, "Deck added");
        Ok(Deck::new(name, url))
    }

    /// Remove a deck by name. The registry is unchanged on error.
    pub fn remove(&mut self, name: &str) -> std::result::Result<Deck, RegistryError> {
        let name = name.trim();
        let Some(url) = self.decks.remove(name) else {
            return Err(RegistryError::NotFound(name.to_string()));
        };
        if let Err(e) = self.save() {
            self.decks.insert(name.to_string(), url);
            return Err(RegistryError::Persist(e));
        }
        info!(deck = name, "Deck removed");
        Ok(Deck::new(name, url))
    }

    pub fn save(&self) -> Result<()> {
        save_json(&self.decks, &self.path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

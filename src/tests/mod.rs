mod recommender;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::catalog::CatalogItem;
use crate::semantic::{EmbeddingError, EmbeddingProvider, HashingEmbedder, Recommender};

pub fn hashing_engine() -> Recommender {
    Recommender::new(Box::new(HashingEmbedder::new(256).unwrap()))
}

pub fn item(title: &str, synopsis: Option<&str>) -> CatalogItem {
    CatalogItem::new(title, synopsis)
}

/// Ten titles with distinct synopses.
pub fn anime_catalog() -> Vec<CatalogItem> {
    vec![
        item("Naruto", Some("A young ninja from the hidden leaf village dreams of becoming hokage")),
        item("Bleach", Some("A teenager gains the powers of a soul reaper and fights hollows")),
        item("One Piece", Some("A rubber pirate sails the grand line searching for the legendary treasure")),
        item("Boruto", Some("The son of the hokage trains as a ninja in the leaf village")),
        item("Shokugeki no Soma", Some("A cooking student battles rivals in culinary school duels")),
        item("Haikyuu", Some("A short boy joins the high school volleyball team")),
        item("Black Lagoon", Some("Modern pirates and mercenaries smuggle cargo across the sea")),
        item("Silver Spoon", Some("A city student enrolls in an agricultural school and learns farming")),
        item("Mob Psycho 100", Some("A psychic middle school boy suppresses his emotions")),
        item("Sakamoto Days", Some("A retired hitman runs a convenience store with his family")),
    ]
}

/// Hashing provider that can be switched off, standing in for an
/// unreachable embedding service.
#[derive(Debug)]
pub struct SwitchableProvider {
    inner: HashingEmbedder,
    available: Arc<AtomicBool>,
}

impl SwitchableProvider {
    /// Returns the provider and the switch controlling it.
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let available = Arc::new(AtomicBool::new(true));
        let provider = Self {
            inner: HashingEmbedder::new(256).unwrap(),
            available: Arc::clone(&available),
        };
        (provider, available)
    }
}

impl EmbeddingProvider for SwitchableProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(EmbeddingError::EmbeddingFailed(
                "service unavailable".to_string(),
            ));
        }
        self.inner.embed(text)
    }
}

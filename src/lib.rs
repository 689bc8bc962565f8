//! Anime recommendations by embedding similarity.
//!
//! Build an index from a catalog, persist it as a bundle, and query it by
//! title or by free-text synopsis:
//!
//! ```no_run
//! use std::path::Path;
//! use anirec::{CatalogItem, HashingEmbedder, Recommender};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Recommender::new(Box::new(HashingEmbedder::new(256)?));
//! engine.build(vec![
//!     CatalogItem::new("Naruto", Some("A young ninja seeks recognition")),
//!     CatalogItem::new("Bleach", Some("A teenager becomes a soul reaper")),
//! ])?;
//! engine.persist(Path::new("bundle"))?;
//!
//! for rec in engine.recommend_by_synopsis("ninja village", 5)? {
//!     println!("{} {:.2}", rec.title, rec.similarity);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod recommendation;
pub mod semantic;

#[cfg(test)]
mod tests;

pub use catalog::{load_catalog, Catalog, CatalogItem};
pub use config::Config;
pub use error::{RecommendError, RecommendResult};
pub use recommendation::{Recommendation, DEFAULTS};
pub use semantic::{
    EmbeddingProvider, EngineOptions, EngineState, FastEmbedProvider, HashingEmbedder,
    Recommender,
};

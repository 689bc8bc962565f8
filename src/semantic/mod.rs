//! Similarity search over catalog synopses.
//!
//! # Architecture
//!
//! - `embeddings`: provider trait and the fastembed-backed model
//! - `hashing`: model-free feature-hashing provider
//! - `index`: in-memory exact inner-product index
//! - `storage`: index.bin + catalog.csv bundle persistence
//! - `engine`: build / persist / load and the two query modes

pub mod embeddings;
mod engine;
mod hashing;
mod index;
mod storage;

pub use embeddings::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use engine::{EngineOptions, EngineState, Recommender, DEFAULT_BATCH_SIZE};
pub use hashing::{HashingEmbedder, HASHING_MODEL_PREFIX};
pub use index::{l2_norm, normalize, DegenerateVector, IndexError, SearchResult, VectorIndex};
pub use storage::{BundleError, BundleStorage, StoredBundle, CATALOG_FILE, INDEX_FILE};

/// Default embedding model, multilingual so non-English synopses and queries work
pub const DEFAULT_MODEL: &str = "paraphrase-multilingual-MiniLM-L12-v2";

/// Default number of recommendations per query
pub const DEFAULT_K: usize = 10;

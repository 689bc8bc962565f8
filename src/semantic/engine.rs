//! Recommender engine.
//!
//! Owns the published (index, catalog) snapshot and keeps index row `i`
//! aligned with the `i`-th catalog item that has a synopsis:
//! - `build` and `load` assemble a new snapshot under the write lock and only
//!   publish it once alignment is validated
//! - queries clone the current snapshot and run without holding any lock

use std::path::Path;
use std::sync::{Arc, RwLock};

use rayon::prelude::*;

use crate::catalog::{Catalog, CatalogItem, TitleMatch};
use crate::error::{RecommendError, RecommendResult};
use crate::recommendation::Recommendation;
use crate::semantic::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::semantic::index::{IndexError, SearchResult, VectorIndex};
use crate::semantic::storage::BundleStorage;

/// Number of synopses handed to the provider per call during build.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Tuning for the build path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Threads used to embed batches; 0 lets rayon decide
    pub embedding_parallelism: usize,
    pub batch_size: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            embedding_parallelism: 0,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    /// An index and its catalog are loaded and validated
    Ready,
}

/// Immutable index + catalog pair. Never mutated once published.
#[derive(Debug)]
struct Snapshot {
    index: VectorIndex,
    catalog: Catalog,
}

impl Snapshot {
    /// Pair an index with its catalog, refusing misaligned input.
    fn assemble(index: VectorIndex, catalog: Catalog) -> RecommendResult<Self> {
        let snapshot = Self { index, catalog };
        snapshot.check_aligned()?;
        if snapshot.index.is_empty() {
            return Err(RecommendError::CorruptBundle(
                "index has no rows".to_string(),
            ));
        }
        Ok(snapshot)
    }

    fn check_aligned(&self) -> RecommendResult<()> {
        if self.index.len() != self.catalog.indexed_len() {
            return Err(RecommendError::CorruptBundle(format!(
                "index has {} rows but catalog has {} items with a synopsis",
                self.index.len(),
                self.catalog.indexed_len()
            )));
        }
        Ok(())
    }

    /// Map index hits to output records.
    fn join(&self, hits: Vec<SearchResult>) -> RecommendResult<Vec<Recommendation>> {
        self.check_aligned()?;
        hits.into_iter()
            .map(|hit| {
                self.catalog
                    .item_for_row(hit.row)
                    .map(|item| Recommendation::from_item(item, hit.score))
                    .ok_or_else(|| {
                        RecommendError::CorruptBundle(format!(
                            "index row {} has no catalog item",
                            hit.row
                        ))
                    })
            })
            .collect()
    }
}

/// Similarity-search engine over a static catalog.
pub struct Recommender {
    provider: Box<dyn EmbeddingProvider>,
    options: EngineOptions,
    state: RwLock<Option<Arc<Snapshot>>>,
}

impl std::fmt::Debug for Recommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("model", &self.provider.name())
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

impl Recommender {
    /// Create an uninitialized engine. Call `build` or `load` before querying.
    pub fn new(provider: Box<dyn EmbeddingProvider>) -> Self {
        Self::with_options(provider, EngineOptions::default())
    }

    pub fn with_options(provider: Box<dyn EmbeddingProvider>, options: EngineOptions) -> Self {
        Self {
            provider,
            options,
            state: RwLock::new(None),
        }
    }

    /// Create an engine and load the bundle at `dir` into it.
    pub fn open(dir: &Path, provider: Box<dyn EmbeddingProvider>) -> RecommendResult<Self> {
        let engine = Self::new(provider);
        engine.load(dir)?;
        Ok(engine)
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    pub fn state(&self) -> EngineState {
        match self.state.read() {
            Ok(guard) if guard.is_some() => EngineState::Ready,
            _ => EngineState::Uninitialized,
        }
    }

    /// Number of index rows, 0 when uninitialized.
    pub fn indexed_count(&self) -> usize {
        self.snapshot().map(|s| s.index.len()).unwrap_or(0)
    }

    /// Number of catalog items including those without a synopsis.
    pub fn catalog_len(&self) -> usize {
        self.snapshot().map(|s| s.catalog.len()).unwrap_or(0)
    }

    /// Embed every item with a synopsis and publish the resulting index.
    ///
    /// On any failure the previously published state is left in place.
    pub fn build(&self, items: Vec<CatalogItem>) -> RecommendResult<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|e| RecommendError::Internal(format!("Lock poisoned: {}", e)))?;

        let catalog = Catalog::new(items);
        if catalog.indexed_len() == 0 {
            if !catalog.is_empty() {
                log::warn!("None of the {} catalog items has a synopsis", catalog.len());
            }
            return Err(RecommendError::EmptyCatalog);
        }

        log::info!(
            "Embedding {} of {} catalog items with '{}'",
            catalog.indexed_len(),
            catalog.len(),
            self.provider.name()
        );

        let embeddings = self.embed_all(&catalog.synopses())?;

        let mut index = VectorIndex::with_dimensions(self.provider.dimensions());
        index.add(embeddings)?;

        let snapshot = Snapshot::assemble(index, catalog)?;
        log::info!("Index built with {} rows", snapshot.index.len());

        *guard = Some(Arc::new(snapshot));
        Ok(())
    }

    /// Write the current index and catalog to `dir` as one bundle.
    pub fn persist(&self, dir: &Path) -> RecommendResult<()> {
        let snapshot = self.snapshot()?;
        let storage = BundleStorage::new(dir);

        storage.save(
            &snapshot.index,
            snapshot.catalog.items(),
            &self.provider.model_id(),
        )?;

        log::info!(
            "Saved bundle with {} rows to {}",
            snapshot.index.len(),
            dir.display()
        );
        Ok(())
    }

    /// Replace the engine state with the bundle stored in `dir`.
    ///
    /// The bundle must have been built with this engine's embedding model.
    /// On any failure the previously published state is left in place.
    pub fn load(&self, dir: &Path) -> RecommendResult<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|e| RecommendError::Internal(format!("Lock poisoned: {}", e)))?;

        let stored = BundleStorage::new(dir).load()?;

        if stored.model_id != self.provider.model_id() {
            return Err(RecommendError::ModelMismatch(
                self.provider.name().to_string(),
            ));
        }
        if stored.dimensions != self.provider.dimensions() {
            return Err(IndexError::DimensionMismatch {
                expected: self.provider.dimensions(),
                got: stored.dimensions,
            }
            .into());
        }

        let index = VectorIndex::from_normalized(stored.dimensions, stored.rows)
            .map_err(|e| RecommendError::CorruptBundle(e.to_string()))?;
        let snapshot = Snapshot::assemble(index, Catalog::new(stored.items))?;

        log::info!(
            "Loaded bundle with {} rows ({} catalog items) from {}",
            snapshot.index.len(),
            snapshot.catalog.len(),
            dir.display()
        );

        *guard = Some(Arc::new(snapshot));
        Ok(())
    }

    /// Titles most similar to the catalog item named `title`.
    ///
    /// The title is matched case-insensitively against the full catalog. The
    /// matched item's own row is excluded from the results; other items with
    /// the same title are not.
    pub fn recommend_by_title(&self, title: &str, k: usize) -> RecommendResult<Vec<Recommendation>> {
        if k == 0 {
            return Err(IndexError::InvalidLimit.into());
        }
        let snapshot = self.snapshot()?;

        let row = match snapshot.catalog.find_title(title) {
            TitleMatch::Indexed { row, .. } => row,
            TitleMatch::NotIndexed { .. } => {
                return Err(RecommendError::ItemNotIndexed(title.to_string()))
            }
            TitleMatch::NotFound => return Err(RecommendError::TitleNotFound(title.to_string())),
        };

        snapshot.check_aligned()?;
        let query = snapshot.index.reconstruct(row)?;
        let hits = snapshot
            .index
            .search(&query, k.saturating_add(1))?
            .into_iter()
            .filter(|hit| hit.row != row)
            .take(k)
            .collect();

        snapshot.join(hits)
    }

    /// Titles whose synopses are most similar to free text.
    pub fn recommend_by_synopsis(&self, text: &str, k: usize) -> RecommendResult<Vec<Recommendation>> {
        if text.trim().is_empty() {
            return Err(RecommendError::EmptyQuery);
        }
        let snapshot = self.snapshot()?;

        let query = self.provider.embed(text)?;
        let hits = snapshot.index.search(&query, k)?;

        snapshot.join(hits)
    }

    fn snapshot(&self) -> RecommendResult<Arc<Snapshot>> {
        let guard = self
            .state
            .read()
            .map_err(|e| RecommendError::Internal(format!("Lock poisoned: {}", e)))?;
        guard.as_ref().map(Arc::clone).ok_or(RecommendError::NotReady)
    }

    /// Embed `texts` in batches across a rayon pool; output order matches input.
    fn embed_all(&self, texts: &[String]) -> RecommendResult<Vec<Vec<f32>>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.embedding_parallelism)
            .build()
            .map_err(|e| RecommendError::Internal(format!("Failed to start embedding pool: {}", e)))?;

        let batches = pool.install(|| {
            texts
                .par_chunks(self.options.batch_size.max(1))
                .map(|chunk| self.provider.embed_batch(chunk))
                .collect::<Result<Vec<_>, EmbeddingError>>()
        })?;

        let embeddings: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::EmbeddingFailed(format!(
                "provider returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            ))
            .into());
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::HashingEmbedder;

    fn engine() -> Recommender {
        Recommender::new(Box::new(HashingEmbedder::new(64).unwrap()))
    }

    #[test]
    fn test_new_engine_is_uninitialized() {
        let engine = engine();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert_eq!(engine.indexed_count(), 0);
        assert!(matches!(
            engine.recommend_by_synopsis("ninja", 3),
            Err(RecommendError::NotReady)
        ));
        assert!(matches!(
            engine.recommend_by_title("Naruto", 3),
            Err(RecommendError::NotReady)
        ));
    }

    #[test]
    fn test_persist_requires_ready() {
        let dir = tempfile::tempdir().unwrap();
        let result = engine().persist(dir.path());
        assert!(matches!(result, Err(RecommendError::NotReady)));
    }

    #[test]
    fn test_build_transitions_to_ready() {
        let engine = engine();
        engine
            .build(vec![
                CatalogItem::new("Naruto", Some("ninja village")),
                CatalogItem::new("Short", None),
            ])
            .unwrap();

        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.indexed_count(), 1);
        assert_eq!(engine.catalog_len(), 2);
    }

    #[test]
    fn test_zero_k_rejected() {
        let engine = engine();
        engine
            .build(vec![
                CatalogItem::new("Naruto", Some("ninja village")),
                CatalogItem::new("Bleach", Some("soul reaper")),
            ])
            .unwrap();

        for result in [
            engine.recommend_by_title("Naruto", 0),
            engine.recommend_by_synopsis("ninja", 0),
        ] {
            assert!(matches!(
                result,
                Err(RecommendError::Index(IndexError::InvalidLimit))
            ));
        }
    }

    #[test]
    fn test_snapshot_rejects_misaligned_pair() {
        let mut index = VectorIndex::new();
        index.add(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let catalog = Catalog::new(vec![CatalogItem::new("Only", Some("one synopsis"))]);

        assert!(matches!(
            Snapshot::assemble(index, catalog),
            Err(RecommendError::CorruptBundle(_))
        ));
    }

    #[test]
    fn test_batched_embedding_keeps_order() {
        let provider = HashingEmbedder::new(32).unwrap();
        let engine = Recommender::with_options(
            Box::new(provider.clone()),
            EngineOptions {
                embedding_parallelism: 3,
                batch_size: 2,
            },
        );
        let texts: Vec<String> = (0..7).map(|i| format!("synopsis number {i}")).collect();

        let embeddings = engine.embed_all(&texts).unwrap();
        assert_eq!(embeddings.len(), 7);
        for (text, embedding) in texts.iter().zip(&embeddings) {
            assert_eq!(embedding, &provider.embed(text).unwrap());
        }
    }
}

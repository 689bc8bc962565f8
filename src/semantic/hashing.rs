//! Model-free embedding by feature hashing.
//!
//! Each lowercase alphanumeric token (and each adjacent token pair) is hashed
//! with SHA256 into one of `dimensions` buckets with a sign. The result is a
//! sparse bag-of-words vector: texts sharing vocabulary point the same way.
//! Deterministic across runs and platforms.

use sha2::{Digest, Sha256};

use crate::semantic::embeddings::{EmbeddingError, EmbeddingProvider};

/// Model name prefix recognised by [`HashingEmbedder::parse`].
pub const HASHING_MODEL_PREFIX: &str = "hashing";

/// Weight of bigram features relative to single tokens.
const BIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    name: String,
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self, EmbeddingError> {
        if dimensions == 0 || dimensions > usize::from(u16::MAX) {
            return Err(EmbeddingError::InvalidModel(format!(
                "hashing dimensions must be in 1..={}, got {}",
                u16::MAX,
                dimensions
            )));
        }
        Ok(Self {
            name: format!("{HASHING_MODEL_PREFIX}-{dimensions}"),
            dimensions,
        })
    }

    /// Parse `hashing` or `hashing-<dims>`; `None` if the name is not a hashing model.
    pub fn parse(
        model_name: &str,
        default_dimensions: usize,
    ) -> Option<Result<Self, EmbeddingError>> {
        let name = model_name.to_lowercase();
        let rest = name.strip_prefix(HASHING_MODEL_PREFIX)?;

        if rest.is_empty() {
            return Some(Self::new(default_dimensions));
        }
        let dims = rest.strip_prefix('-')?;
        Some(
            dims.parse::<usize>()
                .map_err(|_| EmbeddingError::InvalidModel(model_name.to_string()))
                .and_then(Self::new),
        )
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(raw) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Texts without any alphanumeric token produce a zero vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0f32; self.dimensions];

        for token in &tokens {
            let (bucket, sign) = self.bucket(token);
            vector[bucket] += sign;
        }
        for pair in tokens.windows(2) {
            let (bucket, sign) = self.bucket(&format!("{} {}", pair[0], pair[1]));
            vector[bucket] += sign * BIGRAM_WEIGHT;
        }

        Ok(vector)
    }
}

//! In-memory vector index with exact inner-product search.
//!
//! Rows are stored L2-normalized, so the inner product of a stored row and a
//! normalized query is their cosine similarity. Rows are addressed only by
//! their insertion position.

use std::cmp::Ordering;

use rayon::prelude::*;

/// Norm tolerance accepted for rows restored from disk.
const RESTORE_NORM_TOLERANCE: f32 = 1e-3;

/// Flat, exact vector index.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    /// Fixed by the first batch added
    dimensions: Option<usize>,
    rows: Vec<Vec<f32>>,
}

/// A single search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// Row position in the index
    pub row: usize,
    /// Cosine similarity in [-1.0, 1.0]
    pub score: f32,
}

impl VectorIndex {
    /// Create an empty index. The dimension is fixed by the first `add`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index with a known dimension.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: Some(dimensions),
            rows: Vec::new(),
        }
    }

    /// Restore an index from rows that were normalized before being persisted.
    ///
    /// Rows are kept bit-for-bit so that search results match the index they
    /// were saved from.
    pub fn from_normalized(dimensions: usize, rows: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        for (row, vector) in rows.iter().enumerate() {
            if vector.len() != dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: dimensions,
                    got: vector.len(),
                });
            }
            let norm = l2_norm(vector);
            if !norm.is_finite() || (norm - 1.0).abs() > RESTORE_NORM_TOLERANCE {
                return Err(IndexError::NotNormalized { row, norm });
            }
        }

        Ok(Self {
            dimensions: Some(dimensions),
            rows,
        })
    }

    /// Embedding dimension, or `None` if nothing has been added yet.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append vectors in input order.
    ///
    /// The whole batch is validated before anything is stored, so a failed
    /// call leaves the index untouched.
    pub fn add(&mut self, vectors: Vec<Vec<f32>>) -> Result<(), IndexError> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let dimensions = self.dimensions.unwrap_or(first.len());

        let mut normalized = Vec::with_capacity(vectors.len());
        for (offset, mut vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: dimensions,
                    got: vector.len(),
                });
            }
            normalize(&mut vector)
                .map_err(|e| e.into_index_error(Some(self.rows.len() + offset)))?;
            normalized.push(vector);
        }

        self.dimensions = Some(dimensions);
        self.rows.extend(normalized);
        Ok(())
    }

    /// Return up to `k` rows ranked by descending similarity to `query`.
    ///
    /// Equal scores are ordered by ascending row. `k` larger than the index
    /// returns every row.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidLimit);
        }
        let dimensions = match self.dimensions {
            Some(d) if !self.rows.is_empty() => d,
            _ => return Err(IndexError::EmptyIndex),
        };
        if query.len() != dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                got: query.len(),
            });
        }

        let mut query = query.to_vec();
        normalize(&mut query).map_err(|e| e.into_index_error(None))?;

        let mut results: Vec<SearchResult> = self
            .rows
            .par_iter()
            .enumerate()
            .map(|(row, vector)| SearchResult {
                row,
                score: dot(&query, vector).clamp(-1.0, 1.0),
            })
            .collect();

        results.sort_by(rank_order);
        results.truncate(k);

        Ok(results)
    }

    /// Return a copy of the stored (normalized) vector at `row`.
    pub fn reconstruct(&self, row: usize) -> Result<Vec<f32>, IndexError> {
        self.rows
            .get(row)
            .cloned()
            .ok_or(IndexError::IndexOutOfRange {
                row,
                len: self.rows.len(),
            })
    }

    /// Iterate over stored rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// Descending score, then ascending row.
fn rank_order(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score.total_cmp(&a.score).then(a.row.cmp(&b.row))
}

/// Compute the L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length in place.
///
/// Components are divided by the largest magnitude before squaring, so large
/// finite vectors do not overflow. `v` is left untouched on error.
pub fn normalize(v: &mut [f32]) -> Result<(), DegenerateVector> {
    if v.iter().any(|x| !x.is_finite()) {
        return Err(DegenerateVector::NonFinite);
    }
    let scale = v.iter().fold(0.0f32, |max, x| max.max(x.abs()));
    if scale == 0.0 {
        return Err(DegenerateVector::ZeroNorm);
    }

    let scaled_norm = v
        .iter()
        .map(|x| (x / scale) * (x / scale))
        .sum::<f32>()
        .sqrt();
    if scale * scaled_norm < f32::EPSILON {
        return Err(DegenerateVector::ZeroNorm);
    }

    let norm = scale * scaled_norm;
    if norm.is_finite() {
        v.iter_mut().for_each(|x| *x /= norm);
    } else {
        v.iter_mut().for_each(|x| *x = (*x / scale) / scaled_norm);
    }
    Ok(())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Why [`normalize`] refused a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateVector {
    /// Length below `f32::EPSILON`
    ZeroNorm,
    /// A component is NaN or infinite
    NonFinite,
}

impl DegenerateVector {
    fn into_index_error(self, row: Option<usize>) -> IndexError {
        match self {
            Self::ZeroNorm => IndexError::ZeroNormVector { row },
            Self::NonFinite => IndexError::NonFiniteVector { row },
        }
    }
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Index is empty")]
    EmptyIndex,

    #[error("Row {row} out of range for index of {len} rows")]
    IndexOutOfRange { row: usize, len: usize },

    #[error("Result limit must be at least 1")]
    InvalidLimit,

    #[error("Cannot store or search with zero-norm vector (row {row:?})")]
    ZeroNormVector { row: Option<usize> },

    #[error("Cannot store or search with non-finite vector (row {row:?})")]
    NonFiniteVector { row: Option<usize> },

    #[error("Stored row {row} is not unit length (norm {norm})")]
    NotNormalized { row: usize, norm: f32 },
}

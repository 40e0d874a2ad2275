//! Exact nearest-neighbour index under squared Euclidean distance.
//!
//! [`VectorIndex`] stores every embedding in one dense row-major matrix and
//! answers queries with a full scan. There is no approximation and no
//! incremental insert: an index is built once from a complete set of vectors
//! and replaced wholesale when the corpus changes.

use std::cmp::Ordering;

use crate::error::{NlqError, Result};

/// One search hit: the matrix row and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row position in the index, equal to the position of the source vector.
    pub slot: usize,
    /// Squared Euclidean distance to the query, accumulated in `f64`.
    pub distance: f64,
}

/// A dense, immutable matrix of embeddings with exact k-NN search.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    rows: usize,
    matrix: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from `vectors`, one row per vector in input order.
    ///
    /// The dimension is taken from the first vector.
    ///
    /// # Errors
    ///
    /// - [`NlqError::EmptyCorpus`] if `vectors` is empty.
    /// - [`NlqError::DimensionMismatch`] if the first vector is empty or any
    ///   later vector differs in length from the first.
    /// - [`NlqError::NonFiniteVector`] if any component is NaN or infinite.
    pub fn build<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Self> {
        let first = vectors.first().ok_or(NlqError::EmptyCorpus)?;
        let dimension = first.as_ref().len();
        if dimension == 0 {
            return Err(NlqError::DimensionMismatch { expected: 1, actual: 0 });
        }

        let mut matrix = Vec::with_capacity(dimension * vectors.len());
        for (slot, vector) in vectors.iter().enumerate() {
            let vector = vector.as_ref();
            if vector.len() != dimension {
                return Err(NlqError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            if !all_finite(vector) {
                return Err(NlqError::NonFiniteVector(format!("corpus row {slot}")));
            }
            matrix.extend_from_slice(vector);
        }

        Ok(Self { dimension, rows: vectors.len(), matrix })
    }

    /// Embedding dimension `d`.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Always false for a built index; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// The stored vector at `slot`, if any.
    pub fn row(&self, slot: usize) -> Option<&[f32]> {
        (slot < self.rows).then(|| &self.matrix[slot * self.dimension..(slot + 1) * self.dimension])
    }

    /// Return the `k` nearest rows to `query`, closest first.
    ///
    /// Equal distances are ordered by ascending slot, so results are fully
    /// deterministic. Returns `min(k, len)` neighbours.
    ///
    /// # Errors
    ///
    /// - [`NlqError::DimensionMismatch`] if `query.len() != dimension`.
    /// - [`NlqError::NonFiniteVector`] if the query has a NaN or infinite
    ///   component.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(NlqError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if !all_finite(query) {
            return Err(NlqError::NonFiniteVector("query".into()));
        }

        let k = k.min(self.rows);
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .matrix
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(slot, row)| Neighbor { slot, distance: squared_euclidean(query, row) })
            .collect();

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, closest_first);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(closest_first);
        Ok(neighbors)
    }
}

/// `Σ (a_i - b_i)^2`, accumulated left to right in `f64`.
///
/// Finite `f32` inputs cannot overflow here: each term is at most
/// `(2 * f32::MAX)^2`, far below `f64::MAX`.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum()
}

fn all_finite(vector: &[f32]) -> bool {
    vector.iter().all(|c| c.is_finite())
}

// Total order: distance (NaN sorts last), then slot.
fn closest_first(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance.total_cmp(&b.distance).then_with(|| a.slot.cmp(&b.slot))
}

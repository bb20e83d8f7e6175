//! # Similarity index
//!
//! In-memory nearest-neighbor structure over the stored question embeddings,
//! rebuilt from the answer store rather than persisted. Every vector is
//! L2-normalized before insertion and queries are scored by inner product,
//! which for unit vectors is exactly cosine similarity.
//!
//! ## Build semantics
//! Rows whose embedding does not parse, whose dimensionality differs from
//! the first usable row, or whose norm is zero are skipped with a log line.
//! A broken cache entry must never abort a chat response, so neither
//! [`AnswerIndex::build`] nor [`AnswerIndex::search`] ever returns an error:
//! anything unusable degrades to "no index" / "no hit" and the caller falls
//! through to its fallback lookup.
//!
//! ## Quick example
//! ```
//! use mist_ai::index::{AnswerIndex, l2_normalize};
//! use mist_ai::store::StoredEmbedding;
//!
//! let rows = vec![StoredEmbedding {
//!     id: 1,
//!     answer: "Kattankulathur, Tamil Nadu.".to_string(),
//!     embedding: "[1.0, 0.0]".to_string(),
//! }];
//! let index = AnswerIndex::build(&rows).unwrap();
//! let query = l2_normalize(&[0.9, 0.1]).unwrap();
//! let hit = index.search(&query).unwrap();
//! assert_eq!(hit.answer, "Kattankulathur, Tamil Nadu.");
//! ```

use hora::core::ann_index::ANNIndex;
use hora::core::metrics::Metric;
use hora::index::hnsw_idx::HNSWIndex;
use hora::index::hnsw_params::HNSWParams;

use crate::error::MistError;
use crate::store::StoredEmbedding;

/// Best match for a query vector: the stored answer and its cosine
/// similarity to the query.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub answer: String,
    pub score: f32,
}

/// Nearest-neighbor index over unit-length question embeddings.
pub struct AnswerIndex {
    index: HNSWIndex<f32, usize>,
    answers: Vec<String>,
    dimension: usize,
}

/// L2-normalize a vector.
///
/// Returns `None` when the norm is zero or not finite; such a vector cannot
/// point anywhere and callers treat it as "no semantic match possible".
pub fn l2_normalize(vector: &[f32]) -> Option<Vec<f32>> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }

    Some(vector.iter().map(|v| v / norm).collect())
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Parse a stored JSON embedding, enforcing dimensionality once known.
fn parse_embedding(raw: &str, expected_dimension: Option<usize>) -> Result<Vec<f32>, MistError> {
    let vector: Vec<f32> =
        serde_json::from_str(raw).map_err(|e| MistError::Data(e.to_string()))?;

    if let Some(expected) = expected_dimension {
        if vector.len() != expected {
            return Err(MistError::Data(format!(
                "expected {expected} dimensions, found {}",
                vector.len()
            )));
        }
    }

    Ok(vector)
}

impl AnswerIndex {
    /// Build an index from stored rows.
    ///
    /// The first row that parses and normalizes fixes the index
    /// dimensionality; later rows that disagree are skipped. Returns `None`
    /// when no usable rows remain or the underlying index refuses to build.
    pub fn build(rows: &[StoredEmbedding]) -> Option<Self> {
        let mut answers = Vec::new();
        let mut vectors: Vec<Vec<f32>> = Vec::new();
        let mut dimension: Option<usize> = None;

        for row in rows {
            let vector = match parse_embedding(&row.embedding, dimension) {
                Ok(vector) => vector,
                Err(err) => {
                    tracing::warn!(row_id = row.id, "skipping stored embedding: {err}");
                    continue;
                }
            };

            let Some(unit) = l2_normalize(&vector) else {
                tracing::warn!(row_id = row.id, "skipping zero-norm stored embedding");
                continue;
            };

            dimension.get_or_insert(unit.len());
            answers.push(row.answer.clone());
            vectors.push(unit);
        }

        let dimension = dimension?;

        let mut index = HNSWIndex::new(dimension, &HNSWParams::default());
        for (id, vector) in vectors.iter().enumerate() {
            if let Err(err) = index.add(vector, id) {
                tracing::warn!("similarity index rejected a vector: {err}");
                return None;
            }
        }
        if let Err(err) = index.build(Metric::Euclidean) {
            tracing::warn!("similarity index failed to build: {err}");
            return None;
        }

        Some(Self {
            index,
            answers,
            dimension,
        })
    }

    /// Number of indexed answers.
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Dimensionality fixed at build time.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Top-1 search.
    ///
    /// `query` must already be unit length; the returned score is its inner
    /// product with the best stored vector, i.e. cosine similarity. A query
    /// of the wrong dimensionality finds nothing.
    pub fn search(&self, query: &[f32]) -> Option<SemanticHit> {
        if query.len() != self.dimension {
            return None;
        }

        let neighbors = self.index.search_nodes(query, 1);
        let (node, _distance) = neighbors.first()?;
        let id = (*node.idx())?;
        let score = inner_product(query, node.vectors());

        Some(SemanticHit {
            answer: self.answers.get(id)?.clone(),
            score,
        })
    }
}

//! Persisted id→embedding map with cosine-similarity ranking.
//!
//! The whole index serializes as one JSON blob tagged with the embedding
//! model identifier. A blob written under a different model is invalid —
//! similarity across embedding spaces is meaningless — and decoding
//! reports the mismatch so the caller can start fresh.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const BLOB_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum IndexDecodeError {
    #[error("index blob does not parse: {0}")]
    Format(String),

    #[error("index blob version {0} is unsupported")]
    VersionMismatch(u32),

    #[error("index was built with model {found}, expected {expected}")]
    ModelMismatch { expected: String, found: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexBlob {
    version: u32,
    model: String,
    vectors: HashMap<String, Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: String,
    vectors: HashMap<String, Vec<f32>>,
}

impl VectorIndex {
    pub fn new(model: &str) -> Self {
        VectorIndex {
            model: model.to_string(),
            vectors: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.vectors.contains_key(id)
    }

    pub fn insert(&mut self, id: &str, embedding: Vec<f32>) {
        self.vectors.insert(id.to_string(), embedding);
    }

    /// No-op when the id is absent. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        self.vectors.remove(id).is_some()
    }

    /// Rank every indexed id against the query, best first, at most `k`
    /// results. Ties keep the map's iteration order; no secondary key is
    /// defined.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        let mut ranked: Vec<(String, f32)> = self
            .vectors
            .iter()
            .map(|(id, embedding)| (id.clone(), cosine_similarity(query, embedding)))
            .collect();

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        ranked
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let blob = IndexBlob {
            version: BLOB_VERSION,
            model: self.model.clone(),
            vectors: self.vectors.clone(),
        };
        // HashMap<String, Vec<f32>> always serializes
        serde_json::to_vec(&blob).unwrap_or_default()
    }

    pub fn from_bytes(bytes: &[u8], expected_model: &str) -> Result<Self, IndexDecodeError> {
        let blob: IndexBlob = serde_json::from_slice(bytes)
            .map_err(|err| IndexDecodeError::Format(err.to_string()))?;

        if blob.version != BLOB_VERSION {
            return Err(IndexDecodeError::VersionMismatch(blob.version));
        }
        if blob.model != expected_model {
            return Err(IndexDecodeError::ModelMismatch {
                expected: expected_model.to_string(),
                found: blob.model,
            });
        }

        Ok(VectorIndex {
            model: blob.model,
            vectors: blob.vectors,
        })
    }
}

/// `dot(a,b) / (|a| * |b|)`, defined as 0 when either vector has zero
/// magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

//! Semantic search infrastructure.
//!
//! - `embed`: the `EmbeddingProvider` boundary plus a fastembed-backed
//!   local provider
//! - `index`: the persisted id→embedding map with cosine ranking
//!
//! The store owns index persistence (the blob rides the same
//! backend-with-fallback path as every other record) and drives
//! reindexing; everything here is deliberately free of I/O.

pub mod embed;
pub mod index;

pub use embed::{EmbedError, EmbeddingProvider, FastembedProvider};
pub use index::{cosine_similarity, IndexDecodeError, VectorIndex};

/// Cap on the text handed to the embedding model. Long bodies past this
/// point add latency without moving the vector much.
const MAX_EMBED_CHARS: usize = 8000;

/// Outcome of a batch (re)indexing run. The job never aborts early;
/// per-entry failures only bump `errors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    pub processed: usize,
    pub errors: usize,
}

/// The text an entry is embedded under: title and body, whitespace
/// collapsed, truncated on a char boundary.
pub fn embedding_text(title: &str, content: &str) -> String {
    let combined = format!("{title}\n{content}");
    let mut text = combined.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.chars().count() > MAX_EMBED_CHARS {
        text = text.chars().take(MAX_EMBED_CHARS).collect();
    }

    text
}

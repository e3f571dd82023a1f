#![forbid(unsafe_code)]
//! shelfmatch-search library.
//!
//! Hybrid product retrieval: a dense embedding index (cosine similarity over
//! L2-normalized vectors), a BM25 keyword index, and a weighted score fusion
//! that merges both ranked lists into explainable results.
//!
//! # Conventions
//!
//! - **Errors**: [`SearchError`] at the library seam; embedders return
//!   `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod error;
pub mod fusion;
pub mod lexical;
pub mod semantic;
pub mod service;

pub use error::SearchError;
pub use fusion::{FusionConfig, HybridResult, HybridRetriever, MatchQuality};
pub use lexical::{Bm25Params, LexicalHit, LexicalIndex, normalize_lexical_score, tokenize};
pub use semantic::{EmbeddingIndex, Embedder, HashingEmbedder, IndexSummary, SemanticHit};
pub use service::SearchService;

#[cfg(feature = "semantic-model2vec")]
pub use semantic::StaticEmbedder;

/// Round to two decimals, the precision every reported score uses.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Map a value onto the `[0, 100]` reporting scale, treating NaN as 0.
pub(crate) fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

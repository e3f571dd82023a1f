//! Weighted fusion of semantic and lexical hits into explainable results.
//!
//! Both indices are over-retrieved, their 0-100 confidences are combined
//! linearly, and the fused score is bucketed into a [`MatchQuality`].

pub mod hybrid;
pub mod scoring;

pub use hybrid::{HybridResult, HybridRetriever, fuse};
pub use scoring::{FusionConfig, MatchQuality, classify, explain, final_score, retrieve_depth};

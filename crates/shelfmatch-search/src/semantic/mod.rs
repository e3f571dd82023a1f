//! Dense-embedding retrieval.

mod embed;
mod index;
mod store;

pub use embed::{Embedder, HashingEmbedder};
pub use index::{DEFAULT_BATCH_SIZE, EmbeddingIndex, SemanticHit};
pub use store::{IndexSummary, MAPPING_FILE, VECTORS_FILE, inspect};

#[cfg(feature = "semantic-model2vec")]
pub use embed::StaticEmbedder;

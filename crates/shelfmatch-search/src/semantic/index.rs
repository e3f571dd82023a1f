//! Flat inner-product index over L2-normalized embeddings.
//!
//! Vectors are stored row-major by corpus position. Because every row and the
//! query are unit length (or zero), inner product equals cosine similarity.

use crate::error::SearchError;
use crate::semantic::embed::Embedder;
use crate::{clamp_percent, round2};
use shelfmatch_core::{Corpus, ProductId, ProductMetadata};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Texts embedded per call during build.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// One nearest-neighbor result.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticHit {
    /// Corpus position of the matched row.
    pub position: usize,
    pub product_id: ProductId,
    /// Raw cosine similarity in `[-1, 1]`.
    pub similarity: f32,
    /// `similarity * 100`, clamped to `[0, 100]` and rounded to 2 decimals.
    pub confidence: f64,
    pub metadata: ProductMetadata,
}

/// Built state: vectors plus the position-keyed id mapping and metadata.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IndexState {
    pub(crate) dimension: usize,
    pub(crate) vectors: Vec<f32>,
    pub(crate) id_mapping: Vec<ProductId>,
    pub(crate) metadata: Vec<ProductMetadata>,
}

impl IndexState {
    pub(crate) fn rows(&self) -> usize {
        self.id_mapping.len()
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.vectors[start..start + self.dimension]
    }
}

/// Cosine nearest-neighbor index. Unusable until [`EmbeddingIndex::build`]
/// or a load succeeds.
pub struct EmbeddingIndex {
    pub(crate) embedder: Arc<dyn Embedder>,
    batch_size: usize,
    pub(crate) state: Option<IndexState>,
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("model_id", &self.embedder.model_id())
            .field("batch_size", &self.batch_size)
            .field("rows", &self.state.as_ref().map(IndexState::rows))
            .finish()
    }
}

impl EmbeddingIndex {
    /// An empty, not-yet-built index.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            state: None,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub(crate) fn from_state(embedder: Arc<dyn Embedder>, state: IndexState) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            state: Some(state),
        }
    }

    /// Embed every record's searchable text and replace any previous state.
    ///
    /// # Errors
    ///
    /// [`SearchError::EmptyCorpus`] for an empty corpus,
    /// [`SearchError::Embedding`] if the embedder fails, and
    /// [`SearchError::DimensionMismatch`] if it returns wrong-length vectors.
    #[instrument(skip_all, fields(records = corpus.len(), model = self.embedder.model_id()))]
    pub fn build(&mut self, corpus: &Corpus) -> Result<(), SearchError> {
        if corpus.is_empty() {
            return Err(SearchError::EmptyCorpus);
        }

        let dimension = self.embedder.dimension();
        let texts = corpus.texts();
        let mut vectors = Vec::with_capacity(texts.len() * dimension);

        for (batch_no, batch) in texts.chunks(self.batch_size).enumerate() {
            let embedded = self
                .embedder
                .embed_batch(batch)
                .map_err(|err| SearchError::embedding(&err))?;
            if embedded.len() != batch.len() {
                return Err(SearchError::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            for mut vector in embedded {
                if vector.len() != dimension {
                    return Err(SearchError::DimensionMismatch {
                        expected: dimension,
                        actual: vector.len(),
                    });
                }
                l2_normalize(&mut vector);
                vectors.extend_from_slice(&vector);
            }
            debug!(batch = batch_no, size = batch.len(), "embedded batch");
        }

        self.state = Some(IndexState {
            dimension,
            vectors,
            id_mapping: corpus.product_ids(),
            metadata: corpus.iter().map(|record| record.metadata()).collect(),
        });
        info!(rows = corpus.len(), dimension, "embedding index built");
        Ok(())
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        self.state.is_some()
    }

    /// Number of indexed rows; 0 before build.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, IndexState::rows)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.state
            .as_ref()
            .map_or_else(|| self.embedder.dimension(), |state| state.dimension)
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    /// Product ids by position; empty before build.
    #[must_use]
    pub fn product_ids(&self) -> &[ProductId] {
        self.state
            .as_ref()
            .map_or(&[][..], |state| state.id_mapping.as_slice())
    }

    /// Checked metadata lookup by position.
    #[must_use]
    pub fn metadata(&self, position: usize) -> Option<&ProductMetadata> {
        self.state.as_ref()?.metadata.get(position)
    }

    /// Top-`k` rows by cosine similarity to `query`.
    ///
    /// Ties keep corpus order. Non-finite similarities are dropped. A blank
    /// query, a query that embeds to the zero vector, or `k == 0` yields no
    /// hits.
    ///
    /// # Errors
    ///
    /// [`SearchError::NotReady`] before build, [`SearchError::Embedding`] if
    /// the query cannot be embedded, [`SearchError::DimensionMismatch`] if the
    /// query vector has the wrong length.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SemanticHit>, SearchError> {
        let state = self.state.as_ref().ok_or(SearchError::NotReady)?;
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut query_vector = self
            .embedder
            .embed(query)
            .map_err(|err| SearchError::embedding(&err))?;
        if query_vector.len() != state.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: state.dimension,
                actual: query_vector.len(),
            });
        }
        // A query with no embeddable content matches nothing.
        let norm = l2_normalize(&mut query_vector);
        if norm.is_nan() || norm <= 0.0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = (0..state.rows())
            .map(|position| (position, dot(&query_vector, state.row(position))))
            .filter(|(_, similarity)| similarity.is_finite())
            .collect();
        // Stable sort keeps insertion order among equal similarities.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        let hits = scored
            .into_iter()
            .filter_map(|(position, similarity)| {
                let product_id = *state.id_mapping.get(position)?;
                let metadata = state.metadata.get(position)?.clone();
                Some(SemanticHit {
                    position,
                    product_id,
                    similarity,
                    confidence: round2(clamp_percent(f64::from(similarity) * 100.0)),
                    metadata,
                })
            })
            .collect::<Vec<_>>();

        debug!(k, hits = hits.len(), "semantic search");
        Ok(hits)
    }
}

/// Scale to unit L2 norm and return the original norm. Zero vectors stay zero.
pub(crate) fn l2_normalize(v: &mut [f32]) -> f32 {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

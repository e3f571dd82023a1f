//! Hybrid retrieval over a semantic and a lexical index built from the same
//! corpus.
//!
//! Candidates are the union of both over-retrieved hit lists. A candidate seen
//! by only one index gets 0 for the other component; nothing else penalizes
//! disagreement.

use crate::error::SearchError;
use crate::fusion::scoring::{FusionConfig, MatchQuality, classify, explain, final_score, retrieve_depth};
use crate::lexical::{Bm25Params, LexicalHit, LexicalIndex, tokenize};
use crate::round2;
use crate::semantic::{EmbeddingIndex, Embedder, SemanticHit};
use serde::Serialize;
use shelfmatch_core::{Corpus, ProductId, ProductMetadata};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// One fused search result. Scores are rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridResult {
    pub product_id: ProductId,
    pub title: Option<String>,
    pub vendor: Option<String>,
    pub category: Option<String>,
    pub searchable_text: String,
    pub semantic_score: f64,
    pub lexical_score: f64,
    pub final_score: f64,
    /// Same value as `final_score`.
    pub confidence: f64,
    pub match_quality: MatchQuality,
    pub explanation: String,
}

struct Candidate<'a> {
    product_id: ProductId,
    semantic: f64,
    lexical: f64,
    metadata: &'a ProductMetadata,
}

/// Merge ranked hit lists into at most `k` results.
///
/// The union is seeded with semantic hits in rank order, then lexical-only
/// hits in rank order; that insertion order breaks ties in the rounded final
/// score. Match quality is classified from the unrounded score.
#[must_use]
pub fn fuse(
    semantic: &[SemanticHit],
    lexical: &[LexicalHit],
    k: usize,
    config: &FusionConfig,
) -> Vec<HybridResult> {
    let mut slots: HashMap<ProductId, usize> = HashMap::with_capacity(semantic.len() + lexical.len());
    let mut candidates: Vec<Candidate<'_>> = Vec::with_capacity(semantic.len() + lexical.len());

    for hit in semantic {
        if slots.contains_key(&hit.product_id) {
            continue;
        }
        slots.insert(hit.product_id, candidates.len());
        candidates.push(Candidate {
            product_id: hit.product_id,
            semantic: hit.confidence,
            lexical: 0.0,
            metadata: &hit.metadata,
        });
    }
    for hit in lexical {
        if let Some(&slot) = slots.get(&hit.product_id) {
            candidates[slot].lexical = hit.confidence;
            continue;
        }
        slots.insert(hit.product_id, candidates.len());
        candidates.push(Candidate {
            product_id: hit.product_id,
            semantic: 0.0,
            lexical: hit.confidence,
            metadata: &hit.metadata,
        });
    }

    let mut scored: Vec<(f64, Candidate<'_>)> = candidates
        .into_iter()
        .map(|c| (final_score(c.semantic, c.lexical, config), c))
        .collect();
    scored.sort_by(|a, b| round2(b.0).total_cmp(&round2(a.0)));
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(raw, c)| HybridResult {
            product_id: c.product_id,
            title: c.metadata.title.clone(),
            vendor: c.metadata.vendor.clone(),
            category: c.metadata.category.clone(),
            searchable_text: c.metadata.searchable_text.clone(),
            semantic_score: round2(c.semantic),
            lexical_score: round2(c.lexical),
            final_score: round2(raw),
            confidence: round2(raw),
            match_quality: classify(raw, config),
            explanation: explain(c.semantic, c.lexical),
        })
        .collect()
}

/// A semantic and a lexical index over the same product ids, plus the fusion
/// configuration. Immutable once constructed; share it behind an `Arc`.
#[derive(Debug)]
pub struct HybridRetriever {
    semantic: EmbeddingIndex,
    lexical: LexicalIndex,
    config: FusionConfig,
}

impl HybridRetriever {
    /// Build both indices from `corpus`.
    ///
    /// # Errors
    ///
    /// Any error from [`EmbeddingIndex::build`].
    #[instrument(skip_all, fields(records = corpus.len()))]
    pub fn build(
        corpus: &Corpus,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
        bm25: Bm25Params,
        config: FusionConfig,
    ) -> Result<Self, SearchError> {
        let mut semantic = EmbeddingIndex::new(embedder).with_batch_size(batch_size);
        semantic.build(corpus)?;
        let lexical = LexicalIndex::build(corpus, bm25);
        Self::from_parts(semantic, lexical, config)
    }

    /// Load the persisted semantic index from `index_dir` and rebuild the
    /// lexical index from `corpus`.
    ///
    /// # Errors
    ///
    /// Any error from [`EmbeddingIndex::load`], or
    /// [`SearchError::IdUniverseMismatch`] if `corpus` is not the catalog
    /// the index was built from.
    #[instrument(skip_all, fields(dir = %index_dir.display()))]
    pub fn open(
        index_dir: &Path,
        corpus: &Corpus,
        embedder: Arc<dyn Embedder>,
        bm25: Bm25Params,
        config: FusionConfig,
    ) -> Result<Self, SearchError> {
        let semantic = EmbeddingIndex::load(index_dir, embedder)?;
        let lexical = LexicalIndex::build(corpus, bm25);
        Self::from_parts(semantic, lexical, config)
    }

    /// Pair two prebuilt indices.
    ///
    /// # Errors
    ///
    /// [`SearchError::NotReady`] if the semantic index is unbuilt and
    /// [`SearchError::IdUniverseMismatch`] if the indices cover different
    /// product ids or index different text for the same id.
    pub fn from_parts(
        semantic: EmbeddingIndex,
        lexical: LexicalIndex,
        config: FusionConfig,
    ) -> Result<Self, SearchError> {
        if !semantic.is_built() {
            return Err(SearchError::NotReady);
        }
        check_same_corpus(&semantic, &lexical)?;
        info!(products = semantic.len(), "hybrid retriever ready");
        Ok(Self {
            semantic,
            lexical,
            config,
        })
    }

    #[must_use]
    pub const fn semantic(&self) -> &EmbeddingIndex {
        &self.semantic
    }

    #[must_use]
    pub const fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }

    #[must_use]
    pub const fn config(&self) -> &FusionConfig {
        &self.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.semantic.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.semantic.is_empty()
    }

    /// Persist the semantic index. The lexical index is rebuilt from the
    /// catalog on open.
    ///
    /// # Errors
    ///
    /// Any error from [`EmbeddingIndex::save`].
    pub fn save(&self, index_dir: &Path) -> Result<(), SearchError> {
        self.semantic.save(index_dir)
    }

    /// Fused top-`k` results for `query`. A query with no tokens or `k == 0`
    /// yields an empty list.
    ///
    /// # Errors
    ///
    /// Any error from [`EmbeddingIndex::search`].
    #[instrument(skip(self), fields(query_len = query.len()))]
    pub fn search_hybrid(&self, query: &str, k: usize) -> Result<Vec<HybridResult>, SearchError> {
        if k == 0 || tokenize(query).is_empty() {
            return Ok(Vec::new());
        }

        let depth = retrieve_depth(k, self.config.max_retrieve);
        let semantic = self.semantic.search(query, depth)?;
        let lexical = self.lexical.search(query, depth);
        let results = fuse(&semantic, &lexical, k, &self.config);

        debug!(
            depth,
            semantic = semantic.len(),
            lexical = lexical.len(),
            results = results.len(),
            "hybrid search"
        );
        Ok(results)
    }

    /// Semantic-only top-`k`.
    ///
    /// # Errors
    ///
    /// Any error from [`EmbeddingIndex::search`].
    pub fn search_semantic(&self, query: &str, k: usize) -> Result<Vec<SemanticHit>, SearchError> {
        self.semantic.search(query, k)
    }

    /// Keyword-only top-`k`.
    #[must_use]
    pub fn search_lexical(&self, query: &str, k: usize) -> Vec<LexicalHit> {
        self.lexical.search(query, k)
    }
}

fn check_same_ids(semantic: &[ProductId], lexical: &[ProductId]) -> Result<(), SearchError> {
    let semantic_ids: HashSet<ProductId> = semantic.iter().copied().collect();
    let lexical_ids: HashSet<ProductId> = lexical.iter().copied().collect();
    if semantic_ids == lexical_ids {
        return Ok(());
    }

    let only_semantic = semantic_ids.difference(&lexical_ids).count();
    let only_lexical = lexical_ids.difference(&semantic_ids).count();
    Err(SearchError::IdUniverseMismatch {
        detail: format!(
            "{only_semantic} ids only in the semantic index, {only_lexical} only in the lexical index"
        ),
    })
}

fn check_same_corpus(semantic: &EmbeddingIndex, lexical: &LexicalIndex) -> Result<(), SearchError> {
    check_same_ids(semantic.product_ids(), lexical.product_ids())?;

    let lexical_texts: HashMap<ProductId, &str> = lexical
        .product_ids()
        .iter()
        .enumerate()
        .filter_map(|(position, id)| {
            let text = lexical.metadata(position)?.searchable_text.as_str();
            Some((*id, text))
        })
        .collect();
    let changed = semantic
        .product_ids()
        .iter()
        .enumerate()
        .filter(|(position, id)| {
            let text = semantic
                .metadata(*position)
                .map(|metadata| metadata.searchable_text.as_str());
            text != lexical_texts.get(*id).copied()
        })
        .count();
    if changed == 0 {
        return Ok(());
    }

    Err(SearchError::IdUniverseMismatch {
        detail: format!("{changed} product(s) have different searchable text in each index"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::HashingEmbedder;
    use shelfmatch_core::ProductRecord;

    fn metadata(text: &str) -> ProductMetadata {
        ProductMetadata {
            title: Some(text.to_string()),
            vendor: None,
            category: None,
            searchable_text: text.to_string(),
        }
    }

    fn sem(id: ProductId, confidence: f64) -> SemanticHit {
        SemanticHit {
            position: 0,
            product_id: id,
            similarity: (confidence / 100.0) as f32,
            confidence,
            metadata: metadata(&format!("semantic {id}")),
        }
    }

    fn lex(id: ProductId, confidence: f64) -> LexicalHit {
        LexicalHit {
            position: 0,
            product_id: id,
            score: confidence,
            confidence,
            metadata: metadata(&format!("lexical {id}")),
        }
    }

    fn corpus(rows: &[(ProductId, &str)]) -> Corpus {
        Corpus::new(
            rows.iter()
                .map(|(id, text)| ProductRecord {
                    product_id: *id,
                    title: Some((*text).to_string()),
                    vendor: None,
                    category: None,
                    tags: Vec::new(),
                    searchable_text: (*text).to_string(),
                    title_cleaned: String::new(),
                    vendor_cleaned: String::new(),
                })
                .collect(),
        )
        .expect("corpus")
    }

    #[test]
    fn fuse_zero_fills_missing_components() {
        let results = fuse(&[sem(1, 80.0)], &[lex(2, 90.0)], 5, &FusionConfig::default());
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].product_id, 1);
        assert!((results[0].final_score - 56.0).abs() < 1e-9);
        assert!((results[0].lexical_score).abs() < f64::EPSILON);

        assert_eq!(results[1].product_id, 2);
        assert!((results[1].final_score - 27.0).abs() < 1e-9);
        assert_eq!(results[1].match_quality, MatchQuality::VeryLow);
    }

    #[test]
    fn fuse_combines_shared_candidates_and_prefers_semantic_metadata() {
        let results = fuse(&[sem(1, 90.0)], &[lex(1, 80.0)], 5, &FusionConfig::default());
        assert_eq!(results.len(), 1);
        let only = &results[0];
        assert!((only.final_score - 87.0).abs() < 1e-9);
        assert!((only.confidence - only.final_score).abs() < f64::EPSILON);
        assert_eq!(only.match_quality, MatchQuality::High);
        assert_eq!(only.searchable_text, "semantic 1");
        assert_eq!(
            only.explanation,
            "Strong semantic similarity + Strong keyword match"
        );
    }

    #[test]
    fn fuse_ties_put_semantic_candidates_first() {
        // 0.7 * 30 = 21 = 0.3 * 70
        let results = fuse(&[sem(5, 30.0)], &[lex(6, 70.0)], 5, &FusionConfig::default());
        let ids: Vec<_> = results.iter().map(|r| r.product_id).collect();
        assert_eq!(ids, vec![5, 6]);
    }

    #[test]
    fn quality_uses_the_unrounded_score() {
        // 0.7 * 100 + 0.3 * 49.99 = 84.997, reported as 85 but still MEDIUM
        let results = fuse(&[sem(1, 100.0)], &[lex(1, 49.99)], 5, &FusionConfig::default());
        assert!((results[0].final_score - 85.0).abs() < 1e-9);
        assert_eq!(results[0].match_quality, MatchQuality::Medium);
    }

    #[test]
    fn fuse_truncates_to_k() {
        let semantic: Vec<_> = (1..=10).map(|id| sem(id, 50.0)).collect();
        let results = fuse(&semantic, &[], 3, &FusionConfig::default());
        assert_eq!(results.len(), 3);
        assert!(fuse(&semantic, &[], 0, &FusionConfig::default()).is_empty());
    }

    #[test]
    fn leather_leash_ranks_leash_first() {
        let retriever = HybridRetriever::build(
            &corpus(&[(1, "red leather dog leash"), (2, "blue nylon cat collar")]),
            Arc::new(HashingEmbedder::default()),
            32,
            Bm25Params::default(),
            FusionConfig::default(),
        )
        .expect("build");

        let results = retriever.search_hybrid("leather leash", 2).expect("search");
        assert_eq!(results[0].product_id, 1);
        if let Some(second) = results.get(1) {
            assert!(results[0].final_score > second.final_score);
        }
    }

    #[test]
    fn blank_query_returns_nothing() {
        let retriever = HybridRetriever::build(
            &corpus(&[(1, "dog bed")]),
            Arc::new(HashingEmbedder::new(32)),
            32,
            Bm25Params::default(),
            FusionConfig::default(),
        )
        .expect("build");
        assert!(retriever.search_hybrid("   ", 5).expect("search").is_empty());
        assert!(retriever.search_hybrid("!!! ???", 5).expect("search").is_empty());
        assert!(retriever.search_hybrid("dog", 0).expect("search").is_empty());
    }

    #[test]
    fn from_parts_rejects_unbuilt_semantic_index() {
        let semantic = EmbeddingIndex::new(Arc::new(HashingEmbedder::new(8)));
        let lexical = LexicalIndex::build(&corpus(&[(1, "dog")]), Bm25Params::default());
        let err = HybridRetriever::from_parts(semantic, lexical, FusionConfig::default())
            .expect_err("unbuilt");
        assert!(matches!(err, SearchError::NotReady));
    }

    #[test]
    fn from_parts_rejects_disjoint_ids() {
        let mut semantic = EmbeddingIndex::new(Arc::new(HashingEmbedder::new(8)));
        semantic.build(&corpus(&[(1, "dog"), (2, "cat")])).expect("build");
        let lexical = LexicalIndex::build(&corpus(&[(1, "dog"), (3, "cat")]), Bm25Params::default());

        let err = HybridRetriever::from_parts(semantic, lexical, FusionConfig::default())
            .expect_err("mismatch");
        assert!(matches!(err, SearchError::IdUniverseMismatch { .. }));
    }

    #[test]
    fn from_parts_rejects_changed_text() {
        let mut semantic = EmbeddingIndex::new(Arc::new(HashingEmbedder::new(8)));
        semantic.build(&corpus(&[(1, "dog"), (2, "cat")])).expect("build");
        let lexical =
            LexicalIndex::build(&corpus(&[(1, "dog"), (2, "parrot")]), Bm25Params::default());

        let err = HybridRetriever::from_parts(semantic, lexical, FusionConfig::default())
            .expect_err("text drift");
        let SearchError::IdUniverseMismatch { detail } = err else {
            panic!("expected an id universe mismatch, got {err:?}");
        };
        assert!(detail.contains("different searchable text"));
    }
}

//! In-memory inverted index scored with Okapi BM25.
//!
//! Term statistics (document frequency, IDF, average document length) are
//! computed once in [`LexicalIndex::build`]; the index is read-only after.
//!
//! ```text
//! idf(t)     = ln(1 + (N - df + 0.5) / (df + 0.5))
//! score(d,q) = sum over q terms: idf * tf * (k1 + 1) / (tf + k1 * (1 - b + b * |d| / avgdl))
//! ```

use crate::lexical::tokenize::tokenize;
use crate::{clamp_percent, round2};
use shelfmatch_core::{Corpus, ProductId, ProductMetadata};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Ceiling applied after rounding so a normalized score never reads 100.
const NORMALIZED_CEILING: f64 = 99.99;

/// BM25 free parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl From<&shelfmatch_core::config::LexicalConfig> for Bm25Params {
    fn from(config: &shelfmatch_core::config::LexicalConfig) -> Self {
        Self {
            k1: f64::from(config.k1),
            b: f64::from(config.b),
        }
    }
}

/// One keyword-match result.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub position: usize,
    pub product_id: ProductId,
    /// Raw BM25 score, always positive.
    pub score: f64,
    /// [`normalize_lexical_score`] of `score`.
    pub confidence: f64,
    pub metadata: ProductMetadata,
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    position: usize,
    term_frequency: u32,
}

/// BM25 index over the searchable text of a corpus.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    params: Bm25Params,
    postings: HashMap<String, Vec<Posting>>,
    idf: HashMap<String, f64>,
    doc_lengths: Vec<usize>,
    avg_doc_len: f64,
    id_mapping: Vec<ProductId>,
    metadata: Vec<ProductMetadata>,
}

impl LexicalIndex {
    /// Tokenize every record in corpus order and derive term statistics.
    ///
    /// An empty corpus yields an empty index whose searches return nothing.
    #[instrument(skip_all, fields(records = corpus.len()))]
    pub fn build(corpus: &Corpus, params: Bm25Params) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(corpus.len());

        for (position, record) in corpus.iter().enumerate() {
            let tokens = tokenize(&record.searchable_text);
            doc_lengths.push(tokens.len());

            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *counts.entry(token).or_default() += 1;
            }
            for (term, term_frequency) in counts {
                postings.entry(term).or_default().push(Posting {
                    position,
                    term_frequency,
                });
            }
        }

        let total_docs = doc_lengths.len() as f64;
        let avg_doc_len = if doc_lengths.is_empty() {
            0.0
        } else {
            doc_lengths.iter().sum::<usize>() as f64 / total_docs
        };
        let idf = postings
            .iter()
            .map(|(term, list)| (term.clone(), idf_plus1(total_docs, list.len() as f64)))
            .collect();

        info!(
            docs = doc_lengths.len(),
            terms = postings.len(),
            avg_doc_len,
            "lexical index built"
        );
        Self {
            params,
            postings,
            idf,
            doc_lengths,
            avg_doc_len,
            id_mapping: corpus.product_ids(),
            metadata: corpus.iter().map(|record| record.metadata()).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    #[must_use]
    pub const fn params(&self) -> Bm25Params {
        self.params
    }

    /// Product ids by position.
    #[must_use]
    pub fn product_ids(&self) -> &[ProductId] {
        &self.id_mapping
    }

    /// Checked metadata lookup by position.
    #[must_use]
    pub fn metadata(&self, position: usize) -> Option<&ProductMetadata> {
        self.metadata.get(position)
    }

    /// Number of documents containing `term`.
    #[must_use]
    pub fn doc_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, Vec::len)
    }

    /// BM25 score of every document for `query`, by position.
    ///
    /// Repeated query terms contribute once per occurrence.
    #[must_use]
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let mut scores = vec![0.0_f64; self.len()];
        let Bm25Params { k1, b } = self.params;

        for term in tokenize(query) {
            let (Some(list), Some(&idf)) = (self.postings.get(&term), self.idf.get(&term)) else {
                continue;
            };
            for posting in list {
                let tf = f64::from(posting.term_frequency);
                let length_norm = if self.avg_doc_len > 0.0 {
                    self.doc_lengths[posting.position] as f64 / self.avg_doc_len
                } else {
                    1.0
                };
                scores[posting.position] +=
                    idf * tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * length_norm));
            }
        }
        scores
    }

    /// Top-`k` documents by BM25 score. Documents scoring zero or less are
    /// excluded and ties keep corpus order.
    #[must_use]
    pub fn search(&self, query: &str, k: usize) -> Vec<LexicalHit> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = self
            .scores(query)
            .into_iter()
            .enumerate()
            .filter(|(_, score)| score.is_finite() && *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        let hits: Vec<LexicalHit> = scored
            .into_iter()
            .filter_map(|(position, score)| {
                Some(LexicalHit {
                    position,
                    product_id: *self.id_mapping.get(position)?,
                    score,
                    confidence: normalize_lexical_score(score),
                    metadata: self.metadata.get(position)?.clone(),
                })
            })
            .collect();

        debug!(k, hits = hits.len(), "lexical search");
        hits
    }
}

fn idf_plus1(total_docs: f64, doc_freq: f64) -> f64 {
    ((total_docs - doc_freq + 0.5) / (doc_freq + 0.5)).ln_1p()
}

/// Map an unbounded BM25 score onto `[0, 100)`:
/// `round(clamp(100 * (1 - e^(-s/10)), 0, 100), 2)`, capped at 99.99.
#[must_use]
pub fn normalize_lexical_score(score: f64) -> f64 {
    let scaled = 100.0 * (1.0 - (-score / 10.0).exp());
    round2(clamp_percent(scaled)).min(NORMALIZED_CEILING)
}

//! Shared search context for concurrent callers.
//!
//! The lock guards only the `Arc` pointer; it is held long enough to clone or
//! replace it, never across a query. A swapped-in retriever takes effect for
//! the next snapshot while in-flight queries finish on the old one.

use crate::error::SearchError;
use crate::fusion::{HybridResult, HybridRetriever};
use std::num::NonZeroUsize;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use tracing::{debug, info};

/// Holds the current [`HybridRetriever`] and runs queries against it.
#[derive(Debug)]
pub struct SearchService {
    current: RwLock<Arc<HybridRetriever>>,
}

impl SearchService {
    #[must_use]
    pub fn new(retriever: HybridRetriever) -> Self {
        Self {
            current: RwLock::new(Arc::new(retriever)),
        }
    }

    /// The retriever new queries will run against.
    #[must_use]
    pub fn snapshot(&self) -> Arc<HybridRetriever> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Install a rebuilt retriever, returning the one it replaced.
    pub fn swap(&self, retriever: HybridRetriever) -> Arc<HybridRetriever> {
        let next = Arc::new(retriever);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, next);
        drop(guard);
        info!(products = previous.len(), "search retriever swapped");
        previous
    }

    /// Fused top-`k` for one query.
    ///
    /// # Errors
    ///
    /// Any error from [`HybridRetriever::search_hybrid`].
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<HybridResult>, SearchError> {
        self.snapshot().search_hybrid(query, k)
    }

    /// Run every query on its own scoped worker thread, at most
    /// `available_parallelism` at a time. Results are in input order and all
    /// queries see the same snapshot.
    pub fn search_many<S>(&self, queries: &[S], k: usize) -> Vec<Result<Vec<HybridResult>, SearchError>>
    where
        S: AsRef<str> + Sync,
    {
        let retriever = self.snapshot();
        let wave = thread::available_parallelism().map_or(4, NonZeroUsize::get);
        debug!(queries = queries.len(), wave, "batch search");

        let mut results = Vec::with_capacity(queries.len());
        for chunk in queries.chunks(wave) {
            thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|query| {
                        let retriever = &retriever;
                        scope.spawn(move || retriever.search_hybrid(query.as_ref(), k))
                    })
                    .collect();
                for handle in handles {
                    results.push(
                        handle
                            .join()
                            .unwrap_or_else(|payload| std::panic::resume_unwind(payload)),
                    );
                }
            });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::FusionConfig;
    use crate::lexical::Bm25Params;
    use crate::semantic::HashingEmbedder;
    use shelfmatch_core::{Corpus, ProductId, ProductRecord};

    fn retriever(rows: &[(ProductId, &str)]) -> HybridRetriever {
        let corpus = Corpus::new(
            rows.iter()
                .map(|(id, text)| ProductRecord {
                    product_id: *id,
                    title: None,
                    vendor: None,
                    category: None,
                    tags: Vec::new(),
                    searchable_text: (*text).to_string(),
                    title_cleaned: String::new(),
                    vendor_cleaned: String::new(),
                })
                .collect(),
        )
        .expect("corpus");
        HybridRetriever::build(
            &corpus,
            Arc::new(HashingEmbedder::new(64)),
            8,
            Bm25Params::default(),
            FusionConfig::default(),
        )
        .expect("build")
    }

    #[test]
    fn search_many_matches_sequential_results_in_order() {
        let service = SearchService::new(retriever(&[
            (1, "red leather dog leash"),
            (2, "blue nylon cat collar"),
            (3, "orthopedic dog bed"),
        ]));
        let queries: Vec<String> = ["leash", "collar", "bed", "", "dog"]
            .iter()
            .cycle()
            .take(23)
            .map(|q| (*q).to_string())
            .collect();

        let batch = service.search_many(&queries, 2);
        assert_eq!(batch.len(), queries.len());
        for (query, result) in queries.iter().zip(batch) {
            let expected = service.search(query, 2).expect("sequential");
            assert_eq!(result.expect("batch"), expected);
        }
    }

    #[test]
    fn swap_replaces_retriever_for_new_snapshots() {
        let service = SearchService::new(retriever(&[(1, "dog bed")]));
        let before = service.snapshot();

        let previous = service.swap(retriever(&[(1, "dog bed"), (2, "cat tree")]));
        assert!(Arc::ptr_eq(&before, &previous));
        assert_eq!(before.len(), 1);
        assert_eq!(service.snapshot().len(), 2);

        let hits = service.search("cat tree", 1).expect("search");
        assert_eq!(hits[0].product_id, 2);
    }
}

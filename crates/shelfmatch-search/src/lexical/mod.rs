//! Keyword retrieval with Okapi BM25.

mod index;
mod tokenize;

pub use index::{Bm25Params, LexicalHit, LexicalIndex, normalize_lexical_score};
pub use tokenize::tokenize;

//! The embedding model seam.
//!
//! Indices talk to an [`Embedder`]; which model backs it is a deployment
//! choice. [`HashingEmbedder`] needs no model files and is fully
//! deterministic. `StaticEmbedder` (feature `semantic-model2vec`) loads a
//! Model2Vec-style static embedding table.

use anyhow::{Result, anyhow};

/// Text-to-vector model used by the embedding index.
///
/// Implementations must be `Send + Sync`: one embedder is shared by every
/// concurrent query.
pub trait Embedder: Send + Sync {
    /// Identifier persisted next to the vectors so a load with a different
    /// model can be flagged.
    fn model_id(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails or yields no vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedder returned no vector for a single input"))
    }
}

// ---------------------------------------------------------------------------
// Feature hashing
// ---------------------------------------------------------------------------

const TOKEN_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic feature-hashing embedder.
///
/// Each lowercase word token and each boundary-marked character trigram
/// (`<le`, `lea`, ..., `er>`) is hashed with BLAKE3 into a signed bucket.
/// Texts that share words or word fragments land close in cosine space.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimension`-length vectors (at least 1).
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_id: format!("hashing-blake3-{dimension}"),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in crate::lexical::tokenize(text) {
            self.accumulate(&mut vector, b"w:", token.as_bytes(), TOKEN_WEIGHT);

            let marked: Vec<char> = std::iter::once('<')
                .chain(token.chars())
                .chain(std::iter::once('>'))
                .collect();
            let mut gram = String::with_capacity(12);
            for window in marked.windows(3) {
                gram.clear();
                gram.extend(window);
                self.accumulate(&mut vector, b"g:", gram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], namespace: &[u8], feature: &[u8], weight: f32) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(namespace);
        hasher.update(feature);
        let digest = hasher.finalize();

        let mut head = [0_u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        let bits = u64::from_le_bytes(head);

        let bucket = usize::try_from(bits % self.dimension as u64).unwrap_or_default();
        let sign = if digest.as_bytes()[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

// ---------------------------------------------------------------------------
// Static (Model2Vec-style) embeddings
// ---------------------------------------------------------------------------

#[cfg(feature = "semantic-model2vec")]
mod static_model {
    use super::Embedder;
    use anyhow::{Context, Result, anyhow, bail};
    use safetensors::{Dtype, SafeTensors};
    use std::fs;
    use std::path::Path;
    use tokenizers::Tokenizer;
    use tracing::info;

    const WEIGHTS_FILE: &str = "model.safetensors";
    const TOKENIZER_FILE: &str = "tokenizer.json";
    const EMBEDDINGS_TENSOR: &str = "embeddings";

    /// Static token-embedding table, mean-pooled per text.
    pub struct StaticEmbedder {
        model_id: String,
        tokenizer: Tokenizer,
        table: Vec<f32>,
        vocab_size: usize,
        dimension: usize,
    }

    impl StaticEmbedder {
        /// Load `model.safetensors` and `tokenizer.json` from `dir`.
        ///
        /// # Errors
        ///
        /// Returns an error if either file is missing or the `embeddings`
        /// tensor is not a 2-D F32 table.
        pub fn from_dir(dir: &Path) -> Result<Self> {
            let weights_path = dir.join(WEIGHTS_FILE);
            let bytes = fs::read(&weights_path)
                .with_context(|| format!("failed to read {}", weights_path.display()))?;
            let tensors = SafeTensors::deserialize(&bytes)
                .with_context(|| format!("failed to parse {}", weights_path.display()))?;
            let view = tensors
                .tensor(EMBEDDINGS_TENSOR)
                .with_context(|| format!("{} has no `{EMBEDDINGS_TENSOR}` tensor", weights_path.display()))?;

            if view.dtype() != Dtype::F32 {
                bail!("expected F32 embeddings, found {:?}", view.dtype());
            }
            let [vocab_size, dimension] = view.shape() else {
                bail!("expected a 2-D embedding table, found shape {:?}", view.shape());
            };
            let (vocab_size, dimension) = (*vocab_size, *dimension);

            let table: Vec<f32> = view
                .data()
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            if table.len() != vocab_size * dimension {
                bail!(
                    "embedding table holds {} values, expected {vocab_size}x{dimension}",
                    table.len()
                );
            }

            let tokenizer_path = dir.join(TOKENIZER_FILE);
            let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|err| {
                anyhow!("failed to load tokenizer {}: {err}", tokenizer_path.display())
            })?;

            let model_id = dir
                .file_name()
                .map_or_else(|| "model2vec".to_string(), |n| n.to_string_lossy().into_owned());
            info!(model_id, vocab_size, dimension, "loaded static embedding model");

            Ok(Self {
                model_id,
                tokenizer,
                table,
                vocab_size,
                dimension,
            })
        }

        fn pool(&self, ids: &[u32]) -> Vec<f32> {
            let mut pooled = vec![0.0_f32; self.dimension];
            let mut count = 0_usize;
            for &id in ids {
                let row = id as usize;
                if row >= self.vocab_size {
                    continue;
                }
                let start = row * self.dimension;
                for (acc, value) in pooled
                    .iter_mut()
                    .zip(&self.table[start..start + self.dimension])
                {
                    *acc += value;
                }
                count += 1;
            }
            if count > 0 {
                let scale = 1.0 / count as f32;
                pooled.iter_mut().for_each(|v| *v *= scale);
            }
            pooled
        }
    }

    impl Embedder for StaticEmbedder {
        fn model_id(&self) -> &str {
            &self.model_id
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            texts
                .iter()
                .map(|text| {
                    let encoding = self
                        .tokenizer
                        .encode(*text, false)
                        .map_err(|err| anyhow!("tokenization failed: {err}"))?;
                    Ok(self.pool(encoding.get_ids()))
                })
                .collect()
        }
    }
}

#[cfg(feature = "semantic-model2vec")]
pub use static_model::StaticEmbedder;

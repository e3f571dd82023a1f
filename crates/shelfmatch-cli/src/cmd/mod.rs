//! Command handlers and the project context they share.

pub mod batch;
pub mod build;
pub mod completions;
pub mod prepare;
pub mod search;
pub mod status;

use crate::timing::timed;
use anyhow::Context;
use shelfmatch_core::ErrorCode;
use shelfmatch_core::catalog::load_corpus;
use shelfmatch_core::config::{Config, EmbeddingBackend, EmbeddingConfig, PathsConfig, load_config};
use shelfmatch_search::{Bm25Params, Embedder, FusionConfig, HashingEmbedder, HybridRetriever};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Failures raised by the CLI itself rather than the libraries.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("embedding backend `model2vec` needs `embedding.model_path` in the config")]
    ModelPathMissing,

    #[error("embedding backend `model2vec` is not compiled in (build with `--features semantic-model2vec`)")]
    BackendUnavailable,

    #[error("failed to load embedding model from {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },
}

impl CommandError {
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ModelPathMissing | Self::BackendUnavailable | Self::ModelLoad { .. } => {
                ErrorCode::ModelLoadFailed
            }
        }
    }
}

/// Config plus resolved paths for one project root.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
    pub paths: PathsConfig,
}

impl Project {
    /// Load `.shelfmatch/config.toml` under `root`, or defaults.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let config = timed("load_config", || load_config(root))?;
        let paths = config.paths.resolved(root);
        Ok(Self {
            root: root.to_path_buf(),
            config,
            paths,
        })
    }

    /// A path given on the command line, relative to the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub fn bm25(&self) -> Bm25Params {
        Bm25Params::from(&self.config.lexical)
    }

    pub fn fusion(&self) -> FusionConfig {
        FusionConfig::from(&self.config.search)
    }

    pub fn embedder(&self) -> Result<Arc<dyn Embedder>, CommandError> {
        timed("load_model", || make_embedder(&self.config.embedding, &self.root))
    }

    /// Load the processed catalog and the persisted index into a retriever.
    pub fn open_retriever(&self) -> anyhow::Result<HybridRetriever> {
        let catalog = &self.paths.catalog;
        let corpus = timed("load_catalog", || load_corpus(catalog))
            .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
        let embedder = self.embedder()?;

        let index_dir = &self.paths.index_dir;
        timed("load_index", || {
            HybridRetriever::open(index_dir, &corpus, embedder, self.bm25(), self.fusion())
        })
        .with_context(|| format!("Failed to open index {}", index_dir.display()))
    }
}

fn make_embedder(config: &EmbeddingConfig, root: &Path) -> Result<Arc<dyn Embedder>, CommandError> {
    match config.backend {
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension))),
        EmbeddingBackend::Model2vec => {
            let dir = config
                .model_path
                .as_deref()
                .ok_or(CommandError::ModelPathMissing)?;
            load_static_embedder(&root.join(dir))
        }
    }
}

#[cfg(feature = "semantic-model2vec")]
fn load_static_embedder(dir: &Path) -> Result<Arc<dyn Embedder>, CommandError> {
    let embedder = shelfmatch_search::StaticEmbedder::from_dir(dir).map_err(|err| {
        CommandError::ModelLoad {
            path: dir.to_path_buf(),
            reason: format!("{err:#}"),
        }
    })?;
    tracing::info!(model = embedder.model_id(), dimension = embedder.dimension(), "loaded static embedder");
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "semantic-model2vec"))]
fn load_static_embedder(_dir: &Path) -> Result<Arc<dyn Embedder>, CommandError> {
    Err(CommandError::BackendUnavailable)
}

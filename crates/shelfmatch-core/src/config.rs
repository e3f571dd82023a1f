use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project configuration loaded from `.shelfmatch/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub lexical: LexicalConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_raw_catalog")]
    pub raw_catalog: PathBuf,
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_catalog: default_raw_catalog(),
            catalog: default_catalog(),
            index_dir: default_index_dir(),
        }
    }
}

impl PathsConfig {
    /// Resolve every relative path against `root`.
    #[must_use]
    pub fn resolved(&self, root: &Path) -> Self {
        Self {
            raw_catalog: root.join(&self.raw_catalog),
            catalog: root.join(&self.catalog),
            index_dir: root.join(&self.index_dir),
        }
    }
}

/// Which embedder backs the semantic index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Hashing,
    Model2vec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,
    /// Directory holding `model.safetensors` and `tokenizer.json` for the
    /// `model2vec` backend.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model_path: None,
            dimension: default_dimension(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalConfig {
    #[serde(default = "default_k1")]
    pub k1: f32,
    #[serde(default = "default_b")]
    pub b: f32,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
    /// Upper bound on candidates pulled from each index per query.
    #[serde(default = "default_max_retrieve")]
    pub max_retrieve: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_weight: default_semantic_weight(),
            lexical_weight: default_lexical_weight(),
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            low_threshold: default_low_threshold(),
            max_retrieve: default_max_retrieve(),
            default_limit: default_limit(),
        }
    }
}

/// Load `<project_root>/.shelfmatch/config.toml`, falling back to defaults
/// when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<Config> {
    let path = config_path(project_root);
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<Config>(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[must_use]
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(".shelfmatch/config.toml")
}

fn default_raw_catalog() -> PathBuf {
    PathBuf::from("data/product_catalogue.jsonl")
}

fn default_catalog() -> PathBuf {
    PathBuf::from("data/product_catalogue_processed.jsonl")
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("models")
}

const fn default_dimension() -> usize {
    384
}

const fn default_batch_size() -> usize {
    32
}

const fn default_k1() -> f32 {
    1.5
}

const fn default_b() -> f32 {
    0.75
}

const fn default_semantic_weight() -> f64 {
    0.7
}

const fn default_lexical_weight() -> f64 {
    0.3
}

const fn default_high_threshold() -> f64 {
    85.0
}

const fn default_medium_threshold() -> f64 {
    60.0
}

const fn default_low_threshold() -> f64 {
    40.0
}

const fn default_max_retrieve() -> usize {
    20
}

const fn default_limit() -> usize {
    5
}

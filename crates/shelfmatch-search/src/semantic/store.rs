//! On-disk format for a built [`EmbeddingIndex`].
//!
//! Two files live in the index directory:
//!
//! ```text
//! vectors.bin   "SMVX" | version u8 | 3 reserved | dim u32 | rows u64 | blake3[32] | f32 LE payload
//! mapping.json  {format_version, model_id, dimension, id_mapping, metadata}
//! ```
//!
//! Both are written to a temp file and renamed into place. On load every
//! cross-check failure is [`SearchError::IndexCorrupt`].

use crate::error::SearchError;
use crate::semantic::embed::Embedder;
use crate::semantic::index::{EmbeddingIndex, IndexState};
use serde::{Deserialize, Serialize};
use shelfmatch_core::{ProductId, ProductMetadata};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const MAPPING_FILE: &str = "mapping.json";

const MAGIC: &[u8; 4] = b"SMVX";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 3 + 4 + 8 + 32;

#[derive(Serialize)]
struct MappingRef<'a> {
    format_version: u8,
    model_id: &'a str,
    dimension: usize,
    id_mapping: &'a [ProductId],
    metadata: &'a [ProductMetadata],
}

#[derive(Deserialize)]
struct Mapping {
    format_version: u8,
    model_id: String,
    dimension: usize,
    id_mapping: Vec<ProductId>,
    metadata: Vec<ProductMetadata>,
}

/// What a persisted index holds, read without loading the vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub format_version: u8,
    pub model_id: String,
    pub dimension: usize,
    pub products: usize,
}

impl EmbeddingIndex {
    /// Persist the built index into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// [`SearchError::NotReady`] if the index was never built,
    /// [`SearchError::Io`] on filesystem failure.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn save(&self, dir: &Path) -> Result<(), SearchError> {
        let state = self.state.as_ref().ok_or(SearchError::NotReady)?;
        fs::create_dir_all(dir).map_err(|err| SearchError::io(dir, err))?;

        let dimension = u32::try_from(state.dimension).map_err(|_| {
            SearchError::io(
                dir,
                io::Error::new(io::ErrorKind::InvalidInput, "dimension exceeds u32"),
            )
        })?;

        let mut payload = Vec::with_capacity(state.vectors.len() * 4);
        for value in &state.vectors {
            payload.extend_from_slice(&value.to_le_bytes());
        }

        let mut blob = Vec::with_capacity(HEADER_LEN + payload.len());
        blob.extend_from_slice(MAGIC);
        blob.push(FORMAT_VERSION);
        blob.extend_from_slice(&[0_u8; 3]);
        blob.extend_from_slice(&dimension.to_le_bytes());
        blob.extend_from_slice(&(state.rows() as u64).to_le_bytes());
        blob.extend_from_slice(blake3::hash(&payload).as_bytes());
        blob.extend_from_slice(&payload);

        let mapping = MappingRef {
            format_version: FORMAT_VERSION,
            model_id: self.embedder.model_id(),
            dimension: state.dimension,
            id_mapping: &state.id_mapping,
            metadata: &state.metadata,
        };
        let mapping_json = serde_json::to_vec(&mapping)
            .map_err(|err| SearchError::io(dir.join(MAPPING_FILE), err.into()))?;

        write_atomically(&dir.join(VECTORS_FILE), &blob)?;
        write_atomically(&dir.join(MAPPING_FILE), &mapping_json)?;
        info!(rows = state.rows(), bytes = blob.len(), "embedding index saved");
        Ok(())
    }

    /// Restore an index saved by [`EmbeddingIndex::save`].
    ///
    /// # Errors
    ///
    /// [`SearchError::IndexMissing`] if either file is absent,
    /// [`SearchError::IndexCorrupt`] if they fail to parse or disagree,
    /// [`SearchError::DimensionMismatch`] if `embedder` produces vectors of a
    /// different length than the stored ones.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, SearchError> {
        let mapping_path = dir.join(MAPPING_FILE);
        let vectors_path = dir.join(VECTORS_FILE);

        let mapping = read_mapping(&mapping_path)?;
        let blob = read_file(&vectors_path)?;
        let (dimension, rows, vectors) = decode_vectors(&vectors_path, &blob)?;

        if mapping.dimension != dimension {
            return Err(SearchError::corrupt(
                &mapping_path,
                format!(
                    "mapping dimension {} disagrees with vectors dimension {dimension}",
                    mapping.dimension
                ),
            ));
        }
        if mapping.id_mapping.len() != rows || mapping.metadata.len() != rows {
            return Err(SearchError::corrupt(
                &mapping_path,
                format!(
                    "mapping holds {} ids and {} metadata rows, vectors hold {rows}",
                    mapping.id_mapping.len(),
                    mapping.metadata.len()
                ),
            ));
        }
        let mut seen = HashSet::with_capacity(rows);
        if let Some(duplicate) = mapping.id_mapping.iter().find(|id| !seen.insert(**id)) {
            return Err(SearchError::corrupt(
                &mapping_path,
                format!("product_id {duplicate} appears twice"),
            ));
        }

        if embedder.dimension() != dimension {
            return Err(SearchError::DimensionMismatch {
                expected: dimension,
                actual: embedder.dimension(),
            });
        }
        if embedder.model_id() != mapping.model_id {
            warn!(
                stored = %mapping.model_id,
                current = embedder.model_id(),
                "index was built with a different embedding model"
            );
        }

        info!(rows, dimension, "embedding index loaded");
        Ok(Self::from_state(
            embedder,
            IndexState {
                dimension,
                vectors,
                id_mapping: mapping.id_mapping,
                metadata: mapping.metadata,
            },
        ))
    }
}

/// Read the mapping of a persisted index without touching the vectors.
///
/// # Errors
///
/// [`SearchError::IndexMissing`] or [`SearchError::IndexCorrupt`] as for
/// [`EmbeddingIndex::load`].
pub fn inspect(dir: &Path) -> Result<IndexSummary, SearchError> {
    let mapping = read_mapping(&dir.join(MAPPING_FILE))?;
    Ok(IndexSummary {
        format_version: mapping.format_version,
        model_id: mapping.model_id,
        dimension: mapping.dimension,
        products: mapping.id_mapping.len(),
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>, SearchError> {
    fs::read(path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            SearchError::IndexMissing {
                path: path.to_path_buf(),
            }
        } else {
            SearchError::io(path, err)
        }
    })
}

fn read_mapping(path: &Path) -> Result<Mapping, SearchError> {
    let bytes = read_file(path)?;
    let mapping: Mapping = serde_json::from_slice(&bytes)
        .map_err(|err| SearchError::corrupt(path, format!("invalid mapping: {err}")))?;
    if mapping.format_version != FORMAT_VERSION {
        return Err(SearchError::corrupt(
            path,
            format!("unsupported format version {}", mapping.format_version),
        ));
    }
    Ok(mapping)
}

fn decode_vectors(path: &Path, blob: &[u8]) -> Result<(usize, usize, Vec<f32>), SearchError> {
    if blob.len() < HEADER_LEN {
        return Err(SearchError::corrupt(path, "truncated header"));
    }
    let (header, payload) = blob.split_at(HEADER_LEN);

    if &header[0..4] != MAGIC {
        return Err(SearchError::corrupt(path, "bad magic"));
    }
    if header[4] != FORMAT_VERSION {
        return Err(SearchError::corrupt(
            path,
            format!("unsupported format version {}", header[4]),
        ));
    }

    let mut dim_bytes = [0_u8; 4];
    dim_bytes.copy_from_slice(&header[8..12]);
    let mut rows_bytes = [0_u8; 8];
    rows_bytes.copy_from_slice(&header[12..20]);
    let digest = &header[20..52];

    let dimension = usize::try_from(u32::from_le_bytes(dim_bytes))
        .map_err(|_| SearchError::corrupt(path, "dimension out of range"))?;
    let rows = usize::try_from(u64::from_le_bytes(rows_bytes))
        .map_err(|_| SearchError::corrupt(path, "row count out of range"))?;

    let expected_len = rows
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| SearchError::corrupt(path, "row count overflows"))?;
    if payload.len() != expected_len {
        return Err(SearchError::corrupt(
            path,
            format!(
                "payload is {} bytes, header implies {expected_len}",
                payload.len()
            ),
        ));
    }
    if blake3::hash(payload).as_bytes() != digest {
        return Err(SearchError::corrupt(path, "digest mismatch"));
    }

    let vectors = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((dimension, rows, vectors))
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), SearchError> {
    let tmp_path: PathBuf = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp_path).map_err(|err| SearchError::io(&tmp_path, err))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|err| SearchError::io(&tmp_path, err))?;
    fs::rename(&tmp_path, path).map_err(|err| SearchError::io(path, err))
}

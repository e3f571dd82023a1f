//! JSON Lines catalog IO and the preparation pipeline.
//!
//! Raw catalogs hold one [`RawProduct`] object per line. [`prepare`] turns
//! them into processed [`ProductRecord`]s: blank records are dropped,
//! duplicates by searchable text are dropped (first wins), and product-id
//! uniqueness is checked. [`load_corpus`] reads a processed catalog back into
//! a [`Corpus`] ready for indexing.

use crate::error::ErrorCode;
use crate::model::{Corpus, ProductId, ProductRecord, RawProduct};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Number of example rows included in catalog statistics.
const SAMPLE_RECORDS: usize = 5;

/// Errors raised while reading, preparing, or writing a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog io failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    SchemaViolation {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("duplicate product_id {0} in corpus")]
    DuplicateProductId(ProductId),

    #[error("corpus is empty: no record has non-blank searchable_text")]
    EmptyCorpus,
}

impl CatalogError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Stable machine code for this error.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                ErrorCode::CatalogMissing
            }
            Self::Io { .. } => ErrorCode::InternalUnexpected,
            Self::SchemaViolation { .. } => ErrorCode::SchemaViolation,
            Self::DuplicateProductId(_) => ErrorCode::DuplicateProductId,
            Self::EmptyCorpus => ErrorCode::EmptyCorpus,
        }
    }
}

/// Counts reported by [`prepare`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrepareReport {
    pub input_records: usize,
    pub removed_empty: usize,
    pub removed_duplicates: usize,
    pub output_records: usize,
}

/// One example row in [`CatalogStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub product_id: ProductId,
    pub title: Option<String>,
    pub searchable_text: String,
}

/// Summary statistics written next to a processed catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_records: usize,
    pub unique_vendors: usize,
    pub unique_categories: usize,
    pub avg_text_length: f64,
    pub sample_records: Vec<SampleRecord>,
}

impl CatalogStats {
    #[must_use]
    pub fn compute(records: &[ProductRecord]) -> Self {
        let unique_vendors = records
            .iter()
            .filter_map(|record| record.vendor.as_deref())
            .collect::<HashSet<_>>()
            .len();
        let unique_categories = records
            .iter()
            .filter_map(|record| record.category.as_deref())
            .collect::<HashSet<_>>()
            .len();

        let total_chars: usize = records
            .iter()
            .map(|record| record.searchable_text.chars().count())
            .sum();
        let avg_text_length = if records.is_empty() {
            0.0
        } else {
            total_chars as f64 / records.len() as f64
        };

        let sample_records = records
            .iter()
            .take(SAMPLE_RECORDS)
            .map(|record| SampleRecord {
                product_id: record.product_id,
                title: record.title.clone(),
                searchable_text: record.searchable_text.clone(),
            })
            .collect();

        Self {
            total_records: records.len(),
            unique_vendors,
            unique_categories,
            avg_text_length,
            sample_records,
        }
    }
}

/// Process raw rows into an id-unique list of records.
///
/// # Errors
///
/// Returns [`CatalogError::DuplicateProductId`] if two surviving records share
/// an id, and [`CatalogError::EmptyCorpus`] if nothing survives.
#[instrument(skip_all, fields(input = raw.len()))]
pub fn prepare(raw: Vec<RawProduct>) -> Result<(Vec<ProductRecord>, PrepareReport), CatalogError> {
    let mut report = PrepareReport {
        input_records: raw.len(),
        ..PrepareReport::default()
    };

    let mut seen_texts: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut records = Vec::with_capacity(raw.len());
    for row in raw {
        let record = ProductRecord::from_raw(row);
        if record.searchable_text.trim().is_empty() {
            debug!(product_id = record.product_id, "dropping record with empty searchable text");
            report.removed_empty += 1;
            continue;
        }
        if !seen_texts.insert(record.searchable_text.clone()) {
            debug!(product_id = record.product_id, "dropping duplicate searchable text");
            report.removed_duplicates += 1;
            continue;
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(CatalogError::EmptyCorpus);
    }

    let mut seen_ids = HashSet::with_capacity(records.len());
    for record in &records {
        if !seen_ids.insert(record.product_id) {
            return Err(CatalogError::DuplicateProductId(record.product_id));
        }
    }

    report.output_records = records.len();
    info!(
        removed_empty = report.removed_empty,
        removed_duplicates = report.removed_duplicates,
        output = report.output_records,
        "catalog prepared"
    );
    Ok((records, report))
}

/// Read a raw catalog export.
///
/// # Errors
///
/// Returns [`CatalogError::Io`] if the file cannot be read and
/// [`CatalogError::SchemaViolation`] for a line that is not a valid row.
pub fn read_raw_catalog(path: &Path) -> Result<Vec<RawProduct>, CatalogError> {
    read_jsonl(path)
}

/// Read a processed catalog without validating it as a corpus.
///
/// # Errors
///
/// Same as [`read_raw_catalog`].
pub fn read_processed_catalog(path: &Path) -> Result<Vec<ProductRecord>, CatalogError> {
    read_jsonl(path)
}

/// Load a processed catalog as a corpus ready for indexing.
///
/// Records with blank searchable text are skipped.
///
/// # Errors
///
/// Returns [`CatalogError::EmptyCorpus`] when no record survives filtering,
/// [`CatalogError::DuplicateProductId`] on repeated ids, and the read errors
/// of [`read_processed_catalog`].
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_corpus(path: &Path) -> Result<Corpus, CatalogError> {
    let records = read_processed_catalog(path)?;
    let total = records.len();
    let kept: Vec<ProductRecord> = records
        .into_iter()
        .filter(|record| !record.searchable_text.trim().is_empty())
        .collect();

    if kept.is_empty() {
        return Err(CatalogError::EmptyCorpus);
    }
    if kept.len() < total {
        debug!(skipped = total - kept.len(), "skipped records with blank searchable text");
    }

    let corpus = Corpus::new(kept)?;
    info!(records = corpus.len(), "loaded corpus");
    Ok(corpus)
}

/// Write records as JSON Lines, replacing `path` atomically.
///
/// # Errors
///
/// Returns [`CatalogError::Io`] if any write or the final rename fails.
pub fn write_catalog(path: &Path, records: &[ProductRecord]) -> Result<(), CatalogError> {
    write_atomically(path, |writer| {
        for record in records {
            serde_json::to_writer(&mut *writer, record).map_err(io::Error::from)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    })
}

/// Write catalog statistics as pretty JSON, replacing `path` atomically.
///
/// # Errors
///
/// Returns [`CatalogError::Io`] if the write fails.
pub fn write_stats(path: &Path, stats: &CatalogStats) -> Result<(), CatalogError> {
    write_atomically(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, stats).map_err(io::Error::from)?;
        writer.write_all(b"\n")
    })
}

/// Sibling statistics path for a catalog: `dir/name.jsonl` → `dir/name_stats.json`.
#[must_use]
pub fn stats_path_for(catalog_path: &Path) -> PathBuf {
    let stem = catalog_path
        .file_stem()
        .map_or_else(|| "catalog".to_string(), |s| s.to_string_lossy().into_owned());
    catalog_path.with_file_name(format!("{stem}_stats.json"))
}

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CatalogError> {
    let file = fs::File::open(path).map_err(|err| CatalogError::io(path, err))?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| CatalogError::io(path, err))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|err| CatalogError::SchemaViolation {
            path: path.to_path_buf(),
            line: idx + 1,
            message: err.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn write_atomically(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<fs::File>) -> io::Result<()>,
) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| CatalogError::io(parent, err))?;
    }

    let tmp_path = path.with_extension("tmp");
    let file = fs::File::create(&tmp_path).map_err(|err| CatalogError::io(&tmp_path, err))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer).map_err(|err| CatalogError::io(&tmp_path, err))?;
    let file = writer
        .into_inner()
        .map_err(|err| CatalogError::io(&tmp_path, err.into_error()))?;
    file.sync_all()
        .map_err(|err| CatalogError::io(&tmp_path, err))?;

    fs::rename(&tmp_path, path).map_err(|err| CatalogError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawTags;

    fn raw(id: ProductId, title: Option<&str>, tags: Option<&str>) -> RawProduct {
        RawProduct {
            product_id: id,
            title: title.map(String::from),
            vendor: Some("Acme".to_string()),
            category: None,
            tags: tags.map(|t| RawTags::Encoded(t.to_string())),
        }
    }

    #[test]
    fn prepare_drops_duplicates_by_text_keeping_first() {
        let (records, report) = prepare(vec![
            raw(1, Some("Dog Bed"), None),
            raw(2, Some("Dog Bed"), None),
            raw(3, Some("Cat Tree"), None),
        ])
        .expect("prepare");

        assert_eq!(records.iter().map(|r| r.product_id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(report.removed_duplicates, 1);
        assert_eq!(report.output_records, 2);
    }

    #[test]
    fn prepare_drops_records_with_blank_text() {
        let blank = RawProduct {
            product_id: 9,
            title: None,
            vendor: None,
            category: None,
            tags: Some(RawTags::Encoded("['xy']".to_string())),
        };
        let (records, report) =
            prepare(vec![blank, raw(1, Some("Leash"), None)]).expect("prepare");

        assert_eq!(records.len(), 1);
        assert_eq!(report.removed_empty, 1);
    }

    #[test]
    fn prepare_rejects_duplicate_ids_with_distinct_text() {
        let err = prepare(vec![raw(5, Some("Leash"), None), raw(5, Some("Collar"), None)])
            .expect_err("duplicate ids must fail");
        assert!(matches!(err, CatalogError::DuplicateProductId(5)));
        assert_eq!(err.error_code(), ErrorCode::DuplicateProductId);
    }

    #[test]
    fn prepare_fails_when_everything_is_blank() {
        let blank = RawProduct {
            product_id: 1,
            title: None,
            vendor: None,
            category: None,
            tags: None,
        };
        assert!(matches!(prepare(vec![blank]), Err(CatalogError::EmptyCorpus)));
    }

    #[test]
    fn stats_count_unique_fields_and_average_length() {
        let (records, _) = prepare(vec![
            raw(1, Some("ab"), None),
            raw(2, Some("abcd"), None),
        ])
        .expect("prepare");
        let stats = CatalogStats::compute(&records);

        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.unique_vendors, 1);
        assert_eq!(stats.unique_categories, 0);
        // "ab Acme" = 7 chars, "abcd Acme" = 9 chars
        assert!((stats.avg_text_length - 8.0).abs() < f64::EPSILON);
        assert_eq!(stats.sample_records.len(), 2);
    }

    #[test]
    fn stats_path_replaces_extension() {
        let path = stats_path_for(Path::new("data/catalog_processed.jsonl"));
        assert_eq!(path, Path::new("data/catalog_processed_stats.json"));
    }

    #[test]
    fn schema_violation_names_the_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("raw.jsonl");
        fs::write(
            &path,
            "{\"product_id\": 1, \"title\": \"ok\"}\n\n{\"title\": \"no id\"}\n",
        )
        .expect("write fixture");

        let err = read_raw_catalog(&path).expect_err("missing product_id must fail");
        match err {
            CatalogError::SchemaViolation { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_catalog_maps_to_catalog_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_corpus(&dir.path().join("absent.jsonl")).expect_err("missing file");
        assert_eq!(err.error_code(), ErrorCode::CatalogMissing);
    }

    #[test]
    fn written_catalog_loads_as_corpus() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/processed.jsonl");
        let (records, _) = prepare(vec![
            raw(1, Some("Red Leather Dog Leash"), Some("['Leather']")),
            raw(2, Some("Blue Nylon Cat Collar"), None),
        ])
        .expect("prepare");

        write_catalog(&path, &records).expect("write catalog");
        let corpus = load_corpus(&path).expect("load corpus");

        assert_eq!(corpus.records(), records.as_slice());
    }

    #[test]
    fn load_corpus_rejects_all_blank_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blank.jsonl");
        fs::write(&path, "{\"product_id\": 1, \"searchable_text\": \"  \"}\n")
            .expect("write fixture");

        assert!(matches!(load_corpus(&path), Err(CatalogError::EmptyCorpus)));
    }
}

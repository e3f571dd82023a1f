use std::fmt;

/// Machine-readable error codes for scripts and agents driving the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    CatalogMissing,
    SchemaViolation,
    DuplicateProductId,
    EmptyCorpus,
    IndexNotReady,
    IndexMissing,
    IndexCorrupt,
    DimensionMismatch,
    IdUniverseMismatch,
    EmbeddingFailed,
    ModelLoadFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::CatalogMissing => "E1002",
            Self::SchemaViolation => "E2001",
            Self::DuplicateProductId => "E2002",
            Self::EmptyCorpus => "E2003",
            Self::IndexNotReady => "E3001",
            Self::IndexMissing => "E3002",
            Self::IndexCorrupt => "E3003",
            Self::DimensionMismatch => "E3004",
            Self::IdUniverseMismatch => "E3005",
            Self::EmbeddingFailed => "E4001",
            Self::ModelLoadFailed => "E4002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::CatalogMissing => "Catalog file not found",
            Self::SchemaViolation => "Catalog record violates schema",
            Self::DuplicateProductId => "Duplicate product id",
            Self::EmptyCorpus => "Corpus is empty",
            Self::IndexNotReady => "Index has not been built",
            Self::IndexMissing => "Persisted index not found",
            Self::IndexCorrupt => "Persisted index is corrupt",
            Self::DimensionMismatch => "Embedding dimension mismatch",
            Self::IdUniverseMismatch => "Indices built from different catalogs",
            Self::EmbeddingFailed => "Embedding inference failed",
            Self::ModelLoadFailed => "Embedding model load failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint surfaced alongside the error.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .shelfmatch/config.toml and retry."),
            Self::CatalogMissing => {
                Some("Run `shelfmatch prepare` to produce the processed catalog.")
            }
            Self::SchemaViolation => {
                Some("Every catalog line must be a JSON object with an integer product_id.")
            }
            Self::DuplicateProductId => Some("De-duplicate product ids in the raw catalog."),
            Self::EmptyCorpus => Some("Check that catalog records have a title, vendor or tags."),
            Self::IndexNotReady | Self::IndexMissing => {
                Some("Run `shelfmatch build` to create the index.")
            }
            Self::IndexCorrupt => Some("Run `shelfmatch build` to rebuild the index."),
            Self::DimensionMismatch => {
                Some("Rebuild the index with the embedding model configured for search.")
            }
            Self::IdUniverseMismatch => {
                Some("Rebuild the index from the same catalog used for search.")
            }
            Self::EmbeddingFailed | Self::ModelLoadFailed => {
                Some("Verify model files and the [embedding] section of the config.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

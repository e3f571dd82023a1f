#![forbid(unsafe_code)]
//! shelfmatch-core library.
//!
//! Product records, the text normalizer that derives each record's searchable
//! text, JSON Lines catalog IO, and project configuration.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at library seams, `anyhow::Result`
//!   where the caller only needs context.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;

pub use catalog::{CatalogError, CatalogStats, PrepareReport};
pub use error::ErrorCode;
pub use model::{Corpus, ProductId, ProductMetadata, ProductRecord, RawProduct, RawTags};

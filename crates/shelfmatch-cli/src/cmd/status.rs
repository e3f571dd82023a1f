//! `shelfmatch status`: catalog and index readiness without loading vectors.

use crate::cmd::Project;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Context;
use serde::Serialize;
use shelfmatch_core::CatalogError;
use shelfmatch_core::catalog::read_processed_catalog;
use shelfmatch_core::config::config_path;
use shelfmatch_search::{IndexSummary, SearchError, semantic::inspect};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub project_root: PathBuf,
    pub config_found: bool,
    pub catalog: PathBuf,
    /// `None` when the processed catalog does not exist yet.
    pub total_products: Option<usize>,
    pub index_dir: PathBuf,
    pub index: Option<IndexSummary>,
    pub ready: bool,
}

pub fn run_status(output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = Project::load(project_root)?;
    let catalog = project.paths.catalog.clone();
    let index_dir = project.paths.index_dir.clone();

    let total_products = match read_processed_catalog(&catalog) {
        Ok(records) => Some(records.len()),
        Err(CatalogError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", catalog.display()));
        }
    };

    let index = match inspect(&index_dir) {
        Ok(summary) => Some(summary),
        Err(SearchError::IndexMissing { .. }) => None,
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to inspect {}", index_dir.display()));
        }
    };

    let ready = matches!(
        (total_products, &index),
        (Some(products), Some(summary)) if products == summary.products
    );
    let status = StatusOutput {
        config_found: config_path(project_root).exists(),
        project_root: project.root,
        catalog,
        total_products,
        index_dir,
        index,
        ready,
    };
    render_mode(output, &status, render_status_text, render_status_human)
}

fn render_status_human(out: &StatusOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "shelfmatch status")?;
    pretty_kv(w, "root", out.project_root.display().to_string())?;
    pretty_kv(w, "config", if out.config_found { "found" } else { "defaults" })?;
    pretty_kv(w, "catalog", out.catalog.display().to_string())?;
    pretty_kv(
        w,
        "products",
        out.total_products
            .map_or_else(|| "missing (run `shelfmatch prepare`)".to_string(), |n| n.to_string()),
    )?;
    pretty_kv(w, "index", out.index_dir.display().to_string())?;
    match &out.index {
        Some(summary) => {
            pretty_kv(w, "model", &summary.model_id)?;
            pretty_kv(w, "dimension", summary.dimension.to_string())?;
            pretty_kv(w, "indexed", summary.products.to_string())?;
        }
        None => pretty_kv(w, "indexed", "missing (run `shelfmatch build`)")?,
    }
    pretty_kv(w, "ready", if out.ready { "yes" } else { "no" })
}

fn render_status_text(out: &StatusOutput, w: &mut dyn Write) -> std::io::Result<()> {
    write!(w, "status  ready={}", out.ready)?;
    if let Some(products) = out.total_products {
        write!(w, "  products={products}")?;
    }
    if let Some(summary) = &out.index {
        write!(
            w,
            "  indexed={}  dimension={}  model={}",
            summary.products, summary.dimension, summary.model_id
        )?;
    }
    writeln!(w)
}

//! `shelfmatch build`: embed the processed catalog and persist the index.

use crate::cmd::Project;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use crate::timing::timed;
use anyhow::Context;
use clap::Args;
use serde::Serialize;
use shelfmatch_core::catalog::load_corpus;
use shelfmatch_search::HybridRetriever;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Processed catalog to index. Defaults to `paths.catalog`.
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Where to write the index. Defaults to `paths.index_dir`.
    #[arg(long, value_name = "DIR")]
    pub index_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct BuildOutput {
    pub catalog: PathBuf,
    pub index_dir: PathBuf,
    pub products: usize,
    pub dimension: usize,
    pub model_id: String,
}

pub fn run_build(args: &BuildArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = Project::load(project_root)?;
    let catalog = args
        .catalog
        .as_deref()
        .map_or_else(|| project.paths.catalog.clone(), |p| project.resolve(p));
    let index_dir = args
        .index_dir
        .as_deref()
        .map_or_else(|| project.paths.index_dir.clone(), |p| project.resolve(p));

    let corpus = timed("load_catalog", || load_corpus(&catalog))
        .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
    let embedder = project.embedder()?;

    let retriever = timed("build_index", || {
        HybridRetriever::build(
            &corpus,
            embedder,
            project.config.embedding.batch_size,
            project.bm25(),
            project.fusion(),
        )
    })
    .context("Failed to build index")?;
    timed("save_index", || retriever.save(&index_dir))
        .with_context(|| format!("Failed to save index to {}", index_dir.display()))?;

    let semantic = retriever.semantic();
    info!(products = retriever.len(), dir = %index_dir.display(), "index built");
    let result = BuildOutput {
        catalog,
        index_dir,
        products: retriever.len(),
        dimension: semantic.dimension(),
        model_id: semantic.model_id().to_string(),
    };
    render_mode(output, &result, render_build_text, render_build_human)
}

fn render_build_human(out: &BuildOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Index built")?;
    pretty_kv(w, "catalog", out.catalog.display().to_string())?;
    pretty_kv(w, "index", out.index_dir.display().to_string())?;
    pretty_kv(w, "products", out.products.to_string())?;
    pretty_kv(w, "model", &out.model_id)?;
    pretty_kv(w, "dimension", out.dimension.to_string())
}

fn render_build_text(out: &BuildOutput, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "built  products={}  dimension={}  model={}  dir={}",
        out.products,
        out.dimension,
        out.model_id,
        out.index_dir.display()
    )
}

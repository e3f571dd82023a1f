//! `shelfmatch prepare`: raw catalog export to processed catalog + stats.

use crate::cmd::Project;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use crate::timing::timed;
use anyhow::Context;
use clap::Args;
use serde::Serialize;
use shelfmatch_core::catalog::{
    prepare, read_raw_catalog, stats_path_for, write_catalog, write_stats,
};
use shelfmatch_core::{CatalogStats, PrepareReport};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Raw catalog (JSON Lines). Defaults to `paths.raw_catalog`.
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Processed catalog to write. Defaults to `paths.catalog`.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct PrepareOutput {
    pub input: PathBuf,
    pub output: PathBuf,
    pub stats_path: PathBuf,
    pub report: PrepareReport,
    pub stats: CatalogStats,
}

pub fn run_prepare(args: &PrepareArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = Project::load(project_root)?;
    let input = args
        .input
        .as_deref()
        .map_or_else(|| project.paths.raw_catalog.clone(), |p| project.resolve(p));
    let catalog = args
        .output
        .as_deref()
        .map_or_else(|| project.paths.catalog.clone(), |p| project.resolve(p));

    let raw = timed("read_raw_catalog", || read_raw_catalog(&input))
        .with_context(|| format!("Failed to read raw catalog {}", input.display()))?;
    let (records, report) = timed("normalize", || prepare(raw))
        .with_context(|| format!("Failed to prepare {}", input.display()))?;

    let stats = CatalogStats::compute(&records);
    let stats_path = stats_path_for(&catalog);
    timed("write_catalog", || {
        write_catalog(&catalog, &records)?;
        write_stats(&stats_path, &stats)
    })
    .with_context(|| format!("Failed to write {}", catalog.display()))?;

    let result = PrepareOutput {
        input,
        output: catalog,
        stats_path,
        report,
        stats,
    };
    render_mode(output, &result, render_prepare_text, render_prepare_human)
}

fn render_prepare_human(out: &PrepareOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Catalog prepared")?;
    pretty_kv(w, "input", out.input.display().to_string())?;
    pretty_kv(w, "output", out.output.display().to_string())?;
    pretty_kv(w, "stats", out.stats_path.display().to_string())?;
    pretty_kv(w, "read", out.report.input_records.to_string())?;
    pretty_kv(w, "empty", out.report.removed_empty.to_string())?;
    pretty_kv(w, "duplicates", out.report.removed_duplicates.to_string())?;
    pretty_kv(w, "written", out.report.output_records.to_string())?;
    writeln!(w)?;
    pretty_kv(w, "vendors", out.stats.unique_vendors.to_string())?;
    pretty_kv(w, "categories", out.stats.unique_categories.to_string())?;
    pretty_kv(w, "avg length", format!("{:.1} chars", out.stats.avg_text_length))
}

fn render_prepare_text(out: &PrepareOutput, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "prepared  read={}  removed_empty={}  removed_duplicates={}  written={}  path={}",
        out.report.input_records,
        out.report.removed_empty,
        out.report.removed_duplicates,
        out.report.output_records,
        out.output.display()
    )
}

//! `shelfmatch batch`: run a file of queries concurrently against one index
//! snapshot.

use crate::cmd::Project;
use crate::cmd::search::{SearchRow, write_result_lines, write_result_table};
use crate::output::{OutputMode, render_mode};
use crate::timing::timed;
use anyhow::Context;
use clap::Args;
use serde::Serialize;
use shelfmatch_search::SearchService;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// File with one query per line. Blank lines are skipped.
    #[arg(value_name = "QUERIES_FILE")]
    pub queries: PathBuf,

    /// Maximum number of results per query. Defaults to `search.default_limit`.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct BatchEntry {
    pub query: String,
    pub count: usize,
    pub results: Vec<SearchRow>,
}

#[derive(Debug, Serialize)]
pub struct BatchOutput {
    pub queries: usize,
    pub entries: Vec<BatchEntry>,
}

pub fn run_batch(args: &BatchArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = Project::load(project_root)?;
    let path = project.resolve(&args.queries);
    let queries = read_queries(&path)?;
    let limit = args.limit.unwrap_or(project.config.search.default_limit);

    let service = SearchService::new(project.open_retriever()?);
    let outcomes = timed("search_many", || service.search_many(&queries, limit));
    debug!(queries = queries.len(), "batch finished");

    let mut entries = Vec::with_capacity(queries.len());
    for (line, (query, outcome)) in queries.into_iter().zip(outcomes).enumerate() {
        let results: Vec<SearchRow> = outcome
            .with_context(|| format!("Query {} ({query:?}) failed", line + 1))?
            .into_iter()
            .map(SearchRow::from)
            .collect();
        entries.push(BatchEntry {
            query,
            count: results.len(),
            results,
        });
    }

    let batch_output = BatchOutput {
        queries: entries.len(),
        entries,
    };
    render_mode(output, &batch_output, render_batch_text, render_batch_human)
}

fn read_queries(path: &Path) -> anyhow::Result<Vec<String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_queries(&content))
}

fn parse_queries(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn render_batch_human(out: &BatchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for entry in &out.entries {
        writeln!(w, "{} result(s) for '{}':", entry.count, entry.query)?;
        if !entry.results.is_empty() {
            write_result_table(&entry.results, w)?;
        }
        writeln!(w)?;
    }
    writeln!(w, "{} queries", out.queries)
}

fn render_batch_text(out: &BatchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for entry in &out.entries {
        writeln!(w, "query  {}  count={}", entry.query, entry.count)?;
        write_result_lines(&entry.results, w)?;
    }
    Ok(())
}

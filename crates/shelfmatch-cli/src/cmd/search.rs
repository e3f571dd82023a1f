//! `shelfmatch search`: hybrid (default), semantic-only, or keyword-only
//! product search.

use crate::cmd::Project;
use crate::output::{OutputMode, render_mode};
use crate::timing::timed;
use clap::Args;
use serde::Serialize;
use shelfmatch_core::{ProductId, ProductMetadata};
use shelfmatch_search::{HybridResult, LexicalHit, MatchQuality, SemanticHit};
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Free-text product description.
    pub query: String,

    /// Maximum number of results. Defaults to `search.default_limit`.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Keyword (BM25) results only.
    #[arg(long)]
    pub lexical: bool,

    /// Embedding similarity results only.
    #[arg(long)]
    pub semantic: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Hybrid,
    Lexical,
    Semantic,
}

/// One rendered result. Single-index modes leave the other component and
/// the fused fields empty.
#[derive(Debug, Serialize)]
pub struct SearchRow {
    pub product_id: ProductId,
    pub title: Option<String>,
    pub vendor: Option<String>,
    pub category: Option<String>,
    pub searchable_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f64>,
    pub final_score: f64,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_quality: Option<MatchQuality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl SearchRow {
    fn single(product_id: ProductId, metadata: ProductMetadata, confidence: f64) -> Self {
        Self {
            product_id,
            title: metadata.title,
            vendor: metadata.vendor,
            category: metadata.category,
            searchable_text: metadata.searchable_text,
            semantic_score: None,
            lexical_score: None,
            final_score: confidence,
            confidence,
            match_quality: None,
            explanation: None,
        }
    }
}

impl From<HybridResult> for SearchRow {
    fn from(result: HybridResult) -> Self {
        Self {
            product_id: result.product_id,
            title: result.title,
            vendor: result.vendor,
            category: result.category,
            searchable_text: result.searchable_text,
            semantic_score: Some(result.semantic_score),
            lexical_score: Some(result.lexical_score),
            final_score: result.final_score,
            confidence: result.confidence,
            match_quality: Some(result.match_quality),
            explanation: Some(result.explanation),
        }
    }
}

impl From<SemanticHit> for SearchRow {
    fn from(hit: SemanticHit) -> Self {
        let mut row = Self::single(hit.product_id, hit.metadata, hit.confidence);
        row.semantic_score = Some(hit.confidence);
        row
    }
}

impl From<LexicalHit> for SearchRow {
    fn from(hit: LexicalHit) -> Self {
        let mut row = Self::single(hit.product_id, hit.metadata, hit.confidence);
        row.lexical_score = Some(hit.confidence);
        row
    }
}

#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub query: String,
    pub mode: SearchMode,
    pub count: usize,
    pub results: Vec<SearchRow>,
}

pub fn run_search(args: &SearchArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let mode = resolve_mode(args)?;
    let project = Project::load(project_root)?;
    let limit = args.limit.unwrap_or(project.config.search.default_limit);
    let retriever = project.open_retriever()?;

    let results: Vec<SearchRow> = timed("query", || -> anyhow::Result<Vec<SearchRow>> {
        Ok(match mode {
            SearchMode::Hybrid => rows(retriever.search_hybrid(&args.query, limit)?),
            SearchMode::Semantic => rows(retriever.search_semantic(&args.query, limit)?),
            SearchMode::Lexical => rows(retriever.search_lexical(&args.query, limit)),
        })
    })?;

    let search_output = SearchOutput {
        query: args.query.clone(),
        mode,
        count: results.len(),
        results,
    };
    render_mode(output, &search_output, render_search_text, render_search_human)
}

fn rows<T: Into<SearchRow>>(hits: Vec<T>) -> Vec<SearchRow> {
    hits.into_iter().map(Into::into).collect()
}

fn resolve_mode(args: &SearchArgs) -> anyhow::Result<SearchMode> {
    if args.lexical && args.semantic {
        anyhow::bail!("--lexical and --semantic are mutually exclusive");
    }

    if args.lexical {
        Ok(SearchMode::Lexical)
    } else if args.semantic {
        Ok(SearchMode::Semantic)
    } else {
        Ok(SearchMode::Hybrid)
    }
}

fn render_search_human(out: &SearchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    if out.results.is_empty() {
        writeln!(w, "No results for '{}'", out.query)?;
        return Ok(());
    }

    writeln!(w, "{} result(s) for '{}':", out.count, out.query)?;
    write_result_table(&out.results, w)
}

/// Header plus one line per result, shared with `batch`.
pub fn write_result_table(results: &[SearchRow], w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{:-<90}", "")?;
    writeln!(
        w,
        "{:>10}  {:>6}  {:>6}  {:>6}  {:<8}  TITLE",
        "ID", "SCORE", "SEM", "LEX", "QUALITY"
    )?;
    writeln!(w, "{:-<90}", "")?;

    for row in results {
        writeln!(
            w,
            "{:>10}  {:>6.2}  {:>6}  {:>6}  {:<8}  {}",
            row.product_id,
            row.final_score,
            component(row.semantic_score),
            component(row.lexical_score),
            row.match_quality.map_or("-", MatchQuality::as_str),
            display_title(row)
        )?;
        if let Some(explanation) = &row.explanation {
            writeln!(w, "{:>10}  {explanation}", "")?;
        }
    }
    Ok(())
}

fn render_search_text(out: &SearchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    if out.results.is_empty() {
        writeln!(w, "advice  no-results  query={}", out.query)?;
        return Ok(());
    }
    write_result_lines(&out.results, w)
}

/// Compact one-line-per-result rendering, shared with `batch`.
pub fn write_result_lines(results: &[SearchRow], w: &mut dyn Write) -> std::io::Result<()> {
    for row in results {
        write!(w, "{}  score={:.2}", row.product_id, row.final_score)?;
        if let Some(quality) = row.match_quality {
            write!(w, "  quality={quality}")?;
        }
        writeln!(w, "  {}", display_title(row))?;
    }
    Ok(())
}

fn component(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{s:.2}"))
}

fn display_title(row: &SearchRow) -> &str {
    row.title.as_deref().unwrap_or(&row.searchable_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(lexical: bool, semantic: bool) -> SearchArgs {
        SearchArgs {
            query: "dog leash".to_string(),
            limit: None,
            lexical,
            semantic,
        }
    }

    fn metadata() -> ProductMetadata {
        ProductMetadata {
            title: None,
            vendor: Some("Pawsome".to_string()),
            category: None,
            searchable_text: "dog leash pawsome".to_string(),
        }
    }

    #[test]
    fn mode_flags_are_exclusive() {
        assert_eq!(resolve_mode(&args(false, false)).expect("hybrid"), SearchMode::Hybrid);
        assert_eq!(resolve_mode(&args(true, false)).expect("lexical"), SearchMode::Lexical);
        assert_eq!(resolve_mode(&args(false, true)).expect("semantic"), SearchMode::Semantic);
        assert!(resolve_mode(&args(true, true)).is_err());
    }

    #[test]
    fn lexical_rows_omit_fused_fields() {
        let row = SearchRow::from(LexicalHit {
            position: 0,
            product_id: 7,
            score: 2.4,
            confidence: 70.59,
            metadata: metadata(),
        });
        let json = serde_json::to_value(&row).expect("serialize");
        assert_eq!(json["lexical_score"], 70.59);
        assert!(json.get("semantic_score").is_none());
        assert!(json.get("match_quality").is_none());
        assert_eq!(display_title(&row), "dog leash pawsome");
    }

    #[test]
    fn text_lines_fall_back_to_searchable_text() {
        let row = SearchRow::from(SemanticHit {
            position: 0,
            product_id: 3,
            similarity: 0.5,
            confidence: 50.0,
            metadata: metadata(),
        });
        let mut buf = Vec::new();
        write_result_lines(&[row], &mut buf).expect("render");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "3  score=50.00  dog leash pawsome\n");
    }
}

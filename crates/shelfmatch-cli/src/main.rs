#![forbid(unsafe_code)]

mod cmd;
mod output;
mod timing;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "shelfmatch: hybrid semantic + keyword product matching",
    long_about = None
)]
struct Cli {
    /// Debug-level logging for shelfmatch crates.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format. Defaults to pretty on a terminal and text when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Emit per-phase timing to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Project directory holding `.shelfmatch/config.toml`. Defaults to the
    /// current directory.
    #[arg(long, global = true, value_name = "DIR")]
    project_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Catalog",
        about = "Normalize a raw catalog export",
        long_about = "Parse tags, build each product's searchable text, drop blank and duplicate \
                      records, and write the processed catalog plus a stats file.",
        after_help = "EXAMPLES:\n    # Use the paths from .shelfmatch/config.toml\n    shelfmatch prepare\n\n    \
                      # Explicit input and output\n    shelfmatch prepare --input export.jsonl --output data/catalog.jsonl"
    )]
    Prepare(cmd::prepare::PrepareArgs),

    #[command(
        next_help_heading = "Index",
        about = "Build and save the search index",
        long_about = "Embed every product in the processed catalog, check the keyword index \
                      covers the same products, and save the embedding index.",
        after_help = "EXAMPLES:\n    # Build from the configured catalog\n    shelfmatch build\n\n    \
                      # Build into another directory\n    shelfmatch build --index-dir /tmp/index --format json"
    )]
    Build(cmd::build::BuildArgs),

    #[command(
        next_help_heading = "Search",
        about = "Find catalog products matching a description",
        long_about = "Rank products by a weighted blend of embedding similarity and BM25 keyword \
                      relevance. Each result carries both component scores, a match quality, \
                      and a short explanation.",
        after_help = "EXAMPLES:\n    # Hybrid search\n    shelfmatch search \"leather dog leash\"\n\n    \
                      # Top 3, keyword scores only\n    shelfmatch search \"leather dog leash\" -n 3 --lexical\n\n    \
                      # Machine-readable output\n    shelfmatch search \"puppy food\" --format json"
    )]
    Search(cmd::search::SearchArgs),

    #[command(
        next_help_heading = "Search",
        about = "Run a file of queries concurrently",
        long_about = "Read one query per line and run them in parallel against the same index. \
                      Results are printed in input order.",
        after_help = "EXAMPLES:\n    # Five results per query\n    shelfmatch batch queries.txt -n 5\n\n    \
                      # JSON for scripts\n    shelfmatch batch queries.txt --format json"
    )]
    Batch(cmd::batch::BatchArgs),

    #[command(
        next_help_heading = "Index",
        about = "Show catalog and index readiness",
        after_help = "EXAMPLES:\n    shelfmatch status\n\n    shelfmatch status --format json"
    )]
    Status,

    #[command(
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Bash\n    shelfmatch completions bash > ~/.local/share/bash-completion/completions/shelfmatch"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("SHELFMATCH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "shelfmatch=debug,info"
        } else {
            "shelfmatch=info,warn"
        })
    });

    let format = env::var("SHELFMATCH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, output: OutputMode) -> anyhow::Result<()> {
    let project_root = match cli.project_root {
        Some(root) => root,
        None => env::current_dir().context("Failed to resolve current directory")?,
    };

    match cli.command {
        Commands::Prepare(args) => timing::timed("cmd.prepare", || {
            cmd::prepare::run_prepare(&args, output, &project_root)
        }),
        Commands::Build(args) => timing::timed("cmd.build", || {
            cmd::build::run_build(&args, output, &project_root)
        }),
        Commands::Search(args) => timing::timed("cmd.search", || {
            cmd::search::run_search(&args, output, &project_root)
        }),
        Commands::Batch(args) => timing::timed("cmd.batch", || {
            cmd::batch::run_batch(&args, output, &project_root)
        }),
        Commands::Status => {
            timing::timed("cmd.status", || cmd::status::run_status(output, &project_root))
        }
        Commands::Completions(args) => timing::timed("cmd.completions", || {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }),
    }
}

fn print_timing_report() {
    let report = timing::collect_report();
    if report.is_empty() {
        eprintln!("timing report: no samples recorded");
        return;
    }
    eprintln!("timing report:");
    eprint!("{}", report.display_table());
    if let Ok(json) = serde_json::to_string_pretty(&report.to_json()) {
        eprintln!("timing report (json):");
        eprintln!("{json}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);

    let output = cli.output_mode();
    let result = run(cli, output);

    if timing_enabled {
        print_timing_report();
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "command failed");
            if render_error(output, &CliError::from_anyhow(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

//! `scrape` command: run each search term through one browser tab and write
//! a file set per term.
//!
//! Per-term failures are reported in the summary, not propagated; the command
//! only fails when the request is invalid, the browser cannot start, or every
//! term failed.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, ValueEnum};
use mapscout_core::{AppConfig, SearchRequest, Target};
use mapscout_scraper::{
    cancel_pair, BatchOptions, BatchReport, BatchRunner, BrowserOptions, ChromeSession, FileSink,
    OutputFormat, Selectors,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
    Both,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Both => OutputFormat::Both,
        }
    }
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Search term (repeatable)
    #[arg(short = 's', long = "search")]
    pub search: Vec<String>,

    /// File with one search term per line; blank lines and `#` comments are skipped
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// Maximum listings per term (default: everything the feed yields)
    #[arg(short = 't', long)]
    pub total: Option<usize>,

    /// Directory for result files (overrides MAPSCOUT_OUTPUT_DIR)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = FormatArg::Csv)]
    pub format: FormatArg,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,
}

/// Parses a terms file: one term per line, `#` comment lines and blanks
/// skipped.
pub(crate) fn parse_terms_file(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToOwned::to_owned)
        .collect()
}

fn read_terms_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read search terms from {}", path.display()))?;
    Ok(parse_terms_file(&contents))
}

/// Combines `--search` values and `--input` file terms, in that order.
///
/// # Errors
///
/// Returns an error if the input file cannot be read, `--total 0` was given,
/// or no search term remains.
pub(crate) fn build_request(args: &ScrapeArgs) -> anyhow::Result<SearchRequest> {
    let mut terms = args.search.clone();
    if let Some(path) = &args.input {
        terms.extend(read_terms_file(path)?);
    }
    let target = Target::from_count(args.total)?;
    Ok(SearchRequest::new(terms, target)?)
}

/// Runs the `scrape` command end to end.
///
/// # Errors
///
/// Returns an error if the request is invalid, the browser cannot be started,
/// or every search term failed.
pub(crate) async fn run_scrape(config: &AppConfig, args: ScrapeArgs) -> anyhow::Result<()> {
    let request = build_request(&args)?;

    let mut browser_options = BrowserOptions::from_config(config);
    if args.headed {
        browser_options.headless = false;
    }
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_dir.clone());
    let mut sink = FileSink::new(output_dir, args.format.into());

    let (cancel, signal) = cancel_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current step");
            cancel.cancel();
        }
    });

    let session = ChromeSession::start(&browser_options)
        .await
        .context("failed to start browser")?;
    let page = match session.new_page().await {
        Ok(page) => page,
        Err(e) => {
            session.close().await;
            return Err(e).context("failed to open browser tab");
        }
    };

    let runner = BatchRunner::new(
        page,
        Selectors::default(),
        BatchOptions::from_config(config),
    );
    let report = runner.run(&request, &mut sink, &signal).await;

    interrupt.abort();
    runner.into_page().close().await;
    session.close().await;

    print_summary(&report);
    for path in sink.written() {
        println!("wrote {}", path.display());
    }

    if report.terms.iter().all(|t| t.error.is_some()) {
        anyhow::bail!("every search term failed; see log for details");
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    for term in &report.terms {
        let mut line = format!(
            "{}: {} records ({} attempted, {} failed)",
            term.search_term,
            term.businesses.len(),
            term.attempted,
            term.failed()
        );
        if term.cancelled {
            line.push_str(" [cancelled]");
        }
        if let Some(error) = &term.error {
            line.push_str(&format!(" [aborted: {error}]"));
        }
        if let Some(error) = &term.sink_error {
            line.push_str(&format!(" [not written: {error}]"));
        }
        println!("{line}");
    }
    println!("total: {} records", report.total_records());
}

#[cfg(test)]
#[path = "scrape_test.rs"]
mod tests;

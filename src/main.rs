//! codedigest - assemble a directory tree into a single LLM-ready digest.
//!
//! Usage:
//!   codedigest [PATH]                  Digest to stdout (markdown)
//!   codedigest [PATH] -f json -o out   Digest to a file as JSON
//!   codedigest --include 'src/**'      Restrict to matching files
//!   codedigest --help                  Show help

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use humansize::{format_size, BINARY};
use tokio_util::sync::CancellationToken;

use codedigest_assemble::AssemblyPipeline;
use codedigest_core::{AutoApprove, DigestConfig, OutputFormat, OverridePrompt, QuotaUsage};
use codedigest_scan::TraversalEngine;

#[derive(Parser)]
#[command(
    name = "codedigest",
    version,
    about = "Assemble a directory tree into a single LLM-ready digest",
    long_about = "codedigest walks a directory, applies gitignore-style and \
                  user-supplied filters, and assembles the surviving files \
                  into one digest artifact (markdown, text, or JSON)."
)]
struct Cli {
    /// Path to digest (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Output format (markdown, text, json)
    #[arg(short, long, default_value = "markdown")]
    format: OutputFormat,

    /// Write the digest to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Include glob pattern (repeatable)
    #[arg(short, long = "include")]
    include: Vec<String>,

    /// Exclude glob pattern (repeatable)
    #[arg(short = 'x', long = "exclude")]
    exclude: Vec<String>,

    /// Built-in pattern preset (code-only, docs-only, tests-only, config-only)
    #[arg(short, long)]
    preset: Option<String>,

    /// Maximum size for a single file (e.g. "10MB")
    #[arg(long, default_value = "10MB")]
    max_file_size: String,

    /// Cumulative size budget (e.g. "500MB")
    #[arg(long, default_value = "500MB")]
    max_total_size: String,

    /// Maximum number of files
    #[arg(long, default_value = "10000")]
    max_files: u64,

    /// Maximum directory depth
    #[arg(long, default_value = "20")]
    max_depth: u32,

    /// Soft token budget for the assembled output
    #[arg(long)]
    max_tokens: Option<u64>,

    /// Separator between file chunks in textual formats
    #[arg(long, default_value = "\n")]
    separator: String,

    /// Omit the ASCII tree block
    #[arg(long)]
    no_tree: bool,

    /// Omit the summary block
    #[arg(long)]
    no_summary: bool,

    /// Skip the secret-redaction pass
    #[arg(long)]
    show_redacted: bool,

    /// Worker pool width for assembly
    #[arg(long, default_value = "8")]
    concurrency: usize,

    /// Approve all quota override prompts without asking
    #[arg(short, long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let interactive = !cli.yes && std::io::stdin().is_terminal();
    let mut config = DigestConfig::builder()
        .max_file_size(parse_size(&cli.max_file_size)?)
        .max_total_size(parse_size(&cli.max_total_size)?)
        .max_files(cli.max_files)
        .max_directory_depth(cli.max_depth)
        .max_tokens(cli.max_tokens)
        .output_format(cli.format)
        .chunk_separator(cli.separator.clone())
        .include_summary(!cli.no_summary)
        .include_tree(!cli.no_tree)
        .include_patterns(cli.include.clone())
        .exclude_patterns(cli.exclude.clone())
        .preset(cli.preset.clone())
        .concurrency(cli.concurrency)
        .interactive(interactive)
        .build()
        .map_err(|e| color_eyre::eyre::eyre!("invalid configuration: {e}"))?;
    config.redaction.show_redacted = cli.show_redacted;

    let prompt: Arc<dyn OverridePrompt> = if interactive {
        Arc::new(StderrPrompt)
    } else {
        Arc::new(AutoApprove)
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ninterrupted, finishing in-flight work...");
                cancel.cancel();
            }
        });
    }

    let path = cli.path.canonicalize().context("Invalid path")?;
    let root_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let engine =
        TraversalEngine::new(config.clone(), Arc::clone(&prompt)).with_cancellation(cancel.clone());
    spawn_progress_printer(engine.subscribe());

    eprintln!("Scanning {}...", path.display());
    let outcome = engine.scan_root(&path).await?;
    eprintln!(
        "Scanned {} files ({}), {} directories",
        outcome.stats.total_files,
        format_size(outcome.stats.total_size, BINARY),
        outcome.stats.directories
    );
    for warning in outcome.stats.warnings() {
        eprintln!("warning: {warning}");
    }

    let pipeline = AssemblyPipeline::with_collaborators(config, prompt, cancel);
    spawn_progress_printer(pipeline.subscribe());
    let result = pipeline
        .generate(&outcome.nodes, &root_name, Some(outcome.stats))
        .await?;

    match &cli.output {
        Some(file) => {
            std::fs::write(file, &result.content)
                .with_context(|| format!("writing {}", file.display()))?;
            eprintln!(
                "Wrote {} ({} files, ~{} tokens) to {}",
                format_size(result.content.len() as u64, BINARY),
                result.files.len(),
                result.token_estimate,
                file.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(result.content.as_bytes())?;
        }
    }

    if result.has_errors() {
        eprintln!("{} file(s) could not be processed", result.errors.len());
    }

    Ok(())
}

/// Interactive override prompt on stderr.
struct StderrPrompt;

impl StderrPrompt {
    fn ask(&self, usage: &QuotaUsage) -> bool {
        eprint!(
            "{} at {:.0}% of limit ({} / {}). Continue? [y/N] ",
            usage.what,
            usage.percent(),
            usage.current,
            usage.limit
        );
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }
}

impl OverridePrompt for StderrPrompt {
    fn confirm_size_override(&self, usage: &QuotaUsage) -> bool {
        self.ask(usage)
    }

    fn confirm_file_count_override(&self, usage: &QuotaUsage) -> bool {
        self.ask(usage)
    }

    fn confirm_token_override(&self, usage: &QuotaUsage) -> bool {
        self.ask(usage)
    }
}

/// Forward debounced progress events to stderr when it is a terminal.
fn spawn_progress_printer(
    mut rx: tokio::sync::broadcast::Receiver<codedigest_core::ProgressEvent>,
) {
    if !std::io::stderr().is_terminal() {
        return;
    }
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match (event.percent, &event.message) {
                (Some(pct), _) => eprint!("\r{} {}: {:.0}%   ", event.op, event.mode, pct),
                (None, Some(msg)) => eprint!("\r{} {}: {}   ", event.op, event.mode, msg),
                (None, None) => {}
            }
        }
    });
}

/// Parse a size string (e.g. "10MB", "512K", "1048576").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();

    let (num, multiplier) = if s.ends_with("GB") || s.ends_with('G') {
        let num: f64 = s
            .trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.')
            .parse()?;
        (num, 1024 * 1024 * 1024)
    } else if s.ends_with("MB") || s.ends_with('M') {
        let num: f64 = s
            .trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.')
            .parse()?;
        (num, 1024 * 1024)
    } else if s.ends_with("KB") || s.ends_with('K') {
        let num: f64 = s
            .trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.')
            .parse()?;
        (num, 1024)
    } else if s.ends_with('B') {
        let num: f64 = s
            .trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.')
            .parse()?;
        (num, 1)
    } else {
        let num: f64 = s.parse()?;
        (num, 1)
    };

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("10MB").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size("1.5K").unwrap(), 1536);
        assert!(parse_size("abc").is_err());
    }
}

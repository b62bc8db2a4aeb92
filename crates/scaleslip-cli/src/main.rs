//! scaleslip: resolve, normalize and validate weighbridge ticket fields from
//! extracted candidate documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser as _, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use scaleslip_core::{CandidateSummary, ExtractedDocument, ParseResult, Parser, Policy, summarize_candidates};

mod display;

#[derive(clap::Parser, Debug)]
#[command(name = "scaleslip")]
#[command(about = "Resolve and validate weighbridge ticket fields")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse extracted candidate documents into validated records
    Parse {
        /// Policy file (TOML); defaults apply when omitted
        #[arg(long, env = "SCALESLIP_CONFIG")]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Exit non-zero if any record is invalid or unreadable
        #[arg(long)]
        strict: bool,

        /// ExtractedDocument JSON files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print candidate statistics for extracted documents
    Summarize {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Card,
}

/// One line of `parse` JSON output.
#[derive(Serialize)]
struct ParsedOutput<'a> {
    source: &'a str,
    is_valid: bool,
    #[serde(flatten)]
    result: &'a ParseResult,
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    source: &'a str,
    #[serde(flatten)]
    summary: &'a CandidateSummary,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    valid: usize,
    invalid: usize,
    failed: usize,
}

impl Tally {
    fn fails_strict(&self) -> bool {
        self.invalid > 0 || self.failed > 0
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Parse {
            config,
            format,
            pretty,
            strict,
            inputs,
        } => {
            let policy = load_policy(config.as_deref())?;
            let parser = Parser::new(policy).context("invalid policy")?;
            let tally = parse_all(&parser, &inputs, format, pretty)?;
            info!(
                valid = tally.valid,
                invalid = tally.invalid,
                failed = tally.failed,
                "batch complete"
            );
            if strict && tally.fails_strict() {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Command::Summarize { inputs } => {
            let failed = summarize_all(&inputs)?;
            info!(summarized = inputs.len() - failed, failed, "batch complete");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn parse_all(parser: &Parser, inputs: &[PathBuf], format: Format, pretty: bool) -> Result<Tally> {
    let mut tally = Tally::default();

    for path in inputs {
        let document = match read_document(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "skipping document");
                tally.failed += 1;
                continue;
            }
        };
        if !document.warnings.is_empty() {
            debug!(path = %path.display(), warnings = ?document.warnings, "upstream warnings");
        }

        let output = parser.parse_document(&document);
        if output.result.is_valid() {
            tally.valid += 1;
        } else {
            tally.invalid += 1;
        }

        let source = path.display().to_string();
        match format {
            Format::Json => {
                let out = ParsedOutput {
                    source: &source,
                    is_valid: output.result.is_valid(),
                    result: &output.result,
                };
                let line = if pretty {
                    serde_json::to_string_pretty(&out)?
                } else {
                    serde_json::to_string(&out)?
                };
                println!("{line}");
            }
            Format::Card => {
                let summary = summarize_candidates(&document.pool());
                display::print_card(&source, &summary, &output)?;
            }
        }
    }

    Ok(tally)
}

/// Print one summary line per readable document. Returns how many were skipped.
fn summarize_all(inputs: &[PathBuf]) -> Result<usize> {
    let mut failed = 0;

    for path in inputs {
        let document = match read_document(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "skipping document");
                failed += 1;
                continue;
            }
        };
        let summary = summarize_candidates(&document.pool());
        let source = path.display().to_string();
        let out = SummaryOutput {
            source: &source,
            summary: &summary,
        };
        println!("{}", serde_json::to_string(&out)?);
    }

    Ok(failed)
}

/// Load a policy from TOML, or defaults when no file is given.
fn load_policy(path: Option<&Path>) -> Result<Policy> {
    let Some(path) = path else {
        return Ok(Policy::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let policy: Policy = toml::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    policy
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    info!(path = %path.display(), "loaded policy");
    Ok(policy)
}

fn read_document(path: &Path) -> Result<ExtractedDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to decode {}", path.display()))
}

//! Batch driver for validate-inject.
//!
//! - **stdin mode**: `validate-inject -m meta.json < lib/Foo.pm > out.pm`
//! - **file mode**: `validate-inject -m meta/ -o build/ lib/*.pm` or `--in-place`
//!
//! Files are independent: a fatal diagnostic or an unreadable input leaves
//! that file untouched and the run continues with the next one. In stdin
//! mode a fatal diagnostic passes the input through unchanged.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use validate_inject::{Diagnostic, JsonMetadataStore, Outcome, PerlSchemaCompiler, Severity};

#[derive(Parser)]
#[command(
    name = "validate-inject",
    about = "Insert argument validation code at VALIDATE_ARG(S) tags in Perl sources"
)]
struct Cli {
    /// Input files, directories or glob patterns. If omitted, reads from
    /// stdin and writes to stdout (the input unchanged after a fatal error).
    files: Vec<String>,

    /// Function metadata: a JSON file keyed by package, or a directory of
    /// per-package files (Foo::Bar → Foo/Bar.json)
    #[arg(short = 'm', long, env = "VALIDATE_INJECT_METADATA")]
    metadata: PathBuf,

    /// Output directory for rewritten files
    #[arg(short = 'o', long, conflicts_with = "in_place")]
    output: Option<PathBuf>,

    /// Rewrite input files in place
    #[arg(long)]
    in_place: bool,

    /// Report diagnostics only; write nothing
    #[arg(long, conflicts_with_all = ["output", "in_place"])]
    check: bool,

    /// File name used in diagnostics in stdin mode
    #[arg(long, default_value = "<stdin>")]
    name: String,

    /// More log output (repeatable)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let store = JsonMetadataStore::new(&cli.metadata);
    let ok = if cli.files.is_empty() {
        stdin_mode(&cli, &store)?
    } else {
        file_mode(&cli, &store)?
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn log_level(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    }
}

/// Log to stderr; `RUST_LOG` wins over the command-line flags.
fn init_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(verbose, quiet)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn report(diagnostic: &Diagnostic) {
    let Diagnostic {
        severity,
        file,
        line,
        message,
    } = diagnostic;
    match severity {
        Severity::Fatal => error!(file = %file, line = *line, "{message}"),
        Severity::Warning => warn!(file = %file, line = *line, "{message}"),
        Severity::Notice => info!(file = %file, line = *line, "{message}"),
    }
}

/// Process one source, reporting its diagnostics; `None` after a fatal one.
fn run_one(name: &str, source: &str, store: &JsonMetadataStore) -> Option<Outcome> {
    match validate_inject::process(name, source, store, &PerlSchemaCompiler) {
        Ok(outcome) => {
            outcome.diagnostics.iter().for_each(report);
            debug!(file = name, tags = outcome.tags_processed, "processed");
            Some(outcome)
        }
        Err(err) => {
            err.diagnostics.iter().for_each(report);
            report(&err.fatal);
            None
        }
    }
}

/// stdin mode: read one source from stdin, write the result to stdout.
fn stdin_mode(cli: &Cli, store: &JsonMetadataStore) -> Result<bool> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;

    let outcome = run_one(&cli.name, &input, store);
    let ok = outcome.is_some();
    if !cli.check {
        let text = outcome.map_or(input, |outcome| outcome.text);
        io::stdout()
            .write_all(text.as_bytes())
            .context("failed to write stdout")?;
    }
    Ok(ok)
}

/// file mode: process every input, writing results per `--output`/`--in-place`.
fn file_mode(cli: &Cli, store: &JsonMetadataStore) -> Result<bool> {
    if !cli.check && !cli.in_place && cli.output.is_none() {
        bail!("--output or --in-place is required when files are given");
    }
    if let Some(dir) = &cli.output {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory: {}", dir.display()))?;
    }

    let input_files = expand_globs(&cli.files)?;
    let mut all_ok = true;
    for path in &input_files {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                error!(file = %path.display(), "failed to read: {err}");
                all_ok = false;
                continue;
            }
        };
        let name = path.to_string_lossy();
        let Some(outcome) = run_one(&name, &source, store) else {
            all_ok = false;
            continue;
        };

        let target = match &cli.output {
            Some(dir) => output_path(dir, path)?,
            None if cli.in_place && outcome.is_modified(&source) => path.clone(),
            None => continue,
        };
        fs::write(&target, &outcome.text)
            .with_context(|| format!("failed to write {}", target.display()))?;
    }
    Ok(all_ok)
}

/// File extensions recognized as Perl sources.
const SUPPORTED_EXTENSIONS: &[&str] = &["pm", "pl"];

/// Expand glob patterns into a list of real file paths.
/// Also handles bare directory paths by scanning for supported file types.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        if path.is_dir() {
            let entries = fs::read_dir(path)
                .with_context(|| format!("failed to read directory: {}", path.display()))?;
            for entry in entries.flatten() {
                let p = entry.path();
                let supported = p
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext));
                if p.is_file() && supported {
                    files.push(p);
                }
            }
            continue;
        }
        let matches: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            warn!(pattern = %pattern, "no files matched");
        }
        files.extend(matches);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// "lib/Foo/Bar.pm" written to "out" → "out/Bar.pm"
fn output_path(dir: &Path, input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .with_context(|| format!("not a file path: {}", input.display()))?;
    Ok(dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_keeps_file_name() {
        assert_eq!(
            output_path(Path::new("out"), Path::new("lib/Foo/Bar.pm")).unwrap(),
            PathBuf::from("out/Bar.pm")
        );
        assert!(output_path(Path::new("out"), Path::new("..")).is_err());
    }

    #[test]
    fn log_levels() {
        assert_eq!(log_level(0, false), "info");
        assert_eq!(log_level(1, false), "debug");
        assert_eq!(log_level(3, false), "trace");
        assert_eq!(log_level(0, true), "error");
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

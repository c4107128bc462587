use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use idxcheck::{CheckError, CheckOptions, Checker, Layout, detect};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

// ── CLI definition ──────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "idxcheck",
    version,
    about = "Check a search-index database or a single table for consistency"
)]
struct Cli {
    /// Database directory or table file (`foo`, `foo.`, `foo.DB`, `foo.glass`).
    path: PathBuf,
    /// Print a short summary of each table.
    #[arg(short = 't', long)]
    short_tree: bool,
    /// Dump every key of every table.
    #[arg(short = 'f', long)]
    full_tree: bool,
    /// Print table statistics.
    #[arg(short = 'v', long)]
    stats: bool,
    /// Recreate a damaged version record when the tables are sound.
    #[arg(short = 'F', long)]
    fix: bool,
    /// Print a JSON summary instead of the verdict line.
    #[arg(long)]
    json: bool,
    /// Suppress per-table diagnostics.
    #[arg(long, conflicts_with_all = ["short_tree", "full_tree", "stats"])]
    quiet: bool,
}

impl Cli {
    fn options(&self) -> CheckOptions {
        let mut options = CheckOptions::empty();
        options.set(CheckOptions::SHORT_TREE, self.short_tree);
        options.set(CheckOptions::FULL_TREE, self.full_tree);
        options.set(CheckOptions::SHOW_STATS, self.stats);
        options.set(CheckOptions::FIX, self.fix);
        options
    }
}

// ── Serializable outputs ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CheckSummary<'a> {
    path: &'a std::path::Path,
    layout: &'a Layout,
    errors: usize,
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{}: {err}", cli.path.display());
            ExitCode::from(2)
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second subscriber can only come from a test harness; keep the first.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: &Cli) -> Result<usize, CheckError> {
    let layout = detect(&cli.path)?;
    let checker = Checker::new();

    let errors = if cli.quiet {
        checker.check_layout(&layout, cli.options(), None)?
    } else if cli.json {
        // stdout carries the JSON document, so diagnostics move to stderr.
        let mut stderr = io::stderr().lock();
        let sink: &mut dyn Write = &mut stderr;
        checker.check_layout(&layout, cli.options(), Some(sink))?
    } else {
        let mut stdout = io::stdout().lock();
        let sink: &mut dyn Write = &mut stdout;
        checker.check_layout(&layout, cli.options(), Some(sink))?
    };

    let mut stdout = io::stdout().lock();
    if cli.json {
        let summary = CheckSummary {
            path: &cli.path,
            layout: &layout,
            errors,
        };
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        writeln!(stdout, "{json}")?;
    } else {
        match errors {
            0 => writeln!(stdout, "No errors found")?,
            1 => writeln!(stdout, "1 error found")?,
            n => writeln!(stdout, "{n} errors found")?,
        }
    }
    Ok(errors)
}

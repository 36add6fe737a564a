//! CLI surface: `extract`, `scan`, `analyze`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "logcov", version, about = "Measure log coverage against runtime log files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover log-emission sites in a source tree and persist them.
    Extract {
        /// Root directory to walk for source files.
        #[arg(long)]
        codebase: PathBuf,
        /// Logical repository name to stamp on every discovered position.
        #[arg(long)]
        repo: String,
        /// Rule file restricting which sites are extracted. Defaults to
        /// `log-level = ["error"]` when omitted.
        #[arg(long)]
        filter: Option<PathBuf>,
        /// Pattern store path.
        #[arg(long, default_value = "./logcov.logpattern")]
        output: PathBuf,
    },
    /// Scan runtime log files and record coverage against known sites.
    Scan {
        /// Pattern store path written by `extract`.
        #[arg(long = "log-pattern")]
        log_pattern: PathBuf,
        /// Comma-separated list of log files to scan.
        #[arg(long, value_delimiter = ',')]
        logs: Vec<PathBuf>,
        /// Log level treated as "unknown" when unmatched.
        #[arg(long, default_value = "error")]
        unknown_level: String,
        /// Optional rule file restricting which runtime lines are matched.
        #[arg(long)]
        rule: Option<PathBuf>,
    },
    /// Render a coverage report from previously recorded data.
    Analyze {
        /// Store path containing patterns and coverage rows.
        #[arg(long = "log-coverage")]
        log_coverage: PathBuf,
        /// Report destination; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Optional custom report template; the built-in default is used
        /// otherwise.
        #[arg(long)]
        template: Option<PathBuf>,
    },
}

//! logcov CLI entry point.
//!
//! Logging goes to stderr and to a date-stamped file under the user's home
//! directory; everything downstream of that bootstrap is the extract/scan/
//! analyze pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use logcov::cli::{Cli, Command};
use logcov::coverager::Coverager;
use logcov::error::CoverageError;
use logcov::extractor::{Producer, RegexProducer};
use logcov::model::LogPatternRule;
use logcov::processor::Processor;
use logcov::recorder::{CoverageRecorder, UnknownLogRecorder};
use logcov::report::Reporter;
use logcov::rule::load_rule_file;
use logcov::store::{PatternStore, SledDb};
use logcov::trie::PatternTrie;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let log_path = log_file_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("failed to open log file")?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_writer(move || log_file.try_clone().expect("failed to clone log file"))
                .with_ansi(false),
        )
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, "logcov failed");
            std::process::exit(exit_code_for(&e));
        }
    }
}

fn exit_code_for(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<CoverageError>().map(|c| c.exit_code()).unwrap_or(1)
}

fn log_file_path() -> PathBuf {
    let dir = dirs::home_dir()
        .map(|h| h.join(".logcov"))
        .unwrap_or_else(|| std::env::temp_dir().join("logcov"));
    let date = chrono::Local::now().format("%Y-%m-%d");
    dir.join(format!("logcov-{date}.log"))
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Extract { codebase, repo, filter, output } => {
            extract(&output, &codebase, &repo, filter.as_deref()).await
        }
        Command::Scan { log_pattern, logs, unknown_level, rule } => {
            scan(&log_pattern, logs, &unknown_level, rule.as_deref()).await
        }
        Command::Analyze { log_coverage, output, template } => {
            analyze(&log_coverage, output.as_deref(), template.as_deref())
        }
    }
}

fn open_store(path: &Path) -> Result<PatternStore> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    fs::create_dir_all(path).context("failed to create store directory")?;
    let db = Arc::new(SledDb::open(path).context("failed to open pattern store")?);
    Ok(PatternStore::new(db))
}

async fn extract(output: &Path, codebase: &Path, repo: &str, filter_path: Option<&Path>) -> Result<()> {
    let store = open_store(output)?;
    let rule = match filter_path {
        Some(path) => load_rule_file(path).context("failed to load rule file")?,
        None => LogPatternRule {
            log_level: vec!["error".to_string()],
            log_signature: vec![],
        },
    };

    let producer = RegexProducer::default();
    let mut discovered = 0usize;
    for entry in walk_source_files(codebase)? {
        let source = fs::read_to_string(&entry)
            .with_context(|| format!("failed to read {}", entry.display()))?;
        let relative = entry.strip_prefix(codebase).unwrap_or(&entry);
        for pattern in producer.extract(repo, relative, &source) {
            if !LogPatternRule::matches(Some(&rule), &pattern.level, pattern.signature()) {
                continue;
            }
            store.put_log_pattern(&pattern)?;
            discovered += 1;
        }
    }
    store.put_rule("default", &rule)?;
    store.flush()?;
    tracing::info!(discovered, "extract complete");
    println!("discovered {discovered} log-emission sites");
    Ok(())
}

fn walk_source_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("go") {
                out.push(path);
            }
        }
    }
    Ok(out)
}

async fn scan(
    log_pattern: &Path,
    log_files: Vec<PathBuf>,
    unknown_level: &str,
    rule_path: Option<&Path>,
) -> Result<()> {
    let store = open_store(log_pattern)?;
    let rule = rule_path
        .map(load_rule_file)
        .transpose()
        .context("failed to load rule file")?
        .map(Arc::new);

    let trie = Arc::new(PatternTrie::new());
    for pattern in store.all_log_patterns()? {
        trie.insert(Arc::new(pattern));
    }

    let recorder = Arc::new(CoverageRecorder::new());
    let unknown_recorder = Arc::new(UnknownLogRecorder::new(unknown_level));
    let processor = Processor::new(Arc::clone(&trie), Arc::clone(&recorder), Arc::clone(&unknown_recorder), rule);

    let outcome = processor.run(log_files).await;

    for coverage in recorder.flush() {
        store.put_coverage(&coverage)?;
    }
    // Unknowns are in-memory only; flush() logs the summary and that's the
    // only record of them this run leaves behind.
    unknown_recorder.flush();
    store.flush()?;

    tracing::info!(
        files = outcome.files_scanned,
        matched = outcome.records_matched,
        unmatched = outcome.records_unmatched,
        "scan complete"
    );
    println!(
        "scanned {} file(s): {} matched, {} unmatched",
        outcome.files_scanned, outcome.records_matched, outcome.records_unmatched
    );
    Ok(())
}

fn analyze(log_coverage: &Path, output: Option<&Path>, template_path: Option<&Path>) -> Result<()> {
    let store = open_store(log_coverage)?;
    let coverager = Coverager::load(&store).context("failed to load coverage data")?;
    let reporter = match template_path {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read template {}", path.display()))?;
            Reporter::with_template(&source)?
        }
        None => Reporter::default_template()?,
    };
    let rendered = reporter.render(&coverager)?;
    match output {
        Some(path) => fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}

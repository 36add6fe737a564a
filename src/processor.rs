//! Processor: orchestrates scan runs across many log files.
//!
//! One `tokio::task::JoinSet` entry per file, scanner and matcher paired and
//! run concurrently across files, ordered within a file via the bounded
//! pipeline in `pipeline.rs`.

use crate::model::{LogPatternRule, Position};
use crate::parser::ParserRegistry;
use crate::pipeline::{Payload, Pipeline};
use crate::recorder::{CoverageRecorder, UnknownLogRecorder};
use crate::scanner::{FileLogReader, LogScanner};
use crate::trie::PatternTrie;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

pub struct ScanOutcome {
    pub files_scanned: usize,
    pub records_matched: u64,
    pub records_unmatched: u64,
}

/// Runs the scan phase over every path in `log_files`, matching each parsed
/// record against `trie` and recording hits in `recorder`. One scanner task
/// per file; files run in parallel, lines within a file are processed in
/// order via its own pipeline.
pub struct Processor {
    trie: Arc<PatternTrie>,
    recorder: Arc<CoverageRecorder>,
    unknown_recorder: Arc<UnknownLogRecorder>,
    rule: Option<Arc<LogPatternRule>>,
}

impl Processor {
    pub fn new(
        trie: Arc<PatternTrie>,
        recorder: Arc<CoverageRecorder>,
        unknown_recorder: Arc<UnknownLogRecorder>,
        rule: Option<Arc<LogPatternRule>>,
    ) -> Self {
        Self {
            trie,
            recorder,
            unknown_recorder,
            rule,
        }
    }

    pub async fn run(&self, log_files: Vec<PathBuf>) -> ScanOutcome {
        let mut joinset: JoinSet<(u64, u64)> = JoinSet::new();

        for path in log_files {
            let trie = Arc::clone(&self.trie);
            let recorder = Arc::clone(&self.recorder);
            let unknown_recorder = Arc::clone(&self.unknown_recorder);
            let rule = self.rule.clone();

            joinset.spawn(async move {
                match process_one_file(path.clone(), trie, recorder, unknown_recorder, rule).await {
                    Ok(counts) => counts,
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "scan failed for file");
                        (0, 0)
                    }
                }
            });
        }

        let mut files_scanned = 0;
        let mut matched = 0u64;
        let mut unmatched = 0u64;
        while let Some(res) = joinset.join_next().await {
            if let Ok((m, u)) = res {
                files_scanned += 1;
                matched += m;
                unmatched += u;
            }
        }

        info!(files_scanned, matched, unmatched, "scan complete");
        ScanOutcome {
            files_scanned,
            records_matched: matched,
            records_unmatched: unmatched,
        }
    }
}

async fn process_one_file(
    path: PathBuf,
    trie: Arc<PatternTrie>,
    recorder: Arc<CoverageRecorder>,
    unknown_recorder: Arc<UnknownLogRecorder>,
    rule: Option<Arc<LogPatternRule>>,
) -> Result<(u64, u64), crate::error::CoverageError> {
    let registry = ParserRegistry::default();
    let mut reader = FileLogReader::open(&path).await?;
    let mut scanner = LogScanner::new(path.display().to_string(), &registry);
    let records = scanner.scan(&mut reader).await?;

    let mut pipeline = Pipeline::with_default_capacity();
    let log_file_name = path.display().to_string();

    let feed = {
        let tx = pipeline.tx.clone();
        let log_file_name = log_file_name.clone();
        tokio::spawn(async move {
            for record in records {
                if tx.send(Payload::Record(record)).await.is_err() {
                    break;
                }
            }
            let _ = tx.send(Payload::Eof).await;
            let _ = log_file_name;
        })
    };

    let mut matched = 0u64;
    let mut unmatched = 0u64;

    while let Some(payload) = pipeline.recv().await {
        match payload {
            Payload::Record(record) => {
                if !LogPatternRule::matches(rule.as_deref(), &record.level, &record.message) {
                    continue;
                }
                let hits = trie.matches(&record.message, &record.level, &record.short_position);
                if hits.is_empty() {
                    unknown_recorder.record(&record.short_position, &record.level, &log_file_name);
                    unmatched += 1;
                } else {
                    for hit in &hits {
                        let position: &Position = &hit.pattern.position;
                        recorder.record(&hit.pattern_id, position, &log_file_name);
                    }
                    matched += 1;
                }
            }
            Payload::Eof => break,
        }
    }

    let _ = feed.await;
    Ok((matched, unmatched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FuncInfo, LogPattern};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn processes_a_single_file_and_counts_matches() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[t1] [error] [worker.go:9] [connection refused]").unwrap();
        writeln!(file, "[t2] [error] [worker.go:9] [connection refused]").unwrap();
        writeln!(file, "[t3] [warn] [worker.go:20] [disk almost full]").unwrap();

        let trie = Arc::new(PatternTrie::new());
        trie.insert(Arc::new(LogPattern {
            position: Position::new("repo", "worker.go", 9, 0),
            func: FuncInfo {
                name: "run".into(),
                position: Position::new("repo", "worker.go", 8, 0),
            },
            level: "error".into(),
            signatures: vec!["connection refused".into()],
        }));

        let recorder = Arc::new(CoverageRecorder::new());
        let unknown_recorder = Arc::new(UnknownLogRecorder::new("error"));
        let processor = Processor::new(trie, recorder.clone(), unknown_recorder, None);

        let outcome = processor.run(vec![file.path().to_path_buf()]).await;
        assert_eq!(outcome.files_scanned, 1);
        assert_eq!(outcome.records_matched, 2);
        assert_eq!(outcome.records_unmatched, 1);
    }
}

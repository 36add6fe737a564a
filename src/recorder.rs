//! Coverage aggregation.
//!
//! A shared, lock-guarded map from pattern identity to running hit counts,
//! flushed to the store once per `scan` run.

use crate::model::{Coverage, Position, UnknownLogPattern};
use dashmap::DashMap;

/// Accumulates hit counts per known pattern id. One instance per `scan` run,
/// shared across every file's matcher task.
#[derive(Default)]
pub struct CoverageRecorder {
    entries: DashMap<String, Coverage>,
}

impl CoverageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one hit against `pattern_id` at `position`, attributed to
    /// `log_file`. Idempotent in the sense that repeated calls only ever
    /// add counts — there's no double-counting within a single call.
    pub fn record(&self, pattern_id: &str, position: &Position, log_file: &str) {
        self.entries
            .entry(pattern_id.to_string())
            .or_insert_with(|| Coverage::new(position.clone()))
            .record(log_file);
    }

    /// Drains the current snapshot without clearing it — flush is meant to
    /// be callable more than once (e.g. a periodic checkpoint) and always
    /// returns the same entries until more hits are recorded.
    pub fn flush(&self) -> Vec<Coverage> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    pub fn get(&self, pattern_id: &str) -> Option<Coverage> {
        self.entries.get(pattern_id).map(|e| e.value().clone())
    }
}

/// Summarizes runtime lines at the configured "unknown" level that matched
/// no known pattern. Capped at 32 distinct short-positions per flush, same
/// as the original's `unknow_recorder.go`, so a noisy unknown line doesn't
/// blow up the coverage report.
pub struct UnknownLogRecorder {
    unknown_level: String,
    entries: DashMap<String, UnknownLogPattern>,
}

const MAX_UNKNOWN_ENTRIES: usize = 32;

impl UnknownLogRecorder {
    pub fn new(unknown_level: impl Into<String>) -> Self {
        Self {
            unknown_level: unknown_level.into().to_lowercase(),
            entries: DashMap::new(),
        }
    }

    /// Records an unmatched line if its level is the configured unknown
    /// level; a no-op otherwise.
    pub fn record(&self, short_position: &str, level: &str, log_file: &str) {
        if !level.eq_ignore_ascii_case(&self.unknown_level) {
            return;
        }
        self.entries
            .entry(short_position.to_string())
            .or_insert_with(|| UnknownLogPattern::new(short_position.to_string(), level.to_lowercase()))
            .record(log_file);
    }

    /// Logs a summary of up to 32 entries, most-frequent first, and returns
    /// them. Unknowns live in memory only — this summary is the only record
    /// of them a `scan` run leaves behind.
    pub fn flush(&self) -> Vec<UnknownLogPattern> {
        let mut all: Vec<UnknownLogPattern> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| b.total.cmp(&a.total));
        all.truncate(MAX_UNKNOWN_ENTRIES);

        if !all.is_empty() {
            tracing::warn!(
                unknown_level = %self.unknown_level,
                count = all.len(),
                "unmatched log lines at unknown level"
            );
            for entry in &all {
                tracing::warn!(
                    position = %entry.short_position,
                    level = %entry.level,
                    total = entry.total,
                    "unknown log pattern"
                );
            }
        }

        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_recorder_accumulates_across_files() {
        let recorder = CoverageRecorder::new();
        let pos = Position::new("repo", "worker.go", 10, 0);
        recorder.record("abc", &pos, "app1.log");
        recorder.record("abc", &pos, "app2.log");
        recorder.record("abc", &pos, "app1.log");

        let cov = recorder.get("abc").unwrap();
        assert_eq!(cov.total, 3);
        assert_eq!(cov.by_log_file["app1.log"], 2);
        assert_eq!(cov.by_log_file["app2.log"], 1);
    }

    #[test]
    fn flush_is_idempotent_without_new_hits() {
        let recorder = CoverageRecorder::new();
        let pos = Position::new("repo", "worker.go", 10, 0);
        recorder.record("abc", &pos, "app.log");
        assert_eq!(recorder.flush(), recorder.flush());
    }

    #[test]
    fn unknown_recorder_ignores_other_levels() {
        let recorder = UnknownLogRecorder::new("error");
        recorder.record("worker.go:1", "info", "app.log");
        assert!(recorder.flush().is_empty());
    }

    #[test]
    fn unknown_recorder_caps_at_32_entries() {
        let recorder = UnknownLogRecorder::new("error");
        for i in 0..40 {
            recorder.record(&format!("f{i}.go:1"), "error", "app.log");
        }
        assert_eq!(recorder.flush().len(), 32);
    }
}

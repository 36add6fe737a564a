//! Core value types for log-site positions, patterns, and coverage.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A source location: the identity of one log-emission call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub repo: String,
    pub file_path: String,
    pub line_number: u32,
    pub column_offset: u32,
}

impl Position {
    pub fn new(repo: impl Into<String>, file_path: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            repo: repo.into(),
            file_path: file_path.into(),
            line_number: line,
            column_offset: column,
        }
    }

    /// `basename(file):line`, the coarse locator most structured loggers stamp
    /// onto each runtime log line.
    pub fn short(&self) -> String {
        let base = Path::new(&self.file_path)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.clone());
        format!("{base}:{}", self.line_number)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.repo, self.file_path, self.line_number, self.column_offset
        )
    }
}

/// The enclosing function of a log call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncInfo {
    /// `<init>@<package-id>` at file scope.
    pub name: String,
    pub position: Position,
}

/// One statically-discovered log-emission site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPattern {
    pub position: Position,
    pub func: FuncInfo,
    /// Lowercase severity, e.g. "error".
    pub level: String,
    /// Ordered signatures; the first is authoritative for trie indexing.
    pub signatures: Vec<String>,
}

impl LogPattern {
    /// Canonical pattern identity: the position's wire-encoded bytes, hex-rendered.
    pub fn id(&self) -> String {
        crate::codec::position_id(&self.position)
    }

    pub fn signature(&self) -> &str {
        self.signatures.first().map(|s| s.as_str()).unwrap_or("")
    }
}

/// Derived view attached to a trie edge: everything match-time filtering needs
/// without dereferencing back into the full `LogPattern`.
#[derive(Debug, Clone)]
pub struct BriefPattern {
    pub pattern_id: String,
    pub short_position: String,
    pub level: String,
    pub pattern: std::sync::Arc<LogPattern>,
}

impl BriefPattern {
    pub fn new(pattern: std::sync::Arc<LogPattern>) -> Self {
        Self {
            pattern_id: pattern.id(),
            short_position: pattern.position.short(),
            level: pattern.level.to_lowercase(),
            pattern,
        }
    }
}

/// Accumulated coverage for one pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub position: Position,
    pub total: u64,
    pub by_log_file: HashMap<String, u64>,
}

impl Coverage {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            total: 0,
            by_log_file: HashMap::new(),
        }
    }

    pub fn record(&mut self, log_path: &str) {
        self.total += 1;
        *self.by_log_file.entry(log_path.to_string()).or_insert(0) += 1;
    }
}

/// An unmatched runtime log line at the configured "unknown" level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownLogPattern {
    pub short_position: String,
    pub level: String,
    pub total: u64,
    pub by_log_file: HashMap<String, u64>,
}

impl UnknownLogPattern {
    pub fn new(short_position: String, level: String) -> Self {
        Self {
            short_position,
            level,
            total: 0,
            by_log_file: HashMap::new(),
        }
    }

    pub fn record(&mut self, log_path: &str) {
        self.total += 1;
        *self.by_log_file.entry(log_path.to_string()).or_insert(0) += 1;
    }
}

/// Extraction-time filter. An absent or empty level list matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogPatternRule {
    #[serde(rename = "log-level", default)]
    pub log_level: Vec<String>,
    #[serde(rename = "log-signature", default)]
    pub log_signature: Vec<String>,
}

impl LogPatternRule {
    /// An absent rule, or one with an empty `log-level` list, matches every level.
    /// `log-signature` is reserved for future use and not yet consulted.
    pub fn matches(rule: Option<&LogPatternRule>, level: &str, _message: &str) -> bool {
        let Some(rule) = rule else {
            return true;
        };

        if rule.log_level.is_empty() {
            return true;
        }

        rule.log_level
            .iter()
            .any(|l| l.eq_ignore_ascii_case(level))
    }
}

/// One parsed line from a runtime log file, borrowed for the duration of one
/// pipeline hop.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub source_file_path: String,
    pub time: String,
    pub level: String,
    pub short_position: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_position_strips_directories() {
        let pos = Position::new("repo", "pkg/worker/source_worker.go", 605, 0);
        assert_eq!(pos.short(), "source_worker.go:605");
    }

    #[test]
    fn rule_matching() {
        let rule = LogPatternRule {
            log_level: vec!["fatal".into(), "error".into()],
            log_signature: vec![],
        };
        assert!(LogPatternRule::matches(Some(&rule), "Error", ""));
        assert!(!LogPatternRule::matches(Some(&rule), "warn", ""));
        assert!(LogPatternRule::matches(None, "", ""));
    }

    #[test]
    fn empty_rule_matches_all() {
        let rule = LogPatternRule::default();
        assert!(LogPatternRule::matches(Some(&rule), "anything", ""));
    }

    #[test]
    fn coverage_accumulates_per_file() {
        let mut cov = Coverage::new(Position::new("r", "f.go", 1, 0));
        cov.record("a.log");
        cov.record("a.log");
        cov.record("b.log");
        assert_eq!(cov.total, 3);
        assert_eq!(cov.by_log_file["a.log"], 2);
        assert_eq!(cov.by_log_file["b.log"], 1);
    }
}

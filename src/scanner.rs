//! Runtime log file scanning.
//!
//! A scanner walks one log file line by line through four states —
//! `Start` (no parser elected yet), `Detect` (trying each registered parser),
//! `Running` (steady state, parser already chosen), and `Assembling`
//! (accumulating continuation lines for a single logical record, e.g. a
//! multi-line stack trace appended after the message). Lines longer than the
//! 100 KiB cap are treated as malformed rather than buffered without bound.

use crate::error::CoverageError;
use crate::model::LogRecord;
use crate::parser::{ParseError, ParserRegistry};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

pub const MAX_LINE_BYTES: usize = 100 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Detect,
    Running,
    Assembling,
}

/// Reads raw lines from a source. Abstracted so tests can feed in-memory
/// content instead of a real file.
#[async_trait::async_trait]
pub trait LogReader: Send {
    async fn next_line(&mut self) -> Result<Option<String>, CoverageError>;
}

pub struct FileLogReader {
    lines: tokio::io::Lines<BufReader<File>>,
}

impl FileLogReader {
    pub async fn open(path: &Path) -> Result<Self, CoverageError> {
        let file = File::open(path)
            .await
            .map_err(|e| CoverageError::UserInput(format!("cannot open {}: {e}", path.display())))?;
        Ok(Self {
            lines: BufReader::with_capacity(64 * 1024, file).lines(),
        })
    }
}

#[async_trait::async_trait]
impl LogReader for FileLogReader {
    async fn next_line(&mut self) -> Result<Option<String>, CoverageError> {
        match self.lines.next_line().await {
            Ok(Some(line)) if line.len() > MAX_LINE_BYTES => Err(CoverageError::Inconsistency(
                format!("log line exceeds {MAX_LINE_BYTES} bytes"),
            )),
            Ok(line) => Ok(line),
            Err(e) => Err(CoverageError::Inconsistency(format!("read error: {e}"))),
        }
    }
}

/// Drives a single log file through the Start/Detect/Running/Assembling
/// states, yielding one `LogRecord` per logical entry (continuation lines
/// folded into the preceding record's message).
pub struct LogScanner<'a> {
    source_file_path: String,
    registry: &'a ParserRegistry,
    state: State,
    parser_name: Option<&'static str>,
}

impl<'a> LogScanner<'a> {
    pub fn new(source_file_path: impl Into<String>, registry: &'a ParserRegistry) -> Self {
        Self {
            source_file_path: source_file_path.into(),
            registry,
            state: State::Start,
            parser_name: None,
        }
    }

    /// Consumes every line from `reader`, returning the assembled records in
    /// order. Unsuitable lines before any parser is elected are skipped;
    /// once a parser is elected, a non-record line is treated as a
    /// continuation of the previous record.
    pub async fn scan(&mut self, reader: &mut dyn LogReader) -> Result<Vec<LogRecord>, CoverageError> {
        let mut out: Vec<LogRecord> = Vec::new();

        while let Some(line) = reader.next_line().await? {
            match self.state {
                State::Start => {
                    self.state = State::Detect;
                    self.handle_detect(&line, &mut out)?;
                }
                State::Detect | State::Running => {
                    self.handle_detect(&line, &mut out)?;
                }
                State::Assembling => {
                    self.append_continuation(&line, &mut out);
                }
            }
        }

        Ok(out)
    }

    fn handle_detect(&mut self, line: &str, out: &mut Vec<LogRecord>) -> Result<(), CoverageError> {
        let Some(parser) = self.registry.select(line) else {
            // No parser claims this line yet; stay in Detect and drop it.
            return Ok(());
        };

        match parser.parse(&self.source_file_path, line) {
            Ok(record) => {
                self.parser_name = Some(parser.name());
                self.state = State::Running;
                out.push(record);
            }
            Err(ParseError::Incomplete(_)) => {
                self.state = State::Assembling;
            }
            Err(ParseError::NotSuitable) | Err(ParseError::Malformed(_)) => {
                // Leave state unchanged; a malformed candidate line from an
                // elected parser is treated as a continuation once running.
                if self.parser_name.is_some() {
                    self.append_continuation(line, out);
                }
            }
        }
        Ok(())
    }

    fn append_continuation(&mut self, line: &str, out: &mut Vec<LogRecord>) {
        if let Some(last) = out.last_mut() {
            last.message.push('\n');
            last.message.push_str(line);
        }
        self.state = State::Running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserRegistry;

    struct VecReader {
        lines: std::collections::VecDeque<String>,
    }

    impl VecReader {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait::async_trait]
    impl LogReader for VecReader {
        async fn next_line(&mut self) -> Result<Option<String>, CoverageError> {
            Ok(self.lines.pop_front())
        }
    }

    #[tokio::test]
    async fn scans_well_formed_lines() {
        let registry = ParserRegistry::default();
        let mut scanner = LogScanner::new("app.log", &registry);
        let mut reader = VecReader::new(&[
            "[t1] [info] [main.go:1] [started]",
            "[t2] [error] [worker.go:9] [connection refused]",
        ]);
        let records = scanner.scan(&mut reader).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "started");
        assert_eq!(records[1].level, "error");
    }

    #[tokio::test]
    async fn continuation_lines_fold_into_previous_record() {
        let registry = ParserRegistry::default();
        let mut scanner = LogScanner::new("app.log", &registry);
        let mut reader = VecReader::new(&[
            "[t1] [error] [worker.go:9] [panic recovered]",
            "    at worker.go:12",
            "    at main.go:4",
        ]);
        let records = scanner.scan(&mut reader).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].message.contains("at worker.go:12"));
        assert!(records[0].message.contains("at main.go:4"));
    }

    #[tokio::test]
    async fn leading_noise_before_first_record_is_skipped() {
        let registry = ParserRegistry::default();
        let mut scanner = LogScanner::new("app.log", &registry);
        let mut reader = VecReader::new(&[
            "some banner nobody asked for",
            "[t1] [info] [main.go:1] [started]",
        ]);
        let records = scanner.scan(&mut reader).await.unwrap();
        assert_eq!(records.len(), 1);
    }
}

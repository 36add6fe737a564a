//! Runtime log line parsing.
//!
//! A zap-console line is a run of bracketed fields — `[time] [level]
//! [position] [message]` — followed by free-form trailing text (structured
//! fields such as `[component="worker controller"]`) this dialect doesn't
//! need to interpret. The grammar is strict about all four leading fields
//! and permissive about everything after the message field.

use crate::model::LogRecord;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line is not a bracketed log record")]
    NotSuitable,
    #[error("malformed log line: {0}")]
    Malformed(String),
    #[error("log line looks truncated: {0}")]
    Incomplete(String),
}

/// A dialect's line grammar. `is_suitable` is a cheap pre-check so a registry
/// can pick the right parser without fully parsing every candidate line.
pub trait LogParser: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_suitable(&self, line: &str) -> bool;
    fn parse(&self, source_file_path: &str, line: &str) -> Result<LogRecord, ParseError>;
}

/// Splits one `[field]` off the front of `s`, returning the field body and
/// the remainder. Fields may not contain an unescaped `]`.
fn take_bracket(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if !s.starts_with('[') {
        return None;
    }
    let close = s.find(']')?;
    Some((&s[1..close], &s[close + 1..]))
}

/// The zap-console-encoder dialect:
/// `[time] [level] [pkg/file.go:line] [message] [rest...]`.
pub struct ZapParser;

impl LogParser for ZapParser {
    fn name(&self) -> &'static str {
        "zap"
    }

    fn is_suitable(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        trimmed.starts_with('[') && trimmed.matches('[').count() >= 4
    }

    fn parse(&self, source_file_path: &str, line: &str) -> Result<LogRecord, ParseError> {
        if !self.is_suitable(line) {
            return Err(ParseError::NotSuitable);
        }

        let (time, rest) =
            take_bracket(line).ok_or_else(|| ParseError::Malformed("missing time field".to_string()))?;
        let (level, rest) = take_bracket(rest)
            .ok_or_else(|| ParseError::Incomplete("missing level field after time".to_string()))?;
        let (position, rest) = take_bracket(rest)
            .ok_or_else(|| ParseError::Incomplete("missing position field after level".to_string()))?;
        let (message, _rest) = take_bracket(rest)
            .ok_or_else(|| ParseError::Incomplete("missing message field after position".to_string()))?;

        let short_position = position.rsplit('/').next().unwrap_or(position).to_string();

        Ok(LogRecord {
            source_file_path: source_file_path.to_string(),
            time: time.to_string(),
            level: level.trim().to_string(),
            short_position,
            message: message.to_string(),
        })
    }
}

/// Owned set of dialect parsers. Never global/static — one instance is built
/// per `scan` invocation and handed to each scanner task.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn LogParser>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self {
            parsers: vec![Box::new(ZapParser)],
        }
    }
}

impl ParserRegistry {
    pub fn new(parsers: Vec<Box<dyn LogParser>>) -> Self {
        Self { parsers }
    }

    /// First parser that claims the line, in registration order.
    pub fn select(&self, line: &str) -> Option<&dyn LogParser> {
        self.parsers.iter().find(|p| p.is_suitable(line)).map(|p| p.as_ref())
    }
}

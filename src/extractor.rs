//! Log-emission site discovery: a `Producer` contract plus a concrete
//! regex-based default implementation.
//!
//! The Producer boundary is intentionally an external contract: whatever
//! parses and type-checks source to find log-emission sites is free to be a
//! full compiler frontend. `RegexProducer` is the batteries-included default
//! this crate ships.

use crate::model::{FuncInfo, LogPattern, Position};
use regex::Regex;
use std::path::Path;

/// Implemented by anything that can discover log-emission call sites in a
/// tree of source files. Kept minimal and synchronous: producers are
/// expected to do their own internal parallelism if needed.
pub trait Producer {
    fn extract(&self, repo: &str, file_path: &Path, source: &str) -> Vec<LogPattern>;
}

/// Classifies a call-site by which logging dialect it belongs to, the way
/// the original's `filter.go` keeps a package → dialect dictionary.
pub trait Dialect {
    fn name(&self) -> &'static str;
    /// The regex used to find call sites for this dialect. Capture groups:
    /// `level`, `func`, `message`.
    fn call_pattern(&self) -> &Regex;
}

pub struct ZapDialect {
    pattern: Regex,
}

impl Default for ZapDialect {
    fn default() -> Self {
        Self {
            pattern: Regex::new(
                r#"(?m)^\s*(?:\w+\.)?(?:logger|log|l)\.(?P<level>Debug|Info|Warn|Error|Fatal)\(\s*"(?P<message>(?:[^"\\]|\\.)*)"#,
            )
            .expect("static regex"),
        }
    }
}

impl Dialect for ZapDialect {
    fn name(&self) -> &'static str {
        "zap"
    }

    fn call_pattern(&self) -> &Regex {
        &self.pattern
    }
}

pub struct StandardDialect {
    pattern: Regex,
}

impl Default for StandardDialect {
    fn default() -> Self {
        Self {
            pattern: Regex::new(
                r#"(?m)^\s*log\.(?P<level>Print|Fatal|Panic)(?:ln|f)?\(\s*"(?P<message>(?:[^"\\]|\\.)*)"#,
            )
            .expect("static regex"),
        }
    }
}

impl Dialect for StandardDialect {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn call_pattern(&self) -> &Regex {
        &self.pattern
    }
}

/// Approximate function-context tracker: scans for `func <name>(` headers and
/// remembers the most recent one seen above a given line. Good enough to
/// attribute a call site to its enclosing function without a real AST.
fn enclosing_func(source: &str, call_line: usize) -> (String, u32) {
    lazy_static::lazy_static! {
        static ref FUNC_HEADER: Regex = Regex::new(r#"^\s*func\s+(?:\([^)]*\)\s*)?(?P<name>\w+)\s*\("#).unwrap();
    }
    let mut name = "<init>".to_string();
    let mut line_no = 0u32;
    for (idx, line) in source.lines().enumerate() {
        if idx + 1 > call_line {
            break;
        }
        if let Some(caps) = FUNC_HEADER.captures(line) {
            name = caps["name"].to_string();
            line_no = (idx + 1) as u32;
        }
    }
    (name, line_no)
}

/// Default Producer: scans source text with a fixed set of dialect regexes,
/// normalizing each match's level to lowercase and attributing it to the
/// nearest preceding `func` header.
pub struct RegexProducer {
    dialects: Vec<Box<dyn Dialect>>,
}

impl Default for RegexProducer {
    fn default() -> Self {
        Self {
            dialects: vec![Box::new(ZapDialect::default()), Box::new(StandardDialect::default())],
        }
    }
}

impl Producer for RegexProducer {
    fn extract(&self, repo: &str, file_path: &Path, source: &str) -> Vec<LogPattern> {
        let mut out = Vec::new();
        let file_path_str = file_path.to_string_lossy().into_owned();

        for dialect in &self.dialects {
            for mat in dialect.call_pattern().captures_iter(source) {
                let whole = mat.get(0).unwrap();
                let line_number = source[..whole.start()].matches('\n').count() as u32 + 1;
                let column_offset = whole.start()
                    - source[..whole.start()].rfind('\n').map(|p| p + 1).unwrap_or(0);

                let (func_name, func_line) = enclosing_func(source, line_number as usize);
                let position = Position::new(repo, file_path_str.clone(), line_number, column_offset as u32);
                let func = FuncInfo {
                    name: func_name,
                    position: Position::new(repo, file_path_str.clone(), func_line, 0),
                };

                out.push(LogPattern {
                    position,
                    func,
                    level: mat["level"].to_lowercase(),
                    // Stored with its surrounding quotes so it lines up with
                    // the quoted message field a zap console encoder emits
                    // at runtime.
                    signatures: vec![format!("\"{}\"", &mat["message"])],
                });
            }
        }

        out
    }
}

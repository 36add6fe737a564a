//! Rule file loading.
//!
//! `LogPatternRule` derives `deny_unknown_fields`, so a strict TOML decode
//! reports any undecoded key back to the caller instead of silently
//! ignoring it.

use crate::model::LogPatternRule;
use thiserror::Error;
use std::path::Path;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("cannot read rule file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rule file {path} is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Loads a rule file from disk, rejecting any key not in
/// `LogPatternRule`'s field set rather than silently ignoring it.
pub fn load_rule_file(path: &Path) -> Result<LogPatternRule, RuleError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_rule(&contents, &path.display().to_string())
}

pub fn parse_rule(contents: &str, source_name: &str) -> Result<LogPatternRule, RuleError> {
    toml::from_str(contents).map_err(|source| RuleError::Malformed {
        path: source_name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_level_and_signature_rules() {
        let toml_text = r#"
            log-level = ["error", "fatal"]
            log-signature = ["connection refused"]
        "#;
        let rule = parse_rule(toml_text, "inline").unwrap();
        assert_eq!(rule.log_level, vec!["error", "fatal"]);
        assert_eq!(rule.log_signature, vec!["connection refused"]);
    }

    #[test]
    fn empty_file_matches_everything() {
        let rule = parse_rule("", "inline").unwrap();
        assert!(rule.log_level.is_empty());
        assert!(rule.log_signature.is_empty());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let toml_text = r#"
            log-level = ["error"]
            log-severityyy = ["typo"]
        "#;
        assert!(parse_rule(toml_text, "inline").is_err());
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err = load_rule_file(Path::new("/nonexistent/rule.toml"));
        assert!(matches!(err, Err(RuleError::Io { .. })));
    }
}

//! Coverage report rendering: a caller-supplied template or a built-in
//! default, rendered against a loaded `Coverager`.

use crate::coverager::Coverager;
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
}

const DEFAULT_TEMPLATE_NAME: &str = "__default__";

const DEFAULT_TEMPLATE: &str = r#"Coverage: {{ covered }}/{{ total }} sites ({{ percent }}%)

{% for d in details -%}
[{{ d.covered }}] {{ d.key }} ({{ d.level }}) hits={{ d.total }}
{% endfor -%}
"#;

#[derive(Serialize)]
struct DetailRow {
    key: String,
    level: String,
    total: u64,
    covered: bool,
}

#[derive(Serialize)]
struct ReportContext {
    total: usize,
    covered: usize,
    percent: u32,
    details: Vec<DetailRow>,
}

pub struct Reporter {
    tera: Tera,
    template_name: String,
}

impl Reporter {
    /// Uses the built-in default template.
    pub fn default_template() -> Result<Self, ReportError> {
        let mut tera = Tera::default();
        tera.add_raw_template(DEFAULT_TEMPLATE_NAME, DEFAULT_TEMPLATE)?;
        Ok(Self {
            tera,
            template_name: DEFAULT_TEMPLATE_NAME.to_string(),
        })
    }

    /// Uses a caller-supplied template source instead of the default.
    pub fn with_template(source: &str) -> Result<Self, ReportError> {
        let mut tera = Tera::default();
        tera.add_raw_template("custom", source)?;
        Ok(Self {
            tera,
            template_name: "custom".to_string(),
        })
    }

    pub fn render(&self, coverager: &Coverager) -> Result<String, ReportError> {
        let (total, covered) = coverager.overall_coverage();
        let percent = if total == 0 { 0 } else { (covered * 100 / total) as u32 };

        let details = coverager
            .for_each()
            .map(|d| DetailRow {
                key: d.key.clone(),
                level: d.pattern.level.clone(),
                total: d.coverage.total,
                covered: d.coverage.total > 0,
            })
            .collect();

        let context = Context::from_serialize(ReportContext {
            total,
            covered,
            percent,
            details,
        })
        .map_err(ReportError::Template)?;

        Ok(self.tera.render(&self.template_name, &context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FuncInfo, LogPattern, Position};
    use crate::store::{Db, PatternStore, StoreError};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct MemDb {
        map: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    }

    impl MemDb {
        fn new() -> Self {
            Self {
                map: Mutex::new(HashMap::new()),
            }
        }
    }

    impl Db for MemDb {
        fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
            self.map.lock().unwrap().insert(key.to_vec(), value.to_vec());
            Ok(())
        }
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(self.map.lock().unwrap().get(key).cloned())
        }
        fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
            Ok(self
                .map
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        }
        fn flush(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn default_template_reports_overall_percentage() {
        let store = PatternStore::new(Arc::new(MemDb::new()));
        let pattern = LogPattern {
            position: Position::new("repo", "worker.go", 10, 0),
            func: FuncInfo {
                name: "run".into(),
                position: Position::new("repo", "worker.go", 9, 0),
            },
            level: "error".into(),
            signatures: vec!["boom".into()],
        };
        store.put_log_pattern(&pattern).unwrap();

        let coverager = Coverager::load(&store).unwrap();
        let reporter = Reporter::default_template().unwrap();
        let rendered = reporter.render(&coverager).unwrap();
        assert!(rendered.contains("Coverage: 0/1 sites (0%)"));
    }

    #[test]
    fn custom_template_is_used_when_supplied() {
        let store = PatternStore::new(Arc::new(MemDb::new()));
        let coverager = Coverager::load(&store).unwrap();
        let reporter = Reporter::with_template("total={{ total }}").unwrap();
        assert_eq!(reporter.render(&coverager).unwrap(), "total=0");
    }
}

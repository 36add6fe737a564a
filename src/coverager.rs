//! Coverage reporting projection shared by `report.rs`.
//!
//! Loads every known `LogPattern` and its `Coverage` (if any) from the store,
//! and computes the overall total/covered pair plus a per-site detail view.
//! A `Coverage` row with no matching `LogPattern` means the store is
//! inconsistent, not merely incomplete, so it is treated as fatal.

use crate::model::{Coverage, LogPattern};
use crate::store::{PatternStore, StoreError};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoveragerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("coverage entry for pattern {0} has no matching log pattern")]
    OrphanCoverage(String),
}

/// One row in the detail view: a known site, keyed by `repo:file:line:col`,
/// with whatever coverage it accumulated (zero if never hit).
#[derive(Debug, Clone)]
pub struct LogDetail {
    pub key: String,
    pub pattern: LogPattern,
    pub coverage: Coverage,
}

pub struct Coverager {
    details: Vec<LogDetail>,
}

impl Coverager {
    /// Loads the full pattern/coverage projection from the store. Fails if
    /// a coverage entry exists for a position with no corresponding
    /// pattern.
    pub fn load(store: &PatternStore) -> Result<Self, CoveragerError> {
        let patterns = store.all_log_patterns()?;
        let mut by_id: HashMap<String, LogPattern> =
            patterns.into_iter().map(|p| (p.id(), p)).collect();

        let mut details = Vec::new();
        for coverage in store.all_coverage()? {
            let id = crate::codec::position_id(&coverage.position);
            let pattern = by_id
                .remove(&id)
                .ok_or_else(|| CoveragerError::OrphanCoverage(id.clone()))?;
            details.push(LogDetail {
                key: pattern.position.to_string(),
                pattern,
                coverage,
            });
        }

        // Remaining patterns never hit: zero coverage.
        for (_, pattern) in by_id {
            let coverage = Coverage::new(pattern.position.clone());
            details.push(LogDetail {
                key: pattern.position.to_string(),
                pattern,
                coverage,
            });
        }

        details.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(Self { details })
    }

    pub fn for_each(&self) -> impl Iterator<Item = &LogDetail> {
        self.details.iter()
    }

    /// `(total_sites, covered_sites)`.
    pub fn overall_coverage(&self) -> (usize, usize) {
        let total = self.details.len();
        let covered = self.details.iter().filter(|d| d.coverage.total > 0).count();
        (total, covered)
    }

    pub fn detail(&self, key: &str) -> Option<&LogDetail> {
        self.details.iter().find(|d| d.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FuncInfo, Position};
    use crate::store::{Db, PatternStore};
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

    fn pattern(line: u32) -> LogPattern {
        LogPattern {
            position: Position::new("repo", "worker.go", line, 0),
            func: FuncInfo {
                name: "run".into(),
                position: Position::new("repo", "worker.go", line - 1, 0),
            },
            level: "error".into(),
            signatures: vec!["boom".into()],
        }
    }

    #[test]
    fn overall_coverage_counts_hit_and_total_sites() {
        let store = PatternStore::new(Arc::new(MemDb::new()));
        let p1 = pattern(10);
        let p2 = pattern(20);
        store.put_log_pattern(&p1).unwrap();
        store.put_log_pattern(&p2).unwrap();

        let mut cov = Coverage::new(p1.position.clone());
        cov.record("app.log");
        store.put_coverage(&cov).unwrap();

        let coverager = Coverager::load(&store).unwrap();
        assert_eq!(coverager.overall_coverage(), (2, 1));
    }

    #[test]
    fn orphan_coverage_is_fatal() {
        let store = PatternStore::new(Arc::new(MemDb::new()));
        let mut cov = Coverage::new(Position::new("repo", "ghost.go", 1, 0));
        cov.record("app.log");
        store.put_coverage(&cov).unwrap();

        assert!(matches!(
            Coverager::load(&store),
            Err(CoveragerError::OrphanCoverage(_))
        ));
    }

    #[test]
    fn detail_lookup_by_key() {
        let store = PatternStore::new(Arc::new(MemDb::new()));
        let p = pattern(10);
        store.put_log_pattern(&p).unwrap();
        let coverager = Coverager::load(&store).unwrap();
        let detail = coverager.detail(&p.position.to_string()).unwrap();
        assert_eq!(detail.coverage.total, 0);
    }
}

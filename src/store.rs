//! Pattern Store: key-prefixed persistence over an embedded KV engine.
//!
//! `WritePool` buffers writes behind `max_writes`/`max_bytes` thresholds
//! (32000 writes or 32MiB, whichever comes first) so a long `extract` run
//! flushes incrementally instead of holding everything in memory.

use crate::codec;
use crate::model::{Coverage, LogPattern, LogPatternRule, Position};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key/value engine error: {0}")]
    Engine(#[from] sled::Error),
    #[error("codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),
    #[error("blocking task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

const PREFIX_LOG: &str = "log:";
const PREFIX_COV: &str = "cov:";
const PREFIX_RULE: &str = "rule:";
const PREFIX_FN: &str = "fn:";

fn prefixed_key(prefix: &str, position: &Position) -> Vec<u8> {
    let mut key = prefix.as_bytes().to_vec();
    key.extend_from_slice(&codec::encode_position(position));
    key
}

/// Minimal KV surface the store needs; lets tests swap in an in-memory
/// implementation without pulling in `sled`.
pub trait Db: Send + Sync {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
    fn flush(&self) -> Result<(), StoreError>;
}

pub struct SledDb {
    tree: sled::Db,
}

impl SledDb {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            tree: sled::open(path)?,
        })
    }
}

impl Db for SledDb {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.tree
            .scan_prefix(prefix)
            .map(|r| r.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(StoreError::from))
            .collect()
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.tree.flush()?;
        Ok(())
    }
}

/// Buffered writer in front of a `Db`, flushed once a threshold is crossed.
/// Mirrors the original's `WritePool` defaults exactly.
pub struct WritePool {
    db: Arc<dyn Db>,
    max_writes: usize,
    max_bytes: usize,
    pending_writes: usize,
    pending_bytes: usize,
}

pub const DEFAULT_MAX_WRITES: usize = 32_000;
pub const DEFAULT_MAX_BYTES: usize = 32 * 1024 * 1024;

impl WritePool {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self::with_thresholds(db, DEFAULT_MAX_WRITES, DEFAULT_MAX_BYTES)
    }

    pub fn with_thresholds(db: Arc<dyn Db>, max_writes: usize, max_bytes: usize) -> Self {
        Self {
            db,
            max_writes,
            max_bytes,
            pending_writes: 0,
            pending_bytes: 0,
        }
    }

    /// Writes one key/value pair, flushing the underlying engine once the
    /// write-count or byte thresholds are reached. Flushing is idempotent:
    /// calling it with nothing pending is a no-op.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db.put(key, value)?;
        self.pending_writes += 1;
        self.pending_bytes += key.len() + value.len();
        if self.pending_writes >= self.max_writes || self.pending_bytes >= self.max_bytes {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.pending_writes == 0 {
            return Ok(());
        }
        self.db.flush()?;
        self.pending_writes = 0;
        self.pending_bytes = 0;
        Ok(())
    }
}

/// The Pattern Store: a thin, typed facade over `Db` using the `log:` /
/// `cov:` / `rule:` / `fn:` key prefixes.
pub struct PatternStore {
    db: Arc<dyn Db>,
}

impl PatternStore {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub fn put_log_pattern(&self, pattern: &LogPattern) -> Result<(), StoreError> {
        let key = prefixed_key(PREFIX_LOG, &pattern.position);
        self.db.put(&key, &codec::encode_log_pattern(pattern))
    }

    pub fn get_log_pattern(&self, position: &Position) -> Result<Option<LogPattern>, StoreError> {
        let key = prefixed_key(PREFIX_LOG, position);
        match self.db.get(&key)? {
            Some(bytes) => Ok(Some(codec::decode_log_pattern(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn all_log_patterns(&self) -> Result<Vec<LogPattern>, StoreError> {
        self.db
            .scan_prefix(PREFIX_LOG.as_bytes())?
            .into_iter()
            .map(|(_, v)| codec::decode_log_pattern(&v).map_err(StoreError::from))
            .collect()
    }

    pub fn put_coverage(&self, coverage: &Coverage) -> Result<(), StoreError> {
        let key = prefixed_key(PREFIX_COV, &coverage.position);
        self.db.put(&key, &codec::encode_coverage(coverage))
    }

    pub fn get_coverage(&self, position: &Position) -> Result<Option<Coverage>, StoreError> {
        let key = prefixed_key(PREFIX_COV, position);
        match self.db.get(&key)? {
            Some(bytes) => Ok(Some(codec::decode_coverage(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn all_coverage(&self) -> Result<Vec<Coverage>, StoreError> {
        self.db
            .scan_prefix(PREFIX_COV.as_bytes())?
            .into_iter()
            .map(|(_, v)| codec::decode_coverage(&v).map_err(StoreError::from))
            .collect()
    }

    pub fn put_rule(&self, name: &str, rule: &LogPatternRule) -> Result<(), StoreError> {
        let mut key = PREFIX_RULE.as_bytes().to_vec();
        key.extend_from_slice(name.as_bytes());
        self.db.put(&key, &codec::encode_rule(rule))
    }

    pub fn get_rule(&self, name: &str) -> Result<Option<LogPatternRule>, StoreError> {
        let mut key = PREFIX_RULE.as_bytes().to_vec();
        key.extend_from_slice(name.as_bytes());
        match self.db.get(&key)? {
            Some(bytes) => Ok(Some(codec::decode_rule(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Records that `func_name` was last seen owning a log-emission site at
    /// `position`, keyed under `fn:` so the extractor can detect when a
    /// function's enclosing position moved between runs.
    pub fn put_func_position(&self, func_name: &str, position: &Position) -> Result<(), StoreError> {
        let mut key = PREFIX_FN.as_bytes().to_vec();
        key.extend_from_slice(func_name.as_bytes());
        self.db.put(&key, &codec::encode_position(position))
    }

    pub fn get_func_position(&self, func_name: &str) -> Result<Option<Position>, StoreError> {
        let mut key = PREFIX_FN.as_bytes().to_vec();
        key.extend_from_slice(func_name.as_bytes());
        match self.db.get(&key)? {
            Some(bytes) => Ok(Some(codec::decode_position(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FuncInfo;
    use std::collections::HashMap;
    use std::sync::Mutex;

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

    fn sample_pattern() -> LogPattern {
        LogPattern {
            position: Position::new("repo", "worker.go", 10, 2),
            func: FuncInfo {
                name: "run".into(),
                position: Position::new("repo", "worker.go", 5, 1),
            },
            level: "error".into(),
            signatures: vec!["connection refused".into()],
        }
    }

    #[test]
    fn put_and_get_log_pattern() {
        let store = PatternStore::new(Arc::new(MemDb::new()));
        let pattern = sample_pattern();
        store.put_log_pattern(&pattern).unwrap();
        let fetched = store.get_log_pattern(&pattern.position).unwrap().unwrap();
        assert_eq!(fetched, pattern);
    }

    #[test]
    fn all_log_patterns_returns_every_inserted_entry() {
        let store = PatternStore::new(Arc::new(MemDb::new()));
        let mut a = sample_pattern();
        let mut b = sample_pattern();
        a.position.line_number = 1;
        b.position.line_number = 2;
        store.put_log_pattern(&a).unwrap();
        store.put_log_pattern(&b).unwrap();
        assert_eq!(store.all_log_patterns().unwrap().len(), 2);
    }

    #[test]
    fn coverage_and_rule_round_trip_through_store() {
        let store = PatternStore::new(Arc::new(MemDb::new()));
        let mut cov = Coverage::new(Position::new("repo", "f.go", 1, 0));
        cov.record("app.log");
        store.put_coverage(&cov).unwrap();
        assert_eq!(store.get_coverage(&cov.position).unwrap().unwrap(), cov);

        let rule = LogPatternRule {
            log_level: vec!["error".into()],
            log_signature: vec![],
        };
        store.put_rule("default", &rule).unwrap();
        assert_eq!(store.get_rule("default").unwrap().unwrap(), rule);
        assert!(store.get_rule("missing").unwrap().is_none());
    }

    #[test]
    fn write_pool_flushes_at_write_threshold() {
        let db = Arc::new(MemDb::new());
        let mut pool = WritePool::with_thresholds(db.clone(), 2, usize::MAX);
        pool.put(b"a", b"1").unwrap();
        assert_eq!(pool.pending_writes, 1);
        pool.put(b"b", b"2").unwrap();
        assert_eq!(pool.pending_writes, 0);
    }

    #[test]
    fn write_pool_flush_without_pending_is_noop() {
        let db = Arc::new(MemDb::new());
        let mut pool = WritePool::new(db);
        pool.flush().unwrap();
    }
}

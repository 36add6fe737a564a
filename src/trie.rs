//! Wildcard pattern trie.
//!
//! Log signatures are indexed byte-by-byte with two wildcard bytes: `*`
//! (zero or more bytes, walked with backtracking at the suffix) and `?`
//! (exactly one byte). Terminal nodes carry every `BriefPattern` inserted at
//! that path, deduplicated by pattern id so re-inserting the same site is a
//! no-op.

use crate::model::{BriefPattern, LogPattern};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const WILDCARD_ANY: u8 = b'*';
const WILDCARD_ONE: u8 = b'?';

/// `printf`/zap-style verbs collapsed to a single `*` during normalization.
/// Mirrors the original's `formatPlaceholder` verb set.
const PLACEHOLDER_VERBS: &[char] = &[
    'v', 'T', 't', 'b', 'c', 'd', 'o', 'O', 'q', 'x', 'X', 'U', 'e', 'E', 'f', 'F', 'g', 'G', 's',
    'p',
];

/// Collapses `%<verb>` runs (with optional width/precision/flags) to a single
/// `*`, and `%%` to a literal `%`. Anything not recognized as a verb is left
/// untouched so literal `%` characters in free text survive.
pub fn normalize_signature(raw: &str) -> String {
    let bytes: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != '%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        if i + 1 < bytes.len() && bytes[i + 1] == '%' {
            out.push('%');
            i += 2;
            continue;
        }
        let mut j = i + 1;
        while j < bytes.len() && !bytes[j].is_alphabetic() {
            j += 1;
        }
        if j < bytes.len() && PLACEHOLDER_VERBS.contains(&bytes[j]) {
            out.push('*');
            i = j + 1;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

struct Node {
    children: HashMap<u8, Arc<RwLock<Node>>>,
    terminal: Vec<BriefPattern>,
}

impl Node {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            terminal: Vec::new(),
        }
    }
}

/// Concurrent wildcard trie. One instance serves every scanner task for a
/// single `scan` invocation; reads (matching) vastly outnumber writes
/// (inserting during `extract`), so each node gets its own `RwLock`.
pub struct PatternTrie {
    root: Arc<RwLock<Node>>,
}

impl Default for PatternTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternTrie {
    pub fn new() -> Self {
        Self {
            root: Arc::new(RwLock::new(Node::new())),
        }
    }

    /// Inserts one log pattern's authoritative signature. Re-inserting the
    /// same `LogPattern::id()` at the same path is idempotent.
    pub fn insert(&self, pattern: Arc<LogPattern>) {
        let normalized = normalize_signature(pattern.signature());
        let brief = BriefPattern::new(pattern);
        let mut node = Arc::clone(&self.root);
        for b in normalized.as_bytes() {
            let next = {
                let mut guard = node.write().unwrap();
                guard
                    .children
                    .entry(*b)
                    .or_insert_with(|| Arc::new(RwLock::new(Node::new())))
                    .clone()
            };
            node = next;
        }
        let mut guard = node.write().unwrap();
        if !guard.terminal.iter().any(|p| p.pattern_id == brief.pattern_id) {
            guard.terminal.push(brief);
        }
    }

    /// Returns every pattern whose signature matches `message` and whose
    /// level/short-position satisfy the given filters (an empty filter
    /// matches everything, case-insensitively otherwise). Results are
    /// deduplicated by pattern id; a pattern reachable via more than one
    /// wildcard path still appears once.
    pub fn matches(&self, message: &str, level_filter: &str, position_filter: &str) -> Vec<BriefPattern> {
        let mut candidates = Vec::new();
        let mut seen = std::collections::HashSet::new();
        Self::walk(&self.root, message.as_bytes(), &mut candidates, &mut seen);

        candidates
            .into_iter()
            .filter(|p| {
                (level_filter.is_empty() || p.level.eq_ignore_ascii_case(level_filter))
                    && (position_filter.is_empty()
                        || p.short_position.eq_ignore_ascii_case(position_filter))
            })
            .collect()
    }

    fn walk(
        node: &Arc<RwLock<Node>>,
        remaining: &[u8],
        out: &mut Vec<BriefPattern>,
        seen: &mut std::collections::HashSet<String>,
    ) {
        let guard = node.read().unwrap();

        if remaining.is_empty() {
            for p in &guard.terminal {
                if seen.insert(p.pattern_id.clone()) {
                    out.push(p.clone());
                }
            }
            // A `*` edge also matches the empty remainder, so a pattern
            // ending in `*` (or `**`) must still be reachable once the
            // message is fully consumed.
            if let Some(child) = guard.children.get(&WILDCARD_ANY) {
                Self::walk(child, remaining, out, seen);
            }
            return;
        }

        if let Some(child) = guard.children.get(&remaining[0]) {
            Self::walk(child, &remaining[1..], out, seen);
        }

        if let Some(child) = guard.children.get(&WILDCARD_ONE) {
            Self::walk(child, &remaining[1..], out, seen);
        }

        if let Some(child) = guard.children.get(&WILDCARD_ANY) {
            // Greedy suffix walk: `*` may consume zero or more bytes, so try
            // every split point, shortest match last.
            for split in 0..=remaining.len() {
                Self::walk(child, &remaining[split..], out, seen);
            }
        }
    }
}

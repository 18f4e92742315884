//! Scoped string interner.
//!
//! The original tool keeps a single process-wide string cache
//! (`original_source/string_cache.c`) written only during parsing and
//! treated as read-only afterwards, used so that author names, log messages
//! and paths that repeat across thousands of revisions are stored once.
//! Design Notes calls for the Rust equivalent to be "a scoped interner owned
//! by the database" rather than a global — pointer equality on `Arc<str>` is
//! still legitimate because every consumer lives strictly no longer than the
//! `Database` that owns the interner.

use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Interner {
    table: HashMap<Arc<str>, ()>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical `Arc<str>` for `s`, inserting it if this is the
    /// first time it has been seen. Equal strings interned through the same
    /// `Interner` are guaranteed to be `Arc::ptr_eq`.
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some((key, _)) = self.table.get_key_value(s) {
            return key.clone();
        }
        let arc: Arc<str> = Arc::from(s);
        self.table.insert(arc.clone(), ());
        arc
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

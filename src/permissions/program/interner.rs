/*!
 * Segment Interner
 * Maps dotted path segments to namespace-scoped integer ids
 */

use crate::core::types::{SegmentId, UNKNOWN_SEGMENT};
use ahash::RandomState;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct InternTable {
    ids: HashMap<Arc<str>, SegmentId, RandomState>,
    names: Vec<Arc<str>>,
}

impl InternTable {
    fn intern(&mut self, segment: &str) -> SegmentId {
        if let Some(&id) = self.ids.get(segment) {
            return id;
        }
        let id = self.names.len() as SegmentId;
        let name: Arc<str> = Arc::from(segment);
        self.names.push(name.clone());
        self.ids.insert(name, id);
        id
    }
}

/// Append-only segment table.
///
/// Reads are lock-free snapshots; interning copies the table and swaps it in.
/// Ids are assigned sequentially and never reused.
#[derive(Debug, Default)]
pub struct SegmentInterner {
    table: ArcSwap<InternTable>,
}

impl SegmentInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern every segment of `local`; `""` compiles to the empty (root) path
    pub fn compile_local(&self, local: &str) -> Vec<SegmentId> {
        if local.is_empty() {
            return Vec::new();
        }
        if let Some(path) = self.lookup_local(local) {
            return path;
        }

        let mut path = Vec::new();
        self.table.rcu(|current| {
            let mut next = InternTable::clone(current);
            path = local.split('.').map(|segment| next.intern(segment)).collect();
            next
        });
        path
    }

    /// Compile without interning; None if any segment is unknown
    pub fn lookup_local(&self, local: &str) -> Option<Vec<SegmentId>> {
        if local.is_empty() {
            return Some(Vec::new());
        }
        let table = self.table.load();
        local
            .split('.')
            .map(|segment| table.ids.get(segment).copied())
            .collect()
    }

    /// Compile without interning; unknown segments become [`UNKNOWN_SEGMENT`]
    pub fn lookup_local_lossy(&self, local: &str) -> Vec<SegmentId> {
        if local.is_empty() {
            return Vec::new();
        }
        let table = self.table.load();
        local
            .split('.')
            .map(|segment| table.ids.get(segment).copied().unwrap_or(UNKNOWN_SEGMENT))
            .collect()
    }

    pub fn segment(&self, id: SegmentId) -> Option<Arc<str>> {
        self.table.load().names.get(id as usize).cloned()
    }

    /// Render a path back into its dotted form
    pub fn render(&self, path: &[SegmentId]) -> String {
        let table = self.table.load();
        let mut out = String::new();
        for (i, id) in path.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match table.names.get(*id as usize) {
                Some(name) => out.push_str(name),
                None => out.push('?'),
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.table.load().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

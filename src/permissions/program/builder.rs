/*!
 * Trie Builder
 *
 * Mutable staging trie. Entries are keyed by `(node, kind)` so a later write
 * replaces an earlier one outright; replaying an ancestor chain root-first
 * therefore lets descendants override exactly the nodes they touch.
 */

use super::automaton::{
    PermissionProgram, EXACT_ALLOW, EXACT_DENY, STAR_ALLOW, STAR_DENY,
};
use crate::core::types::SegmentId;
use crate::permissions::types::{Effect, Kind, NodeAddress};
use ahash::RandomState;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct TrieBuilder {
    children: Vec<HashMap<SegmentId, u32, RandomState>>,
    entries: HashMap<(u32, Kind), Effect, RandomState>,
}

impl TrieBuilder {
    pub fn new() -> Self {
        Self {
            children: vec![HashMap::default()],
            entries: HashMap::default(),
        }
    }

    pub fn set_exact(&mut self, effect: Effect, path: &[SegmentId]) {
        self.set(Kind::Exact, effect, path);
    }

    pub fn set_star(&mut self, effect: Effect, prefix: &[SegmentId]) {
        self.set(Kind::Star, effect, prefix);
    }

    pub fn set_address(&mut self, effect: Effect, address: &NodeAddress) {
        self.set(address.kind(), effect, address.path());
    }

    /// Overwrite the effect stored for `(node(path), kind)`
    pub fn set(&mut self, kind: Kind, effect: Effect, path: &[SegmentId]) {
        let node = self.materialize(path);
        self.entries.insert((node, kind), effect);
    }

    /// Number of entries currently staged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn materialize(&mut self, path: &[SegmentId]) -> u32 {
        if self.children.is_empty() {
            self.children.push(HashMap::default());
        }
        let mut node = 0u32;
        for segment in path {
            let next_id = self.children.len() as u32;
            let next = *self.children[node as usize]
                .entry(*segment)
                .or_insert(next_id);
            if next == next_id {
                self.children.push(HashMap::default());
            }
            node = next;
        }
        node
    }

    /// Bake the staged trie into an immutable program
    pub fn freeze(self) -> PermissionProgram {
        if self.children.is_empty() {
            return PermissionProgram::empty();
        }

        let node_count = self.children.len();
        let mut flags = vec![0u8; node_count];
        for ((node, kind), effect) in &self.entries {
            flags[*node as usize] |= match (kind, effect) {
                (Kind::Exact, Effect::Allow) => EXACT_ALLOW,
                (Kind::Exact, Effect::Deny) => EXACT_DENY,
                (Kind::Star, Effect::Allow) => STAR_ALLOW,
                (Kind::Star, Effect::Deny) => STAR_DENY,
            };
        }

        let edge_count: usize = self.children.iter().map(HashMap::len).sum();
        let mut offsets = Vec::with_capacity(node_count + 1);
        let mut edge_segments = Vec::with_capacity(edge_count);
        let mut edge_targets = Vec::with_capacity(edge_count);

        for children in &self.children {
            offsets.push(edge_segments.len() as u32);
            let mut sorted: Vec<(SegmentId, u32)> =
                children.iter().map(|(s, t)| (*s, *t)).collect();
            sorted.sort_unstable_by_key(|(segment, _)| *segment);
            for (segment, target) in sorted {
                edge_segments.push(segment);
                edge_targets.push(target);
            }
        }
        offsets.push(edge_segments.len() as u32);

        PermissionProgram::from_parts(flags, offsets, edge_segments, edge_targets)
    }
}

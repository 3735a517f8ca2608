/*!
 * Permission Program
 *
 * Immutable, compiled decision automaton. Each node carries a 4-bit flag set
 * and its children as a sorted `(segment → child)` run inside flat arrays, so
 * a decision is O(depth × log(fanout)) with no allocation.
 */

use crate::core::types::SegmentId;
use crate::permissions::types::{Decision, Effect, Kind};
use serde::{Deserialize, Serialize};

pub(crate) const EXACT_ALLOW: u8 = 0b0001;
pub(crate) const EXACT_DENY: u8 = 0b0010;
pub(crate) const STAR_ALLOW: u8 = 0b0100;
pub(crate) const STAR_DENY: u8 = 0b1000;

const ROOT: usize = 0;

/// Which flag produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProgramMatch {
    pub effect: Effect,
    pub kind: Kind,
    /// Number of path segments above the deciding node (0 = root)
    pub depth: usize,
}

impl ProgramMatch {
    #[inline]
    pub fn decision(&self) -> Decision {
        self.effect.into()
    }
}

/// Compiled automaton, node 0 is the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionProgram {
    flags: Box<[u8]>,
    /// `children of n` = `edges[offsets[n]..offsets[n + 1]]`
    offsets: Box<[u32]>,
    edge_segments: Box<[SegmentId]>,
    edge_targets: Box<[u32]>,
}

impl PermissionProgram {
    /// A program with a bare root that decides Unset everywhere
    pub fn empty() -> Self {
        Self {
            flags: vec![0].into_boxed_slice(),
            offsets: vec![0, 0].into_boxed_slice(),
            edge_segments: Box::default(),
            edge_targets: Box::default(),
        }
    }

    pub(crate) fn from_parts(
        flags: Vec<u8>,
        offsets: Vec<u32>,
        edge_segments: Vec<SegmentId>,
        edge_targets: Vec<u32>,
    ) -> Self {
        debug_assert_eq!(offsets.len(), flags.len() + 1);
        debug_assert_eq!(edge_segments.len(), edge_targets.len());
        Self {
            flags: flags.into_boxed_slice(),
            offsets: offsets.into_boxed_slice(),
            edge_segments: edge_segments.into_boxed_slice(),
            edge_targets: edge_targets.into_boxed_slice(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.flags.len()
    }

    /// True if no node carries any flag
    pub fn is_empty(&self) -> bool {
        self.flags.iter().all(|f| *f == 0)
    }

    #[inline]
    fn child(&self, node: usize, segment: SegmentId) -> Option<usize> {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        self.edge_segments[start..end]
            .binary_search(&segment)
            .ok()
            .map(|i| self.edge_targets[start + i] as usize)
    }

    /// Node reached by consuming the whole path
    #[inline]
    fn walk(&self, path: &[SegmentId]) -> Option<usize> {
        path.iter()
            .try_fold(ROOT, |node, segment| self.child(node, *segment))
    }

    /// Decide a path: exact leaf beats any star, deepest star beats shallower ones
    #[inline]
    pub fn decide(&self, path: &[SegmentId]) -> Decision {
        self.lookup(path).map_or(Decision::Unset, |m| m.decision())
    }

    /// Same walk as [`decide`](Self::decide), reporting the deciding node
    pub fn lookup(&self, path: &[SegmentId]) -> Option<ProgramMatch> {
        let mut best = star_effect(self.flags[ROOT]).map(|effect| ProgramMatch {
            effect,
            kind: Kind::Star,
            depth: 0,
        });

        let mut node = ROOT;
        for (depth, segment) in path.iter().enumerate() {
            match self.child(node, *segment) {
                Some(next) => node = next,
                None => return best,
            }
            if let Some(effect) = star_effect(self.flags[node]) {
                best = Some(ProgramMatch {
                    effect,
                    kind: Kind::Star,
                    depth: depth + 1,
                });
            }
        }

        match exact_effect(self.flags[node]) {
            Some(effect) => Some(ProgramMatch {
                effect,
                kind: Kind::Exact,
                depth: path.len(),
            }),
            None => best,
        }
    }

    /// Whether the exact leaf at `path` carries a flag
    pub fn has_exact(&self, path: &[SegmentId]) -> bool {
        self.walk(path)
            .is_some_and(|node| exact_effect(self.flags[node]).is_some())
    }

    /// Whether the prefix node at `prefix` carries a star flag
    pub fn has_star(&self, prefix: &[SegmentId]) -> bool {
        self.walk(prefix)
            .is_some_and(|node| star_effect(self.flags[node]).is_some())
    }

    /// Effect stored for one (node, kind), without any inheritance
    pub fn entry(&self, path: &[SegmentId], kind: Kind) -> Option<Effect> {
        let node = self.walk(path)?;
        match kind {
            Kind::Exact => exact_effect(self.flags[node]),
            Kind::Star => star_effect(self.flags[node]),
        }
    }
}

impl Default for PermissionProgram {
    fn default() -> Self {
        Self::empty()
    }
}

#[inline(always)]
fn star_effect(flags: u8) -> Option<Effect> {
    if flags & STAR_DENY != 0 {
        Some(Effect::Deny)
    } else if flags & STAR_ALLOW != 0 {
        Some(Effect::Allow)
    } else {
        None
    }
}

#[inline(always)]
fn exact_effect(flags: u8) -> Option<Effect> {
    if flags & EXACT_DENY != 0 {
        Some(Effect::Deny)
    } else if flags & EXACT_ALLOW != 0 {
        Some(Effect::Allow)
    } else {
        None
    }
}

/*!
 * Catalog Snapshots
 * Immutable declared-node sets and versioned compiled programs
 */

use crate::core::types::{NamespaceIndex, SegmentId, Version};
use crate::permissions::program::{PermissionProgram, TrieBuilder};
use crate::permissions::types::{Decision, Effect, Kind};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub(crate) type CatalogEntries = BTreeMap<(Vec<SegmentId>, Kind), Effect>;

/// One immutable version of a namespace catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    version: Version,
    entries: CatalogEntries,
    program: Arc<PermissionProgram>,
}

impl Catalog {
    pub(crate) fn compile(version: Version, entries: CatalogEntries) -> Self {
        let mut builder = TrieBuilder::new();
        for ((path, kind), default) in &entries {
            builder.set(*kind, *default, path);
        }
        Self {
            version,
            entries,
            program: Arc::new(builder.freeze()),
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub(crate) fn entries(&self) -> &CatalogEntries {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Program whose flags are the declared default effects
    pub fn program(&self) -> &Arc<PermissionProgram> {
        &self.program
    }

    /// Default decision for a path; Unset means the catalog does not cover it
    #[inline]
    pub fn default_for(&self, path: &[SegmentId]) -> Decision {
        self.program.decide(path)
    }

    /// A path is referenceable if declared exact or under a declared star
    #[inline]
    pub fn covers(&self, path: &[SegmentId]) -> bool {
        !self.default_for(path).is_unset()
    }

    pub fn has_exact(&self, path: &[SegmentId]) -> bool {
        self.program.has_exact(path)
    }

    pub fn has_star(&self, prefix: &[SegmentId]) -> bool {
        self.program.has_star(prefix)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::compile(0, CatalogEntries::new())
    }
}

/// A compiled grant program.
///
/// Segment ids are never reused, so a program stays valid across catalog
/// changes. Only a build that had to skip grants naming segments the
/// namespace did not know yet remembers the interner size it saw, and is
/// rebuilt once the interner grows.
#[derive(Debug, Clone)]
pub struct EffectiveProgram {
    program: Arc<PermissionProgram>,
    pending: Option<usize>,
}

impl EffectiveProgram {
    /// `pending` is the interner size at build time when grants were skipped
    pub fn new(program: PermissionProgram, pending: Option<usize>) -> Self {
        Self {
            program: Arc::new(program),
            pending,
        }
    }

    pub fn program(&self) -> &Arc<PermissionProgram> {
        &self.program
    }

    /// Every grant made it into the program
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.pending.is_none()
    }

    /// Whether the build still reflects an interner holding `interned` segments
    #[inline]
    pub fn is_current(&self, interned: usize) -> bool {
        self.pending.map_or(true, |seen| seen == interned)
    }
}
/// One subject's grants compiled per namespace.
///
/// Grants whose namespace has not been allocated yet are remembered by key
/// so they can be compiled once the namespace appears.
#[derive(Debug, Clone, Default)]
pub struct CompiledGrants {
    pub programs: HashMap<NamespaceIndex, EffectiveProgram>,
    pub unallocated: Vec<Arc<str>>,
}

impl CompiledGrants {
    #[inline]
    pub fn get(&self, namespace: NamespaceIndex) -> Option<&EffectiveProgram> {
        self.programs.get(&namespace)
    }

    /// Whether the program for `namespace` (keyed `key`, `interned` segments)
    /// must be rebuilt before use
    pub fn needs_rebuild(&self, namespace: NamespaceIndex, key: &str, interned: usize) -> bool {
        match self.programs.get(&namespace) {
            Some(effective) => !effective.is_current(interned),
            None => self.unallocated.iter().any(|k| &**k == key),
        }
    }
}

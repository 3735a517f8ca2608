/*!
 * Permission Registry
 *
 * Per-namespace catalogs of declared nodes. Each namespace owns a stable
 * index, a segment interner, the compiled catalog program (declared nodes
 * carry their default effect) and a version counter bumped on every
 * successful declare/undeclare.
 *
 * Catalog snapshots are swapped atomically; readers never lock.
 */

mod catalog;

pub use catalog::{Catalog, CompiledGrants, EffectiveProgram};

use crate::core::errors::{EngineError, EngineResult};
use crate::core::sync::RcuCell;
use crate::core::types::{NamespaceIndex, SegmentId, Version};
use crate::permissions::program::{PermissionProgram, SegmentInterner, TrieBuilder};
use crate::permissions::types::{
    parse_grant, CatalogEntry, Effect, GrantRow, GrantTarget, Kind, NodeRef,
};
use ahash::RandomState;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One namespace: interner plus its current catalog snapshot
#[derive(Debug)]
pub struct Namespace {
    key: Arc<str>,
    index: NamespaceIndex,
    interner: SegmentInterner,
    catalog: ArcSwap<Catalog>,
    /// Serializes catalog writers; readers never take it
    write_lock: Mutex<()>,
}

impl Namespace {
    fn new(key: Arc<str>, index: NamespaceIndex) -> Self {
        Self {
            key,
            index,
            interner: SegmentInterner::new(),
            catalog: ArcSwap::from_pointee(Catalog::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &Arc<str> {
        &self.key
    }

    pub fn index(&self) -> NamespaceIndex {
        self.index
    }

    pub fn interner(&self) -> &SegmentInterner {
        &self.interner
    }

    /// Current catalog snapshot
    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.load_full()
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.catalog.load().version()
    }

    /// Declare (or redeclare) a node with its default effect
    pub fn declare(&self, kind: Kind, local: &str, default: Effect) -> NodeRef {
        let _guard = self.write_lock.lock();
        let path: Arc<[SegmentId]> = self.interner.compile_local(local).into();

        let current = self.catalog.load_full();
        let mut entries = current.entries().clone();
        entries.insert((path.to_vec(), kind), default);
        let next = Catalog::compile(current.version() + 1, entries);
        let version = next.version();
        self.catalog.store(Arc::new(next));

        debug!(namespace = %self.key, local, ?kind, ?default, version, "Declared permission node");
        NodeRef {
            namespace: self.index,
            path,
            version,
        }
    }

    /// Remove a declaration; false (and no version bump) if it was absent
    pub fn undeclare(&self, kind: Kind, local: &str) -> bool {
        let _guard = self.write_lock.lock();
        let Some(path) = self.interner.lookup_local(local) else {
            return false;
        };

        let current = self.catalog.load_full();
        let mut entries = current.entries().clone();
        if entries.remove(&(path, kind)).is_none() {
            return false;
        }
        let next = Catalog::compile(current.version() + 1, entries);
        debug!(namespace = %self.key, local, ?kind, version = next.version(), "Undeclared permission node");
        self.catalog.store(Arc::new(next));
        true
    }

    /// Compile this namespace's grants into one program, in iteration order.
    ///
    /// Grants naming segments the namespace never interned cannot refer to a
    /// declared node yet; they are skipped and the build is marked pending.
    pub fn compile_grants<'a, I>(&self, grants: I) -> EffectiveProgram
    where
        I: IntoIterator<Item = &'a GrantRow>,
    {
        // Size first: a concurrent declare can only make the build look older
        let interned = self.interner.len();
        let mut builder = TrieBuilder::new();
        let mut skipped = 0usize;
        for grant in grants {
            match self.interner.lookup_local(&grant.local) {
                Some(path) if grant.kind == Kind::Star || !path.is_empty() => {
                    builder.set(grant.kind, grant.effect, &path);
                }
                _ => {
                    skipped += 1;
                    warn!(
                        namespace = %self.key,
                        local = %grant.local,
                        subject = ?grant.subject,
                        "Skipping grant on unknown permission node"
                    );
                }
            }
        }
        EffectiveProgram::new(builder.freeze(), (skipped > 0).then_some(interned))
    }

    /// Declared entries rendered back into node strings
    pub fn list(&self) -> Vec<CatalogEntry> {
        self.catalog()
            .entries()
            .iter()
            .map(|((path, kind), default)| {
                let local = self.interner.render(path);
                let target = match kind {
                    Kind::Exact => GrantTarget::Exact(&local),
                    Kind::Star => GrantTarget::Star(&local),
                };
                CatalogEntry {
                    node: format!("{}.{}", self.key, target.normalized()),
                    kind: *kind,
                    default: *default,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct NamespaceTable {
    by_key: HashMap<Arc<str>, NamespaceIndex, RandomState>,
    by_index: Vec<Arc<Namespace>>,
}

/// Catalog of every namespace, addressed by key or by index
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    table: RcuCell<NamespaceTable>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(&self, key: &str) -> Option<Arc<Namespace>> {
        let table = self.table.load();
        let index = *table.by_key.get(key)?;
        table.by_index.get(index as usize).cloned()
    }

    #[inline]
    pub fn namespace_at(&self, index: NamespaceIndex) -> Option<Arc<Namespace>> {
        self.table.load().by_index.get(index as usize).cloned()
    }

    /// Current version of a namespace, None if the index was never allocated
    #[inline]
    pub fn current_version(&self, index: NamespaceIndex) -> Option<Version> {
        self.table
            .load()
            .by_index
            .get(index as usize)
            .map(|ns| ns.version())
    }

    /// Look up or allocate a namespace; allocation is idempotent per key
    pub fn ensure_namespace(&self, key: &str) -> Arc<Namespace> {
        if let Some(ns) = self.namespace(key) {
            return ns;
        }
        self.table.update(|table| {
            if let Some(&index) = table.by_key.get(key) {
                return (table.clone(), table.by_index[index as usize].clone());
            }
            let mut next = table.clone();
            let index = next.by_index.len() as NamespaceIndex;
            let key: Arc<str> = Arc::from(key);
            let ns = Arc::new(Namespace::new(key.clone(), index));
            next.by_key.insert(key, index);
            next.by_index.push(ns.clone());
            debug!(namespace = %ns.key(), index, "Allocated namespace");
            (next, ns)
        })
    }

    /// Declare `<ns>.<local>`, `<ns>.<prefix>.*` or `<ns>.*` with a default effect
    pub fn declare(&self, node: &str, default: Effect) -> EngineResult<NodeRef> {
        let (key, target) =
            parse_grant(node).ok_or_else(|| EngineError::MalformedNode(node.to_string()))?;
        let ns = self.ensure_namespace(key);
        Ok(ns.declare(target.kind(), target.local(), default))
    }

    /// Remove a declaration; Ok(false) if the node was not declared
    pub fn undeclare(&self, node: &str) -> EngineResult<bool> {
        let (key, target) =
            parse_grant(node).ok_or_else(|| EngineError::MalformedNode(node.to_string()))?;
        Ok(self
            .namespace(key)
            .is_some_and(|ns| ns.undeclare(target.kind(), target.local())))
    }

    pub fn list(&self, key: &str) -> Option<Vec<CatalogEntry>> {
        self.namespace(key).map(|ns| ns.list())
    }

    pub fn namespace_keys(&self) -> Vec<Arc<str>> {
        self.table
            .load()
            .by_index
            .iter()
            .map(|ns| ns.key().clone())
            .collect()
    }

    /// Compile grants of any namespaces into one program per namespace.
    ///
    /// Never allocates: grants in namespaces nobody declared yet are only
    /// recorded by key.
    pub fn compile_grants<G: Borrow<GrantRow>>(&self, grants: &[G]) -> CompiledGrants {
        let mut keys: Vec<&str> = Vec::new();
        for grant in grants {
            let key = row(grant).namespace.as_str();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        let mut compiled = CompiledGrants::default();
        for key in keys {
            match self.namespace(key) {
                Some(ns) => {
                    let effective = ns.compile_grants(
                        grants.iter().map(row).filter(|g| g.namespace == key),
                    );
                    compiled.programs.insert(ns.index(), effective);
                }
                None => {
                    debug!(namespace = key, "Deferring grants for an unallocated namespace");
                    compiled.unallocated.push(Arc::from(key));
                }
            }
        }
        compiled
    }

    /// Catalog program of a namespace, if allocated
    pub fn catalog_program(&self, index: NamespaceIndex) -> Option<Arc<PermissionProgram>> {
        self.namespace_at(index).map(|ns| ns.catalog().program().clone())
    }
}

#[inline]
fn row<G: Borrow<GrantRow>>(grant: &G) -> &GrantRow {
    grant.borrow()
}

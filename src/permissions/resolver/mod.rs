/*!
 * Resolver
 *
 * Turns node strings into validated, interned [`NodeRef`]s and validates
 * grant-authoring strings against the live catalog.
 *
 * Lookups go through a striped LRU keyed by the raw node string. A cached
 * reference is honoured only while its version matches the namespace's
 * current version; stale entries are recomputed on read, never evicted
 * eagerly on catalog writes.
 */

mod handle;
mod lru;

pub use handle::NodeHandle;
pub use lru::LruCache;

use crate::core::config::EngineConfig;
use crate::permissions::registry::PermissionRegistry;
use crate::permissions::types::{
    parse_grant, parse_lookup, GrantTarget, NodeRef, ResolvedGrant,
};
use ahash::RandomState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

type Stripe = Mutex<LruCache<Box<str>, NodeRef>>;

/// Resolver statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Hits rejected because the namespace version moved on
    pub stale: u64,
}

pub struct Resolver {
    registry: Arc<PermissionRegistry>,
    stripes: Box<[Stripe]>,
    hasher: RandomState,
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
}

impl Resolver {
    pub fn new(registry: Arc<PermissionRegistry>, config: &EngineConfig) -> Self {
        let per_stripe = config.per_stripe_capacity();
        let stripes = (0..config.effective_stripes())
            .map(|_| Mutex::new(LruCache::new(per_stripe)))
            .collect();
        Self {
            registry,
            stripes,
            hasher: RandomState::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<PermissionRegistry> {
        &self.registry
    }

    #[inline]
    fn stripe(&self, node: &str) -> &Stripe {
        // Stripe count is a power of two
        let mask = self.stripes.len() - 1;
        &self.stripes[self.hasher.hash_one(node) as usize & mask]
    }

    /// Whether a reference still matches its namespace's current version
    #[inline]
    pub fn is_current(&self, node_ref: &NodeRef) -> bool {
        self.registry.current_version(node_ref.namespace) == Some(node_ref.version)
    }

    /// Resolve an authorization node; None if malformed, wildcarded,
    /// in an unknown namespace, or not covered by the catalog
    pub fn resolve(&self, node: &str) -> Option<NodeRef> {
        let stripe = self.stripe(node);
        if let Some(cached) = stripe.lock().get(node) {
            if self.is_current(cached) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(cached.clone());
            }
            self.stale.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let resolved = self.resolve_uncached(node)?;
        trace!(node, version = resolved.version, "Resolved permission node");
        stripe.lock().insert(node.into(), resolved.clone());
        Some(resolved)
    }

    /// Resolution against the live catalog, bypassing the cache
    pub fn resolve_uncached(&self, node: &str) -> Option<NodeRef> {
        let (key, local) = parse_lookup(node)?;
        let ns = self.registry.namespace(key)?;
        // Path and version must come from the same snapshot
        let catalog = ns.catalog();
        let path = ns.interner().lookup_local_lossy(local);
        if !catalog.covers(&path) {
            return None;
        }
        Some(NodeRef {
            namespace: ns.index(),
            path: path.into(),
            version: catalog.version(),
        })
    }

    /// Validate a grant string (`exact`, `prefix.*`, `*`) against the live catalog
    pub fn resolve_grant(&self, node: &str) -> Option<ResolvedGrant> {
        let (key, target) = parse_grant(node)?;
        let ns = self.registry.namespace(key)?;
        let catalog = ns.catalog();
        let path = ns.interner().lookup_local(target.local())?;

        let declared = match target {
            GrantTarget::Exact(_) => catalog.has_exact(&path),
            GrantTarget::Star(_) => catalog.has_star(&path),
        };
        if !declared {
            return None;
        }

        Some(ResolvedGrant {
            node: NodeRef {
                namespace: ns.index(),
                path: path.into(),
                version: catalog.version(),
            },
            namespace_key: ns.key().clone(),
            kind: target.kind(),
            normalized_local: target.normalized(),
        })
    }

    /// Resolve through a caller-held handle, refreshing it if stale
    pub fn resolve_handle(&self, handle: &NodeHandle) -> Option<Arc<NodeRef>> {
        handle.resolve(self)
    }

    pub fn clear(&self) {
        for stripe in self.stripes.iter() {
            stripe.lock().clear();
        }
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            entries: self.stripes.iter().map(|s| s.lock().len()).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("stripes", &self.stripes.len())
            .field("stats", &self.stats())
            .finish()
    }
}

/*!
 * Cached Node Handle
 *
 * A dispatcher keeps one handle per registered node. The handle serves its
 * cached reference while the namespace version is unchanged and re-resolves
 * (updating itself in place) once it goes stale, so the hot path does no
 * string parsing.
 */

use super::Resolver;
use crate::permissions::types::NodeRef;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

#[derive(Debug)]
pub struct NodeHandle {
    node: Box<str>,
    cached: ArcSwapOption<NodeRef>,
}

impl NodeHandle {
    pub fn new(node: impl Into<Box<str>>) -> Self {
        Self {
            node: node.into(),
            cached: ArcSwapOption::empty(),
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// The reference currently held, current or not
    pub fn cached(&self) -> Option<Arc<NodeRef>> {
        self.cached.load_full()
    }

    pub fn resolve(&self, resolver: &Resolver) -> Option<Arc<NodeRef>> {
        let guard = self.cached.load();
        if let Some(cached) = &*guard {
            if resolver.is_current(cached) {
                return Some(Arc::clone(cached));
            }
        }
        drop(guard);

        let fresh = resolver.resolve(&self.node).map(Arc::new);
        self.cached.store(fresh.clone());
        fresh
    }
}

impl Clone for NodeHandle {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            cached: ArcSwapOption::new(self.cached.load_full()),
        }
    }
}

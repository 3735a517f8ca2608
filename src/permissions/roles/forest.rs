/*!
 * Role Forest
 * Immutable role graph snapshot and the traversals over it
 */

use crate::core::types::{Rank, RoleId};
use crate::permissions::registry::CompiledGrants;
use crate::permissions::types::GrantRow;
use ahash::RandomState;
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub(crate) struct RoleNode {
    pub parent: Option<RoleId>,
    pub rank: Rank,
    pub children: Vec<RoleId>,
    /// The role's own grants, in store order
    pub grants: Arc<[GrantRow]>,
    pub effective: CompiledGrants,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RoleForest {
    pub roles: HashMap<RoleId, Arc<RoleNode>, RandomState>,
    pub generation: u64,
}

impl RoleForest {
    pub fn freeze(staged: HashMap<RoleId, RoleNode, RandomState>, generation: u64) -> Self {
        Self {
            roles: staged
                .into_iter()
                .map(|(id, node)| (id, Arc::new(node)))
                .collect(),
            generation,
        }
    }

    pub fn rank(&self, role_id: RoleId) -> Rank {
        self.roles.get(&role_id).map_or(0, |node| node.rank)
    }
}

#[inline]
pub(crate) fn node_of<N: Borrow<RoleNode>>(node: &N) -> &RoleNode {
    node.borrow()
}

/// Rebuild every `children` list from the parent links.
///
/// Parents that do not exist leave the role as a root.
pub(crate) fn link_children(staged: &mut HashMap<RoleId, RoleNode, RandomState>) {
    let mut links: Vec<(RoleId, RoleId)> = Vec::new();
    for (id, node) in staged.iter() {
        if let Some(parent) = node.parent {
            if staged.contains_key(&parent) {
                links.push((parent, *id));
            } else {
                warn!(role_id = id, parent, "Role references a missing parent, treating it as a root");
            }
        }
    }
    links.sort_unstable();
    for (parent, child) in links {
        if let Some(node) = staged.get_mut(&parent) {
            node.children.push(child);
        }
    }
}

/// Chain from the topmost ancestor down to `role_id` (inclusive).
///
/// A cycle or a missing parent terminates the chain.
pub(crate) fn ancestor_chain<N: Borrow<RoleNode>>(
    roles: &HashMap<RoleId, N, RandomState>,
    role_id: RoleId,
) -> Vec<RoleId> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(role_id);
    while let Some(id) = cursor {
        let Some(node) = roles.get(&id) else {
            break;
        };
        if !seen.insert(id) {
            warn!(role_id, at = id, "Role hierarchy cycle detected, truncating chain");
            break;
        }
        chain.push(id);
        cursor = node_of(node).parent;
    }
    chain.reverse();
    chain
}

/// Roles with no (existing) parent, in ascending id order
pub(crate) fn roots<N: Borrow<RoleNode>>(roles: &HashMap<RoleId, N, RandomState>) -> Vec<RoleId> {
    let mut roots: Vec<RoleId> = roles
        .iter()
        .filter(|(_, node)| {
            node_of(*node)
                .parent
                .map_or(true, |parent| !roles.contains_key(&parent))
        })
        .map(|(id, _)| *id)
        .collect();
    roots.sort_unstable();

    // Roles caught in a parent cycle have no root; seed them too so they still get built
    let reachable: HashSet<RoleId> = roots
        .iter()
        .flat_map(|root| subtree(roles, *root))
        .collect();
    let mut stranded: Vec<RoleId> = roles
        .keys()
        .copied()
        .filter(|id| !reachable.contains(id))
        .collect();
    stranded.sort_unstable();
    let mut covered: HashSet<RoleId> = HashSet::new();
    for id in stranded {
        if covered.contains(&id) {
            continue;
        }
        covered.extend(subtree(roles, id));
        roots.push(id);
    }
    roots
}

/// `root` and all of its descendants, parents before children
pub(crate) fn subtree<N: Borrow<RoleNode>>(
    roles: &HashMap<RoleId, N, RandomState>,
    root: RoleId,
) -> Vec<RoleId> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(node) = roles.get(&id) else {
            continue;
        };
        order.push(id);
        stack.extend(node_of(node).children.iter().rev().copied());
    }
    order
}

/*!
 * Role Tree
 *
 * Role hierarchy with per-role, per-namespace effective programs. A role's
 * program replays the grants of its whole ancestor chain root-first, so a
 * descendant's grant replaces the inherited one at the same (node, kind)
 * and everything it does not touch is inherited unchanged.
 *
 * The forest is an immutable snapshot behind an `ArcSwap`. Refreshes build a
 * new forest (reusing untouched roles) and swap it in; readers never block.
 * Programs stay valid across catalog changes. Only a program that skipped
 * grants on not-yet-known segments or namespaces is rebuilt on read, once
 * the registry has caught up.
 */

mod forest;

use forest::{ancestor_chain, RoleForest, RoleNode};

use crate::core::errors::EngineResult;
use crate::core::types::{NamespaceIndex, Rank, RoleId};
use crate::permissions::program::PermissionProgram;
use crate::permissions::registry::{CompiledGrants, EffectiveProgram, Namespace, PermissionRegistry};
use crate::permissions::store::PermissionStore;
use crate::permissions::types::{GrantRow, RoleRow, Subject};
use ahash::RandomState;
use arc_swap::ArcSwap;
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

pub struct RoleTree<S> {
    store: Arc<S>,
    registry: Arc<PermissionRegistry>,
    forest: ArcSwap<RoleForest>,
    /// Serializes refreshes; readers never take it
    refresh_lock: tokio::sync::Mutex<()>,
}

impl<S: PermissionStore> RoleTree<S> {
    pub fn new(store: Arc<S>, registry: Arc<PermissionRegistry>) -> Self {
        Self {
            store,
            registry,
            forest: ArcSwap::from_pointee(RoleForest::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Resync every role row and grant, rebuilding every subtree
    pub async fn refresh_all(&self) -> EngineResult<()> {
        let _guard = self.refresh_lock.lock().await;
        let rows = self.store.list_roles().await?;
        let role_ids: Vec<RoleId> = rows.iter().map(|r| r.role_id).collect();
        let grants = self.store.list_role_grants(&role_ids).await?;

        let previous = self.forest.load_full();
        let mut staged = stage_rows(&rows, &previous, false);
        attach_grants(&mut staged, &role_ids, grants);

        let mut rebuilt = 0;
        for root in forest::roots(&staged) {
            for role_id in forest::subtree(&staged, root) {
                let effective = self.build_from(&staged, role_id);
                if let Some(node) = staged.get_mut(&role_id) {
                    node.effective = effective;
                    rebuilt += 1;
                }
            }
        }

        self.forest
            .store(Arc::new(RoleForest::freeze(staged, previous.generation + 1)));
        info!(roles = rows.len(), rebuilt, "Role tree fully refreshed");
        Ok(())
    }

    /// Resync role rows and rebuild only the subtree rooted at `role_id`
    pub async fn refresh_role_subtree(&self, role_id: RoleId) -> EngineResult<()> {
        let guard = self.refresh_lock.lock().await;
        let rows = self.store.list_roles().await?;
        if !rows.iter().any(|r| r.role_id == role_id) {
            // Role vanished: orphaned children become roots, so resync everything
            drop(guard);
            debug!(role_id, "Refreshed role no longer exists, falling back to full refresh");
            return self.refresh_all().await;
        }

        let previous = self.forest.load_full();
        let mut staged = stage_rows(&rows, &previous, true);

        let subtree = forest::subtree(&staged, role_id);
        let mut fetch: Vec<RoleId> = ancestor_chain(&staged, role_id);
        let in_chain: HashSet<RoleId> = fetch.iter().copied().collect();
        fetch.extend(subtree.iter().filter(|id| !in_chain.contains(id)));

        let grants = self.store.list_role_grants(&fetch).await?;
        attach_grants(&mut staged, &fetch, grants);

        for id in &subtree {
            let effective = self.build_from(&staged, *id);
            if let Some(node) = staged.get_mut(id) {
                node.effective = effective;
            }
        }

        self.forest
            .store(Arc::new(RoleForest::freeze(staged, previous.generation + 1)));
        debug!(role_id, rebuilt = subtree.len(), fetched = fetch.len(), "Role subtree refreshed");
        Ok(())
    }

    /// Effective programs of one role from the current forest
    pub fn build_effective_programs(
        &self,
        role_id: RoleId,
    ) -> HashMap<NamespaceIndex, EffectiveProgram> {
        let forest = self.forest.load();
        self.build_from(&forest.roles, role_id).programs
    }

    /// Replay the chain's grants root-first, one program per namespace
    fn build_from<N: Borrow<RoleNode>>(
        &self,
        roles: &HashMap<RoleId, N, RandomState>,
        role_id: RoleId,
    ) -> CompiledGrants {
        let grants = chain_grants(roles, role_id);
        self.registry.compile_grants(&grants)
    }

    /// Stable sort: rank descending, then role id ascending
    pub fn sort_role_ids(&self, ids: &[RoleId]) -> Vec<RoleId> {
        let forest = self.forest.load();
        let mut sorted = ids.to_vec();
        sorted.sort_by(|a, b| {
            forest
                .rank(*b)
                .cmp(&forest.rank(*a))
                .then_with(|| a.cmp(b))
        });
        sorted
    }

    /// Rank of a role, 0 if unknown
    pub fn get_rank(&self, role_id: RoleId) -> Rank {
        self.forest.load().rank(role_id)
    }

    pub fn get_parent(&self, role_id: RoleId) -> Option<RoleId> {
        self.forest.load().roles.get(&role_id)?.parent
    }

    pub fn contains(&self, role_id: RoleId) -> bool {
        self.forest.load().roles.contains_key(&role_id)
    }

    /// Role rows as currently known to the tree
    pub fn roles(&self) -> Vec<RoleRow> {
        let forest = self.forest.load();
        let mut rows: Vec<RoleRow> = forest
            .roles
            .iter()
            .map(|(id, node)| RoleRow {
                role_id: *id,
                parent: node.parent,
                rank: node.rank,
            })
            .collect();
        rows.sort_by_key(|r| r.role_id);
        rows
    }

    /// Bumps on every refresh
    pub fn generation(&self) -> u64 {
        self.forest.load().generation
    }

    /// Effective program of a role in a namespace, None if it has no grants there.
    ///
    /// Complete programs are served straight from the snapshot. A program
    /// waiting on segments or on the namespace itself is rebuilt from the
    /// cached chain grants once the registry has grown.
    pub fn get_effective_program(
        &self,
        role_id: RoleId,
        namespace: NamespaceIndex,
    ) -> Option<Arc<PermissionProgram>> {
        let ns = {
            let forest = self.forest.load();
            let effective = &forest.roles.get(&role_id)?.effective;
            match effective.get(namespace) {
                Some(entry) if entry.is_complete() => return Some(entry.program().clone()),
                None if effective.unallocated.is_empty() => return None,
                _ => {}
            }
            let ns = self.registry.namespace_at(namespace)?;
            if !effective.needs_rebuild(namespace, ns.key(), ns.interner().len()) {
                return effective.get(namespace).map(|entry| entry.program().clone());
            }
            ns
        };
        self.rebuild_pending(role_id, &ns)
    }

    fn rebuild_pending(&self, role_id: RoleId, ns: &Namespace) -> Option<Arc<PermissionProgram>> {
        let mut rebuilt: Option<Arc<PermissionProgram>> = None;

        self.forest.rcu(|forest| {
            rebuilt = None;
            let Some(node) = forest.roles.get(&role_id) else {
                return RoleForest::clone(forest);
            };
            let grants = chain_grants(&forest.roles, role_id);
            let effective =
                ns.compile_grants(grants.into_iter().filter(|g| g.namespace.as_str() == &**ns.key()));
            rebuilt = Some(effective.program().clone());

            let mut updated = RoleNode::clone(node);
            updated.effective.programs.insert(ns.index(), effective);
            let mut next = RoleForest::clone(forest);
            next.roles.insert(role_id, Arc::new(updated));
            next
        });

        debug!(role_id, namespace = %ns.key(), "Rebuilt pending effective program");
        rebuilt
    }
}

/// Grants of the chain ending at `role_id`, root-first
fn chain_grants<N: Borrow<RoleNode>>(
    roles: &HashMap<RoleId, N, RandomState>,
    role_id: RoleId,
) -> Vec<&GrantRow> {
    ancestor_chain(roles, role_id)
        .iter()
        .filter_map(|id| roles.get(id))
        .flat_map(|node| forest::node_of(node).grants.iter())
        .collect()
}

/// Stage role rows as mutable nodes.
///
/// With `reuse` set, grants and programs of roles already in `previous` are
/// carried over so only the refreshed subtree has to be rebuilt.
fn stage_rows(
    rows: &[RoleRow],
    previous: &RoleForest,
    reuse: bool,
) -> HashMap<RoleId, RoleNode, RandomState> {
    let mut staged: HashMap<RoleId, RoleNode, RandomState> = rows
        .iter()
        .map(|row| {
            let mut node = match previous.roles.get(&row.role_id) {
                Some(old) if reuse => RoleNode::clone(old),
                _ => RoleNode::default(),
            };
            node.parent = row.parent;
            node.rank = row.rank;
            node.children.clear();
            (row.role_id, node)
        })
        .collect();
    forest::link_children(&mut staged);
    staged
}

fn attach_grants(
    staged: &mut HashMap<RoleId, RoleNode, RandomState>,
    fetched: &[RoleId],
    grants: Vec<GrantRow>,
) {
    let mut by_role: HashMap<RoleId, Vec<GrantRow>> = HashMap::new();
    for grant in grants {
        if let Subject::Role(id) = grant.subject {
            by_role.entry(id).or_default().push(grant);
        }
    }
    for id in fetched {
        if let Some(node) = staged.get_mut(id) {
            node.grants = by_role.remove(id).unwrap_or_default().into();
        }
    }
}

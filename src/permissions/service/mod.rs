/*!
 * Permission Service
 *
 * Entry point composing the registry, resolver, role tree and per-user
 * override cache. Decision policy, first non-Unset wins:
 *
 * 1. the user's own grants,
 * 2. each assigned role, rank descending then id ascending,
 * 3. the catalog default of the node.
 *
 * Anything that is not an explicit allow is denied, including nodes that
 * fail to resolve.
 */

mod explain;
mod users;

pub use explain::{DecisionSource, Explanation};

use explain::Verdict;
use users::{UserCache, UserEntry};

use crate::core::config::EngineConfig;
use crate::core::errors::{EngineError, EngineResult};
use crate::core::types::{Rank, RoleId, UserId};
use crate::permissions::registry::{Namespace, PermissionRegistry};
use crate::permissions::resolver::{NodeHandle, Resolver, ResolverStats};
use crate::permissions::roles::RoleTree;
use crate::permissions::store::PermissionStore;
use crate::permissions::types::{
    parse_grant, CatalogEntry, Decision, Effect, NodeRef, ResolvedGrant, RolePatch, RoleRow,
    Subject,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Point-in-time counters across the service's caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub resolver_entries: usize,
    pub resolver_hits: u64,
    pub resolver_misses: u64,
    pub resolver_stale: u64,
    pub cached_users: usize,
    pub user_capacity: usize,
    pub roles: usize,
    pub role_generation: u64,
}

pub struct PermissionService<S> {
    config: EngineConfig,
    store: Arc<S>,
    registry: Arc<PermissionRegistry>,
    resolver: Resolver,
    roles: RoleTree<S>,
    users: UserCache,
    ready: OnceCell<()>,
}

impl<S: PermissionStore> PermissionService<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self::with_registry(Arc::new(store), Arc::new(PermissionRegistry::new()), config)
    }

    /// Build over a shared store and registry
    pub fn with_registry(
        store: Arc<S>,
        registry: Arc<PermissionRegistry>,
        config: EngineConfig,
    ) -> Self {
        debug!(
            cache_capacity = config.resolver_cache_capacity,
            stripes = config.effective_stripes(),
            user_capacity = config.user_cache_capacity,
            "Initializing permission service"
        );
        Self {
            resolver: Resolver::new(registry.clone(), &config),
            roles: RoleTree::new(store.clone(), registry.clone()),
            users: UserCache::new(config.user_cache_capacity),
            ready: OnceCell::new(),
            config,
            store,
            registry,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<PermissionRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn roles(&self) -> &RoleTree<S> {
        &self.roles
    }

    /// Load the role tree once; later calls return immediately
    pub async fn activate(&self) -> EngineResult<()> {
        self.ready
            .get_or_try_init(|| async {
                self.roles.refresh_all().await?;
                info!("Permission service activated");
                Ok::<(), EngineError>(())
            })
            .await?;
        Ok(())
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.ready.initialized()
    }

    // Authorization

    /// Decide for a user, loading the user (and the role tree) on first use
    pub async fn authorize_user(&self, user_id: UserId, node: &NodeRef) -> EngineResult<Decision> {
        self.activate().await?;
        let entry = match self.current_entry(user_id) {
            Some(entry) => entry,
            None => self.load_user(user_id).await?,
        };
        Ok(self.evaluate(user_id, entry, node).0.decision())
    }

    /// Decide from cached state only; None if the user is not loaded yet
    pub fn authorize_user_sync(&self, user_id: UserId, node: &NodeRef) -> Option<Decision> {
        if !self.is_active() {
            return None;
        }
        let entry = self.current_entry(user_id)?;
        Some(self.evaluate(user_id, entry, node).0.decision())
    }

    /// Whether the user may use `node`; every failure denies
    pub async fn can_user(&self, user_id: UserId, node: &str) -> bool {
        let Some(node_ref) = self.resolver.resolve(node) else {
            debug!(user_id, node, "Denying unresolved permission node");
            return false;
        };
        self.allowed(user_id, &node_ref, node).await
    }

    /// [`can_user`](Self::can_user) through a caller-held handle
    pub async fn can_user_handle(&self, user_id: UserId, handle: &NodeHandle) -> bool {
        let Some(node_ref) = self.resolver.resolve_handle(handle) else {
            debug!(user_id, node = handle.node(), "Denying unresolved permission node");
            return false;
        };
        self.allowed(user_id, &node_ref, handle.node()).await
    }

    async fn allowed(&self, user_id: UserId, node_ref: &NodeRef, node: &str) -> bool {
        match self.authorize_user(user_id, node_ref).await {
            Ok(decision) => decision.is_allowed(),
            Err(error) => {
                warn!(user_id, node, %error, "Authorization failed, denying");
                false
            }
        }
    }

    /// Decide and report which layer and node decided
    pub async fn explain(&self, user_id: UserId, node: &str) -> EngineResult<Explanation> {
        self.activate().await?;
        let Some(node_ref) = self.resolver.resolve(node) else {
            return Ok(Explanation::unresolved(node));
        };
        let entry = match self.current_entry(user_id) {
            Some(entry) => entry,
            None => self.load_user(user_id).await?,
        };

        let (verdict, entry) = self.evaluate(user_id, entry, &node_ref);
        let source = match self.registry.namespace_at(node_ref.namespace) {
            Some(ns) => explain::describe(verdict, &ns, &node_ref.path, |id| self.roles.get_rank(id)),
            None => DecisionSource::Undeclared,
        };
        Ok(Explanation {
            node: node.to_string(),
            decision: verdict.decision(),
            source,
            roles_considered: entry.roles.clone(),
        })
    }

    /// Walk the layers for one node; returns the entry actually used
    fn evaluate(
        &self,
        user_id: UserId,
        mut entry: Arc<UserEntry>,
        node: &NodeRef,
    ) -> (Verdict, Arc<UserEntry>) {
        let Some(ns) = self.registry.namespace_at(node.namespace) else {
            return (Verdict::Undeclared, entry);
        };
        let catalog = ns.catalog();
        let path = &node.path[..];
        // Paths are only meaningful against the catalog they were resolved in
        if node.version != catalog.version() {
            debug!(
                user_id,
                namespace = %ns.key(),
                version = node.version,
                current = catalog.version(),
                "Denying stale node reference"
            );
            return (Verdict::Undeclared, entry);
        }

        entry = self.current_override(user_id, entry, &ns);
        let by_user = entry
            .overrides
            .get(node.namespace)
            .and_then(|effective| effective.program().lookup(path));
        if let Some(matched) = by_user {
            return (Verdict::User(matched), entry);
        }

        let by_role = entry.roles.iter().find_map(|role_id| {
            self.roles
                .get_effective_program(*role_id, node.namespace)
                .and_then(|program| program.lookup(path))
                .map(|matched| Verdict::Role {
                    role_id: *role_id,
                    matched,
                })
        });
        if let Some(verdict) = by_role {
            return (verdict, entry);
        }

        match catalog.program().lookup(path) {
            Some(matched) => (Verdict::Default(matched), entry),
            None => (Verdict::Undeclared, entry),
        }
    }

    // User cache

    /// Cached entry with its role ordering brought up to the tree's generation
    fn current_entry(&self, user_id: UserId) -> Option<Arc<UserEntry>> {
        let entry = self.users.get(user_id)?;
        let generation = self.roles.generation();
        if entry.generation == generation {
            return Some(entry);
        }

        let resorted = Arc::new(UserEntry {
            roles: self.roles.sort_role_ids(&entry.roles),
            generation,
            grants: entry.grants.clone(),
            overrides: entry.overrides.clone(),
        });
        self.users.replace(user_id, &entry, resorted.clone());
        Some(resorted)
    }

    /// Rebuild the user's override program if it waits on the namespace
    fn current_override(
        &self,
        user_id: UserId,
        entry: Arc<UserEntry>,
        ns: &Namespace,
    ) -> Arc<UserEntry> {
        if !entry.override_pending(ns) {
            return entry;
        }
        let next = Arc::new(entry.recompile(ns));
        self.users.replace(user_id, &entry, next.clone());
        debug!(user_id, namespace = %ns.key(), "Rebuilt pending user override program");
        next
    }

    /// Fetch roles and grants for a user and cache the result unless the
    /// user was mutated meanwhile
    async fn load_user(&self, user_id: UserId) -> EngineResult<Arc<UserEntry>> {
        let epoch = self.users.epoch(user_id);
        let role_ids = self.store.list_user_role_ids(user_id).await?;
        let grants = self.store.list_grants(Subject::User(user_id)).await?;

        let generation = self.roles.generation();
        let entry = Arc::new(UserEntry::compile(
            &self.registry,
            self.roles.sort_role_ids(&role_ids),
            generation,
            grants,
        ));
        let cached = self.users.insert_if_unchanged(user_id, epoch, entry.clone());
        debug!(
            user_id,
            roles = entry.roles.len(),
            grants = entry.grants.len(),
            cached,
            "Loaded user permissions"
        );
        Ok(entry)
    }

    /// Record a mutation of the user, reloading it if cached.
    ///
    /// Uncached users load on next use; loads already in flight are discarded.
    async fn reload_user(&self, user_id: UserId) -> EngineResult<()> {
        if !self.users.touch(user_id) {
            return Ok(());
        }
        if let Err(error) = self.load_user(user_id).await {
            // Never keep serving the pre-mutation entry
            self.users.remove(user_id);
            return Err(error);
        }
        Ok(())
    }

    /// Drop a user's cached state; true if it was cached
    pub fn invalidate_user(&self, user_id: UserId) -> bool {
        self.users.remove(user_id)
    }

    // Catalog

    pub fn declare(&self, node: &str, default: Effect) -> EngineResult<NodeRef> {
        self.registry.declare(node, default)
    }

    pub fn undeclare(&self, node: &str) -> EngineResult<bool> {
        self.registry.undeclare(node)
    }

    pub fn list_catalog(&self, namespace: &str) -> Vec<CatalogEntry> {
        self.registry.list(namespace).unwrap_or_default()
    }

    // Roles

    pub async fn create_role(&self, parent: Option<RoleId>, rank: Rank) -> EngineResult<RoleRow> {
        self.activate().await?;
        let row = self.store.create_role(parent, rank).await?;
        self.roles.refresh_role_subtree(row.role_id).await?;
        info!(role_id = row.role_id, ?parent, rank, "Created role");
        Ok(row)
    }

    pub async fn update_role(&self, role_id: RoleId, patch: RolePatch) -> EngineResult<RoleRow> {
        self.activate().await?;
        let row = self.store.update_role(role_id, patch).await?;
        self.roles.refresh_role_subtree(role_id).await?;
        debug!(role_id, parent = ?row.parent, rank = row.rank, "Updated role");
        Ok(row)
    }

    pub async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> EngineResult<()> {
        self.activate().await?;
        self.store.assign_role_to_user(user_id, role_id).await?;
        self.reload_user(user_id).await
    }

    pub async fn unassign_role(&self, user_id: UserId, role_id: RoleId) -> EngineResult<()> {
        self.activate().await?;
        self.store.unassign_role_from_user(user_id, role_id).await?;
        self.reload_user(user_id).await
    }

    // Grants

    /// Validate `node` against the catalog, persist the grant and refresh
    /// whatever depends on it
    pub async fn grant(
        &self,
        subject: Subject,
        node: &str,
        effect: Effect,
    ) -> EngineResult<ResolvedGrant> {
        self.activate().await?;
        let resolved = self.resolve_grant(node)?;
        if let Subject::Role(role_id) = subject {
            if !self.roles.contains(role_id) {
                return Err(EngineError::UnknownRole(role_id));
            }
        }

        self.store.upsert_grant(resolved.to_row(subject, effect)).await?;
        self.refresh_subject(subject).await?;
        debug!(?subject, node, ?effect, "Granted permission");
        Ok(resolved)
    }

    /// Remove a grant; Ok(false) if the subject held none at that node
    pub async fn revoke(&self, subject: Subject, node: &str) -> EngineResult<bool> {
        self.activate().await?;
        let resolved = self.resolve_grant(node)?;
        // Effect is not part of a grant's identity
        let removed = self
            .store
            .revoke_grant(&resolved.to_row(subject, Effect::Deny))
            .await?;
        if removed {
            self.refresh_subject(subject).await?;
            debug!(?subject, node, "Revoked permission");
        }
        Ok(removed)
    }

    fn resolve_grant(&self, node: &str) -> EngineResult<ResolvedGrant> {
        self.resolver.resolve_grant(node).ok_or_else(|| {
            if parse_grant(node).is_none() {
                EngineError::MalformedNode(node.to_string())
            } else {
                EngineError::UndeclaredNode(node.to_string())
            }
        })
    }

    async fn refresh_subject(&self, subject: Subject) -> EngineResult<()> {
        match subject {
            Subject::Role(role_id) => self.roles.refresh_role_subtree(role_id).await,
            Subject::User(user_id) => self.reload_user(user_id).await,
        }
    }

    pub fn stats(&self) -> ServiceStats {
        let ResolverStats {
            entries,
            hits,
            misses,
            stale,
        } = self.resolver.stats();
        ServiceStats {
            resolver_entries: entries,
            resolver_hits: hits,
            resolver_misses: misses,
            resolver_stale: stale,
            cached_users: self.users.len(),
            user_capacity: self.users.capacity(),
            roles: self.roles.roles().len(),
            role_generation: self.roles.generation(),
        }
    }
}

impl<S> std::fmt::Debug for PermissionService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionService")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("cached_users", &self.users.len())
            .field("active", &self.ready.initialized())
            .finish()
    }
}

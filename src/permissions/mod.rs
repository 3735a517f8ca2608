/*!
 * Permissions Module
 * Compiled, trie-based permission decisions
 *
 * Collaborators declare permission nodes (`<namespace>.<local>`) into the
 * registry; grants attach effects to declared nodes for roles or users; the
 * service answers checks from immutable compiled programs.
 *
 * ## Features
 * - Per-namespace catalogs with default effects and version counters
 * - Exact-over-star, longest-prefix conflict resolution
 * - Role inheritance with rank-ordered evaluation
 * - Per-user overrides
 * - Striped, version-checked resolver cache
 *
 * ## Usage
 * ```ignore
 * use permission_engine::permissions::{PermissionService, InMemoryStore, Effect, Subject};
 *
 * let service = PermissionService::new(InMemoryStore::new(), Default::default());
 * service.declare("A.cmd.*", Effect::Deny)?;
 * let role = service.create_role(None, 0).await?;
 * service.grant(Subject::Role(role.role_id), "A.cmd.*", Effect::Allow).await?;
 * service.assign_role(user, role.role_id).await?;
 *
 * if service.can_user(user, "A.cmd.reload").await {
 *     // dispatch
 * }
 * ```
 */

pub mod program;
pub mod registry;
pub mod resolver;
pub mod roles;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used items
pub use program::{PermissionProgram, ProgramMatch, SegmentInterner, TrieBuilder};
pub use registry::{Catalog, CompiledGrants, EffectiveProgram, Namespace, PermissionRegistry};
pub use resolver::{NodeHandle, Resolver, ResolverStats};
pub use roles::RoleTree;
pub use service::{DecisionSource, Explanation, PermissionService, ServiceStats};
pub use store::{InMemoryStore, PermissionStore};
pub use types::{
    is_allowed, CatalogEntry, Decision, Effect, GrantRow, GrantTarget, Kind, NodeAddress,
    NodeRef, ResolvedGrant, RolePatch, RoleRow, Subject,
};

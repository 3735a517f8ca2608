/*!
 * Permission Types
 * Core types shared by every layer of the engine
 */

pub mod decision;
pub mod node;
pub mod rows;

pub use decision::{is_allowed, Decision, Effect, Kind};
pub use node::{
    normalize_local, parse_grant, parse_lookup, split_node, CatalogEntry, GrantTarget,
    NodeAddress, NodeRef, ResolvedGrant,
};
pub use rows::{GrantRow, RolePatch, RoleRow, Subject};

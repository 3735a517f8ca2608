/*!
 * Persistence Rows
 * Role and grant records exchanged with the store
 */

use super::decision::{Effect, Kind};
use crate::core::types::{Rank, RoleId, UserId};
use serde::{Deserialize, Serialize};

/// Who a grant applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum Subject {
    User(UserId),
    Role(RoleId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoleRow {
    pub role_id: RoleId,
    pub parent: Option<RoleId>,
    pub rank: Rank,
}

/// Partial role update; `None` leaves a field untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RolePatch {
    /// `Some(None)` detaches the role from its parent
    pub parent: Option<Option<RoleId>>,
    pub rank: Option<Rank>,
}

impl RolePatch {
    pub fn parent(parent: Option<RoleId>) -> Self {
        Self {
            parent: Some(parent),
            rank: None,
        }
    }

    pub fn rank(rank: Rank) -> Self {
        Self {
            parent: None,
            rank: Some(rank),
        }
    }
}

/// One persisted grant.
///
/// `local` is the bare dotted path; for star grants it is the prefix
/// (`""` for the namespace root).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GrantRow {
    pub subject: Subject,
    pub namespace: String,
    pub kind: Kind,
    pub local: String,
    pub effect: Effect,
}

impl GrantRow {
    /// Grants are keyed by everything except their effect
    pub fn same_target(&self, other: &GrantRow) -> bool {
        self.subject == other.subject
            && self.namespace == other.namespace
            && self.kind == other.kind
            && self.local == other.local
    }
}

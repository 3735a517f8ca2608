/*!
 * Permission Store
 *
 * The persistence collaborator the engine reads through. The engine does no
 * I/O of its own; every cache it keeps is derived from these calls and
 * refreshed explicitly after mutations.
 */

mod memory;

pub use memory::InMemoryStore;

use crate::core::errors::StoreError;
use crate::core::types::{Rank, RoleId, UserId};
use crate::permissions::types::{GrantRow, RolePatch, RoleRow, Subject};
use std::future::Future;

pub trait PermissionStore: Send + Sync {
    fn list_roles(&self) -> impl Future<Output = Result<Vec<RoleRow>, StoreError>> + Send;

    fn create_role(
        &self,
        parent: Option<RoleId>,
        rank: Rank,
    ) -> impl Future<Output = Result<RoleRow, StoreError>> + Send;

    fn update_role(
        &self,
        role_id: RoleId,
        patch: RolePatch,
    ) -> impl Future<Output = Result<RoleRow, StoreError>> + Send;

    fn list_user_role_ids(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<RoleId>, StoreError>> + Send;

    fn assign_role_to_user(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn unassign_role_from_user(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn list_grants(
        &self,
        subject: Subject,
    ) -> impl Future<Output = Result<Vec<GrantRow>, StoreError>> + Send;

    /// Grants of several roles at once, in per-role write order
    fn list_role_grants(
        &self,
        role_ids: &[RoleId],
    ) -> impl Future<Output = Result<Vec<GrantRow>, StoreError>> + Send;

    /// Insert, or replace the effect of, the grant with the same target
    fn upsert_grant(&self, row: GrantRow) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the grant with the same target; false if there was none
    fn revoke_grant(
        &self,
        row: &GrantRow,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

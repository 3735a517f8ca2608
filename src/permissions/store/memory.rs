use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use super::PermissionStore;
use crate::core::errors::StoreError;
use crate::core::types::{Rank, RoleId, UserId};
use crate::permissions::types::{GrantRow, RolePatch, RoleRow, Subject};

#[derive(Debug, Default)]
struct InnerState {
    next_role_id: RoleId,
    roles: BTreeMap<RoleId, RoleRow>,
    user_roles: HashMap<UserId, Vec<RoleId>>,
    grants: Vec<GrantRow>,
}

impl InnerState {
    fn would_cycle(&self, role_id: RoleId, parent: RoleId) -> bool {
        let mut cursor = Some(parent);
        let mut steps = 0;
        while let Some(current) = cursor {
            if current == role_id || steps > self.roles.len() {
                return true;
            }
            cursor = self.roles.get(&current).and_then(|r| r.parent);
            steps += 1;
        }
        false
    }
}

/// Process-local store, cloned handles share state
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InnerState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InnerState {
                next_role_id: 1,
                ..InnerState::default()
            })),
        }
    }
}

impl PermissionStore for InMemoryStore {
    async fn list_roles(&self) -> Result<Vec<RoleRow>, StoreError> {
        Ok(self.state.lock().roles.values().copied().collect())
    }

    async fn create_role(&self, parent: Option<RoleId>, rank: Rank) -> Result<RoleRow, StoreError> {
        let mut state = self.state.lock();
        if let Some(parent) = parent {
            if !state.roles.contains_key(&parent) {
                return Err(StoreError::ParentNotFound(parent));
            }
        }
        let role_id = state.next_role_id.max(1);
        state.next_role_id = role_id + 1;
        let row = RoleRow {
            role_id,
            parent,
            rank,
        };
        state.roles.insert(role_id, row);
        Ok(row)
    }

    async fn update_role(&self, role_id: RoleId, patch: RolePatch) -> Result<RoleRow, StoreError> {
        let mut state = self.state.lock();
        let mut row = *state
            .roles
            .get(&role_id)
            .ok_or(StoreError::RoleNotFound(role_id))?;

        if let Some(parent) = patch.parent {
            if let Some(parent) = parent {
                if !state.roles.contains_key(&parent) {
                    return Err(StoreError::ParentNotFound(parent));
                }
                if state.would_cycle(role_id, parent) {
                    return Err(StoreError::RoleCycle {
                        role: role_id,
                        parent,
                    });
                }
            }
            row.parent = parent;
        }
        if let Some(rank) = patch.rank {
            row.rank = rank;
        }
        state.roles.insert(role_id, row);
        Ok(row)
    }

    async fn list_user_role_ids(&self, user_id: UserId) -> Result<Vec<RoleId>, StoreError> {
        Ok(self
            .state
            .lock()
            .user_roles
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn assign_role_to_user(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if !state.roles.contains_key(&role_id) {
            return Err(StoreError::RoleNotFound(role_id));
        }
        let roles = state.user_roles.entry(user_id).or_default();
        if !roles.contains(&role_id) {
            roles.push(role_id);
        }
        Ok(())
    }

    async fn unassign_role_from_user(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if let Some(roles) = state.user_roles.get_mut(&user_id) {
            roles.retain(|r| *r != role_id);
        }
        Ok(())
    }

    async fn list_grants(&self, subject: Subject) -> Result<Vec<GrantRow>, StoreError> {
        Ok(self
            .state
            .lock()
            .grants
            .iter()
            .filter(|g| g.subject == subject)
            .cloned()
            .collect())
    }

    async fn list_role_grants(&self, role_ids: &[RoleId]) -> Result<Vec<GrantRow>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .grants
            .iter()
            .filter(|g| matches!(g.subject, Subject::Role(id) if role_ids.contains(&id)))
            .cloned()
            .collect())
    }

    async fn upsert_grant(&self, row: GrantRow) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if let Subject::Role(role_id) = row.subject {
            if !state.roles.contains_key(&role_id) {
                return Err(StoreError::RoleNotFound(role_id));
            }
        }
        match state.grants.iter_mut().find(|g| g.same_target(&row)) {
            Some(existing) => existing.effect = row.effect,
            None => state.grants.push(row),
        }
        Ok(())
    }

    async fn revoke_grant(&self, row: &GrantRow) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        let before = state.grants.len();
        state.grants.retain(|g| !g.same_target(row));
        Ok(state.grants.len() != before)
    }
}

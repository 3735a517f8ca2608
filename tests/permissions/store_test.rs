/*!
 * Store failures propagate to callers and fail checks closed; reads that
 * race a mutation never end up cached
 */

use permission_engine::core::types::{Rank, RoleId, UserId};
use permission_engine::permissions::{
    Decision, Effect, GrantRow, InMemoryStore, PermissionService, PermissionStore, RolePatch, RoleRow,
    Subject,
};
use permission_engine::{EngineConfig, EngineError, StoreError};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Delegates to an in-memory store until told to fail, optionally parking
/// the next user grant read after it has read the rows
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryStore,
    failing: AtomicBool,
    park_next_grant_read: AtomicBool,
    parked: Notify,
    release: Notify,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        Ok(())
    }
}

impl PermissionStore for FlakyStore {
    async fn list_roles(&self) -> Result<Vec<RoleRow>, StoreError> {
        self.check()?;
        self.inner.list_roles().await
    }

    async fn create_role(&self, parent: Option<RoleId>, rank: Rank) -> Result<RoleRow, StoreError> {
        self.check()?;
        self.inner.create_role(parent, rank).await
    }

    async fn update_role(&self, role_id: RoleId, patch: RolePatch) -> Result<RoleRow, StoreError> {
        self.check()?;
        self.inner.update_role(role_id, patch).await
    }

    async fn list_user_role_ids(&self, user_id: UserId) -> Result<Vec<RoleId>, StoreError> {
        self.check()?;
        self.inner.list_user_role_ids(user_id).await
    }

    async fn assign_role_to_user(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        self.check()?;
        self.inner.assign_role_to_user(user_id, role_id).await
    }

    async fn unassign_role_from_user(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.inner.unassign_role_from_user(user_id, role_id).await
    }

    async fn list_grants(&self, subject: Subject) -> Result<Vec<GrantRow>, StoreError> {
        self.check()?;
        let rows = self.inner.list_grants(subject).await?;
        if self.park_next_grant_read.swap(false, Ordering::SeqCst) {
            self.parked.notify_one();
            self.release.notified().await;
        }
        Ok(rows)
    }

    async fn list_role_grants(&self, role_ids: &[RoleId]) -> Result<Vec<GrantRow>, StoreError> {
        self.check()?;
        self.inner.list_role_grants(role_ids).await
    }

    async fn upsert_grant(&self, row: GrantRow) -> Result<(), StoreError> {
        self.check()?;
        self.inner.upsert_grant(row).await
    }

    async fn revoke_grant(&self, row: &GrantRow) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.revoke_grant(row).await
    }
}

fn service() -> PermissionService<FlakyStore> {
    let service = PermissionService::with_registry(
        Arc::new(FlakyStore::default()),
        Default::default(),
        EngineConfig::default(),
    );
    service.declare("A.*", Effect::Allow).unwrap();
    service
}

#[tokio::test]
async fn test_activation_failure_is_retried() {
    let service = service();
    service.store().failing.store(true, Ordering::SeqCst);

    let error = service.activate().await.unwrap_err();
    assert_eq!(
        error,
        EngineError::Store(StoreError::Backend("connection reset".to_string()))
    );
    assert!(!service.is_active());
    // Default allow, but a failing load never grants anything
    assert!(!service.can_user(1, "A.anything").await);

    service.store().failing.store(false, Ordering::SeqCst);
    assert!(service.can_user(1, "A.anything").await);
    assert!(service.is_active());
}

#[tokio::test]
async fn test_user_load_failure_propagates() {
    let service = service();
    service.activate().await.unwrap();
    let node = service.resolver().resolve("A.x").unwrap();

    service.store().failing.store(true, Ordering::SeqCst);
    assert!(matches!(
        service.authorize_user(1, &node).await,
        Err(EngineError::Store(StoreError::Backend(_)))
    ));
    assert_eq!(service.authorize_user_sync(1, &node), None);
    assert!(!service.can_user(1, "A.x").await);
}

#[tokio::test]
async fn test_store_validation_errors_surface() {
    let service = service();

    assert_eq!(
        service.create_role(Some(99), 0).await,
        Err(EngineError::Store(StoreError::ParentNotFound(99)))
    );

    let parent = service.create_role(None, 0).await.unwrap().role_id;
    let child = service.create_role(Some(parent), 0).await.unwrap().role_id;
    assert_eq!(
        service.update_role(parent, RolePatch::parent(Some(child))).await,
        Err(EngineError::Store(StoreError::RoleCycle {
            role: parent,
            parent: child
        }))
    );
    assert_eq!(
        service.assign_role(1, 404).await,
        Err(EngineError::Store(StoreError::RoleNotFound(404)))
    );
}

#[tokio::test]
async fn test_failed_grant_leaves_state_untouched() {
    let service = service();
    service.declare("A.secret", Effect::Deny).unwrap();
    assert!(!service.can_user(1, "A.secret").await);

    service.store().failing.store(true, Ordering::SeqCst);
    let result = service
        .grant(Subject::User(1), "A.secret", Effect::Allow)
        .await;
    assert!(result.is_err());

    service.store().failing.store(false, Ordering::SeqCst);
    assert!(!service.can_user(1, "A.secret").await);
}

#[tokio::test]
async fn test_grant_during_first_load_is_not_lost() {
    let service = service();
    service.declare("A.x", Effect::Deny).unwrap();
    service.activate().await.unwrap();
    let store = service.store().clone();
    store.park_next_grant_read.store(true, Ordering::SeqCst);

    let (first, ()) = tokio::join!(service.can_user(1, "A.x"), async {
        store.parked.notified().await;
        service
            .grant(Subject::User(1), "A.x", Effect::Allow)
            .await
            .unwrap();
        store.release.notify_one();
    });

    // Decided on the rows read before the grant, but never cached
    assert!(!first);
    assert!(service.can_user(1, "A.x").await);
    let node = service.resolver().resolve("A.x").unwrap();
    assert_eq!(service.authorize_user_sync(1, &node), Some(Decision::Allow));
}


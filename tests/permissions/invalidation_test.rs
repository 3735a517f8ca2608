/*!
 * Version-based invalidation of resolver entries, handles and cached programs
 */

use permission_engine::permissions::{
    Decision, Effect, InMemoryStore, NodeHandle, PermissionRegistry, PermissionService,
    PermissionStore, Resolver, Subject,
};
use permission_engine::EngineConfig;
use pretty_assertions::{assert_eq, assert_ne};
use std::sync::Arc;

fn service() -> PermissionService<InMemoryStore> {
    let service = PermissionService::new(InMemoryStore::new(), EngineConfig::default());
    service.declare("A.cmd.*", Effect::Deny).unwrap();
    service.declare("A.cmd.reload", Effect::Deny).unwrap();
    service
}

#[test]
fn test_declare_and_undeclare_bump_version() {
    let registry = PermissionRegistry::new();
    let first = registry.declare("A.cmd.reload", Effect::Deny).unwrap();
    let second = registry.declare("A.cmd.stop", Effect::Allow).unwrap();
    assert!(second.version > first.version);

    let index = second.namespace;
    assert!(registry.undeclare("A.cmd.stop").unwrap());
    let after_undeclare = registry.current_version(index).unwrap();
    assert!(after_undeclare > second.version);

    // Nothing removed, nothing bumped
    assert!(!registry.undeclare("A.cmd.stop").unwrap());
    assert_eq!(registry.current_version(index), Some(after_undeclare));
}

#[test]
fn test_stale_resolver_entry_is_recomputed() {
    let registry = Arc::new(PermissionRegistry::new());
    registry.declare("A.cmd.*", Effect::Deny).unwrap();
    let resolver = Resolver::new(registry.clone(), &EngineConfig::default());

    let before = resolver.resolve("A.cmd.reload").unwrap();
    registry.declare("A.cmd.reload", Effect::Allow).unwrap();
    let after = resolver.resolve("A.cmd.reload").unwrap();

    assert!(after.version > before.version);
    assert!(!resolver.is_current(&before));
    assert!(resolver.is_current(&after));
    let stats = resolver.stats();
    assert_eq!(stats.stale, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.entries, 1);

    registry.undeclare("A.cmd.*").unwrap();
    registry.undeclare("A.cmd.reload").unwrap();
    assert_eq!(resolver.resolve("A.cmd.reload"), None);
}

#[test]
fn test_handle_refreshes_in_place() {
    let registry = Arc::new(PermissionRegistry::new());
    registry.declare("A.cmd.*", Effect::Deny).unwrap();
    let resolver = Resolver::new(registry.clone(), &EngineConfig::default());
    let handle = NodeHandle::new("A.cmd.reload");
    assert!(handle.cached().is_none());

    let first = handle.resolve(&resolver).unwrap();
    let again = handle.resolve(&resolver).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    registry.declare("A.other", Effect::Deny).unwrap();
    let refreshed = handle.resolve(&resolver).unwrap();
    assert!(!Arc::ptr_eq(&first, &refreshed));
    assert_eq!(refreshed.path, first.path);
    assert!(Arc::ptr_eq(&handle.cached().unwrap(), &refreshed));
}

#[tokio::test]
async fn test_new_declaration_reaches_cached_role_programs() {
    let service = service();
    let role = service.create_role(None, 0).await.unwrap().role_id;
    service
        .grant(Subject::Role(role), "A.cmd.*", Effect::Allow)
        .await
        .unwrap();
    service.assign_role(1, role).await.unwrap();
    assert!(service.can_user(1, "A.cmd.reload").await);

    // Node declared and granted after the user was loaded
    service.declare("A.cmd.stop", Effect::Allow).unwrap();
    service
        .grant(Subject::Role(role), "A.cmd.stop", Effect::Deny)
        .await
        .unwrap();
    assert!(!service.can_user(1, "A.cmd.stop").await);
    assert!(service.can_user(1, "A.cmd.reload").await);
}

#[tokio::test]
async fn test_sync_path_serves_only_loaded_users() {
    let service = service();
    let node = service.resolver().resolve("A.cmd.reload").unwrap();

    assert_eq!(service.authorize_user_sync(1, &node), None);
    assert_eq!(service.authorize_user(1, &node).await.unwrap(), Decision::Deny);
    assert_eq!(service.authorize_user_sync(1, &node), Some(Decision::Deny));
    assert_eq!(service.authorize_user_sync(2, &node), None);

    service
        .grant(Subject::User(1), "A.cmd.reload", Effect::Allow)
        .await
        .unwrap();
    // Loaded users are reloaded eagerly after their own grants change
    assert_eq!(service.authorize_user_sync(1, &node), Some(Decision::Allow));
}

#[tokio::test]
async fn test_handle_checks_through_service() {
    let service = service();
    service
        .grant(Subject::User(3), "A.cmd.*", Effect::Allow)
        .await
        .unwrap();
    let handle = NodeHandle::new("A.cmd.reload");

    assert!(service.can_user_handle(3, &handle).await);
    assert!(!service.can_user_handle(4, &handle).await);

    service.undeclare("A.cmd.reload").unwrap();
    // Still covered by the star, so the handle re-resolves cleanly
    assert!(service.can_user_handle(3, &handle).await);

    service.undeclare("A.cmd.*").unwrap();
    assert!(!service.can_user_handle(3, &handle).await);
    assert!(handle.cached().is_none());
}

#[tokio::test]
async fn test_invalidate_user_forces_reload() {
    let service = service();
    let role = service.create_role(None, 0).await.unwrap().role_id;
    service
        .grant(Subject::Role(role), "A.cmd.*", Effect::Allow)
        .await
        .unwrap();
    assert!(!service.can_user(1, "A.cmd.reload").await);

    // Assigned behind the service's back
    service.store().assign_role_to_user(1, role).await.unwrap();
    assert!(!service.can_user(1, "A.cmd.reload").await);

    assert!(service.invalidate_user(1));
    assert!(service.can_user(1, "A.cmd.reload").await);
}

#[tokio::test]
async fn test_reference_from_older_catalog_fails_closed() {
    let service = PermissionService::new(InMemoryStore::new(), EngineConfig::default());
    service.declare("A.cmd.*", Effect::Allow).unwrap();
    let old = service.resolver().resolve("A.cmd.stop").unwrap();
    assert_eq!(service.authorize_user(1, &old).await.unwrap(), Decision::Allow);

    // An exact deny lands under the star the old reference was resolved through
    service.declare("A.cmd.stop", Effect::Deny).unwrap();
    let fresh = service.resolver().resolve("A.cmd.stop").unwrap();
    assert_ne!(old.path, fresh.path);

    assert_eq!(service.authorize_user(1, &old).await.unwrap(), Decision::Deny);
    assert_eq!(service.authorize_user(1, &fresh).await.unwrap(), Decision::Deny);
    assert!(!service.can_user(1, "A.cmd.stop").await);
    assert!(service.can_user(1, "A.cmd.other").await);

    // Even a harmless catalog change retires outstanding references
    let other = service.resolver().resolve("A.cmd.other").unwrap();
    service.declare("A.unrelated", Effect::Deny).unwrap();
    assert_eq!(service.authorize_user(1, &other).await.unwrap(), Decision::Deny);
}

/*!
 * End-to-end role inheritance scenarios
 */

use permission_engine::permissions::{
    Decision, DecisionSource, Effect, InMemoryStore, Kind, PermissionService, Subject,
};
use permission_engine::EngineConfig;

const U: u64 = 1001;

async fn scenario() -> (PermissionService<InMemoryStore>, u64, u64) {
    let service = PermissionService::new(InMemoryStore::new(), EngineConfig::default());
    service.declare("A.*", Effect::Deny).unwrap();
    service.declare("A.cmd.*", Effect::Deny).unwrap();
    service.declare("A.cmd.reload", Effect::Deny).unwrap();

    let r1 = service.create_role(None, 0).await.unwrap().role_id;
    let r2 = service.create_role(Some(r1), 100).await.unwrap().role_id;
    service
        .grant(Subject::Role(r1), "A.cmd.*", Effect::Allow)
        .await
        .unwrap();
    service.assign_role(U, r2).await.unwrap();
    (service, r1, r2)
}

#[tokio::test]
async fn test_child_role_inherits_parent_star() {
    let (service, _, _) = scenario().await;

    assert!(service.can_user(U, "A.cmd.reload").await);
    assert!(service.can_user(U, "A.cmd.shutdown").await);
}

#[tokio::test]
async fn test_scenario_explained_by_inherited_star() {
    let (service, _, r2) = scenario().await;

    let explanation = service.explain(U, "A.cmd.shutdown").await.unwrap();
    assert_eq!(explanation.decision, Decision::Allow);
    assert_eq!(
        explanation.source,
        DecisionSource::Role {
            role_id: r2,
            rank: 100,
            node: "A.cmd.*".to_string(),
            kind: Kind::Star,
        }
    );
}

#[tokio::test]
async fn test_nodes_outside_the_grant_keep_defaults() {
    let (service, _, _) = scenario().await;

    assert!(!service.can_user(U, "A.status").await);
    assert!(!service.can_user(U, "B.cmd.reload").await);
    // Users without roles fall through to the catalog
    assert!(!service.can_user(U + 1, "A.cmd.reload").await);
}

#[tokio::test]
async fn test_ancestor_exact_grant_survives_untouched() {
    let (service, r1, r2) = scenario().await;
    service
        .grant(Subject::Role(r1), "A.cmd.reload", Effect::Deny)
        .await
        .unwrap();
    service
        .grant(Subject::Role(r2), "A.cmd.*", Effect::Allow)
        .await
        .unwrap();

    // r2 overrides the star only; r1's exact deny still applies below it
    assert!(!service.can_user(U, "A.cmd.reload").await);
    assert!(service.can_user(U, "A.cmd.shutdown").await);
}

#[tokio::test]
async fn test_descendant_override_replaces_inherited_grant() {
    let (service, _, r2) = scenario().await;
    service
        .grant(Subject::Role(r2), "A.cmd.*", Effect::Deny)
        .await
        .unwrap();

    assert!(!service.can_user(U, "A.cmd.reload").await);
    assert!(!service.can_user(U, "A.cmd.shutdown").await);
}

#[tokio::test]
async fn test_reparenting_moves_inheritance() {
    let (service, _, r2) = scenario().await;
    let other = service.create_role(None, 0).await.unwrap().role_id;

    service
        .update_role(r2, permission_engine::permissions::RolePatch::parent(Some(other)))
        .await
        .unwrap();
    assert_eq!(service.roles().get_parent(r2), Some(other));
    assert!(!service.can_user(U, "A.cmd.reload").await);

    service
        .update_role(r2, permission_engine::permissions::RolePatch::parent(None))
        .await
        .unwrap();
    assert_eq!(service.roles().get_parent(r2), None);
    assert!(!service.can_user(U, "A.cmd.reload").await);
}

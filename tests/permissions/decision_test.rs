/*!
 * Decision layering: user overrides, role ranks, catalog defaults
 */

use permission_engine::permissions::{
    is_allowed, Decision, Effect, InMemoryStore, PermissionService, SegmentInterner, Subject,
    TrieBuilder,
};
use permission_engine::{EngineConfig, EngineError};
use pretty_assertions::assert_eq;

fn service() -> PermissionService<InMemoryStore> {
    let service = PermissionService::new(InMemoryStore::new(), EngineConfig::default());
    for node in ["A.*", "A.x.*", "A.x.y.*", "A.x.y.z", "A.help"] {
        service.declare(node, Effect::Deny).unwrap();
    }
    service
}

#[test]
fn test_program_layering() {
    let interner = SegmentInterner::new();
    let mut builder = TrieBuilder::new();
    builder.set_star(Effect::Deny, &interner.compile_local(""));
    builder.set_star(Effect::Allow, &interner.compile_local("x"));
    builder.set_star(Effect::Deny, &interner.compile_local("x.y"));
    builder.set_exact(Effect::Allow, &interner.compile_local("x.y.z"));
    let program = builder.freeze();

    let decide = |local: &str| program.decide(&interner.lookup_local_lossy(local));
    assert_eq!(decide("x.y.z"), Decision::Allow);
    assert_eq!(decide("x.y.w"), Decision::Deny);
    assert_eq!(decide("x.q"), Decision::Allow);
    assert_eq!(decide("x"), Decision::Allow);
    assert_eq!(decide("other"), Decision::Deny);
    assert!(is_allowed(decide("x.y.z")));
    assert!(!is_allowed(Decision::Unset));
}

#[test]
fn test_builder_overwrites_same_node_and_kind() {
    let interner = SegmentInterner::new();
    let path = interner.compile_local("x.y");
    let mut builder = TrieBuilder::new();
    builder.set_exact(Effect::Allow, &path);
    builder.set_exact(Effect::Deny, &path);
    builder.set_star(Effect::Allow, &path);

    let program = builder.freeze();
    // Exact and star at one node are separate entries; exact wins for the node itself
    assert_eq!(program.decide(&path), Decision::Deny);
    assert!(program.has_exact(&path));
    assert!(program.has_star(&path));
}

#[tokio::test]
async fn test_longest_prefix_through_user_grants() {
    let service = service();
    service
        .grant(Subject::User(1), "A.x.*", Effect::Allow)
        .await
        .unwrap();
    service
        .grant(Subject::User(1), "A.x.y.*", Effect::Deny)
        .await
        .unwrap();
    service
        .grant(Subject::User(1), "A.x.y.z", Effect::Allow)
        .await
        .unwrap();

    assert!(service.can_user(1, "A.x.y.z").await);
    assert!(!service.can_user(1, "A.x.y.other").await);
    assert!(service.can_user(1, "A.x.other").await);
}

#[tokio::test]
async fn test_user_override_beats_highest_role() {
    let service = service();
    let admin = service.create_role(None, 1000).await.unwrap().role_id;
    service
        .grant(Subject::Role(admin), "A.*", Effect::Allow)
        .await
        .unwrap();
    service.assign_role(5, admin).await.unwrap();
    service
        .grant(Subject::User(5), "A.help", Effect::Deny)
        .await
        .unwrap();

    assert!(!service.can_user(5, "A.help").await);
    assert!(service.can_user(5, "A.x.y.z").await);
}

#[tokio::test]
async fn test_rank_then_role_id_ordering() {
    let service = service();
    let low = service.create_role(None, -5).await.unwrap().role_id;
    let tied_first = service.create_role(None, 10).await.unwrap().role_id;
    let tied_second = service.create_role(None, 10).await.unwrap().role_id;
    for (role, effect) in [
        (low, Effect::Allow),
        (tied_first, Effect::Deny),
        (tied_second, Effect::Allow),
    ] {
        service
            .grant(Subject::Role(role), "A.help", effect)
            .await
            .unwrap();
        service.assign_role(9, role).await.unwrap();
    }

    let explanation = service.explain(9, "A.help").await.unwrap();
    assert_eq!(explanation.roles_considered, vec![tied_first, tied_second, low]);
    assert_eq!(explanation.decision, Decision::Deny);
    assert_eq!(
        service.roles().sort_role_ids(&[low, tied_second, tied_first]),
        vec![tied_first, tied_second, low]
    );
}

#[tokio::test]
async fn test_role_without_matching_grant_is_skipped() {
    let service = service();
    let high = service.create_role(None, 50).await.unwrap().role_id;
    let low = service.create_role(None, 1).await.unwrap().role_id;
    service
        .grant(Subject::Role(high), "A.x.*", Effect::Deny)
        .await
        .unwrap();
    service
        .grant(Subject::Role(low), "A.help", Effect::Allow)
        .await
        .unwrap();
    service.assign_role(2, high).await.unwrap();
    service.assign_role(2, low).await.unwrap();

    assert!(service.can_user(2, "A.help").await);
    assert!(!service.can_user(2, "A.x.y.z").await);
}

#[tokio::test]
async fn test_unresolvable_nodes_fail_closed() {
    let service = service();
    service.declare("A.open", Effect::Allow).unwrap();
    assert!(service.can_user(1, "A.open").await);

    for node in ["", "A", "A.", ".open", "A..open", "A.open.*", "A.*", "Z.open"] {
        assert!(!service.can_user(1, node).await, "{node} should be denied");
    }
}

#[tokio::test]
async fn test_grant_errors() {
    let service = service();

    let malformed = service.grant(Subject::User(1), "A.x*", Effect::Allow).await;
    assert_eq!(malformed, Err(EngineError::MalformedNode("A.x*".to_string())));

    let undeclared = service.grant(Subject::User(1), "A.help.*", Effect::Allow).await;
    assert_eq!(undeclared, Err(EngineError::UndeclaredNode("A.help.*".to_string())));

    let unknown_role = service.grant(Subject::Role(77), "A.help", Effect::Allow).await;
    assert_eq!(unknown_role, Err(EngineError::UnknownRole(77)));

    let resolved = service
        .grant(Subject::User(1), "A.x.y.*", Effect::Allow)
        .await
        .unwrap();
    assert_eq!(resolved.node_string(), "A.x.y.*");
    assert_eq!(resolved.local(), "x.y");
}

/*!
 * Concurrent readers and writers over shared engine state
 */

use futures::future::join_all;
use permission_engine::permissions::{
    Effect, InMemoryStore, PermissionRegistry, PermissionService, Subject,
};
use permission_engine::EngineConfig;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const TASKS: usize = 64;

async fn shared_service() -> (Arc<PermissionService<InMemoryStore>>, u64) {
    let service = PermissionService::new(
        InMemoryStore::new(),
        EngineConfig::default().with_resolver_cache_stripes(4),
    );
    service.declare("A.*", Effect::Deny).unwrap();
    service.declare("A.cmd.*", Effect::Deny).unwrap();
    service.declare("A.cmd.reload", Effect::Deny).unwrap();
    let role = service.create_role(None, 0).await.unwrap().role_id;
    service
        .grant(Subject::Role(role), "A.cmd.*", Effect::Allow)
        .await
        .unwrap();
    (Arc::new(service), role)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_first_use_activates_once() {
    let service = Arc::new(PermissionService::new(
        InMemoryStore::new(),
        EngineConfig::default(),
    ));
    service.declare("A.open", Effect::Allow).unwrap();

    let checks = (0..TASKS).map(|i| {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.can_user(i as u64, "A.open").await })
    });
    let results = join_all(checks).await;

    assert!(results.into_iter().all(|r| r.unwrap()));
    assert_eq!(service.roles().generation(), 1);
    assert_eq!(service.stats().cached_users, TASKS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_checks_agree() {
    let (service, role) = shared_service().await;
    for user in 0..8u64 {
        service.assign_role(user, role).await.unwrap();
    }

    let checks = (0..TASKS).map(|i| {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let user = (i % 8) as u64;
            let node = if i % 2 == 0 { "A.cmd.reload" } else { "A.cmd.shutdown" };
            service.can_user(user, node).await
        })
    });

    for result in join_all(checks).await {
        assert!(result.unwrap());
    }
    let stats = service.stats();
    assert_eq!(stats.resolver_entries, 2);
    assert_eq!(stats.resolver_hits + stats.resolver_misses, TASKS as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_readers_during_grant_flips() {
    let (service, role) = shared_service().await;
    service.assign_role(1, role).await.unwrap();
    let allowed = Arc::new(AtomicU64::new(0));

    let writer = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            for i in 0..20 {
                let effect = if i % 2 == 0 { Effect::Deny } else { Effect::Allow };
                service
                    .grant(Subject::Role(role), "A.cmd.reload", effect)
                    .await
                    .unwrap();
            }
        })
    };
    let readers = (0..TASKS).map(|_| {
        let service = Arc::clone(&service);
        let allowed = Arc::clone(&allowed);
        tokio::spawn(async move {
            for _ in 0..10 {
                if service.can_user(1, "A.cmd.reload").await {
                    allowed.fetch_add(1, Ordering::Relaxed);
                }
                // Untouched node never flips
                assert!(service.can_user(1, "A.cmd.other").await);
            }
        })
    });

    let readers = join_all(readers).await;
    writer.await.unwrap();
    for reader in readers {
        reader.unwrap();
    }

    // Last write was Allow
    assert!(service.can_user(1, "A.cmd.reload").await);
    assert!(allowed.load(Ordering::Relaxed) <= (TASKS * 10) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_declares_all_land() {
    let registry = Arc::new(PermissionRegistry::new());

    let declares = (0..TASKS).map(|i| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let ns = if i % 2 == 0 { "A" } else { "B" };
            registry
                .declare(&format!("{ns}.node{i}.leaf"), Effect::Allow)
                .unwrap()
        })
    });
    let refs: Vec<_> = join_all(declares)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let namespaces: HashSet<u32> = refs.iter().map(|r| r.namespace).collect();
    assert_eq!(namespaces.len(), 2);
    for key in ["A", "B"] {
        let ns = registry.namespace(key).unwrap();
        assert_eq!(ns.version(), (TASKS / 2) as u64);
        assert_eq!(ns.catalog().len(), TASKS / 2);
    }
    // Distinct segment strings never share an id
    let a = registry.namespace("A").unwrap();
    let ids: HashSet<_> = (0..TASKS)
        .step_by(2)
        .map(|i| a.interner().lookup_local(&format!("node{i}")).unwrap())
        .collect();
    assert_eq!(ids.len(), TASKS / 2);
}

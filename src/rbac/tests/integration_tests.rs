//! End-to-end RBAC tests
//!
//! Configuration → engine → permission checks, assertions, and graph
//! properties of the role registry.

use cretoai_rbac::{
    assertion_fn, AssertionError, AuthzError, CacheStore, DenyReason, GuardDecision, Identity,
    MemoryCacheStore, RbacConfig, RbacDataset, RbacEngine, RequestDescriptor, RoleDefinition,
    RoleRegistry, SimpleIdentity, StaticIdentityProvider,
};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::io::Write;
use std::sync::Arc;

const CONFIG: &str = r#"{
    "guest_role": "guest",
    "protection_policy": "deny",
    "guards": [
        { "type": "route", "pattern": "/admin/*", "permissions": ["write"], "mode": "all" },
        { "type": "route", "pattern": "/articles/*", "roles": ["member", "editor"], "mode": "any" },
        { "type": "route", "pattern": "/*", "roles": ["*"] }
    ],
    "role_providers": [
        {
            "id": "base",
            "roles": {
                "guest": {},
                "member": { "parents": ["guest"], "permissions": ["read"] },
                "admin": { "parents": ["member"], "permissions": ["write"] }
            }
        },
        {
            "id": "publishing",
            "roles": {
                "editor": { "parents": ["member"], "permissions": ["publish"] }
            }
        }
    ],
    "permission_providers": [
        { "id": "grants", "permissions": { "comment": ["member"] } }
    ]
}"#;

fn engine_with(identity: Option<SimpleIdentity>) -> RbacEngine {
    let config = RbacConfig::from_json_str(CONFIG).unwrap();
    let provider = match identity {
        Some(identity) => StaticIdentityProvider::with_identity(Arc::new(identity)),
        None => StaticIdentityProvider::anonymous(),
    };
    RbacEngine::from_config(&config, Arc::new(provider)).unwrap()
}

fn admin() -> SimpleIdentity {
    SimpleIdentity::new("user:alice").with_role("admin")
}

// ============================================================================
// PERMISSION CHECKS
// ============================================================================

#[tokio::test]
async fn test_admin_permissions() {
    let engine = engine_with(Some(admin()));

    assert!(engine.is_granted("read", None).await.unwrap());
    assert!(engine.is_granted("write", None).await.unwrap());
    assert!(engine.is_granted("comment", None).await.unwrap());
    assert!(!engine.is_granted("delete", None).await.unwrap());
    assert!(!engine.is_granted("publish", None).await.unwrap());
}

#[tokio::test]
async fn test_guest_permissions() {
    let engine = engine_with(None);

    assert!(!engine.is_granted("read", None).await.unwrap());

    let decision = engine.evaluate(&RequestDescriptor::new("/home")).await.unwrap();
    assert!(decision.is_allowed());
}

#[tokio::test]
async fn test_identity_without_roles_gets_nothing() {
    let engine = engine_with(Some(SimpleIdentity::new("user:nobody")));

    assert!(!engine.is_granted("read", None).await.unwrap());
    let decision = engine
        .evaluate(&RequestDescriptor::new("/articles/1"))
        .await
        .unwrap();
    assert!(decision.is_denied());
}

#[tokio::test]
async fn test_roles_merged_across_providers() {
    let engine = engine_with(None);
    let editor = SimpleIdentity::new("user:dana").with_role("editor");

    assert!(engine.is_granted_for(Some(&editor), "publish", None).await.unwrap());
    assert!(engine.is_granted_for(Some(&editor), "read", None).await.unwrap());
    assert!(!engine.is_granted_for(Some(&editor), "write", None).await.unwrap());
}

// ============================================================================
// GUARDS
// ============================================================================

#[tokio::test]
async fn test_admin_area_guard() {
    let engine = engine_with(None);
    let member = SimpleIdentity::new("user:bob").with_role("member");
    let request = RequestDescriptor::new("/admin/users");

    let decision = engine.evaluate_for(Some(&member), &request).await.unwrap();
    match decision {
        GuardDecision::Denied(DenyReason::GuardRejected { guard }) => {
            assert_eq!(guard.position, 0);
            assert_eq!(guard.pattern, "route:/admin/*");
        }
        other => panic!("Expected GuardRejected, got {:?}", other),
    }

    assert!(engine.evaluate_for(Some(&admin()), &request).await.unwrap().is_allowed());
}

#[tokio::test]
async fn test_any_mode_guard() {
    let engine = engine_with(None);
    let editor = SimpleIdentity::new("user:dana").with_role("editor");
    let request = RequestDescriptor::new("/articles/42");

    assert!(engine.evaluate_for(Some(&editor), &request).await.unwrap().is_allowed());
    assert!(engine.evaluate_for(None, &request).await.unwrap().is_denied());
}

// ============================================================================
// ASSERTIONS
// ============================================================================

#[tokio::test]
async fn test_assertion_refines_grant() {
    let engine = engine_with(Some(admin()));

    let deny = assertion_fn(|_ctx| Ok(false));
    let allow = assertion_fn(|ctx| Ok(ctx.permission == "write" && ctx.roles.contains(&"admin".to_string())));
    let requires_identity = assertion_fn(|ctx| Ok(ctx.identity.is_some()));

    assert!(!engine.is_granted("write", Some(&deny)).await.unwrap());
    assert!(engine.is_granted("write", Some(&allow)).await.unwrap());
    assert!(engine.is_granted("write", Some(&requires_identity)).await.unwrap());
}

#[tokio::test]
async fn test_assertion_skipped_when_role_check_fails() {
    let engine = engine_with(None);
    let exploding = assertion_fn(|_ctx| Err(AssertionError::Failed("should not run".to_string())));

    assert!(!engine.is_granted("write", Some(&exploding)).await.unwrap());
}

#[tokio::test]
async fn test_assertion_error_surfaces() {
    let engine = engine_with(Some(admin()));
    let broken = assertion_fn(|_ctx| Err(AssertionError::InvalidContext("missing article".to_string())));

    let result = engine.is_granted("write", Some(&broken)).await;
    assert!(matches!(result, Err(AuthzError::Assertion(_))));
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[tokio::test]
async fn test_engine_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let config = RbacConfig::from_file(file.path()).unwrap();
    let engine = RbacEngine::from_config(&config, Arc::new(StaticIdentityProvider::anonymous())).unwrap();

    assert_eq!(engine.guards().guards().len(), 3);
    assert!(engine.is_granted_for(Some(&admin()), "write", None).await.unwrap());
}

#[test]
fn test_missing_config_file() {
    let result = RbacConfig::from_file("/nonexistent/rbac.json");
    assert!(matches!(result, Err(AuthzError::Io(_))));
}

#[tokio::test]
async fn test_missing_roles_not_created() {
    let config = RbacConfig::from_json_str(
        r#"{
            "create_missing_roles": false,
            "role_providers": [ { "id": "base", "roles": { "admin": { "parents": ["ghost"] } } } ]
        }"#,
    )
    .unwrap();

    let result = RbacEngine::start(&config, Arc::new(StaticIdentityProvider::anonymous())).await;
    assert!(matches!(result, Err(AuthzError::RoleNotFound(role)) if role == "ghost"));
}

#[tokio::test]
async fn test_engines_sharing_store_keep_own_data() {
    let store = Arc::new(MemoryCacheStore::new());
    let config_for = |permissions: &str| {
        RbacConfig::from_json_str(&format!(
            r#"{{ "role_providers": [ {{ "id": "static", "roles": {{ "member": {{ "permissions": {} }} }} }} ] }}"#,
            permissions
        ))
        .unwrap()
    };

    let reader = RbacEngine::start_with_store(
        &config_for(r#"["read"]"#),
        Arc::new(StaticIdentityProvider::anonymous()),
        Some(store.clone() as Arc<dyn CacheStore>),
    )
    .await
    .unwrap();
    let deleter = RbacEngine::start_with_store(
        &config_for(r#"["read", "delete"]"#),
        Arc::new(StaticIdentityProvider::anonymous()),
        Some(store.clone() as Arc<dyn CacheStore>),
    )
    .await
    .unwrap();

    let member = SimpleIdentity::new("user:bob").with_role("member");
    assert!(!reader.is_granted_for(Some(&member), "delete", None).await.unwrap());
    assert!(deleter.is_granted_for(Some(&member), "delete", None).await.unwrap());

    // Each engine wrote its own entry instead of reading the other's
    assert_eq!(deleter.service().loader_stats().hits, 0);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_force_reload_config() {
    let config = RbacConfig::from_json_str(
        r#"{
            "force_reload": true,
            "role_providers": [ { "id": "base", "roles": { "member": { "permissions": ["read"] } } } ]
        }"#,
    )
    .unwrap();
    let engine = RbacEngine::from_config(&config, Arc::new(StaticIdentityProvider::anonymous())).unwrap();
    let member = SimpleIdentity::new("user:bob").with_role("member");

    for _ in 0..3 {
        assert!(engine.is_granted_for(Some(&member), "read", None).await.unwrap());
    }
    assert_eq!(engine.service().loader_stats().builds, 3);
}

#[tokio::test]
async fn test_identity_trait_object() {
    let engine = engine_with(None);
    let identity: Arc<dyn Identity> = Arc::new(admin());

    assert!(engine
        .is_granted_for(Some(identity.as_ref()), "write", None)
        .await
        .unwrap());
}

// ============================================================================
// PROPERTY-BASED TESTS (PROPTEST)
// ============================================================================

/// Edges only point from a lower to a higher index, so the graph is acyclic
fn acyclic_graph() -> impl Strategy<Value = (usize, Vec<(usize, usize)>, usize)> {
    (2usize..12).prop_flat_map(|size| {
        let edges = proptest::collection::vec((0..size, 0..size), 0..size * 2).prop_map(|pairs| {
            pairs
                .into_iter()
                .filter(|(from, to)| from < to)
                .collect::<Vec<_>>()
        });
        (Just(size), edges, 0..size)
    })
}

fn reachable(edges: &[(usize, usize)], start: usize, target: usize) -> bool {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        if node == target {
            return true;
        }
        if visited.insert(node) {
            queue.extend(edges.iter().filter(|(from, _)| *from == node).map(|(_, to)| *to));
        }
    }
    false
}

proptest! {
    #[test]
    fn test_grant_equals_reachability((size, edges, holder) in acyclic_graph()) {
        let mut dataset = RbacDataset::new();
        for i in 0..size {
            dataset.merge_role(RoleDefinition::new(format!("r{}", i)));
        }
        for (child, parent) in &edges {
            dataset.merge_role(RoleDefinition::new(format!("r{}", child)).with_parent(format!("r{}", parent)));
        }
        dataset.merge_role(RoleDefinition::new(format!("r{}", holder)).with_permission("p"));

        let registry = RoleRegistry::build(&dataset, false).unwrap();

        for start in 0..size {
            let name = format!("r{}", start);
            prop_assert_eq!(
                registry.is_granted(&[name.as_str()], "p"),
                reachable(&edges, start, holder)
            );
        }
    }

    #[test]
    fn test_expansion_terminates_with_cycles(
        edges in proptest::collection::vec((0usize..6, 0usize..6), 0..20)
    ) {
        let mut dataset = RbacDataset::new();
        for (child, parent) in &edges {
            dataset.merge_role(RoleDefinition::new(format!("r{}", child)).with_parent(format!("r{}", parent)));
        }

        let registry = RoleRegistry::build(&dataset, true).unwrap();
        let expanded = registry.expand_roles(&["r0"]);

        let expected: BTreeSet<String> = (0..6)
            .filter(|target| reachable(&edges, 0, *target))
            .map(|target| format!("r{}", target))
            .collect();
        prop_assert_eq!(expanded, expected);
    }
}

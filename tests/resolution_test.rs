mod common;

use accesscontrol_lib::{
    Binding, BindingKind, ErrorKind, GetResourcePermissionsQuery, GetUserPermissionsQuery,
    RequestContext, SignedInUser,
};
use common::{empty_fixture, seeded_fixture};

#[tokio::test]
async fn test_user_permissions_by_role() {
    let fixture = seeded_fixture().await;
    let store = fixture.manager.store();
    let ctx = RequestContext::new();

    let cases: Vec<(&str, GetUserPermissionsQuery, usize)> = vec![
        ("Admin", GetUserPermissionsQuery::all(), 7),
        ("Viewer", GetUserPermissionsQuery::all(), 5),
        ("", GetUserPermissionsQuery::all(), 5),
        ("", GetUserPermissionsQuery::with_actions(["dashboards:write"]), 3),
        ("", GetUserPermissionsQuery::with_actions(["dashboards:read"]), 2),
        ("Admin", GetUserPermissionsQuery::with_actions(["dashboards:read"]), 4),
        ("", GetUserPermissionsQuery::with_actions(Vec::<String>::new()), 0),
    ];

    for (role, query, expected) in cases {
        let user = fixture.signed_in(role).await;
        let permissions = store
            .get_user_permissions(&ctx, fixture.org_id, &user, &query)
            .await
            .unwrap();
        assert_eq!(
            permissions.len(),
            expected,
            "role {:?} with filter {:?}",
            role,
            query.actions
        );
    }
}

#[tokio::test]
async fn test_overlapping_rows_are_not_merged() {
    let fixture = seeded_fixture().await;
    let user = fixture.signed_in("").await;

    let permissions = fixture
        .manager
        .store()
        .get_user_permissions(
            &RequestContext::new(),
            fixture.org_id,
            &user,
            &GetUserPermissionsQuery::all(),
        )
        .await
        .unwrap();

    let shared: Vec<_> = permissions
        .iter()
        .filter(|p| p.resource_id == "2")
        .collect();
    assert_eq!(shared.len(), 2);
    assert!(shared.iter().any(|p| p.binding.kind() == BindingKind::User));
    assert!(shared.iter().any(|p| p.binding.kind() == BindingKind::Team));
}

#[tokio::test]
async fn test_role_inheritance_and_server_admin() {
    let fixture = empty_fixture().await;
    fixture
        .grant(Binding::built_in_role("Viewer"), "10", &["dashboards:read"])
        .await;
    fixture
        .grant(Binding::built_in_role("Editor"), "11", &["dashboards:write"])
        .await;
    fixture
        .grant(Binding::built_in_role("Server Admin"), "12", &["dashboards:delete"])
        .await;

    let store = fixture.manager.store();
    let ctx = RequestContext::new();
    let count = |user: SignedInUser| {
        let store = store.clone();
        let ctx = ctx.clone();
        let org_id = fixture.org_id;
        async move {
            store
                .get_user_permissions(&ctx, org_id, &user, &GetUserPermissionsQuery::all())
                .await
                .unwrap()
                .len()
        }
    };

    assert_eq!(count(fixture.signed_in("Viewer").await).await, 1);
    assert_eq!(count(fixture.signed_in("Editor").await).await, 2);
    assert_eq!(count(fixture.signed_in("Admin").await).await, 2);

    let server_admin = SignedInUser {
        is_server_admin: true,
        ..fixture.signed_in("").await
    };
    assert_eq!(count(server_admin).await, 1);
}

#[tokio::test]
async fn test_unknown_org_or_user_is_not_found() {
    let fixture = seeded_fixture().await;
    let store = fixture.manager.store();
    let ctx = RequestContext::new();
    let user = fixture.signed_in("Admin").await;

    let err = store
        .get_user_permissions(&ctx, 999, &user, &GetUserPermissionsQuery::all())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let stranger = SignedInUser {
        user_id: 999,
        ..user
    };
    let err = store
        .get_user_permissions(&ctx, fixture.org_id, &stranger, &GetUserPermissionsQuery::all())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_permissions_are_scoped_to_org() {
    let fixture = seeded_fixture().await;
    let directory = fixture.manager.directory();
    let other = directory.create_org("org-2").await.unwrap();
    let other_user = directory.create_user(other.id, "user-2", "Admin").await.unwrap();

    let user = directory.signed_in_user(other.id, other_user.id).await.unwrap();
    let permissions = fixture
        .manager
        .store()
        .get_user_permissions(&RequestContext::new(), other.id, &user, &GetUserPermissionsQuery::all())
        .await
        .unwrap();
    assert!(permissions.is_empty());
}

#[tokio::test]
async fn test_resource_permissions_with_inherited_scopes() {
    let fixture = seeded_fixture().await;
    let store = fixture.manager.store();
    let ctx = RequestContext::new();

    let query = GetResourcePermissionsQuery {
        resource: "dashboards".to_string(),
        resource_attribute: "id".to_string(),
        resource_id: "2".to_string(),
        ..Default::default()
    };
    let direct = store
        .get_resource_permissions(&ctx, fixture.org_id, &query)
        .await
        .unwrap();
    assert_eq!(direct.len(), 2);

    let inherited = store
        .get_resource_permissions(
            &ctx,
            fixture.org_id,
            &GetResourcePermissionsQuery {
                inherited_scopes: vec!["dashboards:id:5".to_string()],
                ..query.clone()
            },
        )
        .await
        .unwrap();
    assert_eq!(inherited.len(), 3);

    let writers = store
        .get_resource_permissions(
            &ctx,
            fixture.org_id,
            &GetResourcePermissionsQuery {
                actions: Some(vec!["dashboards:write".to_string()]),
                ..query.clone()
            },
        )
        .await
        .unwrap();
    assert_eq!(writers.len(), 1);
    assert_eq!(writers[0].binding, Binding::user(fixture.user_id));

    let err = store
        .get_resource_permissions(
            &ctx,
            fixture.org_id,
            &GetResourcePermissionsQuery {
                inherited_scopes: vec!["folders".to_string()],
                ..query
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#![allow(dead_code)]

use accesscontrol_lib::{
    Binding, RequestContext, SetResourcePermissionCommand, SignedInUser, StoreConfig, StoreManager,
};
use tempfile::TempDir;

pub struct Fixture {
    _dir: TempDir,
    pub manager: StoreManager,
    pub org_id: i64,
    pub user_id: i64,
    pub team_id: i64,
}

impl Fixture {
    /// The seeded user as a middleware would present them, with `role` as org role.
    pub async fn signed_in(&self, role: &str) -> SignedInUser {
        let user = self
            .manager
            .directory()
            .signed_in_user(self.org_id, self.user_id)
            .await
            .unwrap();
        SignedInUser {
            org_role: role.to_string(),
            ..user
        }
    }

    pub async fn grant(&self, binding: Binding, resource_id: &str, actions: &[&str]) {
        self.manager
            .store()
            .set_resource_permission(
                &RequestContext::new(),
                self.org_id,
                &binding,
                &SetResourcePermissionCommand::new("dashboards", "id", resource_id, actions),
                None,
            )
            .await
            .unwrap();
    }
}

/// Empty store with one org, one user (no org role) and one team the user belongs to.
pub async fn empty_fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let manager = StoreManager::new(StoreConfig::with_db_path(dir.path().join("accesscontrol.db")))
        .await
        .unwrap();

    let directory = manager.directory();
    let org = directory.create_org("org-1").await.unwrap();
    let user = directory.create_user(org.id, "user-1", "").await.unwrap();
    let team = directory.create_team(org.id, "team-1").await.unwrap();
    directory.add_team_member(org.id, team.id, user.id).await.unwrap();

    Fixture {
        _dir: dir,
        manager,
        org_id: org.id,
        user_id: user.id,
        team_id: team.id,
    }
}

/// User rows granting `dashboards:write` on 1, 2 and 10, team rows granting
/// `dashboards:read` on 100 and 2, and `Admin` rows granting `dashboards:read`
/// on 5 and 6.
pub async fn seeded_fixture() -> Fixture {
    let fixture = empty_fixture().await;

    for id in ["1", "2", "10"] {
        fixture
            .grant(Binding::user(fixture.user_id), id, &["dashboards:write"])
            .await;
    }
    for id in ["100", "2"] {
        fixture
            .grant(Binding::team(fixture.team_id), id, &["dashboards:read"])
            .await;
    }
    for id in ["5", "6"] {
        fixture
            .grant(Binding::built_in_role("Admin"), id, &["dashboards:read"])
            .await;
    }

    fixture
}

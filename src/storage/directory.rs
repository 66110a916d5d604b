//! Principal directory
//!
//! Read-only existence checks for organizations, users and teams, answered
//! inside the caller's transaction. The permission store depends only on
//! [`PrincipalDirectory`]; [`SqlDirectory`] answers from the directory tables
//! in the same database and also offers the small set of writes needed to
//! seed them.

use crate::entities::{org, org_user, prelude::*, team, team_member, user};
use crate::error::{AccessControlError, Result};
use crate::roles::BuiltInRole;
use crate::types::SignedInUser;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, info};

#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn org_exists(&self, session: &DatabaseTransaction, org_id: i64) -> Result<bool>;

    async fn user_exists(
        &self,
        session: &DatabaseTransaction,
        org_id: i64,
        user_id: i64,
    ) -> Result<bool>;

    async fn team_exists(
        &self,
        session: &DatabaseTransaction,
        org_id: i64,
        team_id: i64,
    ) -> Result<bool>;
}

/// Directory backed by the `orgs`, `users`, `org_users`, `teams` and `team_members` tables.
#[derive(Debug, Clone)]
pub struct SqlDirectory {
    db: DatabaseConnection,
}

impl SqlDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_org(&self, name: &str) -> Result<org::Model> {
        let model = org::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        let created = model
            .insert(&self.db)
            .await
            .map_err(|e| conflict_or_storage(e, format!("Organization '{}' already exists", name)))?;

        info!("Created organization: id={}, name={}", created.id, name);
        Ok(created)
    }

    /// Create a user and make it a member of `org_id` with `role` (empty for none).
    pub async fn create_user(&self, org_id: i64, login: &str, role: &str) -> Result<user::Model> {
        if !role.is_empty() && BuiltInRole::parse_org_role(role).is_none() {
            return Err(AccessControlError::InvalidArgument(format!(
                "Unknown organization role '{}'",
                role
            )));
        }
        if !org_exists(&self.db, org_id).await? {
            return Err(AccessControlError::NotFound(format!(
                "Organization {} not found",
                org_id
            )));
        }

        let now = chrono::Utc::now();
        let created = user::ActiveModel {
            login: Set(login.to_string()),
            is_server_admin: Set(false),
            created_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| conflict_or_storage(e, format!("User '{}' already exists", login)))?;

        org_user::ActiveModel {
            org_id: Set(org_id),
            user_id: Set(created.id),
            role: Set(role.to_string()),
            created_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(
            "Created user: id={}, login={}, org={}, role={:?}",
            created.id, login, org_id, role
        );
        Ok(created)
    }

    pub async fn set_server_admin(&self, user_id: i64, is_server_admin: bool) -> Result<()> {
        let found = User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AccessControlError::NotFound(format!("User {} not found", user_id)))?;

        let mut active: user::ActiveModel = found.into();
        active.is_server_admin = Set(is_server_admin);
        active.update(&self.db).await?;
        Ok(())
    }

    pub async fn create_team(&self, org_id: i64, name: &str) -> Result<team::Model> {
        if !org_exists(&self.db, org_id).await? {
            return Err(AccessControlError::NotFound(format!(
                "Organization {} not found",
                org_id
            )));
        }

        let created = team::ActiveModel {
            org_id: Set(org_id),
            name: Set(name.to_string()),
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| {
            conflict_or_storage(e, format!("Team '{}' already exists in org {}", name, org_id))
        })?;

        info!("Created team: id={}, name={}, org={}", created.id, name, org_id);
        Ok(created)
    }

    pub async fn add_team_member(&self, org_id: i64, team_id: i64, user_id: i64) -> Result<()> {
        if !team_exists(&self.db, org_id, team_id).await? {
            return Err(AccessControlError::NotFound(format!(
                "Team {} not found in org {}",
                team_id, org_id
            )));
        }
        if !user_exists(&self.db, org_id, user_id).await? {
            return Err(AccessControlError::NotFound(format!(
                "User {} not found in org {}",
                user_id, org_id
            )));
        }

        team_member::ActiveModel {
            org_id: Set(org_id),
            team_id: Set(team_id),
            user_id: Set(user_id),
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| {
            conflict_or_storage(
                e,
                format!("User {} is already a member of team {}", user_id, team_id),
            )
        })?;

        info!("Added user {} to team {} (org {})", user_id, team_id, org_id);
        Ok(())
    }

    /// Build the identity a request middleware would hand to the resolver.
    pub async fn signed_in_user(&self, org_id: i64, user_id: i64) -> Result<SignedInUser> {
        let membership = OrgUser::find()
            .filter(OrgUserColumn::OrgId.eq(org_id))
            .filter(OrgUserColumn::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                AccessControlError::NotFound(format!("User {} not found in org {}", user_id, org_id))
            })?;

        let account = User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AccessControlError::NotFound(format!("User {} not found", user_id)))?;

        let teams = TeamMember::find()
            .filter(TeamMemberColumn::OrgId.eq(org_id))
            .filter(TeamMemberColumn::UserId.eq(user_id))
            .order_by_asc(TeamMemberColumn::TeamId)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.team_id)
            .collect();

        Ok(SignedInUser {
            user_id,
            org_id,
            org_role: membership.role,
            teams,
            is_server_admin: account.is_server_admin,
        })
    }
}

#[async_trait]
impl PrincipalDirectory for SqlDirectory {
    async fn org_exists(&self, session: &DatabaseTransaction, org_id: i64) -> Result<bool> {
        org_exists(session, org_id).await
    }

    async fn user_exists(
        &self,
        session: &DatabaseTransaction,
        org_id: i64,
        user_id: i64,
    ) -> Result<bool> {
        user_exists(session, org_id, user_id).await
    }

    async fn team_exists(
        &self,
        session: &DatabaseTransaction,
        org_id: i64,
        team_id: i64,
    ) -> Result<bool> {
        team_exists(session, org_id, team_id).await
    }
}

async fn org_exists<C: ConnectionTrait>(conn: &C, org_id: i64) -> Result<bool> {
    let count = Org::find()
        .filter(OrgColumn::Id.eq(org_id))
        .count(conn)
        .await?;
    debug!("Org lookup: {} -> {}", org_id, count > 0);
    Ok(count > 0)
}

async fn user_exists<C: ConnectionTrait>(conn: &C, org_id: i64, user_id: i64) -> Result<bool> {
    let count = OrgUser::find()
        .filter(OrgUserColumn::OrgId.eq(org_id))
        .filter(OrgUserColumn::UserId.eq(user_id))
        .count(conn)
        .await?;
    debug!("User lookup: org={} user={} -> {}", org_id, user_id, count > 0);
    Ok(count > 0)
}

async fn team_exists<C: ConnectionTrait>(conn: &C, org_id: i64, team_id: i64) -> Result<bool> {
    let count = Team::find()
        .filter(TeamColumn::OrgId.eq(org_id))
        .filter(TeamColumn::Id.eq(team_id))
        .count(conn)
        .await?;
    debug!("Team lookup: org={} team={} -> {}", org_id, team_id, count > 0);
    Ok(count > 0)
}

fn conflict_or_storage(err: DbErr, conflict: String) -> AccessControlError {
    if err.to_string().contains("UNIQUE constraint failed") {
        AccessControlError::InvalidArgument(conflict)
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::test_support::test_database;
    use sea_orm::TransactionTrait;

    #[tokio::test]
    async fn test_existence_checks() {
        let (_dir, db) = test_database().await;
        let directory = SqlDirectory::new(db.clone());

        let org = directory.create_org("main").await.unwrap();
        let other = directory.create_org("other").await.unwrap();
        let user = directory.create_user(org.id, "alice", "Editor").await.unwrap();
        let team = directory.create_team(org.id, "ops").await.unwrap();

        let session = db.begin().await.unwrap();
        assert!(directory.org_exists(&session, org.id).await.unwrap());
        assert!(!directory.org_exists(&session, 999).await.unwrap());
        assert!(directory.user_exists(&session, org.id, user.id).await.unwrap());
        assert!(!directory.user_exists(&session, other.id, user.id).await.unwrap());
        assert!(directory.team_exists(&session, org.id, team.id).await.unwrap());
        assert!(!directory.team_exists(&session, other.id, team.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_names_are_rejected() {
        let (_dir, db) = test_database().await;
        let directory = SqlDirectory::new(db);

        let org = directory.create_org("main").await.unwrap();
        let err = directory.create_org("main").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        directory.create_team(org.id, "ops").await.unwrap();
        let err = directory.create_team(org.id, "ops").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let (_dir, db) = test_database().await;
        let directory = SqlDirectory::new(db);

        let err = directory.create_user(42, "bob", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let org = directory.create_org("main").await.unwrap();
        let err = directory.create_user(org.id, "bob", "Owner").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_signed_in_user() {
        let (_dir, db) = test_database().await;
        let directory = SqlDirectory::new(db);

        let org = directory.create_org("main").await.unwrap();
        let user = directory.create_user(org.id, "alice", "Admin").await.unwrap();
        let ops = directory.create_team(org.id, "ops").await.unwrap();
        let dev = directory.create_team(org.id, "dev").await.unwrap();
        directory.add_team_member(org.id, dev.id, user.id).await.unwrap();
        directory.add_team_member(org.id, ops.id, user.id).await.unwrap();
        directory.set_server_admin(user.id, true).await.unwrap();

        let signed_in = directory.signed_in_user(org.id, user.id).await.unwrap();
        assert_eq!(signed_in.org_role, "Admin");
        assert_eq!(signed_in.teams, vec![ops.id, dev.id]);
        assert!(signed_in.is_server_admin);

        let err = directory.signed_in_user(org.id, 999).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

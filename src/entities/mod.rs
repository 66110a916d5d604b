//! SeaORM entities
//!
//! Directory tables (`orgs`, `users`, `org_users`, `teams`, `team_members`)
//! and the `permissions` table.

pub mod org;
pub mod org_user;
pub mod permission;
pub mod team;
pub mod team_member;
pub mod user;

/// Prelude module re-exporting entities and their columns
pub mod prelude {
    pub use super::{
        org::Entity as Org,
        org_user::Entity as OrgUser,
        permission::Entity as Permission,
        team::Entity as Team,
        team_member::Entity as TeamMember,
        user::Entity as User,

        org::Column as OrgColumn,
        org_user::Column as OrgUserColumn,
        permission::Column as PermissionColumn,
        team::Column as TeamColumn,
        team_member::Column as TeamMemberColumn,
        user::Column as UserColumn,
    };
}

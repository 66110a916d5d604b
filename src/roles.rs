//! Built-in organization roles and their inheritance table.

use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum BuiltInRole {
    Viewer,
    Editor,
    Admin,
    /// Instance-wide administrator, granted through `SignedInUser::is_server_admin`.
    #[strum(serialize = "Server Admin")]
    #[serde(rename = "Server Admin")]
    ServerAdmin,
}

impl BuiltInRole {
    /// Roles whose grants this role also receives, itself excluded.
    pub fn inherits(self) -> &'static [BuiltInRole] {
        match self {
            BuiltInRole::Admin => &[BuiltInRole::Editor, BuiltInRole::Viewer],
            BuiltInRole::Editor => &[BuiltInRole::Viewer],
            BuiltInRole::Viewer => &[],
            BuiltInRole::ServerAdmin => &[],
        }
    }

    /// The role followed by everything it inherits.
    pub fn with_inherited(self) -> Vec<BuiltInRole> {
        let mut roles = vec![self];
        roles.extend_from_slice(self.inherits());
        roles
    }

    /// Whether this role can be held as an organization role.
    pub fn is_org_role(self) -> bool {
        !matches!(self, BuiltInRole::ServerAdmin)
    }

    /// Parse an organization role; empty or unrecognized names yield `None`.
    pub fn parse_org_role(role: &str) -> Option<BuiltInRole> {
        role.parse::<BuiltInRole>().ok().filter(|r| r.is_org_role())
    }
}

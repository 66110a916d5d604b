//! Principal bindings
//!
//! A [`Binding`] names the principal a permission row belongs to: a single
//! user, a team, or one of the built-in organization roles.

use crate::error::{AccessControlError, Result};
use crate::roles::BuiltInRole;
use serde::{Deserialize, Serialize};

/// Stored discriminant of a binding (`permissions.binding_kind`).
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
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    User,
    Team,
    BuiltInRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Binding {
    User(i64),
    Team(i64),
    BuiltInRole(String),
}

impl Binding {
    pub fn user(user_id: i64) -> Self {
        Binding::User(user_id)
    }

    pub fn team(team_id: i64) -> Self {
        Binding::Team(team_id)
    }

    pub fn built_in_role(role: impl Into<String>) -> Self {
        Binding::BuiltInRole(role.into())
    }

    pub fn kind(&self) -> BindingKind {
        match self {
            Binding::User(_) => BindingKind::User,
            Binding::Team(_) => BindingKind::Team,
            Binding::BuiltInRole(_) => BindingKind::BuiltInRole,
        }
    }

    /// Identifier as stored in `permissions.binding_id`.
    pub fn id(&self) -> String {
        match self {
            Binding::User(id) | Binding::Team(id) => id.to_string(),
            Binding::BuiltInRole(role) => role.clone(),
        }
    }

    /// The `(binding_kind, binding_id)` pair rows are keyed by.
    pub fn storage_key(&self) -> (String, String) {
        (self.kind().to_string(), self.id())
    }

    /// Rebuild a binding from its stored pair.
    pub fn from_storage(kind: &str, id: &str) -> Result<Self> {
        let kind: BindingKind = kind.parse().map_err(|_| {
            AccessControlError::InvalidArgument(format!("Unknown binding kind '{}'", kind))
        })?;

        match kind {
            BindingKind::User | BindingKind::Team => {
                let numeric: i64 = id.parse().map_err(|_| {
                    AccessControlError::InvalidArgument(format!(
                        "Binding id '{}' is not numeric for kind {}",
                        id, kind
                    ))
                })?;
                if kind == BindingKind::User {
                    Ok(Binding::User(numeric))
                } else {
                    Ok(Binding::Team(numeric))
                }
            }
            BindingKind::BuiltInRole => Ok(Binding::BuiltInRole(id.to_string())),
        }
    }

    /// Structural checks that need no storage access.
    pub fn validate(&self) -> Result<()> {
        match self {
            Binding::User(id) | Binding::Team(id) if *id <= 0 => {
                Err(AccessControlError::InvalidArgument(format!(
                    "{} id must be positive, got {}",
                    self.kind(),
                    id
                )))
            }
            Binding::User(_) | Binding::Team(_) => Ok(()),
            Binding::BuiltInRole(role) if role.trim().is_empty() => Err(
                AccessControlError::InvalidArgument("Built-in role name is empty".to_string()),
            ),
            Binding::BuiltInRole(role) => role.parse::<BuiltInRole>().map(|_| ()).map_err(|_| {
                AccessControlError::InvalidArgument(format!("Unknown built-in role '{}'", role))
            }),
        }
    }
}

impl std::fmt::Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_round_trip() {
        let bindings = [
            Binding::user(7),
            Binding::team(3),
            Binding::built_in_role("Editor"),
        ];
        for binding in bindings {
            let (kind, id) = binding.storage_key();
            assert_eq!(Binding::from_storage(&kind, &id).unwrap(), binding);
        }
    }

    #[test]
    fn test_storage_key_values() {
        assert_eq!(
            Binding::user(7).storage_key(),
            ("user".to_string(), "7".to_string())
        );
        assert_eq!(
            Binding::built_in_role("Admin").storage_key(),
            ("built_in_role".to_string(), "Admin".to_string())
        );
    }

    #[test]
    fn test_from_storage_rejects_unknown_kind() {
        assert!(Binding::from_storage("service_account", "1").is_err());
        assert!(Binding::from_storage("team", "abc").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Binding::user(1).validate().is_ok());
        assert!(Binding::user(0).validate().is_err());
        assert!(Binding::team(-4).validate().is_err());
        assert!(Binding::built_in_role("Viewer").validate().is_ok());
        assert!(Binding::built_in_role("Server Admin").validate().is_ok());
        assert!(Binding::built_in_role("").validate().is_err());
        assert!(Binding::built_in_role("Owner").validate().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Binding::team(3).to_string(), "team:3");
    }
}

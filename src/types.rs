use crate::binding::Binding;
use crate::error::{AccessControlError, Result};
use crate::hook::ResourceHook;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

static ACTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]+(:[A-Za-z0-9_.\-*]+)+$").expect("valid action pattern")
});

// ============================================================================
// Commands
// ============================================================================

/// Actions to grant on one resource tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SetResourcePermissionCommand {
    pub actions: Vec<String>,
    pub resource: String,
    pub resource_id: String,
    pub resource_attribute: String,
    /// Human-readable label for the action set, e.g. "Edit".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

impl SetResourcePermissionCommand {
    pub fn new(
        resource: impl Into<String>,
        resource_attribute: impl Into<String>,
        resource_id: impl Into<String>,
        actions: &[&str],
    ) -> Self {
        Self {
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resource: resource.into(),
            resource_id: resource_id.into(),
            resource_attribute: resource_attribute.into(),
            permission: None,
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    /// Reject empty action lists, malformed action names and an incomplete resource tuple.
    pub fn validate(&self) -> Result<()> {
        if self.actions.is_empty() {
            return Err(AccessControlError::InvalidArgument(
                "At least one action is required; use remove_resource_permission to revoke"
                    .to_string(),
            ));
        }
        if let Some(bad) = self.actions.iter().find(|a| !ACTION_PATTERN.is_match(a)) {
            return Err(AccessControlError::InvalidArgument(format!(
                "Malformed action '{}'",
                bad
            )));
        }
        validate_tuple(&self.resource, &self.resource_id, &self.resource_attribute)
    }

    /// Actions sorted and deduplicated.
    pub fn normalized_actions(&self) -> Vec<String> {
        let mut actions = self.actions.clone();
        actions.sort();
        actions.dedup();
        actions
    }
}

pub(crate) fn validate_tuple(resource: &str, resource_id: &str, resource_attribute: &str) -> Result<()> {
    for (field, value) in [
        ("resource", resource),
        ("resource_id", resource_id),
        ("resource_attribute", resource_attribute),
    ] {
        if value.trim().is_empty() {
            return Err(AccessControlError::InvalidArgument(format!(
                "Field '{}' must not be empty",
                field
            )));
        }
    }
    Ok(())
}

/// One item of a batch assignment.
#[derive(Clone)]
pub struct SetResourcePermissionsCommand {
    pub binding: Binding,
    pub command: SetResourcePermissionCommand,
    pub hook: Option<Arc<dyn ResourceHook>>,
}

impl std::fmt::Debug for SetResourcePermissionsCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetResourcePermissionsCommand")
            .field("binding", &self.binding)
            .field("command", &self.command)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

// ============================================================================
// Stored permission
// ============================================================================

/// A set of actions granted to one binding on one resource tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResourcePermission {
    pub id: String,
    pub org_id: i64,
    pub binding: Binding,
    pub resource: String,
    pub resource_id: String,
    pub resource_attribute: String,
    pub actions: Vec<String>,
    pub permission: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl ResourcePermission {
    /// Scope string in `resource:attribute:id` form, e.g. `dashboards:id:1`.
    pub fn scope(&self) -> String {
        build_scope(&self.resource, &self.resource_attribute, &self.resource_id)
    }

    pub fn contains(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }

    pub fn contains_any(&self, actions: &[String]) -> bool {
        actions.iter().any(|a| self.contains(a))
    }
}

pub fn build_scope(resource: &str, resource_attribute: &str, resource_id: &str) -> String {
    format!("{}:{}:{}", resource, resource_attribute, resource_id)
}

/// Split a `resource:attribute:id` scope into `(resource, attribute, id)`.
///
/// The id is everything after the second colon.
pub fn parse_scope(scope: &str) -> Result<(String, String, String)> {
    let mut parts = scope.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(resource), Some(attribute), Some(id)) => {
            validate_tuple(resource, id, attribute)?;
            Ok((resource.to_string(), attribute.to_string(), id.to_string()))
        }
        _ => Err(AccessControlError::InvalidArgument(format!(
            "Malformed scope '{}', expected resource:attribute:id",
            scope
        ))),
    }
}

// ============================================================================
// Signed-in user and queries
// ============================================================================

/// The caller's identity, as resolved by whatever authenticated the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SignedInUser {
    pub user_id: i64,
    pub org_id: i64,
    /// Organization role name; empty when the user holds none.
    #[serde(default)]
    pub org_role: String,
    #[serde(default)]
    pub teams: Vec<i64>,
    #[serde(default)]
    pub is_server_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GetUserPermissionsQuery {
    /// `None` returns everything, `Some(vec![])` returns nothing.
    #[serde(default)]
    pub actions: Option<Vec<String>>,
}

impl GetUserPermissionsQuery {
    pub fn all() -> Self {
        Self { actions: None }
    }

    pub fn with_actions<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: Some(actions.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GetResourcePermissionsQuery {
    #[serde(default)]
    pub actions: Option<Vec<String>>,
    pub resource: String,
    pub resource_id: String,
    pub resource_attribute: String,
    /// Additional scopes whose rows also apply to this resource, e.g. the parent folder.
    #[serde(default)]
    pub inherited_scopes: Vec<String>,
}

//! Binding resolution
//!
//! Expands a signed-in user into every binding whose rows apply to them and
//! narrows resolved rows by action.

use crate::binding::{Binding, BindingKind};
use crate::entities::prelude::PermissionColumn;
use crate::roles::BuiltInRole;
use crate::types::{ResourcePermission, SignedInUser};
use sea_orm::{ColumnTrait, Condition};
use std::collections::BTreeMap;

/// Built-in roles held by `user`, inherited roles included.
///
/// An empty or unrecognized organization role contributes nothing.
pub fn built_in_roles(user: &SignedInUser) -> Vec<BuiltInRole> {
    let mut roles = BuiltInRole::parse_org_role(&user.org_role)
        .map(BuiltInRole::with_inherited)
        .unwrap_or_default();
    if user.is_server_admin {
        roles.push(BuiltInRole::ServerAdmin);
    }
    roles
}

/// The user binding, one binding per team, then the built-in role bindings.
pub fn user_bindings(user: &SignedInUser) -> Vec<Binding> {
    let mut bindings = vec![Binding::user(user.user_id)];
    for team_id in &user.teams {
        let binding = Binding::team(*team_id);
        if !bindings.contains(&binding) {
            bindings.push(binding);
        }
    }
    bindings.extend(
        built_in_roles(user)
            .into_iter()
            .map(|role| Binding::built_in_role(role.to_string())),
    );
    bindings
}

/// Row filter matching any of `bindings`, one `IN` list per binding kind.
pub(crate) fn bindings_condition(bindings: &[Binding]) -> Condition {
    let mut by_kind: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for binding in bindings {
        let (kind, id) = binding.storage_key();
        by_kind.entry(kind).or_default().push(id);
    }

    by_kind
        .into_iter()
        .fold(Condition::any(), |condition, (kind, ids)| {
            condition.add(
                Condition::all()
                    .add(PermissionColumn::BindingKind.eq(kind))
                    .add(PermissionColumn::BindingId.is_in(ids)),
            )
        })
}

/// Keep rows granting at least one of `actions`.
///
/// `None` keeps everything; an empty filter keeps nothing.
pub fn filter_by_actions(
    permissions: Vec<ResourcePermission>,
    actions: Option<&[String]>,
) -> Vec<ResourcePermission> {
    match actions {
        None => permissions,
        Some([]) => Vec::new(),
        Some(actions) => permissions
            .into_iter()
            .filter(|p| p.contains_any(actions))
            .collect(),
    }
}

/// Count rows per binding kind, for log lines and summaries.
pub fn count_by_kind(permissions: &[ResourcePermission]) -> BTreeMap<BindingKind, usize> {
    let mut counts = BTreeMap::new();
    for permission in permissions {
        *counts.entry(permission.binding.kind()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn signed_in(role: &str, teams: Vec<i64>, server_admin: bool) -> SignedInUser {
        SignedInUser {
            user_id: 1,
            org_id: 1,
            org_role: role.to_string(),
            teams,
            is_server_admin: server_admin,
        }
    }

    fn permission(binding: Binding, actions: &[&str]) -> ResourcePermission {
        ResourcePermission {
            id: format!("{}", binding),
            org_id: 1,
            binding,
            resource: "dashboards".to_string(),
            resource_id: "1".to_string(),
            resource_attribute: "id".to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            permission: None,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    #[test]
    fn test_admin_bindings_include_inherited_roles() {
        let bindings = user_bindings(&signed_in("Admin", vec![1, 2], false));
        assert_eq!(
            bindings,
            vec![
                Binding::user(1),
                Binding::team(1),
                Binding::team(2),
                Binding::built_in_role("Admin"),
                Binding::built_in_role("Editor"),
                Binding::built_in_role("Viewer"),
            ]
        );
    }

    #[test]
    fn test_viewer_and_roleless_bindings() {
        let viewer = user_bindings(&signed_in("Viewer", vec![], false));
        assert_eq!(viewer, vec![Binding::user(1), Binding::built_in_role("Viewer")]);

        let none = user_bindings(&signed_in("", vec![3], false));
        assert_eq!(none, vec![Binding::user(1), Binding::team(3)]);

        let unknown = user_bindings(&signed_in("Owner", vec![], false));
        assert_eq!(unknown, vec![Binding::user(1)]);
    }

    #[test]
    fn test_server_admin_binding() {
        let roles = built_in_roles(&signed_in("", vec![], true));
        assert_eq!(roles, vec![BuiltInRole::ServerAdmin]);

        let bindings = user_bindings(&signed_in("Viewer", vec![2, 2], true));
        assert_eq!(
            bindings,
            vec![
                Binding::user(1),
                Binding::team(2),
                Binding::built_in_role("Viewer"),
                Binding::built_in_role("Server Admin"),
            ]
        );
    }

    #[test]
    fn test_filter_by_actions() {
        let rows = vec![
            permission(Binding::user(1), &["dashboards:read", "dashboards:write"]),
            permission(Binding::team(1), &["dashboards:read"]),
            permission(Binding::built_in_role("Admin"), &["dashboards:delete"]),
        ];

        assert_eq!(filter_by_actions(rows.clone(), None).len(), 3);
        assert!(filter_by_actions(rows.clone(), Some(&[])).is_empty());

        let writes = filter_by_actions(rows.clone(), Some(&["dashboards:write".to_string()]));
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].binding, Binding::user(1));

        let either = filter_by_actions(
            rows,
            Some(&["dashboards:delete".to_string(), "dashboards:write".to_string()]),
        );
        assert_eq!(either.len(), 2);
    }

    #[test]
    fn test_count_by_kind() {
        let rows = vec![
            permission(Binding::user(1), &["a:b"]),
            permission(Binding::team(1), &["a:b"]),
            permission(Binding::team(2), &["a:b"]),
        ];
        let counts = count_by_kind(&rows);
        assert_eq!(counts.get(&BindingKind::Team), Some(&2));
        assert_eq!(counts.get(&BindingKind::User), Some(&1));
        assert_eq!(counts.get(&BindingKind::BuiltInRole), None);
    }
}

//! Permission commands: grant, revoke, purge and the two read paths

use super::output::{print_json, print_permissions, success, warning, OutputFormat};
use super::ResourceArgs;
use crate::binding::Binding;
use crate::context::RequestContext;
use crate::storage::StoreManager;
use crate::types::{
    GetResourcePermissionsQuery, GetUserPermissionsQuery, SetResourcePermissionCommand,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// A request context cancelled on Ctrl-C.
fn interruptible_context() -> RequestContext {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight operation");
            child.cancel();
        }
    });
    RequestContext::with_cancellation(token)
}

fn action_filter(actions: Vec<String>) -> Option<Vec<String>> {
    if actions.is_empty() {
        None
    } else {
        Some(actions)
    }
}

pub async fn grant(
    manager: &StoreManager,
    org_id: i64,
    binding: &Binding,
    resource: &ResourceArgs,
    actions: Vec<String>,
    label: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ctx = interruptible_context();
    let cmd = SetResourcePermissionCommand {
        actions,
        resource: resource.resource.clone(),
        resource_id: resource.id.clone(),
        resource_attribute: resource.attribute.clone(),
        permission: label,
    };

    let stored = manager
        .store()
        .set_resource_permission(&ctx, org_id, binding, &cmd, None)
        .await?;

    match format {
        OutputFormat::Json => print_json(&stored),
        OutputFormat::Text => {
            success(&format!(
                "Granted [{}] on {} to {}",
                stored.actions.join(", "),
                stored.scope(),
                stored.binding
            ));
            Ok(())
        }
    }
}

pub async fn revoke(
    manager: &StoreManager,
    org_id: i64,
    binding: &Binding,
    resource: &ResourceArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ctx = interruptible_context();
    let removed = manager
        .store()
        .remove_resource_permission(
            &ctx,
            org_id,
            binding,
            &resource.resource,
            &resource.id,
            &resource.attribute,
            None,
        )
        .await?;

    match (format, removed) {
        (OutputFormat::Json, removed) => print_json(&json!({ "removed": removed })),
        (OutputFormat::Text, Some(permission)) => {
            success(&format!("Revoked {} from {}", permission.scope(), permission.binding));
            Ok(())
        }
        (OutputFormat::Text, None) => {
            warning(&format!("{} holds nothing on that resource", binding));
            Ok(())
        }
    }
}

pub async fn purge(
    manager: &StoreManager,
    org_id: i64,
    binding: &Binding,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ctx = interruptible_context();
    let store = manager.store();
    let deleted = match binding {
        Binding::User(user_id) => store.delete_user_permissions(&ctx, org_id, *user_id, None).await?,
        Binding::Team(team_id) => store.delete_team_permissions(&ctx, org_id, *team_id, None).await?,
        Binding::BuiltInRole(role) => anyhow::bail!("Built-in role '{}' cannot be purged", role),
    };

    match format {
        OutputFormat::Json => print_json(&json!({ "binding": binding, "deleted": deleted })),
        OutputFormat::Text => {
            success(&format!("Deleted {} permission(s) bound to {}", deleted, binding));
            Ok(())
        }
    }
}

pub async fn list(
    manager: &StoreManager,
    org_id: i64,
    user_id: i64,
    actions: Vec<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ctx = interruptible_context();
    let user = manager.directory().signed_in_user(org_id, user_id).await?;
    let query = GetUserPermissionsQuery {
        actions: action_filter(actions),
    };

    let permissions = manager
        .store()
        .get_user_permissions(&ctx, org_id, &user, &query)
        .await?;
    print_permissions(&permissions, format)
}

pub async fn resource(
    manager: &StoreManager,
    org_id: i64,
    resource: &ResourceArgs,
    inherited_scopes: Vec<String>,
    actions: Vec<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let ctx = interruptible_context();
    let query = GetResourcePermissionsQuery {
        actions: action_filter(actions),
        resource: resource.resource.clone(),
        resource_id: resource.id.clone(),
        resource_attribute: resource.attribute.clone(),
        inherited_scopes,
    };

    let permissions = manager
        .store()
        .get_resource_permissions(&ctx, org_id, &query)
        .await?;
    print_permissions(&permissions, format)
}

//! Permission store
//!
//! Persists resource permissions and answers "which rows apply to this
//! user". Every call runs in one transaction covering its directory checks,
//! its reads or writes, and any hook the caller supplies; every call
//! observes the caller's [`RequestContext`].

use crate::binding::{Binding, BindingKind};
use crate::context::RequestContext;
use crate::entities::{permission, prelude::*};
use crate::error::{AccessControlError, Result};
use crate::hook::ResourceHook;
use crate::resolution;
use crate::storage::directory::PrincipalDirectory;
use crate::types::{
    parse_scope, validate_tuple, GetResourcePermissionsQuery, GetUserPermissionsQuery,
    ResourcePermission, SetResourcePermissionCommand, SetResourcePermissionsCommand,
    SignedInUser,
};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Identity of one permission row within an org.
struct RowKey<'a> {
    binding_kind: String,
    binding_id: String,
    resource: &'a str,
    resource_id: &'a str,
    resource_attribute: &'a str,
}

impl<'a> RowKey<'a> {
    fn new(
        binding: &Binding,
        resource: &'a str,
        resource_id: &'a str,
        resource_attribute: &'a str,
    ) -> Self {
        let (binding_kind, binding_id) = binding.storage_key();
        Self {
            binding_kind,
            binding_id,
            resource,
            resource_id,
            resource_attribute,
        }
    }

    fn condition(&self, org_id: i64) -> Condition {
        Condition::all()
            .add(PermissionColumn::OrgId.eq(org_id))
            .add(PermissionColumn::BindingKind.eq(self.binding_kind.as_str()))
            .add(PermissionColumn::BindingId.eq(self.binding_id.as_str()))
            .add(PermissionColumn::Resource.eq(self.resource))
            .add(PermissionColumn::ResourceId.eq(self.resource_id))
            .add(PermissionColumn::ResourceAttribute.eq(self.resource_attribute))
    }
}

/// SeaORM-backed permission store
pub struct AccessControlStore {
    db: DatabaseConnection,
    directory: Arc<dyn PrincipalDirectory>,
}

impl AccessControlStore {
    pub fn new(db: DatabaseConnection, directory: Arc<dyn PrincipalDirectory>) -> Self {
        Self { db, directory }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // ============================================================================
    // Assignment
    // ============================================================================

    /// Replace the actions `binding` holds on the command's resource tuple.
    ///
    /// The row is created on first assignment and overwritten afterwards,
    /// never merged. `hook` sees the stored row inside the same transaction.
    pub async fn set_resource_permission(
        &self,
        ctx: &RequestContext,
        org_id: i64,
        binding: &Binding,
        cmd: &SetResourcePermissionCommand,
        hook: Option<&dyn ResourceHook>,
    ) -> Result<ResourcePermission> {
        binding.validate()?;
        cmd.validate()?;

        ctx.run(async {
            let txn = self.begin().await?;
            self.ensure_org(&txn, org_id).await?;
            self.ensure_principal(&txn, org_id, binding).await?;

            let stored = upsert_permission(&txn, org_id, binding, cmd).await?;
            if let Some(hook) = hook {
                run_hook(hook, HookEvent::Set, ctx, &txn, &stored).await?;
            }

            commit(txn).await?;
            if let Some(hook) = hook {
                hook.on_committed(org_id);
            }

            info!(
                "Permission set: org={}, binding={}, scope={}, actions={:?}",
                org_id,
                binding,
                stored.scope(),
                stored.actions
            );
            Ok(stored)
        })
        .await
    }

    /// Apply several assignments atomically; any failure rolls back all of them.
    pub async fn set_resource_permissions(
        &self,
        ctx: &RequestContext,
        org_id: i64,
        commands: &[SetResourcePermissionsCommand],
    ) -> Result<Vec<ResourcePermission>> {
        for item in commands {
            item.binding.validate()?;
            item.command.validate()?;
        }

        ctx.run(async {
            let txn = self.begin().await?;
            self.ensure_org(&txn, org_id).await?;
            for item in commands {
                self.ensure_principal(&txn, org_id, &item.binding).await?;
            }

            let mut stored = Vec::with_capacity(commands.len());
            for item in commands {
                let permission = upsert_permission(&txn, org_id, &item.binding, &item.command).await?;
                if let Some(hook) = &item.hook {
                    run_hook(hook.as_ref(), HookEvent::Set, ctx, &txn, &permission).await?;
                }
                stored.push(permission);
            }

            commit(txn).await?;
            for hook in commands.iter().filter_map(|item| item.hook.as_ref()) {
                hook.on_committed(org_id);
            }

            info!("Batch permission set: org={}, rows={}", org_id, stored.len());
            Ok(stored)
        })
        .await
    }

    // ============================================================================
    // Revocation
    // ============================================================================

    /// Delete the row `binding` holds on a resource tuple, returning it if it existed.
    ///
    /// `hook` sees the deleted row inside the same transaction.
    pub async fn remove_resource_permission(
        &self,
        ctx: &RequestContext,
        org_id: i64,
        binding: &Binding,
        resource: &str,
        resource_id: &str,
        resource_attribute: &str,
        hook: Option<&dyn ResourceHook>,
    ) -> Result<Option<ResourcePermission>> {
        binding.validate()?;
        validate_tuple(resource, resource_id, resource_attribute)?;
        let key = RowKey::new(binding, resource, resource_id, resource_attribute);

        ctx.run(async {
            let txn = self.begin().await?;
            self.ensure_org(&txn, org_id).await?;

            let existing = Permission::find()
                .filter(key.condition(org_id))
                .one(&txn)
                .await?;

            let removed = match existing {
                Some(model) => {
                    let permission = ResourcePermission::try_from(model.clone())?;
                    model.delete(&txn).await?;
                    if let Some(hook) = hook {
                        run_hook(hook, HookEvent::Removed, ctx, &txn, &permission).await?;
                    }
                    Some(permission)
                }
                None => None,
            };

            commit(txn).await?;
            if let (Some(hook), Some(_)) = (hook, &removed) {
                hook.on_committed(org_id);
            }

            match &removed {
                Some(permission) => info!(
                    "Permission removed: org={}, binding={}, scope={}",
                    org_id,
                    binding,
                    permission.scope()
                ),
                None => debug!(
                    "No permission to remove: org={}, binding={}, resource={}:{}:{}",
                    org_id, binding, resource, resource_attribute, resource_id
                ),
            }
            Ok(removed)
        })
        .await
    }

    /// Delete every row bound to `user_id` in `org_id`.
    pub async fn delete_user_permissions(
        &self,
        ctx: &RequestContext,
        org_id: i64,
        user_id: i64,
        hook: Option<&dyn ResourceHook>,
    ) -> Result<u64> {
        self.delete_binding_permissions(ctx, org_id, &Binding::user(user_id), hook)
            .await
    }

    /// Delete every row bound to `team_id` in `org_id`.
    pub async fn delete_team_permissions(
        &self,
        ctx: &RequestContext,
        org_id: i64,
        team_id: i64,
        hook: Option<&dyn ResourceHook>,
    ) -> Result<u64> {
        self.delete_binding_permissions(ctx, org_id, &Binding::team(team_id), hook)
            .await
    }

    async fn delete_binding_permissions(
        &self,
        ctx: &RequestContext,
        org_id: i64,
        binding: &Binding,
        hook: Option<&dyn ResourceHook>,
    ) -> Result<u64> {
        binding.validate()?;
        let (binding_kind, binding_id) = binding.storage_key();
        let condition = Condition::all()
            .add(PermissionColumn::OrgId.eq(org_id))
            .add(PermissionColumn::BindingKind.eq(binding_kind.as_str()))
            .add(PermissionColumn::BindingId.eq(binding_id.as_str()));

        ctx.run(async {
            let txn = self.begin().await?;
            self.ensure_org(&txn, org_id).await?;

            let rows = Permission::find()
                .filter(condition.clone())
                .order_by_asc(PermissionColumn::Id)
                .all(&txn)
                .await?;
            let result = Permission::delete_many()
                .filter(condition)
                .exec(&txn)
                .await?;

            if let Some(hook) = hook {
                for row in rows {
                    let permission = ResourcePermission::try_from(row)?;
                    run_hook(hook, HookEvent::Removed, ctx, &txn, &permission).await?;
                }
            }

            commit(txn).await?;
            if let Some(hook) = hook {
                if result.rows_affected > 0 {
                    hook.on_committed(org_id);
                }
            }

            info!(
                "Deleted permissions: org={}, binding={}, rows={}",
                org_id, binding, result.rows_affected
            );
            Ok(result.rows_affected)
        })
        .await
    }

    // ============================================================================
    // Resolution
    // ============================================================================

    /// Every row that applies to `user` in `org_id`, narrowed by `query.actions`.
    ///
    /// Rows bound to the user, to any of their teams, and to each built-in
    /// role they hold (inherited roles included) are returned as stored.
    pub async fn get_user_permissions(
        &self,
        ctx: &RequestContext,
        org_id: i64,
        user: &SignedInUser,
        query: &GetUserPermissionsQuery,
    ) -> Result<Vec<ResourcePermission>> {
        ctx.run(async {
            let txn = self.begin().await?;
            self.ensure_org(&txn, org_id).await?;
            if !self.directory.user_exists(&txn, org_id, user.user_id).await? {
                return Err(AccessControlError::NotFound(format!(
                    "User {} not found in org {}",
                    user.user_id, org_id
                )));
            }

            if matches!(query.actions.as_deref(), Some([])) {
                debug!("Empty action filter, skipping lookup: org={}, user={}", org_id, user.user_id);
                return Ok(Vec::new());
            }

            let bindings = resolution::user_bindings(user);
            let rows = Permission::find()
                .filter(PermissionColumn::OrgId.eq(org_id))
                .filter(resolution::bindings_condition(&bindings))
                .order_by_asc(PermissionColumn::Resource)
                .order_by_asc(PermissionColumn::ResourceId)
                .order_by_asc(PermissionColumn::Id)
                .all(&txn)
                .await?;
            commit(txn).await?;

            let permissions = rows
                .into_iter()
                .map(ResourcePermission::try_from)
                .collect::<Result<Vec<_>>>()?;
            let permissions = resolution::filter_by_actions(permissions, query.actions.as_deref());

            debug!(
                "Resolved permissions: org={}, user={}, bindings={}, rows={}, by_kind={:?}",
                org_id,
                user.user_id,
                bindings.len(),
                permissions.len(),
                resolution::count_by_kind(&permissions)
            );
            Ok(permissions)
        })
        .await
    }

    /// Rows on one resource tuple plus rows on any of `query.inherited_scopes`.
    pub async fn get_resource_permissions(
        &self,
        ctx: &RequestContext,
        org_id: i64,
        query: &GetResourcePermissionsQuery,
    ) -> Result<Vec<ResourcePermission>> {
        validate_tuple(&query.resource, &query.resource_id, &query.resource_attribute)?;
        let inherited = query
            .inherited_scopes
            .iter()
            .map(|scope| parse_scope(scope))
            .collect::<Result<Vec<_>>>()?;

        ctx.run(async {
            let txn = self.begin().await?;
            self.ensure_org(&txn, org_id).await?;

            if matches!(query.actions.as_deref(), Some([])) {
                return Ok(Vec::new());
            }

            let scopes = std::iter::once((
                query.resource.as_str(),
                query.resource_attribute.as_str(),
                query.resource_id.as_str(),
            ))
            .chain(
                inherited
                    .iter()
                    .map(|(r, a, id)| (r.as_str(), a.as_str(), id.as_str())),
            );
            let scope_condition = scopes.fold(Condition::any(), |condition, (resource, attribute, id)| {
                condition.add(
                    Condition::all()
                        .add(PermissionColumn::Resource.eq(resource))
                        .add(PermissionColumn::ResourceAttribute.eq(attribute))
                        .add(PermissionColumn::ResourceId.eq(id)),
                )
            });

            let rows = Permission::find()
                .filter(PermissionColumn::OrgId.eq(org_id))
                .filter(scope_condition)
                .order_by_asc(PermissionColumn::BindingKind)
                .order_by_asc(PermissionColumn::BindingId)
                .order_by_asc(PermissionColumn::Id)
                .all(&txn)
                .await?;
            commit(txn).await?;

            let permissions = rows
                .into_iter()
                .map(ResourcePermission::try_from)
                .collect::<Result<Vec<_>>>()?;
            let permissions = resolution::filter_by_actions(permissions, query.actions.as_deref());

            debug!(
                "Resource permissions: org={}, scope={}:{}:{}, inherited={}, rows={}",
                org_id,
                query.resource,
                query.resource_attribute,
                query.resource_id,
                inherited.len(),
                permissions.len()
            );
            Ok(permissions)
        })
        .await
    }

    // ============================================================================
    // Statistics
    // ============================================================================

    /// Row counts keyed by binding kind, plus `total`.
    pub async fn stats(&self, org_id: Option<i64>) -> Result<HashMap<String, i64>> {
        let mut stats = HashMap::new();
        let mut total = 0;

        for kind in [BindingKind::User, BindingKind::Team, BindingKind::BuiltInRole] {
            let mut select = Permission::find().filter(PermissionColumn::BindingKind.eq(kind.to_string()));
            if let Some(org_id) = org_id {
                select = select.filter(PermissionColumn::OrgId.eq(org_id));
            }
            let count = select
                .count(&self.db)
                .await
                .map_err(|e| AccessControlError::storage("Failed to count permissions", e))?
                as i64;
            total += count;
            stats.insert(kind.to_string(), count);
        }

        stats.insert("total".to_string(), total);
        Ok(stats)
    }

    async fn begin(&self) -> Result<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AccessControlError::storage("Failed to begin transaction", e))
    }

    async fn ensure_org(&self, txn: &DatabaseTransaction, org_id: i64) -> Result<()> {
        if !self.directory.org_exists(txn, org_id).await? {
            return Err(AccessControlError::NotFound(format!(
                "Organization {} not found",
                org_id
            )));
        }
        Ok(())
    }

    async fn ensure_principal(
        &self,
        txn: &DatabaseTransaction,
        org_id: i64,
        binding: &Binding,
    ) -> Result<()> {
        let exists = match binding {
            Binding::User(user_id) => self.directory.user_exists(txn, org_id, *user_id).await?,
            Binding::Team(team_id) => self.directory.team_exists(txn, org_id, *team_id).await?,
            Binding::BuiltInRole(_) => true,
        };
        if !exists {
            return Err(AccessControlError::NotFound(format!(
                "{} {} not found in org {}",
                binding.kind(),
                binding.id(),
                org_id
            )));
        }
        Ok(())
    }
}

/// Insert or overwrite the row for `(org, binding, tuple)` and read it back.
async fn upsert_permission<C: ConnectionTrait>(
    conn: &C,
    org_id: i64,
    binding: &Binding,
    cmd: &SetResourcePermissionCommand,
) -> Result<ResourcePermission> {
    let key = RowKey::new(binding, &cmd.resource, &cmd.resource_id, &cmd.resource_attribute);
    let actions = permission::Model::encode_actions(&cmd.normalized_actions())?;
    let now = chrono::Utc::now();

    let row = permission::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        org_id: Set(org_id),
        binding_kind: Set(key.binding_kind.clone()),
        binding_id: Set(key.binding_id.clone()),
        resource: Set(cmd.resource.clone()),
        resource_id: Set(cmd.resource_id.clone()),
        resource_attribute: Set(cmd.resource_attribute.clone()),
        actions: Set(actions),
        permission: Set(cmd.permission.clone()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    Permission::insert(row)
        .on_conflict(
            OnConflict::columns([
                PermissionColumn::OrgId,
                PermissionColumn::BindingKind,
                PermissionColumn::BindingId,
                PermissionColumn::Resource,
                PermissionColumn::ResourceId,
                PermissionColumn::ResourceAttribute,
            ])
            .update_columns([
                PermissionColumn::Actions,
                PermissionColumn::Permission,
                PermissionColumn::UpdatedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(|e| AccessControlError::storage("Failed to upsert permission", e))?;

    let stored = Permission::find()
        .filter(key.condition(org_id))
        .one(conn)
        .await?
        .ok_or_else(|| {
            AccessControlError::Storage(format!(
                "Permission row missing after upsert: org={}, binding={}",
                org_id, binding
            ))
        })?;

    ResourcePermission::try_from(stored)
}

async fn commit(txn: DatabaseTransaction) -> Result<()> {
    txn.commit()
        .await
        .map_err(|e| AccessControlError::storage("Failed to commit transaction", e))
}

#[derive(Debug, Clone, Copy)]
enum HookEvent {
    Set,
    Removed,
}

async fn run_hook(
    hook: &dyn ResourceHook,
    event: HookEvent,
    ctx: &RequestContext,
    txn: &DatabaseTransaction,
    permission: &ResourcePermission,
) -> Result<()> {
    let result = match event {
        HookEvent::Set => hook.on_permission_set(ctx, txn, permission).await,
        HookEvent::Removed => hook.on_permission_removed(ctx, txn, permission).await,
    };
    result.map_err(|e| match e {
        AccessControlError::Cancelled => AccessControlError::Cancelled,
        other => AccessControlError::Storage(format!(
            "Hook failed for {}: {}",
            permission.scope(),
            other
        )),
    })
}

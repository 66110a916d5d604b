//! Permission write hooks
//!
//! `on_permission_set` and `on_permission_removed` run inside the write's
//! transaction, after the row has been written or deleted and before
//! commit. Returning an error rolls the write back. `on_committed` runs
//! once the transaction has committed.

use crate::context::RequestContext;
use crate::error::Result;
use crate::types::ResourcePermission;
use async_trait::async_trait;
use sea_orm::DatabaseTransaction;

#[async_trait]
pub trait ResourceHook: Send + Sync {
    /// `session` is the open assignment transaction; writes made through it
    /// commit or roll back together with the permission row.
    async fn on_permission_set(
        &self,
        ctx: &RequestContext,
        session: &DatabaseTransaction,
        permission: &ResourcePermission,
    ) -> Result<()>;

    /// Called for each row a revocation deletes, inside its transaction.
    async fn on_permission_removed(
        &self,
        _ctx: &RequestContext,
        _session: &DatabaseTransaction,
        _permission: &ResourcePermission,
    ) -> Result<()> {
        Ok(())
    }

    /// Called after a write touching `org_id` has committed.
    fn on_committed(&self, _org_id: i64) {}
}

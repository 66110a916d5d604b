//! Resolved-permission cache
//!
//! Memoizes the unfiltered result of `get_user_permissions` per signed-in
//! identity and applies the action filter on read. Entries for an org are
//! dropped by [`CacheInvalidationHook`] whenever a permission in that org is
//! assigned or removed, or explicitly through
//! [`PermissionCache::invalidate_org`].
//!
//! Each org carries a generation that every invalidation bumps. A lookup
//! only stores its result if the generation it started under is still
//! current.

use crate::context::RequestContext;
use crate::error::Result;
use crate::hook::ResourceHook;
use crate::resolution;
use crate::storage::AccessControlStore;
use crate::types::{GetUserPermissionsQuery, ResourcePermission, SignedInUser};
use async_trait::async_trait;
use dashmap::DashMap;
use sea_orm::DatabaseTransaction;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    org_id: i64,
    user_id: i64,
    org_role: String,
    teams: Vec<i64>,
    is_server_admin: bool,
}

impl CacheKey {
    fn new(org_id: i64, user: &SignedInUser) -> Self {
        let mut teams = user.teams.clone();
        teams.sort_unstable();
        teams.dedup();
        Self {
            org_id,
            user_id: user.user_id,
            org_role: user.org_role.clone(),
            teams,
            is_server_admin: user.is_server_admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct PermissionCache {
    entries: DashMap<CacheKey, Arc<Vec<ResourcePermission>>>,
    generations: DashMap<i64, u64>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached equivalent of [`AccessControlStore::get_user_permissions`].
    pub async fn get_user_permissions(
        &self,
        ctx: &RequestContext,
        store: &AccessControlStore,
        org_id: i64,
        user: &SignedInUser,
        query: &GetUserPermissionsQuery,
    ) -> Result<Vec<ResourcePermission>> {
        let key = CacheKey::new(org_id, user);

        // No shard lock may be held across the await below.
        let cached = self.entries.get(&key).map(|entry| entry.value().clone());
        let resolved = match cached {
            Some(resolved) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                resolved
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let generation = self.generation(org_id);
                let resolved = Arc::new(
                    store
                        .get_user_permissions(ctx, org_id, user, &GetUserPermissionsQuery::all())
                        .await?,
                );
                if self.store_if_current(key, generation, resolved.clone()) {
                    debug!(
                        "Cached permissions: org={}, user={}, rows={}",
                        org_id,
                        user.user_id,
                        resolved.len()
                    );
                } else {
                    debug!(
                        "Org {} invalidated during lookup, not caching user {}",
                        org_id, user.user_id
                    );
                }
                resolved
            }
        };

        Ok(resolution::filter_by_actions(
            resolved.to_vec(),
            query.actions.as_deref(),
        ))
    }

    fn generation(&self, org_id: i64) -> u64 {
        *self.generations.entry(org_id).or_insert(0)
    }

    /// Insert `resolved` unless the org was invalidated after `generation` was read.
    fn store_if_current(
        &self,
        key: CacheKey,
        generation: u64,
        resolved: Arc<Vec<ResourcePermission>>,
    ) -> bool {
        // Held across the insert so an invalidation cannot interleave.
        let current = self.generations.entry(key.org_id).or_insert(0);
        if *current != generation {
            return false;
        }
        self.entries.insert(key, resolved);
        true
    }

    fn bump(&self, org_id: i64) {
        *self.generations.entry(org_id).or_insert(0) += 1;
    }

    pub fn invalidate_org(&self, org_id: i64) {
        self.bump(org_id);
        self.entries.retain(|key, _| key.org_id != org_id);
        debug!("Invalidated cached permissions for org {}", org_id);
    }

    pub fn invalidate_user(&self, org_id: i64, user_id: i64) {
        self.bump(org_id);
        self.entries
            .retain(|key, _| !(key.org_id == org_id && key.user_id == user_id));
    }

    pub fn clear(&self) {
        self.generations.iter_mut().for_each(|mut generation| *generation += 1);
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Drops an org's cache entries when a permission in that org is assigned
/// or removed, and again once the write has committed.
#[derive(Debug, Clone)]
pub struct CacheInvalidationHook {
    cache: Arc<PermissionCache>,
}

impl CacheInvalidationHook {
    pub fn new(cache: Arc<PermissionCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ResourceHook for CacheInvalidationHook {
    async fn on_permission_set(
        &self,
        _ctx: &RequestContext,
        _session: &DatabaseTransaction,
        permission: &ResourcePermission,
    ) -> Result<()> {
        self.cache.invalidate_org(permission.org_id);
        Ok(())
    }

    async fn on_permission_removed(
        &self,
        _ctx: &RequestContext,
        _session: &DatabaseTransaction,
        permission: &ResourcePermission,
    ) -> Result<()> {
        self.cache.invalidate_org(permission.org_id);
        Ok(())
    }

    fn on_committed(&self, org_id: i64) {
        self.cache.invalidate_org(org_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(teams: Vec<i64>) -> SignedInUser {
        SignedInUser {
            user_id: 7,
            org_id: 1,
            org_role: "Editor".to_string(),
            teams,
            is_server_admin: false,
        }
    }

    #[test]
    fn test_key_ignores_team_order() {
        assert_eq!(CacheKey::new(1, &user(vec![3, 1, 3])), CacheKey::new(1, &user(vec![1, 3])));
        assert_ne!(CacheKey::new(1, &user(vec![1])), CacheKey::new(2, &user(vec![1])));
    }

    #[test]
    fn test_invalidation_is_scoped() {
        let cache = PermissionCache::new();
        cache.entries.insert(CacheKey::new(1, &user(vec![])), Arc::new(Vec::new()));
        cache.entries.insert(CacheKey::new(2, &user(vec![])), Arc::new(Vec::new()));
        cache.entries.insert(
            CacheKey::new(2, &SignedInUser { user_id: 8, ..user(vec![]) }),
            Arc::new(Vec::new()),
        );

        cache.invalidate_user(2, 8);
        assert_eq!(cache.len(), 2);

        cache.invalidate_org(1);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lookup_started_before_invalidation_is_not_stored() {
        let cache = PermissionCache::new();
        let key = CacheKey::new(1, &user(vec![]));

        let generation = cache.generation(1);
        cache.invalidate_org(1);
        assert!(!cache.store_if_current(key.clone(), generation, Arc::new(Vec::new())));
        assert!(cache.is_empty());

        let generation = cache.generation(1);
        assert!(cache.store_if_current(key.clone(), generation, Arc::new(Vec::new())));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(!cache.store_if_current(key, generation, Arc::new(Vec::new())));
    }
}

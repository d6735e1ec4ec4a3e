use std::sync::Arc;

use moss_core::{AppError, AppResult};
use moss_domain::{LocationId, ObjectId, ObjectType, PermissionAction, PersonId, RoleId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::AuthorizationStores;

mod cache;
mod decision;
mod invalidation;
mod resolver;

pub use cache::{
    DEFAULT_PERMISSION_CACHE_MAX_ENTRIES, DEFAULT_PERMISSION_CACHE_TTL, PermissionCache,
    PermissionCacheConfig,
};
pub use decision::{PermissionCheck, PermissionDecision};
pub(crate) use invalidation::MutationScope;
pub use resolver::{AssignedRolePermissions, EffectivePermission, PrincipalPermissions};

use resolver::PermissionResolver;

/// Application service answering permission checks for people.
///
/// Owns the permission cache. Cache fills hold the read side of the
/// consistency gate across lookup, resolution and insert; mutations hold the
/// write side across their store write and the matching invalidation.
#[derive(Clone)]
pub struct AuthorizationService {
    stores: AuthorizationStores,
    cache: Arc<PermissionCache>,
    consistency_gate: Arc<RwLock<()>>,
}

impl AuthorizationService {
    /// Creates a new authorization service over the given stores.
    #[must_use]
    pub fn new(stores: AuthorizationStores, cache_config: PermissionCacheConfig) -> Self {
        Self {
            stores,
            cache: Arc::new(PermissionCache::new(cache_config)),
            consistency_gate: Arc::new(RwLock::new(())),
        }
    }

    /// Returns the stores this service resolves against.
    #[must_use]
    pub fn stores(&self) -> &AuthorizationStores {
        &self.stores
    }

    /// Returns whether the person may perform the action.
    pub async fn has_permission(
        &self,
        person_id: PersonId,
        object_type: ObjectType,
        action: PermissionAction,
        object_id: Option<ObjectId>,
    ) -> AppResult<bool> {
        let mut check = PermissionCheck::new(object_type, action);
        check.object_id = object_id;

        Ok(self.check_permission(person_id, &check).await?.granted)
    }

    /// Returns whether the person may perform the action on an object at a
    /// known location.
    pub async fn has_permission_at_location(
        &self,
        person_id: PersonId,
        object_type: ObjectType,
        action: PermissionAction,
        object_id: Option<ObjectId>,
        location_id: LocationId,
    ) -> AppResult<bool> {
        let mut check = PermissionCheck::new(object_type, action).at_location(location_id);
        check.object_id = object_id;

        Ok(self.check_permission(person_id, &check).await?.granted)
    }

    /// Answers a check with its explanation, using the cache.
    pub async fn check_permission(
        &self,
        person_id: PersonId,
        check: &PermissionCheck,
    ) -> AppResult<PermissionDecision> {
        let permissions = self.principal_permissions(person_id).await?;
        Ok(permissions.evaluate(check))
    }

    /// Answers a check from freshly loaded state, bypassing the cache.
    pub async fn check_permission_uncached(
        &self,
        person_id: PersonId,
        check: &PermissionCheck,
    ) -> AppResult<PermissionDecision> {
        let permissions = PermissionResolver::new(&self.stores)
            .resolve(person_id)
            .await?;
        Ok(permissions.evaluate(check))
    }

    /// Ensures the person may perform the checked action.
    pub async fn require_permission(
        &self,
        person_id: PersonId,
        check: &PermissionCheck,
    ) -> AppResult<()> {
        let decision = self.check_permission(person_id, check).await?;
        if decision.granted {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "person '{person_id}' is missing permission '{} {}': {}",
            check.action, check.object_type, decision.reason
        )))
    }

    /// Returns the resolved snapshot for a person, filling the cache on miss.
    pub async fn principal_permissions(
        &self,
        person_id: PersonId,
    ) -> AppResult<Arc<PrincipalPermissions>> {
        let _gate = self.consistency_gate.read().await;

        if let Some(cached) = self.cache.get(person_id) {
            debug!(%person_id, "permission cache hit");
            return Ok(cached);
        }

        debug!(%person_id, "permission cache miss");
        let generation = self.cache.generation();
        let resolved = Arc::new(
            PermissionResolver::new(&self.stores)
                .resolve(person_id)
                .await?,
        );
        self.cache.insert(person_id, resolved.clone(), generation);

        Ok(resolved)
    }

    /// Lists every grant reachable from a role through its ancestors.
    pub async fn effective_role_permissions(
        &self,
        role_id: RoleId,
    ) -> AppResult<Vec<EffectivePermission>> {
        PermissionResolver::new(&self.stores)
            .effective_role_permissions(role_id)
            .await
    }

    /// Returns whether re-parenting the role would close a loop.
    pub async fn would_create_cycle(
        &self,
        role_id: RoleId,
        candidate_parent_id: Option<RoleId>,
    ) -> AppResult<bool> {
        let hierarchy = PermissionResolver::new(&self.stores)
            .load_hierarchy()
            .await?;
        Ok(hierarchy.would_create_cycle(role_id, candidate_parent_id))
    }

    /// Returns the number of cached person snapshots.
    #[must_use]
    pub fn cached_principal_count(&self) -> usize {
        self.cache.len()
    }
}

use std::collections::BTreeSet;

use moss_core::AppResult;
use moss_domain::{GroupId, PersonId, RoleHierarchy, RoleId, Subject};
use tokio::sync::RwLockWriteGuard;
use tracing::{debug, warn};

use crate::AuthorizationStores;

use super::{AuthorizationService, PermissionResolver};

impl AuthorizationService {
    /// Drops the cached snapshot of one person.
    pub async fn invalidate_user_cache(&self, person_id: PersonId) {
        self.begin_mutation().await.invalidate_person(person_id);
    }

    /// Drops the snapshots of everyone holding the role or any role below it,
    /// directly or through a group. Returns the number of dropped entries.
    pub async fn invalidate_role_cache(&self, role_id: RoleId) -> usize {
        self.begin_mutation().await.invalidate_role(role_id).await
    }

    /// Drops the snapshots of every current member of the group.
    pub async fn invalidate_group_cache(&self, group_id: GroupId) -> usize {
        self.begin_mutation()
            .await
            .invalidate_subject(Subject::Group(group_id))
            .await
    }

    /// Drops every cached snapshot.
    pub async fn clear_cache(&self) {
        self.begin_mutation().await.clear();
    }

    /// Opens a mutation scope that blocks cache fills until dropped.
    pub(crate) async fn begin_mutation(&self) -> MutationScope<'_> {
        MutationScope {
            service: self,
            _gate: self.consistency_gate.write().await,
        }
    }
}

/// Exclusive window for a store write and its cache invalidation.
///
/// Invalidation never fails: when the affected people cannot be determined,
/// the whole cache is cleared instead.
pub(crate) struct MutationScope<'a> {
    service: &'a AuthorizationService,
    _gate: RwLockWriteGuard<'a, ()>,
}

impl MutationScope<'_> {
    pub(crate) fn stores(&self) -> &AuthorizationStores {
        &self.service.stores
    }

    pub(crate) async fn load_hierarchy(&self) -> AppResult<RoleHierarchy> {
        PermissionResolver::new(self.stores()).load_hierarchy().await
    }

    pub(crate) fn invalidate_person(&self, person_id: PersonId) -> usize {
        self.invalidate_persons(&BTreeSet::from([person_id]))
    }

    pub(crate) fn invalidate_persons(&self, person_ids: &BTreeSet<PersonId>) -> usize {
        let dropped = self.service.cache.invalidate(person_ids);
        debug!(
            affected = person_ids.len(),
            dropped, "permission cache entries invalidated"
        );
        dropped
    }

    /// Invalidates the person, or every current member of the group.
    pub(crate) async fn invalidate_subject(&self, subject: Subject) -> usize {
        let affected = self.persons_for_subject(subject).await;
        self.invalidate_collected(affected, &subject.to_string())
    }

    /// Invalidates everyone holding the role or a descendant of it.
    pub(crate) async fn invalidate_role(&self, role_id: RoleId) -> usize {
        let affected = self.persons_holding_role(role_id).await;
        self.invalidate_collected(affected, &format!("role:{role_id}"))
    }

    /// Invalidates people collected before a write, clearing the whole cache
    /// when collection failed.
    pub(crate) fn invalidate_collected(
        &self,
        affected: AppResult<BTreeSet<PersonId>>,
        target: &str,
    ) -> usize {
        match affected {
            Ok(person_ids) => self.invalidate_persons(&person_ids),
            Err(error) => {
                warn!(%target, %error, "could not resolve affected people; clearing permission cache");
                let dropped = self.service.cache.len();
                self.service.cache.clear();
                dropped
            }
        }
    }

    pub(crate) fn clear(&self) {
        self.service.cache.clear();
        debug!("permission cache cleared");
    }

    pub(crate) async fn persons_for_subject(
        &self,
        subject: Subject,
    ) -> AppResult<BTreeSet<PersonId>> {
        match subject {
            Subject::Person(person_id) => Ok(BTreeSet::from([person_id])),
            Subject::Group(group_id) => Ok(self
                .stores()
                .groups
                .list_group_members(group_id)
                .await?
                .into_iter()
                .collect()),
        }
    }

    /// Collects everyone affected by a change to the role. Must run before a
    /// role delete, while its assignments still exist.
    pub(crate) async fn persons_holding_role(
        &self,
        role_id: RoleId,
    ) -> AppResult<BTreeSet<PersonId>> {
        let hierarchy = self.load_hierarchy().await?;
        let role_ids = hierarchy.descendants(role_id).into_iter().collect::<Vec<_>>();
        let assignments = self
            .stores()
            .assignments
            .list_assignments_for_roles(&role_ids)
            .await?;

        let subjects = assignments
            .into_iter()
            .map(|assignment| assignment.subject)
            .collect::<BTreeSet<_>>();
        let mut person_ids = BTreeSet::new();
        for subject in subjects {
            person_ids.extend(self.persons_for_subject(subject).await?);
        }

        Ok(person_ids)
    }
}

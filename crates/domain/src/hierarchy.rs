//! Parent-pointer role tree with bounded traversal.
//!
//! Roles are kept as an id-indexed map of parent pointers. Every walk is a
//! loop bounded by the number of known roles and guarded against revisits,
//! so a corrupt stored loop can never hang a traversal.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use moss_core::{AppError, AppResult};

use crate::{Role, RoleId};

/// Snapshot of the role tree used by the cycle guard and by resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleHierarchy {
    parents: HashMap<RoleId, Option<RoleId>>,
}

impl RoleHierarchy {
    /// Creates an empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a hierarchy from `(role, parent)` edges.
    #[must_use]
    pub fn from_edges(edges: impl IntoIterator<Item = (RoleId, Option<RoleId>)>) -> Self {
        Self {
            parents: edges.into_iter().collect(),
        }
    }

    /// Builds a hierarchy from role records.
    #[must_use]
    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a Role>) -> Self {
        Self::from_edges(
            roles
                .into_iter()
                .map(|role| (role.id(), role.parent_role_id())),
        )
    }

    /// Inserts or replaces the parent pointer of a role.
    pub fn insert(&mut self, role_id: RoleId, parent_role_id: Option<RoleId>) {
        self.parents.insert(role_id, parent_role_id);
    }

    /// Returns whether the role is known.
    #[must_use]
    pub fn contains(&self, role_id: RoleId) -> bool {
        self.parents.contains_key(&role_id)
    }

    /// Returns the number of known roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns whether no roles are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns the parent of a role, if any.
    #[must_use]
    pub fn parent_of(&self, role_id: RoleId) -> Option<RoleId> {
        self.parents.get(&role_id).copied().flatten()
    }

    /// Returns whether making `candidate_parent_id` the parent of `role_id`
    /// would close a loop.
    ///
    /// Walks upward from the candidate. Reaching `role_id` is a cycle, and so
    /// is revisiting any node (an already corrupt chain fails closed).
    #[must_use]
    pub fn would_create_cycle(&self, role_id: RoleId, candidate_parent_id: Option<RoleId>) -> bool {
        let Some(mut current) = candidate_parent_id else {
            return false;
        };

        let mut visited = HashSet::new();
        for _ in 0..=self.parents.len() {
            if current == role_id || !visited.insert(current) {
                return true;
            }

            match self.parent_of(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }

        true
    }

    /// Fails with `InvalidHierarchy` when the new parent would close a loop.
    pub fn ensure_acyclic(
        &self,
        role_id: RoleId,
        candidate_parent_id: Option<RoleId>,
    ) -> AppResult<()> {
        if self.would_create_cycle(role_id, candidate_parent_id) {
            let candidate = candidate_parent_id
                .map(|value| value.to_string())
                .unwrap_or_default();
            return Err(AppError::InvalidHierarchy(format!(
                "setting parent of role '{role_id}' to '{candidate}' would create a circular hierarchy"
            )));
        }

        Ok(())
    }

    /// Returns the role followed by its ancestors, nearest first.
    ///
    /// The walk stops at a root, at an unknown parent, or on a revisit.
    #[must_use]
    pub fn ancestors(&self, role_id: RoleId) -> Vec<RoleId> {
        let mut chain = vec![role_id];
        let mut visited = HashSet::from([role_id]);
        let mut current = role_id;

        while chain.len() <= self.parents.len() {
            let Some(parent) = self.parent_of(current) else {
                break;
            };
            if !visited.insert(parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }

        chain
    }

    /// Returns the role together with every role below it in the tree.
    #[must_use]
    pub fn descendants(&self, role_id: RoleId) -> BTreeSet<RoleId> {
        let mut children: HashMap<RoleId, Vec<RoleId>> = HashMap::new();
        for (child, parent) in &self.parents {
            if let Some(parent) = parent {
                children.entry(*parent).or_default().push(*child);
            }
        }

        let mut found = BTreeSet::from([role_id]);
        let mut queue = VecDeque::from([role_id]);
        while let Some(current) = queue.pop_front() {
            for child in children.get(&current).into_iter().flatten() {
                if found.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }

        found
    }
}

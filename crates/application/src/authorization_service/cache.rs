use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use moss_domain::PersonId;

use super::resolver::PrincipalPermissions;

/// Default lifetime of a cached principal snapshot.
pub const DEFAULT_PERMISSION_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of cached principals.
pub const DEFAULT_PERMISSION_CACHE_MAX_ENTRIES: usize = 10_000;

/// Configuration for the process-local permission cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionCacheConfig {
    /// Entry lifetime. A zero TTL disables caching.
    pub ttl: Duration,
    /// Maximum number of cached principals before the oldest is evicted.
    pub max_entries: usize,
}

impl Default for PermissionCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_PERMISSION_CACHE_TTL,
            max_entries: DEFAULT_PERMISSION_CACHE_MAX_ENTRIES,
        }
    }
}

impl PermissionCacheConfig {
    /// Returns a configuration that never stores entries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            ttl: Duration::ZERO,
            max_entries: 0,
        }
    }

    /// Returns whether entries are ever stored.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero() && self.max_entries > 0
    }
}

#[derive(Debug)]
struct CacheEntry {
    permissions: Arc<PrincipalPermissions>,
    inserted_at: Instant,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<PersonId, CacheEntry>,
    generation: u64,
}

/// Process-local cache of resolved principal snapshots.
///
/// Lookups and invalidations are synchronous. Every invalidation bumps a
/// generation counter; a snapshot computed under an older generation is
/// dropped instead of stored.
#[derive(Debug)]
pub struct PermissionCache {
    config: PermissionCacheConfig,
    state: RwLock<CacheState>,
}

impl PermissionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(config: PermissionCacheConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> PermissionCacheConfig {
        self.config
    }

    /// Returns a live snapshot for the person.
    #[must_use]
    pub fn get(&self, person_id: PersonId) -> Option<Arc<PrincipalPermissions>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .entries
            .get(&person_id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.permissions.clone())
    }

    /// Returns the current generation, to be passed back to [`Self::insert`].
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Stores a snapshot computed at `generation`. Returns `false` when the
    /// snapshot was discarded because an invalidation happened meanwhile or
    /// caching is disabled.
    pub fn insert(
        &self,
        person_id: PersonId,
        permissions: Arc<PrincipalPermissions>,
        generation: u64,
    ) -> bool {
        if !self.config.is_enabled() {
            return false;
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
            return false;
        }

        let now = Instant::now();
        // Expired entries are only swept when a new person would not fit.
        if state.entries.len() >= self.config.max_entries
            && !state.entries.contains_key(&person_id)
        {
            state.entries.retain(|_, entry| entry.expires_at > now);
            if state.entries.len() >= self.config.max_entries
                && let Some(oldest) = state
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted_at)
                    .map(|(key, _)| *key)
            {
                state.entries.remove(&oldest);
            }
        }

        let expires_at = now.checked_add(self.config.ttl).unwrap_or(now);
        state.entries.insert(
            person_id,
            CacheEntry {
                permissions,
                inserted_at: now,
                expires_at,
            },
        );

        true
    }

    /// Drops the entries of the given people.
    pub fn invalidate<'a>(&self, person_ids: impl IntoIterator<Item = &'a PersonId>) -> usize {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.generation = state.generation.wrapping_add(1);
        person_ids
            .into_iter()
            .filter(|person_id| state.entries.remove(person_id).is_some())
            .count()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.generation = state.generation.wrapping_add(1);
        state.entries.clear();
    }

    /// Returns the number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Returns whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

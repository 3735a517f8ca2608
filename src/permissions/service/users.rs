/*!
 * User Cache
 *
 * Per-user role ordering and override programs. The cache is bounded and
 * guarded by per-user mutation epochs: a load only lands if no mutation
 * touched the user while it was reading the store.
 */

use crate::core::limits::USER_EPOCH_STRIPES;
use crate::core::types::{RoleId, UserId};
use crate::permissions::registry::{CompiledGrants, Namespace, PermissionRegistry};
use crate::permissions::types::GrantRow;
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of one user's authorization inputs
#[derive(Debug, Clone, Default)]
pub(crate) struct UserEntry {
    /// Assigned roles in decision order, valid for `generation`
    pub roles: Vec<RoleId>,
    /// Role tree generation the ordering was computed against
    pub generation: u64,
    /// The user's own grants, in store order
    pub grants: Arc<[GrantRow]>,
    pub overrides: CompiledGrants,
}

impl UserEntry {
    /// Compile the user's grants into one override program per namespace
    pub fn compile(
        registry: &PermissionRegistry,
        roles: Vec<RoleId>,
        generation: u64,
        grants: Vec<GrantRow>,
    ) -> Self {
        let grants: Arc<[GrantRow]> = grants.into();
        let overrides = registry.compile_grants(&grants[..]);
        Self {
            roles,
            generation,
            grants,
            overrides,
        }
    }

    /// Recompile one namespace's override program from the cached grants
    pub fn recompile(&self, ns: &Namespace) -> Self {
        let program = ns.compile_grants(
            self.grants
                .iter()
                .filter(|g| g.namespace.as_str() == &**ns.key()),
        );
        let mut next = self.clone();
        next.overrides.programs.insert(ns.index(), program);
        next
    }

    /// Whether the override for `ns` waits on segments or on the namespace
    pub fn override_pending(&self, ns: &Namespace) -> bool {
        match self.overrides.get(ns.index()) {
            Some(effective) if effective.is_complete() => false,
            None if self.overrides.unallocated.is_empty() => false,
            _ => self
                .overrides
                .needs_rebuild(ns.index(), ns.key(), ns.interner().len()),
        }
    }
}

/// Bounded concurrent map of loaded users
pub(crate) struct UserCache {
    entries: DashMap<UserId, Arc<UserEntry>, RandomState>,
    /// Mutation counters, shared by users hashing to the same stripe
    epochs: Box<[AtomicU64]>,
    hasher: RandomState,
    capacity: usize,
}

impl UserCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
            epochs: (0..USER_EPOCH_STRIPES).map(|_| AtomicU64::new(0)).collect(),
            hasher: RandomState::new(),
            capacity,
        }
    }

    #[inline]
    fn epoch_slot(&self, user_id: UserId) -> &AtomicU64 {
        let mask = self.epochs.len() - 1;
        &self.epochs[self.hasher.hash_one(user_id) as usize & mask]
    }

    /// Mutation epoch of a user; take it before reading the store
    #[inline]
    pub fn epoch(&self, user_id: UserId) -> u64 {
        self.epoch_slot(user_id).load(Ordering::Acquire)
    }

    #[inline]
    pub fn get(&self, user_id: UserId) -> Option<Arc<UserEntry>> {
        self.entries.get(&user_id).map(|entry| entry.value().clone())
    }

    /// Cache a loaded entry unless the user was mutated since `epoch`.
    ///
    /// Returns whether the entry was cached.
    pub fn insert_if_unchanged(&self, user_id: UserId, epoch: u64, entry: Arc<UserEntry>) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if !self.contains(user_id) {
            self.make_room(user_id);
        }

        // Same shard lock as `touch`, so a mutation cannot slip in between
        let slot = self.entries.entry(user_id);
        if self.epoch(user_id) != epoch {
            return false;
        }
        slot.insert(entry);
        true
    }

    /// Evict arbitrary other users until one more fits
    fn make_room(&self, user_id: UserId) {
        while self.entries.len() >= self.capacity {
            let victim = self
                .entries
                .iter()
                .map(|entry| *entry.key())
                .find(|id| *id != user_id);
            match victim {
                Some(id) => {
                    self.entries.remove(&id);
                }
                None => break,
            }
        }
    }

    /// Record a mutation of `user_id`; true if the user is cached
    pub fn touch(&self, user_id: UserId) -> bool {
        let slot = self.entries.entry(user_id);
        self.epoch_slot(user_id).fetch_add(1, Ordering::AcqRel);
        matches!(slot, Entry::Occupied(_))
    }

    /// Swap in `next` only if the slot still holds `expected`.
    ///
    /// A concurrent reload or invalidation wins over a lazy rebuild.
    pub fn replace(&self, user_id: UserId, expected: &Arc<UserEntry>, next: Arc<UserEntry>) -> bool {
        match self.entries.get_mut(&user_id) {
            Some(mut slot) if Arc::ptr_eq(slot.value(), expected) => {
                *slot = next;
                true
            }
            _ => false,
        }
    }

    /// Drop a user, also discarding any load already in flight
    pub fn remove(&self, user_id: UserId) -> bool {
        let slot = self.entries.entry(user_id);
        self.epoch_slot(user_id).fetch_add(1, Ordering::AcqRel);
        match slot {
            Entry::Occupied(occupied) => {
                occupied.remove();
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.entries.contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

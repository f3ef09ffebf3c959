//! In-memory cache of connected players' profiles.
//!
//! Reads are lock-free (`scc::HashMap`). Membership changes (admit, evict,
//! reconcile) go through one mutex so that the id map, the name index and
//! the pending admissions always change together. The mutex is never held
//! across an await.

use nautilus_db::{PlayerId, PlayerName, ProfileSnapshot, ProfileUpdate};
use scc::HashMap;
use std::collections::{HashMap as StdHashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Issued at pre-connect. The matching admit only succeeds while the ticket
/// is still pending, so a disconnect that overtakes a slow pre-connect wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionTicket {
    id: PlayerId,
    serial: u64,
}

#[derive(Default)]
struct Membership {
    next_serial: u64,
    pending: StdHashMap<PlayerId, u64>,
    /// Connection name of every cached player
    connected: StdHashMap<PlayerId, PlayerName>,
    /// Cached players whose connection has finalized
    joined: HashSet<PlayerId>,
}

pub struct ProfileCache {
    profiles: HashMap<PlayerId, ProfileSnapshot>,
    /// Lowercased connection name -> id
    names: HashMap<String, PlayerId>,
    membership: Mutex<Membership>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
            names: HashMap::new(),
            membership: Mutex::new(Membership::default()),
        }
    }

    /// Snapshot of a connected player.
    pub fn get(&self, id: &PlayerId) -> Option<ProfileSnapshot> {
        self.profiles.read_sync(id, |_, profile| profile.clone())
    }

    /// Snapshot of the connected player using `name`, ignoring case.
    pub fn get_by_name(&self, name: &str) -> Option<ProfileSnapshot> {
        let id = self.names.read_sync(&name_key(name), |_, id| *id)?;
        self.get(&id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.profiles.read_sync(id, |_, _| ()).is_some()
    }

    /// Number of connected players.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a pending admission for `id`, superseding any earlier one.
    pub fn begin_admission(&self, id: PlayerId) -> AdmissionTicket {
        let mut membership = self.membership();
        let serial = membership.next_serial;
        membership.next_serial += 1;
        membership.pending.insert(id, serial);
        AdmissionTicket { id, serial }
    }

    /// Insert the profile if the ticket is still pending.
    /// Returns false if the player disconnected in the meantime.
    pub fn admit(
        &self,
        ticket: AdmissionTicket,
        name: PlayerName,
        profile: ProfileSnapshot,
    ) -> bool {
        let mut membership = self.membership();
        if membership.pending.get(&ticket.id) != Some(&ticket.serial) {
            return false;
        }
        membership.pending.remove(&ticket.id);
        membership.joined.remove(&ticket.id);

        if let Some(old_name) = membership.connected.insert(ticket.id, name) {
            self.unindex_name(&old_name, ticket.id);
        }
        let _ = self.names.upsert_sync(name_key(&name), ticket.id);
        let _ = self.profiles.upsert_sync(ticket.id, profile);
        true
    }

    /// Drop a ticket whose admission failed.
    pub fn abandon(&self, ticket: AdmissionTicket) {
        let mut membership = self.membership();
        if membership.pending.get(&ticket.id) == Some(&ticket.serial) {
            membership.pending.remove(&ticket.id);
        }
    }

    /// Apply `update` to the cached snapshot in one atomic step.
    /// Returns `(previous, current)`, or None if the player is not connected.
    pub fn apply(
        &self,
        id: &PlayerId,
        update: &ProfileUpdate,
    ) -> Option<(ProfileSnapshot, ProfileSnapshot)> {
        self.profiles.update_sync(id, |_, cached| {
            let next = update.apply_to(cached);
            let previous = std::mem::replace(cached, next.clone());
            (previous, next)
        })
    }

    /// Mark a cached player's connection as finalized, making it subject to
    /// [`Self::retain_connected`]. With `name`, the name index moves to it.
    pub fn finalize(&self, id: PlayerId, name: Option<PlayerName>) {
        let mut membership = self.membership();
        if !membership.connected.contains_key(&id) {
            return;
        }
        membership.joined.insert(id);

        let Some(name) = name else {
            return;
        };
        let Some(current) = membership.connected.get_mut(&id) else {
            return;
        };
        if *current == name {
            return;
        }
        let old_name = std::mem::replace(current, name);
        self.unindex_name(&old_name, id);
        let _ = self.names.upsert_sync(name_key(&name), id);
    }

    /// Remove the player and any pending admission, unconditionally.
    pub fn evict(&self, id: &PlayerId) -> Option<ProfileSnapshot> {
        let mut membership = self.membership();
        self.evict_locked(&mut membership, id)
    }

    /// Evict every finalized player not in `live`. Pending admissions and
    /// players admitted but not yet finalized are kept, since the host does
    /// not list players that are still logging in.
    pub fn retain_connected(&self, live: &HashSet<PlayerId>) -> Vec<PlayerId> {
        let mut membership = self.membership();
        let stale: Vec<PlayerId> = membership
            .joined
            .iter()
            .filter(|id| !live.contains(id))
            .copied()
            .collect();

        for id in &stale {
            self.evict_locked(&mut membership, id);
        }
        stale
    }

    fn evict_locked(
        &self,
        membership: &mut Membership,
        id: &PlayerId,
    ) -> Option<ProfileSnapshot> {
        membership.pending.remove(id);
        membership.joined.remove(id);
        if let Some(name) = membership.connected.remove(id) {
            self.unindex_name(&name, *id);
        }
        self.profiles.remove_sync(id).map(|(_, profile)| profile)
    }

    /// Remove `name` from the index if it still belongs to `id`.
    fn unindex_name(&self, name: &PlayerName, id: PlayerId) {
        let key = name_key(name);
        if self.names.read_sync(&key, |_, owner| *owner) == Some(id) {
            let _ = self.names.remove_sync(&key);
        }
    }

    fn membership(&self) -> MutexGuard<'_, Membership> {
        self.membership.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new()
    }
}

fn name_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

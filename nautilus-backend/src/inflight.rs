//! Registry of profile creations that are currently in flight.
//!
//! Concurrent first contacts for the same id join one creation instead of
//! racing each other into the store.

use nautilus_db::{PlayerId, ProfileSnapshot};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<ProfileSnapshot>>;

struct Entry {
    slot: Slot,
    /// Live claims on `slot`
    claims: usize,
}

#[derive(Default)]
pub(crate) struct CreationRegistry {
    slots: Mutex<HashMap<PlayerId, Entry>>,
}

impl CreationRegistry {
    /// Join the creation in flight for `id`, or open a new one.
    /// Lookup and insert happen under one lock.
    pub fn claim(&self, id: PlayerId) -> CreationClaim<'_> {
        let mut slots = self.lock();
        let entry = slots.entry(id).or_insert_with(|| Entry {
            slot: Arc::new(OnceCell::new()),
            claims: 0,
        });
        entry.claims += 1;

        CreationClaim {
            registry: self,
            id,
            slot: entry.slot.clone(),
        }
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PlayerId, Entry>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A share in one in-flight creation. The last claim to drop retires the slot.
pub(crate) struct CreationClaim<'a> {
    registry: &'a CreationRegistry,
    id: PlayerId,
    slot: Slot,
}

impl CreationClaim<'_> {
    /// Run `init` unless another claimant already produced the profile.
    /// If the running initializer fails, the next waiter takes over.
    pub async fn resolve<E, F, Fut>(&self, init: F) -> Result<ProfileSnapshot, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ProfileSnapshot, E>>,
    {
        self.slot.get_or_try_init(init).await.cloned()
    }
}

impl Drop for CreationClaim<'_> {
    fn drop(&mut self) {
        // The entry cannot be retired while this claim is counted, so the
        // one under our id is ours.
        let mut slots = self.registry.lock();
        let retire = match slots.get_mut(&self.id) {
            Some(entry) => {
                entry.claims -= 1;
                entry.claims == 0
            }
            None => false,
        };
        if retire {
            slots.remove(&self.id);
        }
    }
}

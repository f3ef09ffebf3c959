//! The profile directory: cached snapshots of connected players in front of
//! the profile store, with the identity provider as a last resort.

use nautilus_db::{DbError, PlayerId, PlayerName, ProfileSnapshot, ProfileUpdate, SkinBlob};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::ProfileCache;
use crate::changes::{ChangeStream, ProfileChanged};
use crate::error::{DirectoryError, Result};
use crate::events::ConnectionEvent;
use crate::inflight::CreationRegistry;
use crate::provider::{IdentityProvider, ProviderError};
use crate::store::ProfileStore;

/// Deadlines for calls leaving the process.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub store: Duration,
    pub provider: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            store: Duration::from_secs(5),
            provider: Duration::from_secs(5),
        }
    }
}

pub struct ProfileDirectory {
    store: Arc<dyn ProfileStore>,
    provider: Arc<dyn IdentityProvider>,
    cache: ProfileCache,
    creations: CreationRegistry,
    changes: ChangeStream,
    timeouts: Timeouts,
}

impl ProfileDirectory {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        provider: Arc<dyn IdentityProvider>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            store,
            provider,
            cache: ProfileCache::new(),
            creations: CreationRegistry::default(),
            changes: ChangeStream::new(),
            timeouts,
        }
    }

    /// Snapshot of a connected player.
    ///
    /// # Panics
    ///
    /// If `id` is not connected. Use [`Self::try_cached`] when that is a
    /// legitimate outcome.
    pub fn cached(&self, id: PlayerId) -> ProfileSnapshot {
        match self.cache.get(&id) {
            Some(profile) => profile,
            None => panic!("{}", DirectoryError::InvariantViolation(id)),
        }
    }

    pub fn try_cached(&self, id: PlayerId) -> Option<ProfileSnapshot> {
        self.cache.get(&id)
    }

    pub fn is_connected(&self, id: PlayerId) -> bool {
        self.cache.contains(&id)
    }

    pub fn connected_count(&self) -> usize {
        self.cache.len()
    }

    pub async fn stored_count(&self) -> Result<u64> {
        self.store_call("count profiles", self.store.count()).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProfileChanged> {
        self.changes.subscribe()
    }

    /// Cached snapshot if connected, otherwise the stored one. Store hits
    /// are not cached.
    pub async fn lookup_by_id(&self, id: PlayerId) -> Result<ProfileSnapshot> {
        if let Some(profile) = self.cache.get(&id) {
            return Ok(profile);
        }

        self.store_call("find profile", self.store.find_by_id(id))
            .await?
            .ok_or(DirectoryError::NotFound)
    }

    /// Resolve a username. Names are not unique over time, so when several
    /// stored profiles carry `name` the identity provider decides who owns
    /// it now.
    pub async fn lookup_by_name(&self, name: &str) -> Result<ProfileSnapshot> {
        if let Some(profile) = self.cache.get_by_name(name) {
            return Ok(profile);
        }

        let mut matches = self
            .store_call("find profiles by name", self.store.find_by_name(name))
            .await?;

        match matches.len() {
            0 => Err(DirectoryError::NotFound),
            1 => Ok(matches.remove(0)),
            count => {
                warn!(name, count, "name is shared, asking the identity provider");

                let owner = self
                    .provider_call("resolve name", self.provider.resolve_name(name))
                    .await?;

                match owner {
                    Some(id) => self.lookup_by_id(id).await,
                    None => Err(DirectoryError::AmbiguousName {
                        name: name.to_string(),
                    }),
                }
            }
        }
    }

    /// The existing profile for `id`, or a freshly persisted one.
    ///
    /// With `populate`, a new profile is filled with the provider's current
    /// name and skin when available. Concurrent calls for the same id share
    /// one creation; the joined calls get whatever that creation produced.
    pub async fn get_or_create(&self, id: PlayerId, populate: bool) -> Result<ProfileSnapshot> {
        if let Some(profile) = self.cache.get(&id) {
            return Ok(profile);
        }

        let claim = self.creations.claim(id);
        claim.resolve(|| self.find_or_create(id, populate)).await
    }

    async fn find_or_create(&self, id: PlayerId, populate: bool) -> Result<ProfileSnapshot> {
        // Checked under the claim: an earlier creation may have finished
        if let Some(existing) = self.store_call("find profile", self.store.find_by_id(id)).await? {
            return Ok(existing);
        }

        let mut profile = ProfileSnapshot::new(id);
        if populate {
            profile = self.enrich(profile).await;
        }

        match self.store_call("insert profile", self.store.insert(&profile)).await {
            Ok(()) => {
                info!(%id, populated = populate, "created profile");
                Ok(profile)
            }
            Err(DirectoryError::StoreUnavailable(DbError::DuplicateProfile)) => {
                debug!(%id, "profile was created by another process, reading it back");
                self.store_call("find profile", self.store.find_by_id(id))
                    .await?
                    .ok_or(DirectoryError::NotFound)
            }
            Err(err) => Err(err),
        }
    }

    /// Best effort: any provider trouble leaves the profile as it was.
    async fn enrich(&self, profile: ProfileSnapshot) -> ProfileSnapshot {
        let id = profile.id();

        match self
            .provider_call("fetch profile", self.provider.fetch_profile(id))
            .await
        {
            Ok(Some(identity)) => profile.with_name(identity.name).with_skin(identity.skin),
            Ok(None) => {
                debug!(%id, "identity provider does not know this player");
                profile
            }
            Err(err) => {
                warn!(%id, error = %err, "profile enrichment failed, creating a bare profile");
                profile
            }
        }
    }

    /// Persist the fields named in `update` and mirror them into the cache
    /// if the player is connected. Unnamed fields are left as they are.
    pub async fn record_update(
        &self,
        snapshot: &ProfileSnapshot,
        update: ProfileUpdate,
    ) -> Result<ProfileSnapshot> {
        let id = snapshot.id();

        self.store_call("update profile", self.store.update(id, &update))
            .await?;

        // The cached snapshot may be newer than the one the caller holds
        let (profile, previous) = match self.cache.apply(&id, &update) {
            Some((previous, current)) => (current, Some(previous)),
            None => (update.apply_to(snapshot), None),
        };

        self.changes.emit(ProfileChanged {
            profile: profile.clone(),
            previous,
        });

        Ok(profile)
    }

    /// Dispatch one host lifecycle event.
    ///
    /// Returns the player's snapshot after the event; for
    /// [`ConnectionEvent::DisconnectFinalized`] that is the evicted entry.
    pub async fn handle(&self, event: ConnectionEvent) -> Result<Option<ProfileSnapshot>> {
        let kind = event.kind();
        let id = event.player_id();
        debug!(kind, %id, "handling connection event");

        let result = match event {
            ConnectionEvent::PreConnect { id, name } => self.pre_connect(id, name).await.map(Some),
            ConnectionEvent::ConnectFinalized { id, name, skin, at } => {
                self.connect_finalized(id, name, skin, at).await.map(Some)
            }
            ConnectionEvent::DisconnectInitiated { id, at } => {
                self.disconnect_initiated(id, at).await.map(Some)
            }
            ConnectionEvent::DisconnectFinalized { id, name } => {
                Ok(self.disconnect_finalized(id, name))
            }
        };

        if let Err(err) = &result {
            warn!(kind, %id, error = %err, "connection event failed");
        }
        result
    }

    /// Resolve or create the profile and cache it.
    ///
    /// The admission is registered before the returned future is first
    /// polled, so a [`Self::disconnect_finalized`] issued after this call
    /// always prevents the cache insert, however slow the store is.
    pub fn pre_connect(
        &self,
        id: PlayerId,
        name: PlayerName,
    ) -> impl Future<Output = Result<ProfileSnapshot>> + '_ {
        let ticket = self.cache.begin_admission(id);

        async move {
            let profile = match self.get_or_create(id, false).await {
                Ok(profile) => profile,
                Err(err) => {
                    self.cache.abandon(ticket);
                    return Err(err);
                }
            };

            if self.cache.admit(ticket, name, profile.clone()) {
                info!(%id, %name, "caching profile");
            } else {
                info!(%id, %name, "player left before admission completed, not caching");
            }

            Ok(profile)
        }
    }

    pub async fn connect_finalized(
        &self,
        id: PlayerId,
        name: PlayerName,
        skin: Option<SkinBlob>,
        at: i64,
    ) -> Result<ProfileSnapshot> {
        let snapshot = self
            .try_cached(id)
            .ok_or(DirectoryError::InvariantViolation(id))?;

        let update = ProfileUpdate::new().name(name).last_online(at).skin(skin);
        let result = self.record_update(&snapshot, update).await;

        // The connection is live either way; the name index follows the store
        self.cache.finalize(id, result.is_ok().then_some(name));
        result
    }

    pub async fn disconnect_initiated(&self, id: PlayerId, at: i64) -> Result<ProfileSnapshot> {
        let snapshot = self
            .try_cached(id)
            .ok_or(DirectoryError::InvariantViolation(id))?;

        self.record_update(&snapshot, ProfileUpdate::new().last_online(at))
            .await
    }

    /// Remove the cache entry and any pending admission. Never waits for
    /// writes still in flight.
    pub fn disconnect_finalized(&self, id: PlayerId, name: PlayerName) -> Option<ProfileSnapshot> {
        info!(%id, %name, "removing cached profile");
        self.cache.evict(&id)
    }

    /// Evict finalized players the host no longer reports as connected.
    /// Covers quit events that never arrived. Players between pre-connect
    /// and connect-finalized are kept.
    pub fn reconcile(&self, live: &[PlayerId]) -> usize {
        let live: HashSet<PlayerId> = live.iter().copied().collect();
        let evicted = self.cache.retain_connected(&live);

        for id in &evicted {
            warn!(%id, "evicting stale cached profile");
        }
        if !evicted.is_empty() {
            info!(evicted = evicted.len(), "reconciled profile cache");
        }

        evicted.len()
    }

    async fn store_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = std::result::Result<T, DbError>>,
    ) -> Result<T> {
        let timeout = self.timeouts.store;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result.map_err(DirectoryError::from),
            Err(_) => Err(DirectoryError::Timeout { operation, timeout }),
        }
    }

    async fn provider_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = std::result::Result<T, ProviderError>>,
    ) -> Result<T> {
        let timeout = self.timeouts.provider;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result.map_err(DirectoryError::from),
            Err(_) => Err(DirectoryError::Timeout { operation, timeout }),
        }
    }
}

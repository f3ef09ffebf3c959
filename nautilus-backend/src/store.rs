use async_trait::async_trait;
use nautilus_db::{Database, DbError, PlayerId, ProfileSnapshot, ProfileUpdate};

/// Durable side of the directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_id(&self, id: PlayerId) -> Result<Option<ProfileSnapshot>, DbError>;

    /// Profiles whose last known name equals `name` ignoring case.
    async fn find_by_name(&self, name: &str) -> Result<Vec<ProfileSnapshot>, DbError>;

    /// Fails with [`DbError::DuplicateProfile`] if the id is taken.
    async fn insert(&self, profile: &ProfileSnapshot) -> Result<(), DbError>;

    async fn update(&self, id: PlayerId, update: &ProfileUpdate) -> Result<(), DbError>;

    async fn count(&self) -> Result<u64, DbError>;
}

#[async_trait]
impl ProfileStore for Database {
    async fn find_by_id(&self, id: PlayerId) -> Result<Option<ProfileSnapshot>, DbError> {
        self.find_profile(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<ProfileSnapshot>, DbError> {
        self.find_profiles_by_name(name.to_string()).await
    }

    async fn insert(&self, profile: &ProfileSnapshot) -> Result<(), DbError> {
        self.insert_profile(profile.clone()).await
    }

    async fn update(&self, id: PlayerId, update: &ProfileUpdate) -> Result<(), DbError> {
        self.update_profile(id, update.clone()).await
    }

    async fn count(&self) -> Result<u64, DbError> {
        self.count_profiles().await
    }
}

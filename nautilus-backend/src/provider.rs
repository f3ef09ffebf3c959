//! Identity provider seam and the Mojang implementation.
//!
//! Mojang is the authority on which account currently owns a username and
//! on the signed skin textures of an account. Both endpoints are rate
//! limited and occasionally unavailable, so callers must treat every call
//! as fallible.

use async_trait::async_trait;
use nautilus_db::{PlayerId, PlayerName, SkinBlob};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("identity provider answered with status {0}")]
    Status(StatusCode),

    #[error("identity provider response was malformed: {0}")]
    Malformed(String),
}

/// What the provider currently knows about an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub id: PlayerId,
    pub name: PlayerName,
    pub skin: Option<SkinBlob>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The identifier currently bound to `name`, if any.
    async fn resolve_name(&self, name: &str) -> Result<Option<PlayerId>, ProviderError>;

    /// Current name and skin of `id`, if the account exists.
    async fn fetch_profile(&self, id: PlayerId) -> Result<Option<ResolvedIdentity>, ProviderError>;
}

#[derive(Deserialize)]
struct NameLookup {
    id: String,
}

#[derive(Deserialize)]
struct SessionProfile {
    id: String,
    name: String,
    #[serde(default)]
    properties: Vec<ProfileProperty>,
}

#[derive(Deserialize)]
struct ProfileProperty {
    name: String,
    value: String,
    signature: Option<String>,
}

/// HTTP client for the Mojang account API and session server.
#[derive(Clone)]
pub struct MojangProvider {
    client: Client,
    api_url: String,
    session_url: String,
}

impl MojangProvider {
    pub fn new(
        api_url: impl Into<String>,
        session_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nautilus/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            session_url: session_url.into(),
        })
    }
}

#[async_trait]
impl IdentityProvider for MojangProvider {
    async fn resolve_name(&self, name: &str) -> Result<Option<PlayerId>, ProviderError> {
        let url = endpoint(&self.api_url, &["users", "profiles", "minecraft", name])?;
        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => {
                debug!(name, "no account owns this name");
                Ok(None)
            }
            status if status.is_success() => {
                let body: NameLookup = response.json().await?;
                parse_id(&body.id).map(Some)
            }
            status => Err(ProviderError::Status(status)),
        }
    }

    async fn fetch_profile(&self, id: PlayerId) -> Result<Option<ResolvedIdentity>, ProviderError> {
        let simple = id.simple().to_string();
        let mut url = endpoint(&self.session_url, &["session", "minecraft", "profile", &simple])?;
        url.query_pairs_mut().append_pair("unsigned", "false");

        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => {
                debug!(%id, "session server does not know this account");
                Ok(None)
            }
            status if status.is_success() => {
                let body: SessionProfile = response.json().await?;
                identity_from_session(body).map(Some)
            }
            status => Err(ProviderError::Status(status)),
        }
    }
}

/// Append percent-encoded path segments to a base URL.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ProviderError> {
    let mut url = Url::parse(base).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ProviderError::Malformed(format!("{base} cannot be a base url")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn parse_id(raw: &str) -> Result<PlayerId, ProviderError> {
    Uuid::parse_str(raw).map_err(|_| ProviderError::Malformed(format!("invalid id {raw:?}")))
}

fn identity_from_session(body: SessionProfile) -> Result<ResolvedIdentity, ProviderError> {
    let id = parse_id(&body.id)?;
    let name = PlayerName::from(body.name.as_str())
        .map_err(|_| ProviderError::Malformed(format!("name {:?} is too long", body.name)))?;

    // Unsigned textures are useless to clients, treat them as no skin
    let skin = body
        .properties
        .into_iter()
        .find(|property| property.name == "textures")
        .and_then(|textures| {
            let signature = textures.signature?;
            Some(SkinBlob::new(textures.value, signature))
        });

    Ok(ResolvedIdentity { id, name, skin })
}

use crate::AppState;
use crate::error::AppError;
use crate::events::ConnectionEvent;
use crate::helpers::now;
use crate::skin::{SkinTextures, decode_textures};
use crate::validation;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use axum_macros::debug_handler;
use headers::Authorization;
use headers::authorization::Bearer;
use nautilus_db::{ProfileSnapshot, SkinBlob};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub(crate) struct PreConnectRequest {
    id: String,
    name: String,
}

#[derive(Deserialize)]
pub(crate) struct ConnectRequest {
    id: String,
    name: String,
    skin: Option<SkinPayload>,
}

#[derive(Deserialize, Serialize)]
pub(crate) struct SkinPayload {
    value: String,
    signature: String,
}

#[derive(Deserialize)]
pub(crate) struct DisconnectRequest {
    id: String,
}

#[derive(Deserialize)]
pub(crate) struct QuitRequest {
    id: String,
    name: String,
}

#[derive(Deserialize)]
pub(crate) struct SyncRequest {
    players: Vec<String>,
}

#[derive(Serialize)]
pub(crate) struct SyncResponse {
    evicted: usize,
}

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    connected: usize,
    stored: u64,
}

#[derive(Serialize)]
pub(crate) struct ProfileResponse {
    id: String,
    name: Option<String>,
    last_online: Option<i64>,
    connected: bool,
    skin: Option<SkinPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    textures: Option<SkinTextures>,
}

impl ProfileResponse {
    fn new(profile: ProfileSnapshot, connected: bool) -> Self {
        let textures = profile.last_known_skin.as_ref().and_then(decode_textures);
        Self {
            id: profile.id().to_string(),
            name: profile.last_known_name.map(|name| name.to_string()),
            last_online: profile.last_online,
            connected,
            skin: profile.last_known_skin.map(|skin| SkinPayload {
                value: skin.value,
                signature: skin.signature,
            }),
            textures,
        }
    }
}

/// Only the game server holding the shared host token may talk to the bridge.
fn authorize(state: &AppState, auth: &Authorization<Bearer>) -> Result<(), AppError> {
    if auth.token() == state.host_token {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

/// Run one lifecycle event and answer with the player's resulting profile.
async fn dispatch(state: &AppState, event: ConnectionEvent) -> Result<Response, AppError> {
    let id = event.player_id();
    let profile = state.directory.handle(event).await?;

    Ok(match profile {
        Some(profile) => {
            let connected = state.directory.is_connected(id);
            (StatusCode::OK, Json(ProfileResponse::new(profile, connected))).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

#[debug_handler]
pub(crate) async fn pre_connect(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<PreConnectRequest>,
) -> Result<Response, AppError> {
    authorize(&state, &auth)?;
    let id = validation::validate_player_id(&payload.id)?;
    let name = validation::validate_player_name(&payload.name)?;

    dispatch(&state, ConnectionEvent::PreConnect { id, name }).await
}

#[debug_handler]
pub(crate) async fn connect(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<ConnectRequest>,
) -> Result<Response, AppError> {
    authorize(&state, &auth)?;
    let id = validation::validate_player_id(&payload.id)?;
    let name = validation::validate_player_name(&payload.name)?;
    let skin = match payload.skin {
        Some(skin) => {
            validation::validate_skin(&skin.value, &skin.signature)?;
            Some(SkinBlob::new(skin.value, skin.signature))
        }
        None => None,
    };

    dispatch(
        &state,
        ConnectionEvent::ConnectFinalized {
            id,
            name,
            skin,
            at: now(),
        },
    )
    .await
}

#[debug_handler]
pub(crate) async fn disconnect(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<DisconnectRequest>,
) -> Result<Response, AppError> {
    authorize(&state, &auth)?;
    let id = validation::validate_player_id(&payload.id)?;

    dispatch(&state, ConnectionEvent::DisconnectInitiated { id, at: now() }).await
}

pub(crate) async fn quit(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<QuitRequest>,
) -> Result<Response, AppError> {
    authorize(&state, &auth)?;
    let id = validation::validate_player_id(&payload.id)?;
    let name = validation::validate_player_name(&payload.name)?;

    // Answer with 204 whether or not the player was cached
    state
        .directory
        .handle(ConnectionEvent::DisconnectFinalized { id, name })
        .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn sync(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<SyncRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &auth)?;
    let live = validation::validate_player_ids(&payload.players)?;

    let evicted = state.directory.reconcile(&live);

    Ok((StatusCode::OK, Json(SyncResponse { evicted })))
}

#[debug_handler]
pub(crate) async fn profile_by_id(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &auth)?;
    let id = validation::validate_player_id(&id)?;

    let profile = state.directory.lookup_by_id(id).await?;
    let connected = state.directory.is_connected(id);

    Ok(Json(ProfileResponse::new(profile, connected)))
}

#[debug_handler]
pub(crate) async fn profile_by_name(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &auth)?;
    let name = validation::validate_player_name(&name)?;

    let profile = state.directory.lookup_by_name(&name).await?;
    let connected = state.directory.is_connected(profile.id());

    Ok(Json(ProfileResponse::new(profile, connected)))
}

pub(crate) async fn status(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &auth)?;

    let stored = state.directory.stored_count().await?;

    Ok(Json(StatusResponse {
        connected: state.directory.connected_count(),
        stored,
    }))
}

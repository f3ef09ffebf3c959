//! Decoding of the textures payload carried inside a [`SkinBlob`].
//!
//! The payload is base64 encoded JSON of the form
//! `{"textures": {"SKIN": {"url": ..., "metadata": {"model": "slim"}}, "CAPE": {"url": ...}}}`.

use base64::{Engine, engine::general_purpose::STANDARD};
use nautilus_db::SkinBlob;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct TexturesPayload {
    #[serde(default)]
    textures: Textures,
}

#[derive(Deserialize, Default)]
struct Textures {
    #[serde(rename = "SKIN")]
    skin: Option<Texture>,
    #[serde(rename = "CAPE")]
    cape: Option<Texture>,
}

#[derive(Deserialize)]
struct Texture {
    url: String,
    metadata: Option<TextureMetadata>,
}

#[derive(Deserialize)]
struct TextureMetadata {
    model: Option<String>,
}

/// Texture locations referenced by a skin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkinTextures {
    pub skin_url: Option<String>,
    pub cape_url: Option<String>,
    /// Alex-style arms
    pub slim: bool,
}

/// Decode the textures payload. Returns None if it is not valid base64 JSON.
pub fn decode_textures(skin: &SkinBlob) -> Option<SkinTextures> {
    let raw = STANDARD.decode(skin.value.trim()).ok()?;
    let payload: TexturesPayload = serde_json::from_slice(&raw).ok()?;

    let slim = payload
        .textures
        .skin
        .as_ref()
        .and_then(|t| t.metadata.as_ref())
        .and_then(|m| m.model.as_deref())
        == Some("slim");

    Some(SkinTextures {
        skin_url: payload.textures.skin.map(|t| t.url),
        cape_url: payload.textures.cape.map(|t| t.url),
        slim,
    })
}

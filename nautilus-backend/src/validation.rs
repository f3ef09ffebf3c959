/// Input validation for everything the host bridge accepts
use nautilus_db::{PlayerId, PlayerName};
use thiserror::Error;
use uuid::Uuid;

/// Max players per /sync request (prevents DOS)
const MAX_PLAYERS: usize = 1000;

/// Upper bound for a skin textures payload or signature
const MAX_SKIN_FIELD_LEN: usize = 4096;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Player name cannot be empty")]
    PlayerNameEmpty,

    #[error("Player name too long (max 16 characters, got {0})")]
    PlayerNameTooLong(usize),

    #[error("Player name contains invalid characters (only alphanumeric and underscore allowed)")]
    PlayerNameInvalidChars,

    #[error("Player id is not a valid UUID")]
    PlayerIdInvalid,

    #[error("Player list too large (max {max} players, got {actual})")]
    PlayerListTooLarge { max: usize, actual: usize },

    #[error("Skin value and signature cannot be empty")]
    SkinEmpty,

    #[error("Skin field too long (max {max} characters, got {actual})")]
    SkinTooLong { max: usize, actual: usize },
}

/// Validates a Minecraft player name
///
/// Rules:
/// - Cannot be empty
/// - Max 16 characters (Minecraft username limit)
/// - Only alphanumeric characters and underscores
pub fn validate_player_name(name: &str) -> Result<PlayerName, ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::PlayerNameEmpty);
    }

    if name.len() > 16 {
        return Err(ValidationError::PlayerNameTooLong(name.len()));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::PlayerNameInvalidChars);
    }

    PlayerName::from(name).map_err(|_| ValidationError::PlayerNameTooLong(name.len()))
}

/// Validates a player UUID, hyphenated or not
pub fn validate_player_id(id: &str) -> Result<PlayerId, ValidationError> {
    Uuid::parse_str(id).map_err(|_| ValidationError::PlayerIdInvalid)
}

/// Validates a list of player ids for /sync
pub fn validate_player_ids(ids: &[String]) -> Result<Vec<PlayerId>, ValidationError> {
    if ids.len() > MAX_PLAYERS {
        return Err(ValidationError::PlayerListTooLarge {
            max: MAX_PLAYERS,
            actual: ids.len(),
        });
    }

    ids.iter().map(|id| validate_player_id(id)).collect()
}

/// Validates the two halves of a signed skin
pub fn validate_skin(value: &str, signature: &str) -> Result<(), ValidationError> {
    if value.is_empty() || signature.is_empty() {
        return Err(ValidationError::SkinEmpty);
    }

    let longest = value.len().max(signature.len());
    if longest > MAX_SKIN_FIELD_LEN {
        return Err(ValidationError::SkinTooLong {
            max: MAX_SKIN_FIELD_LEN,
            actual: longest,
        });
    }

    Ok(())
}

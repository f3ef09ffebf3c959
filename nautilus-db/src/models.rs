use arrayvec::ArrayString;
use uuid::Uuid;

/// Minecraft player name - max 16 characters, stored inline (no heap allocation).
pub type PlayerName = ArrayString<16>;

/// Stable player identifier (the Minecraft account UUID).
pub type PlayerId = Uuid;

/// Signed skin textures as handed out by the session server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinBlob {
  /// Base64 encoded textures payload
  pub value: String,
  /// Mojang signature over `value`
  pub signature: String,
}

impl SkinBlob {
  pub fn new(value: impl Into<String>, signature: impl Into<String>) -> Self {
    Self {
      value: value.into(),
      signature: signature.into(),
    }
  }
}

/// Durable profile state of one player.
///
/// The identifier is fixed at construction; everything else is replaced
/// through [`ProfileUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSnapshot {
  id: PlayerId,
  /// Most recently observed username
  pub last_known_name: Option<PlayerName>,
  /// Most recently observed skin
  pub last_known_skin: Option<SkinBlob>,
  /// Unix timestamp of the last observed activity
  pub last_online: Option<i64>,
}

impl ProfileSnapshot {
  /// A bare profile with only the identifier set.
  pub fn new(id: PlayerId) -> Self {
    Self {
      id,
      last_known_name: None,
      last_known_skin: None,
      last_online: None,
    }
  }

  pub fn id(&self) -> PlayerId {
    self.id
  }

  pub fn with_name(mut self, name: PlayerName) -> Self {
    self.last_known_name = Some(name);
    self
  }

  pub fn with_skin(mut self, skin: Option<SkinBlob>) -> Self {
    self.last_known_skin = skin;
    self
  }

  pub fn with_last_online(mut self, at: i64) -> Self {
    self.last_online = Some(at);
    self
  }
}

/// A partial update. Only the fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
  pub last_known_name: Option<PlayerName>,
  /// `Some(None)` clears the stored skin.
  pub last_known_skin: Option<Option<SkinBlob>>,
  pub last_online: Option<i64>,
}

impl ProfileUpdate {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn name(mut self, name: PlayerName) -> Self {
    self.last_known_name = Some(name);
    self
  }

  pub fn skin(mut self, skin: Option<SkinBlob>) -> Self {
    self.last_known_skin = Some(skin);
    self
  }

  pub fn last_online(mut self, at: i64) -> Self {
    self.last_online = Some(at);
    self
  }

  pub fn is_empty(&self) -> bool {
    self.last_known_name.is_none() && self.last_known_skin.is_none() && self.last_online.is_none()
  }

  /// Produce the snapshot that results from applying this update to `base`.
  pub fn apply_to(&self, base: &ProfileSnapshot) -> ProfileSnapshot {
    let mut next = base.clone();
    if let Some(name) = self.last_known_name {
      next.last_known_name = Some(name);
    }
    if let Some(skin) = &self.last_known_skin {
      next.last_known_skin = skin.clone();
    }
    if let Some(at) = self.last_online {
      next.last_online = Some(at);
    }
    next
  }
}

use nautilus_db::{PlayerId, PlayerName, SkinBlob};

/// Connection lifecycle points emitted by the game server, in the order
/// they occur for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Login handshake accepted, player not yet in the world.
    PreConnect { id: PlayerId, name: PlayerName },

    /// Player is in the world; name and skin are now authoritative.
    ConnectFinalized {
        id: PlayerId,
        name: PlayerName,
        skin: Option<SkinBlob>,
        at: i64,
    },

    /// Player is leaving; the connection is still valid.
    DisconnectInitiated { id: PlayerId, at: i64 },

    /// Connection closed. Fires even if the login never completed.
    DisconnectFinalized { id: PlayerId, name: PlayerName },
}

impl ConnectionEvent {
    pub fn player_id(&self) -> PlayerId {
        match self {
            ConnectionEvent::PreConnect { id, .. }
            | ConnectionEvent::ConnectFinalized { id, .. }
            | ConnectionEvent::DisconnectInitiated { id, .. }
            | ConnectionEvent::DisconnectFinalized { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionEvent::PreConnect { .. } => "pre-connect",
            ConnectionEvent::ConnectFinalized { .. } => "connect",
            ConnectionEvent::DisconnectInitiated { .. } => "disconnect",
            ConnectionEvent::DisconnectFinalized { .. } => "quit",
        }
    }
}

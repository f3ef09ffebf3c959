use nautilus_db::ProfileSnapshot;
use tokio::sync::broadcast;

const BUFFER_SIZE: usize = 256;

/// Emitted after every recorded profile update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileChanged {
    pub profile: ProfileSnapshot,
    /// The cached snapshot that was replaced, if the player was connected
    pub previous: Option<ProfileSnapshot>,
}

pub(crate) struct ChangeStream {
    sender: broadcast::Sender<ProfileChanged>,
}

impl ChangeStream {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUFFER_SIZE);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProfileChanged> {
        self.sender.subscribe()
    }

    pub fn emit(&self, change: ProfileChanged) {
        if self.has_subscribers() {
            let _ = self.sender.send(change);
        }
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for ChangeStream {
    fn default() -> Self {
        Self::new()
    }
}

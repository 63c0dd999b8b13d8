use std::fmt;
use std::sync::Arc;

use pmocast::RemoteControl;
use url::Url;

/// Backend currently driving playback.
///
/// Selected by the target switch controller and injected into the store;
/// store actions branch on it instead of consulting global state.
#[derive(Clone)]
pub enum PlaybackTarget {
    /// The local audio engine.
    Local,
    /// A cast target reached through its remote adapter.
    Remote(Arc<dyn RemoteControl>),
}

impl PlaybackTarget {
    pub fn is_local(&self) -> bool {
        matches!(self, PlaybackTarget::Local)
    }

    pub fn remote(&self) -> Option<&Arc<dyn RemoteControl>> {
        match self {
            PlaybackTarget::Local => None,
            PlaybackTarget::Remote(remote) => Some(remote),
        }
    }

    /// Command endpoint of the remote target, if any.
    pub fn url(&self) -> Option<&Url> {
        self.remote().map(|remote| remote.url())
    }
}

impl fmt::Debug for PlaybackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackTarget::Local => write!(f, "Local"),
            PlaybackTarget::Remote(remote) => write!(f, "Remote({})", remote.url()),
        }
    }
}

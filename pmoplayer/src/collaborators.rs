//! Narrow interfaces to the services the player drives but does not own.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use pmocast::{PlayQueue, ReplayGainMode, SubscriptionId, Track};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;

/// Events emitted by the local audio engine.
#[derive(Clone, Debug, PartialEq)]
pub enum AudioEvent {
    TimeUpdate(f64),
    DurationChange(f64),
    Ended,
    Paused,
    StreamTitleChange(Option<String>),
    Error(String),
}

/// Local decoding/output engine.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Loads `track` and starts it unless `paused`.
    async fn change_track(&self, track: &Track, paused: bool, playback_rate: f64) -> Result<()>;
    async fn resume(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn seek(&self, position: f64) -> Result<()>;
    /// Pre-buffers the track expected to play next.
    async fn set_buffer(&self, track: &Track) -> Result<()>;

    fn set_volume(&self, volume: f64);
    fn set_replay_gain_mode(&self, mode: ReplayGainMode);
    fn set_playback_rate(&self, rate: f64);
    /// Elapsed seconds in the loaded track.
    fn current_time(&self) -> f64;

    fn subscribe(&self) -> (SubscriptionId, UnboundedReceiver<AudioEvent>);
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Server-side play queue used while playing locally.
#[async_trait]
pub trait QueuePersistence: Send + Sync {
    async fn load_play_queue(&self) -> Result<PlayQueue>;
    async fn save_play_queue(
        &self,
        tracks: &[Track],
        current: Option<&Track>,
        position: f64,
    ) -> Result<()>;
}

#[async_trait]
pub trait ListeningHistory: Send + Sync {
    async fn scrobble(&self, track_id: &str) -> Result<()>;
    async fn update_now_playing(&self, track_id: &str) -> Result<()>;
}

/// Small persistent key/value store for user preferences.
pub trait Preferences: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaPlaybackState {
    None,
    Paused,
    Playing,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Artwork {
    pub src: String,
    pub sizes: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaMetadata {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub artwork: Option<Artwork>,
}

impl MediaMetadata {
    pub fn from_track(track: &Track) -> Self {
        Self {
            title: track.title.clone(),
            artist: track.artist_names(),
            album: track.album.clone(),
            artwork: track.image.as_ref().map(|src| Artwork {
                src: src.clone(),
                sizes: "300x300".to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaAction {
    Play,
    Pause,
    NextTrack,
    PreviousTrack,
    Stop,
    SeekTo,
    SeekForward,
    SeekBackward,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActionDetails {
    pub seek_time: Option<f64>,
    pub seek_offset: Option<f64>,
}

pub type ActionHandler = Arc<dyn Fn(ActionDetails) + Send + Sync>;

/// OS-level "now playing" surface.
pub trait MediaSession: Send + Sync {
    fn set_playback_state(&self, state: MediaPlaybackState);
    fn set_metadata(&self, metadata: Option<MediaMetadata>);
    /// Replaces the title of the current metadata (stream titles).
    fn set_title(&self, title: &str);
    fn set_action_handler(&self, action: MediaAction, handler: ActionHandler);
}

/// Process-wide slot holding the latest player error for the UI.
#[derive(Clone)]
pub struct ErrorSlot {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Default for ErrorSlot {
    fn default() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, message: impl Into<String>) {
        self.tx.send_replace(Some(message.into()));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn latest(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

/// Everything the player store talks to besides the active target.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn AudioEngine>,
    pub persistence: Arc<dyn QueuePersistence>,
    pub history: Arc<dyn ListeningHistory>,
    pub preferences: Arc<dyn Preferences>,
    pub media_session: Arc<dyn MediaSession>,
    pub errors: ErrorSlot,
}

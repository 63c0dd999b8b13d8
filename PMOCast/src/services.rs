//! File and config backed collaborators of the headless player.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pmocast::{PlayQueue, Track};
use pmoconfig::Config;
use pmoplayer::{
    ActionHandler, ListeningHistory, MediaAction, MediaMetadata, MediaPlaybackState, MediaSession,
    Preferences, QueuePersistence,
};
use serde_yaml::Value;
use tracing::{debug, info};

/// Play queue saved as JSON next to `config.yaml`.
pub struct QueueFile {
    path: PathBuf,
}

impl QueueFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QueuePersistence for QueueFile {
    async fn load_play_queue(&self) -> Result<PlayQueue> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => serde_json::from_slice(&data)
                .with_context(|| format!("Invalid play queue file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PlayQueue::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_play_queue(
        &self,
        tracks: &[Track],
        current: Option<&Track>,
        position: f64,
    ) -> Result<()> {
        let queue = PlayQueue {
            tracks: tracks.to_vec(),
            current_track: current
                .and_then(|current| tracks.iter().position(|track| track.id == current.id)),
            current_track_position: position,
        };
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&queue)?).await?;
        debug!(path = %self.path.display(), tracks = tracks.len(), "play queue saved");
        Ok(())
    }
}

/// Preferences stored under `player.preferences` in the configuration.
pub struct ConfigPreferences {
    config: Arc<Config>,
}

impl ConfigPreferences {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl Preferences for ConfigPreferences {
    fn get(&self, key: &str) -> Option<String> {
        match self.config.get_value(&["player", "preferences", key]) {
            Ok(Value::String(s)) => Some(s),
            Ok(Value::Bool(b)) => Some(b.to_string()),
            Ok(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.config.set_value(
            &["player", "preferences", key],
            Value::String(value.to_string()),
        )
    }
}

/// Listening history reported to the log only.
#[derive(Default)]
pub struct LogHistory;

#[async_trait]
impl ListeningHistory for LogHistory {
    async fn scrobble(&self, track_id: &str) -> Result<()> {
        info!(track = track_id, "scrobble");
        Ok(())
    }

    async fn update_now_playing(&self, track_id: &str) -> Result<()> {
        info!(track = track_id, "now playing");
        Ok(())
    }
}

/// Media session without an OS integration: logs what would be shown.
#[derive(Default)]
pub struct LogMediaSession;

impl MediaSession for LogMediaSession {
    fn set_playback_state(&self, state: MediaPlaybackState) {
        debug!(?state, "media session state");
    }

    fn set_metadata(&self, metadata: Option<MediaMetadata>) {
        match metadata {
            Some(metadata) => info!(title = %metadata.title, artist = %metadata.artist, "media session metadata"),
            None => debug!("media session metadata cleared"),
        }
    }

    fn set_title(&self, title: &str) {
        info!(title, "media session title");
    }

    fn set_action_handler(&self, action: MediaAction, _handler: ActionHandler) {
        debug!(?action, "media session action registered");
    }
}

// pmocast/src/client.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;
use url::Url;

use crate::channel::{CommandChannel, DEFAULT_RECONNECT_DELAY, command_url};
use crate::errors::Result;
use crate::events::SubscriptionId;
use crate::model::{PlayQueue, PlayerState, ReplayGainMode, Track};
use crate::protocol::{Command, PushEvent};
use crate::transport::{Transport, WebSocketTransport};

/// Catalog hook applied to every track coming back from a cast target.
pub trait TrackNormalizer: Send + Sync {
    fn normalize_track(&self, track: Track) -> Track;
}

/// Session-auth hook providing the query parameters of the command endpoint.
pub trait SessionAuth: Send + Sync {
    fn url_params(&self) -> Vec<(String, String)>;
}

/// Push events of one cast target, released with [`RemoteControl::unsubscribe`].
pub struct PushSubscription {
    id: SubscriptionId,
    rx: UnboundedReceiver<PushEvent>,
    normalizer: Option<Arc<dyn TrackNormalizer>>,
}

impl PushSubscription {
    pub fn new(
        id: SubscriptionId,
        rx: UnboundedReceiver<PushEvent>,
        normalizer: Option<Arc<dyn TrackNormalizer>>,
    ) -> Self {
        Self { id, rx, normalizer }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next push event; queue snapshots are normalized. Returns `None` once
    /// the subscription was released or the adapter disposed.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        let event = self.rx.recv().await?;
        Some(match event {
            PushEvent::Queue(queue) => PushEvent::Queue(normalize_queue(self.normalizer.as_deref(), queue)),
            other => other,
        })
    }
}

/// Playback-control contract of a cast target. Every call is one round trip
/// and returns once the target confirmed it.
#[async_trait]
pub trait RemoteControl: Send + Sync {
    fn url(&self) -> &Url;

    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn next(&self) -> Result<()>;
    async fn previous(&self) -> Result<()>;
    async fn seek(&self, pos: f64) -> Result<()>;
    async fn play_index(&self, index: usize) -> Result<()>;
    async fn play_track_list(
        &self,
        ids: Vec<String>,
        index: Option<usize>,
        shuffle: Option<bool>,
    ) -> Result<()>;
    async fn reset_queue(&self) -> Result<()>;
    async fn clear_queue(&self) -> Result<()>;
    async fn shuffle_queue(&self) -> Result<()>;
    async fn add_to_queue(&self, ids: Vec<String>) -> Result<()>;
    async fn set_next_in_queue(&self, ids: Vec<String>) -> Result<()>;
    async fn remove_from_queue(&self, index: usize) -> Result<()>;
    async fn get_play_queue(&self) -> Result<PlayQueue>;
    async fn load_player_state(&self, state: PlayerState) -> Result<()>;
    async fn unload_player_state(&self) -> Result<PlayerState>;
    async fn set_replay_gain_mode(&self, mode: ReplayGainMode) -> Result<()>;
    async fn set_repeat(&self, flag: bool) -> Result<()>;
    async fn set_shuffle(&self, flag: bool) -> Result<()>;
    async fn set_volume(&self, volume: f64) -> Result<()>;
    async fn set_playback_rate(&self, rate: f64) -> Result<()>;

    fn subscribe(&self) -> PushSubscription;
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
    fn dispose(&self);
}

/// Remote target adapter over one [`CommandChannel`].
pub struct CastClient {
    channel: CommandChannel,
    normalizer: Option<Arc<dyn TrackNormalizer>>,
}

impl CastClient {
    pub fn new(channel: CommandChannel, normalizer: Option<Arc<dyn TrackNormalizer>>) -> Self {
        Self {
            channel,
            normalizer,
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.channel.request::<()>(command).await
    }
}

#[async_trait]
impl RemoteControl for CastClient {
    fn url(&self) -> &Url {
        self.channel.url()
    }

    async fn play(&self) -> Result<()> {
        self.send(Command::Play).await
    }

    async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    async fn next(&self) -> Result<()> {
        self.send(Command::SkipNext).await
    }

    async fn previous(&self) -> Result<()> {
        self.send(Command::SkipPrevious).await
    }

    async fn seek(&self, pos: f64) -> Result<()> {
        self.send(Command::Seek { pos }).await
    }

    async fn play_index(&self, index: usize) -> Result<()> {
        self.send(Command::PlayIndex { index }).await
    }

    async fn play_track_list(
        &self,
        ids: Vec<String>,
        index: Option<usize>,
        shuffle: Option<bool>,
    ) -> Result<()> {
        self.send(Command::PlayTrackList {
            tracks: ids,
            index,
            shuffle,
        })
        .await
    }

    async fn reset_queue(&self) -> Result<()> {
        self.send(Command::ResetQueue).await
    }

    async fn clear_queue(&self) -> Result<()> {
        self.send(Command::ClearQueue).await
    }

    async fn shuffle_queue(&self) -> Result<()> {
        self.send(Command::ShuffleQueue).await
    }

    async fn add_to_queue(&self, ids: Vec<String>) -> Result<()> {
        self.send(Command::AddToQueue { tracks: ids }).await
    }

    async fn set_next_in_queue(&self, ids: Vec<String>) -> Result<()> {
        self.send(Command::SetNextInQueue { tracks: ids }).await
    }

    async fn remove_from_queue(&self, index: usize) -> Result<()> {
        self.send(Command::RemoveFromQueue { index }).await
    }

    async fn get_play_queue(&self) -> Result<PlayQueue> {
        let queue: PlayQueue = self.channel.request(Command::Queue).await?;
        Ok(normalize_queue(self.normalizer.as_deref(), queue))
    }

    async fn load_player_state(&self, state: PlayerState) -> Result<()> {
        self.send(Command::LoadPlayerState(state)).await
    }

    async fn unload_player_state(&self) -> Result<PlayerState> {
        let mut state: PlayerState = self.channel.request(Command::UnloadPlayerState).await?;
        if let Some(normalizer) = &self.normalizer {
            state.tracks = state
                .tracks
                .into_iter()
                .map(|track| normalizer.normalize_track(track))
                .collect();
        }
        Ok(state)
    }

    async fn set_replay_gain_mode(&self, mode: ReplayGainMode) -> Result<()> {
        self.send(Command::ReplayGainMode { mode }).await
    }

    async fn set_repeat(&self, flag: bool) -> Result<()> {
        self.send(Command::SetRepeat { flag }).await
    }

    async fn set_shuffle(&self, flag: bool) -> Result<()> {
        self.send(Command::SetShuffle { flag }).await
    }

    async fn set_volume(&self, volume: f64) -> Result<()> {
        self.send(Command::SetVolume { volume }).await
    }

    async fn set_playback_rate(&self, rate: f64) -> Result<()> {
        self.send(Command::SetPlaybackRate { rate }).await
    }

    fn subscribe(&self) -> PushSubscription {
        let (id, rx) = self.channel.subscribe();
        PushSubscription::new(id, rx, self.normalizer.clone())
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.channel.unsubscribe(id)
    }

    fn dispose(&self) {
        self.channel.dispose();
    }
}

fn normalize_queue(normalizer: Option<&dyn TrackNormalizer>, mut queue: PlayQueue) -> PlayQueue {
    if let Some(normalizer) = normalizer {
        queue.tracks = queue
            .tracks
            .into_iter()
            .map(|track| normalizer.normalize_track(track))
            .collect();
    }
    queue
}

/// Opens remote target adapters for cast target URLs.
#[async_trait]
pub trait RemoteOpener: Send + Sync {
    async fn open(&self, target: &Url) -> Result<Arc<dyn RemoteControl>>;
}

/// Builds [`CastClient`]s: resolves the command endpoint of a target,
/// applies session auth and opens the channel over the configured transport.
#[derive(Clone)]
pub struct CastConnector {
    transport: Arc<dyn Transport>,
    normalizer: Option<Arc<dyn TrackNormalizer>>,
    auth: Option<Arc<dyn SessionAuth>>,
    reconnect_delay: Duration,
}

impl Default for CastConnector {
    fn default() -> Self {
        Self::new(Arc::new(WebSocketTransport))
    }
}

impl CastConnector {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            normalizer: None,
            auth: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn TrackNormalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn SessionAuth>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn connect(&self, target: &Url) -> Result<CastClient> {
        let params = self
            .auth
            .as_ref()
            .map(|auth| auth.url_params())
            .unwrap_or_default();
        let url = command_url(target, &params)?;
        debug!(base = %target, url = %url, "opening cast client");
        let channel = CommandChannel::open(url, self.transport.clone(), self.reconnect_delay);
        Ok(CastClient::new(channel, self.normalizer.clone()))
    }
}

#[async_trait]
impl RemoteOpener for CastConnector {
    async fn open(&self, target: &Url) -> Result<Arc<dyn RemoteControl>> {
        Ok(Arc::new(self.connect(target)?))
    }
}

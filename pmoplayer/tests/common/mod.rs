#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use pmocast::{
    CastError, PlayQueue, PlaybackEvent, PlayerState, PushEvent, PushSubscription, RemoteControl,
    RemoteOpener, ReplayGainMode, SubscriptionId, Track,
};
use pmoplayer::{
    ActionDetails, ActionHandler, AudioEngine, AudioEvent, Collaborators, ErrorSlot,
    ListeningHistory, MediaAction, MediaMetadata, MediaPlaybackState, MediaSession, PlayerStore,
    Preferences, QueuePersistence,
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use url::Url;

pub fn track(id: &str, duration: f64) -> Track {
    let mut track = Track::new(id, id.to_uppercase(), duration);
    track.url = Some(format!("https://media.example.org/{id}.flac"));
    track
}

pub fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id, 200.0)).collect()
}

pub fn ids(tracks: &[Track]) -> Vec<String> {
    tracks.iter().map(|track| track.id.clone()).collect()
}

/// Lets spawned tasks run; time is paused in these tests.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[derive(Default)]
pub struct FakeEngine {
    pub calls: Mutex<Vec<String>>,
    pub time: Mutex<f64>,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, UnboundedSender<AudioEvent>)>>,
}

impl FakeEngine {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn set_time(&self, time: f64) {
        *self.time.lock().unwrap() = time;
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn emit(&self, event: AudioEvent) {
        for (_, tx) in self.subscribers.lock().unwrap().iter() {
            let _ = tx.send(event.clone());
        }
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn change_track(&self, track: &Track, paused: bool, playback_rate: f64) -> Result<()> {
        self.record(format!("change_track {} paused={paused} rate={playback_rate}", track.id));
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.record("resume".into());
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause".into());
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop".into());
        Ok(())
    }

    async fn seek(&self, position: f64) -> Result<()> {
        self.record(format!("seek {position}"));
        Ok(())
    }

    async fn set_buffer(&self, track: &Track) -> Result<()> {
        self.record(format!("set_buffer {}", track.id));
        Ok(())
    }

    fn set_volume(&self, volume: f64) {
        self.record(format!("set_volume {volume}"));
    }

    fn set_replay_gain_mode(&self, mode: ReplayGainMode) {
        self.record(format!("set_replay_gain_mode {}", mode.as_str()));
    }

    fn set_playback_rate(&self, rate: f64) {
        self.record(format!("set_playback_rate {rate}"));
    }

    fn current_time(&self) -> f64 {
        *self.time.lock().unwrap()
    }

    fn subscribe(&self) -> (SubscriptionId, UnboundedReceiver<AudioEvent>) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (tx, rx) = unbounded_channel();
        self.subscribers.lock().unwrap().push((id, tx));
        (id, rx)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }
}

#[derive(Default)]
pub struct FakePersistence {
    pub stored: Mutex<PlayQueue>,
    /// (track ids, current track id, position) per save.
    pub saves: Mutex<Vec<(Vec<String>, Option<String>, f64)>>,
}

impl FakePersistence {
    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }
}

#[async_trait]
impl QueuePersistence for FakePersistence {
    async fn load_play_queue(&self) -> Result<PlayQueue> {
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save_play_queue(
        &self,
        tracks: &[Track],
        current: Option<&Track>,
        position: f64,
    ) -> Result<()> {
        self.saves.lock().unwrap().push((
            ids(tracks),
            current.map(|track| track.id.clone()),
            position,
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeHistory {
    pub scrobbles: Mutex<Vec<String>>,
    pub now_playing: Mutex<Vec<String>>,
}

impl FakeHistory {
    pub fn scrobbles(&self) -> Vec<String> {
        self.scrobbles.lock().unwrap().clone()
    }

    pub fn now_playing(&self) -> Vec<String> {
        self.now_playing.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListeningHistory for FakeHistory {
    async fn scrobble(&self, track_id: &str) -> Result<()> {
        self.scrobbles.lock().unwrap().push(track_id.to_string());
        Ok(())
    }

    async fn update_now_playing(&self, track_id: &str) -> Result<()> {
        self.now_playing.lock().unwrap().push(track_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePreferences {
    pub values: Mutex<HashMap<String, String>>,
}

impl Preferences for FakePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMediaSession {
    pub state: Mutex<Option<MediaPlaybackState>>,
    pub metadata: Mutex<Option<MediaMetadata>>,
    pub handlers: Mutex<HashMap<MediaAction, ActionHandler>>,
}

impl FakeMediaSession {
    pub fn trigger(&self, action: MediaAction, details: ActionDetails) {
        let handler = self.handlers.lock().unwrap().get(&action).cloned();
        handler.expect("no handler registered")(details);
    }
}

impl MediaSession for FakeMediaSession {
    fn set_playback_state(&self, state: MediaPlaybackState) {
        *self.state.lock().unwrap() = Some(state);
    }

    fn set_metadata(&self, metadata: Option<MediaMetadata>) {
        *self.metadata.lock().unwrap() = metadata;
    }

    fn set_title(&self, title: &str) {
        if let Some(metadata) = self.metadata.lock().unwrap().as_mut() {
            metadata.title = title.to_string();
        }
    }

    fn set_action_handler(&self, action: MediaAction, handler: ActionHandler) {
        self.handlers.lock().unwrap().insert(action, handler);
    }
}

pub struct Fixture {
    pub engine: Arc<FakeEngine>,
    pub persistence: Arc<FakePersistence>,
    pub history: Arc<FakeHistory>,
    pub preferences: Arc<FakePreferences>,
    pub media: Arc<FakeMediaSession>,
    pub errors: ErrorSlot,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            engine: Arc::new(FakeEngine::default()),
            persistence: Arc::new(FakePersistence::default()),
            history: Arc::new(FakeHistory::default()),
            preferences: Arc::new(FakePreferences::default()),
            media: Arc::new(FakeMediaSession::default()),
            errors: ErrorSlot::new(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            engine: self.engine.clone(),
            persistence: self.persistence.clone(),
            history: self.history.clone(),
            preferences: self.preferences.clone(),
            media_session: self.media.clone(),
            errors: self.errors.clone(),
        }
    }

    pub fn store(&self) -> PlayerStore {
        PlayerStore::new(self.collaborators(), Duration::from_secs(10))
    }
}

/// Cast target double recording every call.
pub struct FakeRemote {
    url: Url,
    pub calls: Mutex<Vec<String>>,
    pub loaded_states: Mutex<Vec<PlayerState>>,
    pub queue: Mutex<PlayQueue>,
    pub unload_state: Mutex<PlayerState>,
    pub announce_playing: AtomicBool,
    pub disposed: AtomicBool,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, UnboundedSender<PushEvent>)>>,
}

impl FakeRemote {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            calls: Mutex::new(Vec::new()),
            loaded_states: Mutex::new(Vec::new()),
            queue: Mutex::new(PlayQueue::default()),
            unload_state: Mutex::new(PlayerState::default()),
            announce_playing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: impl Into<String>) -> pmocast::Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(CastError::Disposed);
        }
        self.calls.lock().unwrap().push(call.into());
        Ok(())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn push(&self, event: PushEvent) {
        for (_, tx) in self.subscribers.lock().unwrap().iter() {
            let _ = tx.send(event.clone());
        }
    }
}

#[async_trait]
impl RemoteControl for FakeRemote {
    fn url(&self) -> &Url {
        &self.url
    }

    async fn play(&self) -> pmocast::Result<()> {
        self.record("play")
    }

    async fn pause(&self) -> pmocast::Result<()> {
        self.record("pause")
    }

    async fn next(&self) -> pmocast::Result<()> {
        self.record("skip-next")
    }

    async fn previous(&self) -> pmocast::Result<()> {
        self.record("skip-previous")
    }

    async fn seek(&self, pos: f64) -> pmocast::Result<()> {
        self.record(format!("seek {pos}"))
    }

    async fn play_index(&self, index: usize) -> pmocast::Result<()> {
        self.record(format!("play-index {index}"))
    }

    async fn play_track_list(
        &self,
        ids: Vec<String>,
        index: Option<usize>,
        shuffle: Option<bool>,
    ) -> pmocast::Result<()> {
        self.record(format!("play-track-list {ids:?} {index:?} {shuffle:?}"))
    }

    async fn reset_queue(&self) -> pmocast::Result<()> {
        self.record("reset-queue")
    }

    async fn clear_queue(&self) -> pmocast::Result<()> {
        self.record("clear-queue")
    }

    async fn shuffle_queue(&self) -> pmocast::Result<()> {
        self.record("shuffle-queue")
    }

    async fn add_to_queue(&self, ids: Vec<String>) -> pmocast::Result<()> {
        self.record(format!("add-to-queue {ids:?}"))
    }

    async fn set_next_in_queue(&self, ids: Vec<String>) -> pmocast::Result<()> {
        self.record(format!("set-next-in-queue {ids:?}"))
    }

    async fn remove_from_queue(&self, index: usize) -> pmocast::Result<()> {
        self.record(format!("remove-from-queue {index}"))
    }

    async fn get_play_queue(&self) -> pmocast::Result<PlayQueue> {
        self.record("queue")?;
        Ok(self.queue.lock().unwrap().clone())
    }

    async fn load_player_state(&self, state: PlayerState) -> pmocast::Result<()> {
        self.record("load-player-state")?;
        self.loaded_states.lock().unwrap().push(state);
        Ok(())
    }

    async fn unload_player_state(&self) -> pmocast::Result<PlayerState> {
        self.record("unload-player-state")?;
        Ok(self.unload_state.lock().unwrap().clone())
    }

    async fn set_replay_gain_mode(&self, mode: ReplayGainMode) -> pmocast::Result<()> {
        self.record(format!("replay-gain-mode {}", mode.as_str()))
    }

    async fn set_repeat(&self, flag: bool) -> pmocast::Result<()> {
        self.record(format!("set-repeat {flag}"))
    }

    async fn set_shuffle(&self, flag: bool) -> pmocast::Result<()> {
        self.record(format!("set-shuffle {flag}"))
    }

    async fn set_volume(&self, volume: f64) -> pmocast::Result<()> {
        self.record(format!("set-volume {volume}"))
    }

    async fn set_playback_rate(&self, rate: f64) -> pmocast::Result<()> {
        self.record(format!("set-playback-rate {rate}"))
    }

    fn subscribe(&self) -> PushSubscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (tx, rx) = unbounded_channel();
        if self.announce_playing.load(Ordering::SeqCst) {
            let _ = tx.send(PushEvent::Playback(PlaybackEvent {
                playing: true,
                position: Some(5.0),
                duration: Some(200.0),
            }));
        }
        if !self.is_disposed() {
            self.subscribers.lock().unwrap().push((id, tx));
        }
        PushSubscription::new(id, rx, None)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.subscribers.lock().unwrap().clear();
    }
}

/// Opens a fresh [`FakeRemote`] per call and keeps them for inspection.
#[derive(Default)]
pub struct FakeOpener {
    pub opened: Mutex<Vec<Arc<FakeRemote>>>,
    pub playing: Mutex<Vec<Url>>,
    pub broken: Mutex<Vec<Url>>,
    pub queues: Mutex<HashMap<Url, PlayQueue>>,
}

impl FakeOpener {
    pub fn opened(&self) -> Vec<Arc<FakeRemote>> {
        self.opened.lock().unwrap().clone()
    }

    pub fn last_for(&self, url: &Url) -> Arc<FakeRemote> {
        self.opened()
            .into_iter()
            .rev()
            .find(|remote| remote.url() == url)
            .expect("target never opened")
    }
}

#[async_trait]
impl RemoteOpener for FakeOpener {
    async fn open(&self, target: &Url) -> pmocast::Result<Arc<dyn RemoteControl>> {
        if self.broken.lock().unwrap().contains(target) {
            return Err(CastError::InvalidUrl(target.to_string()));
        }
        let remote = Arc::new(FakeRemote::new(target.clone()));
        if self.playing.lock().unwrap().contains(target) {
            remote.announce_playing.store(true, Ordering::SeqCst);
        }
        if let Some(queue) = self.queues.lock().unwrap().get(target) {
            *remote.queue.lock().unwrap() = queue.clone();
        }
        self.opened.lock().unwrap().push(remote.clone());
        Ok(remote as Arc<dyn RemoteControl>)
    }
}

pub fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

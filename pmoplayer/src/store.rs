//! Playback state store: the single source of truth for queue, index,
//! timing and flags, whichever backend is playing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pmocast::{PlayQueue, PlaybackEvent, PlayerOptions, PushEvent, ReplayGainMode, Track};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::collaborators::{AudioEvent, Collaborators, MediaMetadata, MediaPlaybackState};
use crate::error::{PlayerError, Result};
use crate::target::PlaybackTarget;

/// Tracks shorter than this are never scrobbled.
pub const SCROBBLE_MIN_DURATION: f64 = 30.0;
/// Fraction of a track that must have played before it is scrobbled.
pub const SCROBBLE_THRESHOLD: f64 = 0.7;
/// `previous` restarts the current track past this many seconds.
pub const RESTART_THRESHOLD: f64 = 3.0;
pub const DEFAULT_QUEUE_SAVE_INTERVAL: Duration = Duration::from_secs(10);

pub(crate) const PREF_VOLUME: &str = "player.volume";
pub(crate) const PREF_REPLAY_GAIN: &str = "player.replayGainMode";
pub(crate) const PREF_REPEAT: &str = "player.repeat";
pub(crate) const PREF_SHUFFLE: &str = "player.shuffle";
pub(crate) const PREF_PODCAST_RATE: &str = "player.podcastPlaybackRate";

/// Observable player state.
///
/// `current_index` is `None` exactly when `queue` is empty, otherwise a
/// valid offset into it.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerModel {
    pub queue: Vec<Track>,
    pub current_index: Option<usize>,
    /// Elapsed seconds in the current track.
    pub elapsed: f64,
    /// Duration of the current track in seconds. Infinite for streams.
    pub duration: f64,
    pub playing: bool,
    pub stream_title: Option<String>,
    pub shuffle: bool,
    pub repeat: bool,
    pub volume: f64,
    pub replay_gain: ReplayGainMode,
    pub podcast_playback_rate: f64,
    pub scrobbled: bool,
}

impl Default for PlayerModel {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            current_index: None,
            elapsed: 0.0,
            duration: 0.0,
            playing: false,
            stream_title: None,
            shuffle: false,
            repeat: false,
            volume: 1.0,
            replay_gain: ReplayGainMode::None,
            podcast_playback_rate: 1.0,
            scrobbled: false,
        }
    }
}

impl PlayerModel {
    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|index| self.queue.get(index))
    }

    pub fn track_id(&self) -> Option<&str> {
        self.current_track().map(|track| track.id.as_str())
    }

    /// Elapsed fraction of the current track, 0 when unknown.
    pub fn progress(&self) -> f64 {
        if self.elapsed >= 0.0 && self.duration > 0.0 && self.duration.is_finite() {
            self.elapsed / self.duration
        } else {
            0.0
        }
    }

    pub fn has_next(&self) -> bool {
        matches!(self.current_index, Some(index) if index + 1 < self.queue.len())
    }

    pub fn has_previous(&self) -> bool {
        matches!(self.current_index, Some(index) if index > 0)
    }

    /// Podcasts play at the configured podcast rate, everything else at 1.0.
    pub fn playback_rate(&self) -> f64 {
        match self.current_track() {
            Some(track) if track.is_podcast => self.podcast_playback_rate,
            _ => 1.0,
        }
    }

    pub(crate) fn set_queue(&mut self, tracks: Vec<Track>) {
        self.queue = tracks;
        self.current_index = None;
    }

    /// Selects the current track.
    ///
    /// Negative indexes select the first track and indexes past the end wrap
    /// to the first track. An empty queue has no current track.
    pub(crate) fn set_index(&mut self, index: i64) {
        self.scrobbled = false;
        if self.queue.is_empty() {
            self.current_index = None;
            self.duration = 0.0;
            return;
        }
        let index = usize::try_from(index)
            .ok()
            .filter(|index| *index < self.queue.len())
            .unwrap_or(0);
        self.current_index = Some(index);
        self.duration = self.queue[index].duration;
    }

    /// Current index as a signed offset, `-1` when there is none.
    pub(crate) fn signed_index(&self) -> i64 {
        self.current_index.map_or(-1, |index| index as i64)
    }

    pub(crate) fn next_track(&self) -> Option<&Track> {
        let index = self.current_index?;
        self.queue.get((index + 1) % self.queue.len())
    }

    fn apply_playback(&mut self, event: &PlaybackEvent) {
        self.playing = event.playing;
        self.elapsed = event.position.unwrap_or(0.0);
        self.duration = event.duration.unwrap_or(0.0);
    }

    fn apply_queue(&mut self, queue: PlayQueue) {
        let index = queue.current_track.map_or(-1, |index| index as i64);
        self.set_queue(queue.tracks);
        self.set_index(index);
        self.elapsed = queue.current_track_position;
    }

    fn apply_options(&mut self, options: &PlayerOptions) {
        self.volume = options.volume;
        self.repeat = options.repeat;
        self.shuffle = options.shuffle;
        self.replay_gain = options.replay_gain_mode();
    }
}

struct StoreState {
    model: PlayerModel,
    last_save: Instant,
    /// Track id last reported as "now playing".
    now_playing: Option<String>,
}

#[derive(Clone)]
pub struct PlayerStore {
    state: Arc<Mutex<StoreState>>,
    target: Arc<Mutex<Option<PlaybackTarget>>>,
    pub(crate) deps: Collaborators,
    save_interval: Duration,
}

impl PlayerStore {
    /// Creates a detached store, restoring user preferences.
    pub fn new(deps: Collaborators, save_interval: Duration) -> Self {
        let model = restore_preferences(&deps);
        Self {
            state: Arc::new(Mutex::new(StoreState {
                model,
                last_save: Instant::now(),
                now_playing: None,
            })),
            target: Arc::new(Mutex::new(None)),
            deps,
            save_interval,
        }
    }

    pub fn snapshot(&self) -> PlayerModel {
        self.state
            .lock()
            .expect("PlayerStore mutex poisoned")
            .model
            .clone()
    }

    pub fn is_playing(&self) -> bool {
        self.read(|model| model.playing)
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.deps
    }

    pub fn target(&self) -> Option<PlaybackTarget> {
        self.target
            .lock()
            .expect("PlayerStore target mutex poisoned")
            .clone()
    }

    /// Injects the backend store actions are routed to.
    pub fn set_target(&self, target: Option<PlaybackTarget>) {
        debug!(playback_target = ?target, "player store target changed");
        *self
            .target
            .lock()
            .expect("PlayerStore target mutex poisoned") = target;
    }

    pub(crate) fn require_target(&self) -> Result<PlaybackTarget> {
        self.target().ok_or(PlayerError::NoTarget)
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&PlayerModel) -> R) -> R {
        let state = self.state.lock().expect("PlayerStore mutex poisoned");
        f(&state.model)
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut PlayerModel) -> R) -> R {
        let mut state = self.state.lock().expect("PlayerStore mutex poisoned");
        f(&mut state.model)
    }

    pub(crate) fn set_playing(&self) {
        self.update(|model| model.playing = true);
        self.deps
            .media_session
            .set_playback_state(MediaPlaybackState::Playing);
    }

    pub(crate) fn set_paused(&self) {
        self.update(|model| model.playing = false);
        self.deps
            .media_session
            .set_playback_state(MediaPlaybackState::Paused);
    }

    pub(crate) fn set_preference(&self, target: &PlaybackTarget, key: &str, value: String) {
        if !target.is_local() {
            return;
        }
        if let Err(e) = self.deps.preferences.set(key, &value) {
            warn!(key, error = %e, "failed to store preference");
        }
    }

    /// Follow-up of a queue or index change: media session metadata,
    /// pre-buffering, now-playing report and queue persistence.
    pub(crate) async fn index_changed(&self, target: &PlaybackTarget, persist: bool) {
        let (current, next) =
            self.read(|model| (model.current_track().cloned(), model.next_track().cloned()));

        match &current {
            Some(track) => self
                .deps
                .media_session
                .set_metadata(Some(MediaMetadata::from_track(track))),
            None => {
                self.deps.media_session.set_metadata(None);
                self.deps
                    .media_session
                    .set_playback_state(MediaPlaybackState::None);
            }
        }

        if target.is_local() {
            if let Some(next) = &next {
                if let Err(e) = self.deps.engine.set_buffer(next).await {
                    debug!(track = %next.id, error = %e, "pre-buffering failed");
                }
            }
        }

        self.report_now_playing(target).await;
        if persist {
            self.save_queue(target).await;
        }
    }

    async fn report_now_playing(&self, target: &PlaybackTarget) {
        let changed = {
            let mut state = self.state.lock().expect("PlayerStore mutex poisoned");
            let current = state.model.current_track().cloned();
            let id = current.as_ref().map(|track| track.id.clone());
            if id == state.now_playing {
                None
            } else {
                state.now_playing = id;
                current.filter(|track| !track.is_stream)
            }
        };

        if let Some(track) = changed {
            if target.is_local() {
                if let Err(e) = self.deps.history.update_now_playing(&track.id).await {
                    warn!(track = %track.id, error = %e, "failed to update now playing");
                }
            }
        }
    }

    /// Saves the queue (local only) and restarts the save clock.
    pub(crate) async fn save_queue(&self, target: &PlaybackTarget) {
        let (tracks, current, position) = {
            let mut state = self.state.lock().expect("PlayerStore mutex poisoned");
            state.last_save = Instant::now();
            (
                state.model.queue.clone(),
                state.model.current_track().cloned(),
                state.model.elapsed,
            )
        };
        if !target.is_local() {
            return;
        }
        if let Err(e) = self
            .deps
            .persistence
            .save_play_queue(&tracks, current.as_ref(), position)
            .await
        {
            warn!(error = %e, "failed to save play queue");
        }
    }

    /// Runs after every elapsed-time update.
    async fn time_updated(&self, target: Option<&PlaybackTarget>) {
        let local = target.is_some_and(PlaybackTarget::is_local);

        let scrobble = {
            let mut state = self.state.lock().expect("PlayerStore mutex poisoned");
            let model = &mut state.model;
            let due = match model.current_track() {
                Some(track) => {
                    !model.scrobbled
                        && !track.is_stream
                        && model.duration > SCROBBLE_MIN_DURATION
                        && model.elapsed / model.duration > SCROBBLE_THRESHOLD
                }
                None => false,
            };
            if due {
                model.scrobbled = true;
                model.track_id().map(str::to_owned)
            } else {
                None
            }
        };
        if let Some(id) = scrobble {
            if local {
                debug!(track = %id, "scrobbling");
                if let Err(e) = self.deps.history.scrobble(&id).await {
                    warn!(track = %id, error = %e, "failed to scrobble");
                }
            }
        }

        let save_due = {
            let state = self.state.lock().expect("PlayerStore mutex poisoned");
            state.last_save.elapsed() >= self.save_interval
        };
        if save_due {
            match target {
                Some(target) => self.save_queue(target).await,
                None => {
                    self.state
                        .lock()
                        .expect("PlayerStore mutex poisoned")
                        .last_save = Instant::now();
                }
            }
        }
    }

    /// Applies an unsolicited event from the remote target.
    pub async fn apply_push(&self, event: PushEvent) {
        let target = self.target();
        match event {
            PushEvent::Playback(playback) => {
                self.update(|model| model.apply_playback(&playback));
                self.deps.media_session.set_playback_state(if playback.playing {
                    MediaPlaybackState::Playing
                } else {
                    MediaPlaybackState::Paused
                });
                self.time_updated(target.as_ref()).await;
            }
            PushEvent::Queue(queue) => {
                self.update(|model| model.apply_queue(queue));
                if let Some(target) = &target {
                    self.index_changed(target, true).await;
                }
            }
            PushEvent::Options(options) => {
                self.update(|model| model.apply_options(&options));
            }
        }
    }

    /// Applies an event from the local audio engine.
    pub async fn handle_engine_event(&self, event: AudioEvent) -> Result<()> {
        match event {
            AudioEvent::TimeUpdate(time) => {
                self.update(|model| model.elapsed = time);
                let target = self.target();
                self.time_updated(target.as_ref()).await;
            }
            AudioEvent::DurationChange(duration) => {
                if duration.is_finite() {
                    self.update(|model| model.duration = duration);
                }
            }
            AudioEvent::Ended => {
                let advance = self.read(|model| model.has_next() || model.repeat);
                if advance {
                    self.next().await?;
                } else {
                    self.reset_queue().await?;
                }
            }
            AudioEvent::Paused => self.set_paused(),
            AudioEvent::StreamTitleChange(title) => {
                if let Some(title) = &title {
                    self.deps.media_session.set_title(title);
                }
                self.update(|model| model.stream_title = title);
            }
            AudioEvent::Error(message) => {
                warn!(error = %message, "audio engine error");
                self.set_paused();
                self.deps.errors.set(message);
            }
        }
        Ok(())
    }
}

fn restore_preferences(deps: &Collaborators) -> PlayerModel {
    let prefs = &deps.preferences;
    let mut model = PlayerModel::default();
    if let Some(volume) = prefs.get(PREF_VOLUME).and_then(|v| v.parse().ok()) {
        model.volume = volume;
    }
    if let Some(mode) = prefs.get(PREF_REPLAY_GAIN) {
        model.replay_gain = ReplayGainMode::from_remote(&mode);
    }
    model.repeat = prefs.get(PREF_REPEAT).as_deref() == Some("true");
    model.shuffle = prefs.get(PREF_SHUFFLE).as_deref() == Some("true");
    if let Some(rate) = prefs.get(PREF_PODCAST_RATE).and_then(|v| v.parse().ok()) {
        model.podcast_playback_rate = rate;
    }
    model
}

pub(crate) fn engine_error(error: anyhow::Error) -> PlayerError {
    PlayerError::Engine(format!("{error:#}"))
}

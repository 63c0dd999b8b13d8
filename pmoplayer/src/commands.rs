// pmoplayer/src/commands.rs
//
// Command surface of the player store. Every action branches once on the
// injected `PlaybackTarget`: remote targets get a single adapter call and
// the store catches up through push events, the local target mutates the
// store and drives the engine directly.

use pmocast::{PlayerState, Track, track_list_equals};
use rand::Rng;
use tracing::{debug, warn};

use crate::error::Result;
use crate::shuffle::{shuffle_around, shuffled};
use crate::store::{
    PREF_PODCAST_RATE, PREF_REPEAT, PREF_REPLAY_GAIN, PREF_SHUFFLE, PREF_VOLUME, PlayerStore,
    RESTART_THRESHOLD, engine_error,
};
use crate::target::PlaybackTarget;

fn track_ids(tracks: &[Track]) -> Vec<String> {
    tracks.iter().map(|track| track.id.clone()).collect()
}

impl PlayerStore {
    /// Replaces the queue with `tracks` and plays the first one, shuffle off.
    pub async fn play_now(&self, tracks: Vec<Track>) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => {
                remote
                    .play_track_list(track_ids(&tracks), Some(0), Some(false))
                    .await?;
            }
            target @ PlaybackTarget::Local => {
                self.update(|model| model.shuffle = false);
                self.set_preference(&target, PREF_SHUFFLE, false.to_string());
                self.play_local_list(&target, tracks, Some(0)).await?;
            }
        }
        Ok(())
    }

    /// Replaces the queue with `tracks` in random order, shuffle on.
    pub async fn shuffle_now(&self, tracks: Vec<Track>) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => {
                remote
                    .play_track_list(track_ids(&tracks), None, Some(true))
                    .await?;
            }
            target @ PlaybackTarget::Local => {
                self.update(|model| model.shuffle = true);
                self.set_preference(&target, PREF_SHUFFLE, true.to_string());
                self.play_local_list(&target, tracks, None).await?;
            }
        }
        Ok(())
    }

    /// Plays `tracks` starting at `index`. With shuffle on, the starting
    /// track (random when `index` is absent) is moved to the front and the
    /// rest permuted.
    pub async fn play_track_list(&self, tracks: Vec<Track>, index: Option<usize>) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => {
                remote
                    .play_track_list(track_ids(&tracks), index, None)
                    .await?;
            }
            target @ PlaybackTarget::Local => {
                self.play_local_list(&target, tracks, index).await?;
            }
        }
        Ok(())
    }

    async fn play_local_list(
        &self,
        target: &PlaybackTarget,
        mut tracks: Vec<Track>,
        index: Option<usize>,
    ) -> Result<()> {
        let shuffle = self.read(|model| model.shuffle);
        let mut index = match index {
            Some(index) => index,
            None if shuffle && !tracks.is_empty() => rand::rng().random_range(0..tracks.len()),
            None => 0,
        };
        if shuffle {
            shuffle_around(&mut tracks, Some(index));
            index = 0;
        }

        self.update(|model| {
            if !track_list_equals(&model.queue, &tracks) {
                model.set_queue(tracks);
            }
            model.set_index(index as i64);
            model.elapsed = 0.0;
        });
        self.start_current(target).await
    }

    pub async fn play_index(&self, index: usize) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => remote.play_index(index).await?,
            target @ PlaybackTarget::Local => {
                self.update(|model| {
                    model.set_index(index as i64);
                    model.elapsed = 0.0;
                });
                self.start_current(&target).await?;
            }
        }
        Ok(())
    }

    /// Local only: runs the index follow-up and plays the current track.
    async fn start_current(&self, target: &PlaybackTarget) -> Result<()> {
        let has_track = self.read(|model| model.current_index.is_some());
        if has_track {
            self.set_playing();
        }
        self.index_changed(target, true).await;
        self.load_current(false).await
    }

    /// Local only: hands the current track to the engine.
    async fn load_current(&self, paused: bool) -> Result<()> {
        let current = self.read(|model| {
            model
                .current_track()
                .cloned()
                .map(|track| (track, model.playback_rate()))
        });
        if let Some((track, rate)) = current {
            debug!(track = %track.id, paused, rate, "loading track into engine");
            self.deps
                .engine
                .change_track(&track, paused, rate)
                .await
                .map_err(engine_error)?;
        }
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        let target = self.require_target()?;
        self.set_playing();
        match target {
            PlaybackTarget::Remote(remote) => remote.play().await?,
            PlaybackTarget::Local => self.deps.engine.resume().await.map_err(engine_error)?,
        }
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let target = self.require_target()?;
        self.set_paused();
        match target {
            PlaybackTarget::Remote(remote) => remote.pause().await?,
            PlaybackTarget::Local => self.deps.engine.pause().await.map_err(engine_error)?,
        }
        Ok(())
    }

    pub async fn play_pause(&self) -> Result<()> {
        if self.is_playing() {
            self.pause().await
        } else {
            self.resume().await
        }
    }

    /// Advances to the next track; past the last track the queue restarts.
    pub async fn next(&self) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => remote.next().await?,
            target @ PlaybackTarget::Local => {
                self.update(|model| {
                    let next = model.signed_index() + 1;
                    model.set_index(next);
                    model.elapsed = 0.0;
                });
                self.start_current(&target).await?;
            }
        }
        Ok(())
    }

    /// Goes back one track, or restarts the current one when more than
    /// [`RESTART_THRESHOLD`] seconds have played.
    pub async fn previous(&self) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => remote.previous().await?,
            target @ PlaybackTarget::Local => {
                let restart = self.deps.engine.current_time() > RESTART_THRESHOLD;
                self.update(|model| {
                    let current = model.signed_index();
                    model.set_index(if restart { current } else { current - 1 });
                    model.elapsed = 0.0;
                });
                self.start_current(&target).await?;
            }
        }
        Ok(())
    }

    /// Ignored when the current duration is not finite (live streams).
    pub async fn seek(&self, position: f64) -> Result<()> {
        let target = self.require_target()?;
        if !self.read(|model| model.duration.is_finite()) {
            debug!(position, "seek ignored on unbounded track");
            return Ok(());
        }
        match target {
            PlaybackTarget::Remote(remote) => remote.seek(position).await?,
            PlaybackTarget::Local => self
                .deps
                .engine
                .seek(position)
                .await
                .map_err(engine_error)?,
        }
        Ok(())
    }

    /// Loads the queue owned by the target: the remote play queue, or the
    /// persisted one when local (loaded paused at its saved position).
    pub async fn load_queue(&self) -> Result<()> {
        let target = self.require_target()?;
        let queue = match &target {
            PlaybackTarget::Remote(remote) => remote.get_play_queue().await?,
            PlaybackTarget::Local => self.deps.persistence.load_play_queue().await?,
        };
        let position = queue.current_track_position;
        let index = queue.current_track.map_or(-1, |index| index as i64);
        self.update(|model| {
            model.set_queue(queue.tracks);
            model.set_index(index);
            model.elapsed = position;
        });

        if target.is_local() {
            self.set_paused();
            self.index_changed(&target, false).await;
            self.load_current(true).await?;
            if self.read(|model| model.current_index.is_some()) {
                self.deps
                    .engine
                    .seek(position)
                    .await
                    .map_err(engine_error)?;
            }
        } else {
            self.index_changed(&target, false).await;
        }
        Ok(())
    }

    /// Rewinds to the first track, paused.
    pub async fn reset_queue(&self) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => remote.reset_queue().await?,
            target @ PlaybackTarget::Local => {
                self.update(|model| {
                    model.set_index(0);
                    model.elapsed = 0.0;
                });
                self.set_paused();
                self.index_changed(&target, true).await;
                self.load_current(true).await?;
            }
        }
        Ok(())
    }

    /// Keeps only the current track, or empties the queue and stops when at
    /// most one track is left.
    pub async fn clear_queue(&self) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => remote.clear_queue().await?,
            target @ PlaybackTarget::Local => {
                let emptied = self.update(|model| {
                    if model.queue.len() > 1 {
                        let keep = model.current_index.unwrap_or(0);
                        let current = model.queue.swap_remove(keep);
                        model.set_queue(vec![current]);
                        let scrobbled = model.scrobbled;
                        model.set_index(0);
                        // Same track keeps playing.
                        model.scrobbled = scrobbled;
                        false
                    } else {
                        model.set_queue(Vec::new());
                        model.set_index(-1);
                        true
                    }
                });
                if emptied {
                    self.set_paused();
                    self.deps.engine.stop().await.map_err(engine_error)?;
                }
                self.index_changed(&target, true).await;
            }
        }
        Ok(())
    }

    pub async fn add_to_queue(&self, tracks: Vec<Track>) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => remote.add_to_queue(track_ids(&tracks)).await?,
            target @ PlaybackTarget::Local => {
                self.insert_local(&target, tracks, None).await?;
            }
        }
        Ok(())
    }

    /// Inserts `tracks` right after the current track.
    pub async fn set_next_in_queue(&self, tracks: Vec<Track>) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => {
                remote.set_next_in_queue(track_ids(&tracks)).await?
            }
            target @ PlaybackTarget::Local => {
                let at = self.read(|model| model.current_index.map_or(0, |index| index + 1));
                self.insert_local(&target, tracks, Some(at)).await?;
            }
        }
        Ok(())
    }

    /// Appends (`at == None`) or inserts tracks. Filling an empty queue
    /// selects the first track and loads it paused.
    async fn insert_local(
        &self,
        target: &PlaybackTarget,
        tracks: Vec<Track>,
        at: Option<usize>,
    ) -> Result<()> {
        if tracks.is_empty() {
            return Ok(());
        }
        let tracks = if self.read(|model| model.shuffle) {
            shuffled(tracks)
        } else {
            tracks
        };

        let was_empty = self.update(|model| {
            let was_empty = model.queue.is_empty();
            match at {
                Some(at) => {
                    let at = at.min(model.queue.len());
                    model.queue.splice(at..at, tracks);
                }
                None => model.queue.extend(tracks),
            }
            if was_empty {
                model.set_index(0);
                model.elapsed = 0.0;
            }
            was_empty
        });

        if was_empty {
            self.set_paused();
            self.index_changed(target, true).await;
            self.load_current(true).await?;
        } else {
            self.save_queue(target).await;
        }
        Ok(())
    }

    pub async fn remove_from_queue(&self, index: usize) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => remote.remove_from_queue(index).await?,
            target @ PlaybackTarget::Local => {
                self.remove_local(&target, index).await?;
            }
        }
        Ok(())
    }

    async fn remove_local(&self, target: &PlaybackTarget, index: usize) -> Result<()> {
        enum Removal {
            Ignored,
            Emptied,
            Shifted,
            CurrentRemoved { playing: bool },
        }

        let removal = self.update(|model| {
            if index >= model.queue.len() {
                return Removal::Ignored;
            }
            model.queue.remove(index);
            let Some(current) = model.current_index else {
                return Removal::Shifted;
            };
            if model.queue.is_empty() {
                model.set_index(-1);
                Removal::Emptied
            } else if index < current {
                model.current_index = Some(current - 1);
                Removal::Shifted
            } else if index == current {
                let replacement = current.min(model.queue.len() - 1);
                model.set_index(replacement as i64);
                model.elapsed = 0.0;
                Removal::CurrentRemoved {
                    playing: model.playing,
                }
            } else {
                Removal::Shifted
            }
        });

        match removal {
            Removal::Ignored => {
                warn!(index, "remove_from_queue: index out of range");
            }
            Removal::Emptied => {
                self.set_paused();
                self.deps.engine.stop().await.map_err(engine_error)?;
                self.index_changed(target, true).await;
            }
            Removal::Shifted => self.save_queue(target).await,
            Removal::CurrentRemoved { playing } => {
                self.index_changed(target, true).await;
                self.load_current(!playing).await?;
            }
        }
        Ok(())
    }

    /// Moves the current track to the front and permutes the rest.
    pub async fn shuffle_queue(&self) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => remote.shuffle_queue().await?,
            target @ PlaybackTarget::Local => self.shuffle_local(&target).await,
        }
        Ok(())
    }

    async fn shuffle_local(&self, target: &PlaybackTarget) {
        let shuffled = self.update(|model| {
            if model.queue.is_empty() {
                return false;
            }
            let pinned = model.current_index;
            shuffle_around(&mut model.queue, pinned);
            model.current_index = Some(0);
            true
        });
        if shuffled {
            self.index_changed(target, true).await;
        }
    }

    /// Cycles none → track → album → none.
    pub async fn toggle_replay_gain(&self) -> Result<()> {
        let target = self.require_target()?;
        let mode = self.update(|model| {
            model.replay_gain = model.replay_gain.next();
            model.replay_gain
        });
        match &target {
            PlaybackTarget::Remote(remote) => remote.set_replay_gain_mode(mode).await?,
            PlaybackTarget::Local => {
                self.deps.engine.set_replay_gain_mode(mode);
                self.set_preference(&target, PREF_REPLAY_GAIN, mode.as_str().to_string());
            }
        }
        Ok(())
    }

    pub async fn toggle_repeat(&self) -> Result<()> {
        let target = self.require_target()?;
        let repeat = self.update(|model| {
            model.repeat = !model.repeat;
            model.repeat
        });
        match &target {
            PlaybackTarget::Remote(remote) => remote.set_repeat(repeat).await?,
            PlaybackTarget::Local => self.set_preference(&target, PREF_REPEAT, repeat.to_string()),
        }
        Ok(())
    }

    /// Flips shuffle. Turning it on locally also reorders the queue around
    /// the current track.
    pub async fn toggle_shuffle(&self) -> Result<()> {
        let enable = !self.read(|model| model.shuffle);
        self.set_shuffle(enable).await?;
        let target = self.require_target()?;
        if enable && target.is_local() {
            self.shuffle_local(&target).await;
        }
        Ok(())
    }

    /// Sets the shuffle flag only; the queue order is left untouched.
    pub async fn set_shuffle(&self, enable: bool) -> Result<()> {
        let target = self.require_target()?;
        self.update(|model| model.shuffle = enable);
        match &target {
            PlaybackTarget::Remote(remote) => remote.set_shuffle(enable).await?,
            PlaybackTarget::Local => self.set_preference(&target, PREF_SHUFFLE, enable.to_string()),
        }
        Ok(())
    }

    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        let target = self.require_target()?;
        self.update(|model| model.volume = volume);
        match &target {
            PlaybackTarget::Remote(remote) => remote.set_volume(volume).await?,
            PlaybackTarget::Local => {
                self.deps.engine.set_volume(volume);
                self.set_preference(&target, PREF_VOLUME, volume.to_string());
            }
        }
        Ok(())
    }

    /// Sets the podcast playback rate.
    pub async fn set_playback_rate(&self, rate: f64) -> Result<()> {
        let target = self.require_target()?;
        let is_podcast = self.update(|model| {
            model.podcast_playback_rate = rate;
            model.current_track().is_some_and(|track| track.is_podcast)
        });
        match &target {
            PlaybackTarget::Remote(remote) => remote.set_playback_rate(rate).await?,
            PlaybackTarget::Local => {
                self.set_preference(&target, PREF_PODCAST_RATE, rate.to_string());
                if is_podcast {
                    self.deps.engine.set_playback_rate(rate);
                }
            }
        }
        Ok(())
    }

    /// Restores a transferred snapshot on the current target.
    pub async fn load_player_state(&self, state: PlayerState) -> Result<()> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => remote.load_player_state(state).await?,
            target @ PlaybackTarget::Local => {
                debug!(tracks = state.tracks.len(), index = state.index, time = state.time, playing = state.playing, "loading player state");
                self.update(|model| {
                    model.set_queue(state.tracks);
                    model.set_index(state.index as i64);
                    model.shuffle = state.shuffle;
                    model.repeat = state.repeat;
                    model.elapsed = state.time;
                });
                self.set_preference(&target, PREF_SHUFFLE, state.shuffle.to_string());
                self.set_preference(&target, PREF_REPEAT, state.repeat.to_string());
                self.set_paused();
                self.index_changed(&target, true).await;
                self.load_current(true).await?;
                self.seek(state.time).await?;
                if state.playing {
                    self.resume().await?;
                }
            }
        }
        Ok(())
    }

    /// Takes the player state off the current target. Locally the store is
    /// emptied and the engine stopped.
    pub async fn unload_player_state(&self) -> Result<PlayerState> {
        match self.require_target()? {
            PlaybackTarget::Remote(remote) => Ok(remote.unload_player_state().await?),
            target @ PlaybackTarget::Local => {
                let state = self.update(|model| {
                    let state = PlayerState {
                        tracks: std::mem::take(&mut model.queue),
                        index: model.current_index.unwrap_or(0),
                        time: model.elapsed,
                        shuffle: model.shuffle,
                        repeat: model.repeat,
                        playing: model.playing,
                    };
                    model.set_index(-1);
                    model.elapsed = 0.0;
                    state
                });
                self.set_paused();
                self.index_changed(&target, false).await;
                self.deps.engine.stop().await.map_err(engine_error)?;
                debug!(tracks = state.tracks.len(), index = state.index, "unloaded player state");
                Ok(state)
            }
        }
    }
}


//! Headless audio engine.
//!
//! Nothing is decoded: a one-second clock advances the position of the
//! loaded track while playing, which is enough to drive time updates,
//! scrobbling, periodic queue saves and end-of-track handling.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use pmocast::{ReplayGainMode, SubscriptionId, Track};
use pmoplayer::{AudioEngine, AudioEvent};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info};

const TICK: Duration = Duration::from_secs(1);

#[derive(Default)]
struct EngineState {
    track: Option<Track>,
    position: f64,
    playing: bool,
    rate: f64,
    next_id: u64,
    subscribers: Vec<(SubscriptionId, UnboundedSender<AudioEvent>)>,
}

impl EngineState {
    fn emit(&mut self, event: AudioEvent) {
        self.subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    fn advance(&mut self, seconds: f64) {
        let Some(duration) = self.track.as_ref().map(|track| track.duration) else {
            return;
        };
        if !self.playing {
            return;
        }
        self.position += seconds * self.rate;
        if duration.is_finite() && self.position >= duration {
            self.position = duration;
            self.playing = false;
            self.emit(AudioEvent::TimeUpdate(duration));
            self.emit(AudioEvent::Ended);
        } else {
            self.emit(AudioEvent::TimeUpdate(self.position));
        }
    }
}

#[derive(Clone)]
pub struct SimulatedEngine {
    state: Arc<Mutex<EngineState>>,
}

impl SimulatedEngine {
    /// Creates the engine and spawns its clock. The clock stops once the
    /// last handle is dropped.
    pub fn start() -> Self {
        let engine = Self::detached();
        let weak = Arc::downgrade(&engine.state);
        tokio::spawn(run_clock(weak));
        engine
    }

    fn detached() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                rate: 1.0,
                ..Default::default()
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        let mut state = self.state.lock().expect("SimulatedEngine mutex poisoned");
        f(&mut state)
    }
}

async fn run_clock(state: Weak<Mutex<EngineState>>) {
    let mut ticker = tokio::time::interval(TICK);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(state) = state.upgrade() else {
            debug!("audio engine dropped, clock stops");
            break;
        };
        state
            .lock()
            .expect("SimulatedEngine mutex poisoned")
            .advance(TICK.as_secs_f64());
    }
}

#[async_trait]
impl AudioEngine for SimulatedEngine {
    async fn change_track(&self, track: &Track, paused: bool, playback_rate: f64) -> Result<()> {
        info!(track = %track.id, title = %track.title, paused, "engine loads track");
        self.with_state(|state| {
            state.track = Some(track.clone());
            state.position = 0.0;
            state.playing = !paused;
            state.rate = playback_rate;
            state.emit(AudioEvent::DurationChange(track.duration));
            if track.is_stream {
                state.emit(AudioEvent::StreamTitleChange(Some(track.title.clone())));
            }
        });
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.with_state(|state| state.playing = state.track.is_some());
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.with_state(|state| {
            state.playing = false;
            state.emit(AudioEvent::Paused);
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.with_state(|state| {
            state.track = None;
            state.position = 0.0;
            state.playing = false;
        });
        Ok(())
    }

    async fn seek(&self, position: f64) -> Result<()> {
        self.with_state(|state| {
            let duration = state.track.as_ref().map_or(0.0, |track| track.duration);
            state.position = position.clamp(0.0, duration.max(0.0));
            state.emit(AudioEvent::TimeUpdate(state.position));
        });
        Ok(())
    }

    async fn set_buffer(&self, track: &Track) -> Result<()> {
        debug!(track = %track.id, "engine pre-buffers next track");
        Ok(())
    }

    fn set_volume(&self, volume: f64) {
        debug!(volume, "engine volume");
    }

    fn set_replay_gain_mode(&self, mode: ReplayGainMode) {
        debug!(mode = mode.as_str(), "engine replay gain");
    }

    fn set_playback_rate(&self, rate: f64) {
        self.with_state(|state| state.rate = rate);
    }

    fn current_time(&self) -> f64 {
        self.with_state(|state| state.position)
    }

    fn subscribe(&self) -> (SubscriptionId, UnboundedReceiver<AudioEvent>) {
        let (tx, rx) = unbounded_channel();
        let id = self.with_state(|state| {
            state.next_id += 1;
            let id = SubscriptionId(state.next_id);
            state.subscribers.push((id, tx));
            id
        });
        (id, rx)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.with_state(|state| {
            let before = state.subscribers.len();
            state.subscribers.retain(|(sub_id, _)| *sub_id != id);
            state.subscribers.len() != before
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut UnboundedReceiver<AudioEvent>) -> Vec<AudioEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_clock_reaches_end_of_track() {
        let engine = SimulatedEngine::detached();
        let (_, mut rx) = engine.subscribe();
        engine
            .change_track(&Track::new("a", "A", 2.5), false, 1.0)
            .await
            .unwrap();

        for _ in 0..3 {
            engine.with_state(|state| state.advance(1.0));
        }

        assert_eq!(
            drain(&mut rx),
            vec![
                AudioEvent::DurationChange(2.5),
                AudioEvent::TimeUpdate(1.0),
                AudioEvent::TimeUpdate(2.0),
                AudioEvent::TimeUpdate(2.5),
                AudioEvent::Ended,
            ]
        );
        assert_eq!(engine.current_time(), 2.5);
    }

    #[tokio::test]
    async fn test_paused_track_does_not_advance() {
        let engine = SimulatedEngine::detached();
        engine
            .change_track(&Track::new("a", "A", 100.0), true, 1.0)
            .await
            .unwrap();

        engine.with_state(|state| state.advance(1.0));
        assert_eq!(engine.current_time(), 0.0);

        engine.resume().await.unwrap();
        engine.set_playback_rate(2.0);
        engine.with_state(|state| state.advance(1.0));
        assert_eq!(engine.current_time(), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_ticks_every_second() {
        let engine = SimulatedEngine::start();
        let (id, mut rx) = engine.subscribe();
        engine
            .change_track(&Track::new("a", "A", 100.0), false, 1.0)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;

        let updates: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, AudioEvent::TimeUpdate(_)))
            .collect();
        assert_eq!(updates.len(), 2);
        assert!(engine.unsubscribe(id));
    }
}

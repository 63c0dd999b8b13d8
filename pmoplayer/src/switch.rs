//! Target switch controller: swaps the backend driving the player store.

use std::sync::Arc;
use std::time::Duration;

use pmocast::{RemoteControl, RemoteOpener, SubscriptionId};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{PlayerError, Result};
use crate::store::PlayerStore;
use crate::target::PlaybackTarget;

/// Upper bound for the `clear-queue` sent to a target being left.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Event wiring of the attached backend.
enum Wiring {
    Detached,
    Local {
        subscription: SubscriptionId,
        pump: JoinHandle<()>,
    },
    Remote {
        remote: Arc<dyn RemoteControl>,
        url: Url,
        subscription: SubscriptionId,
        pump: JoinHandle<()>,
    },
}

impl Wiring {
    fn describe(&self) -> String {
        match self {
            Wiring::Detached => "detached".to_string(),
            Wiring::Local { .. } => "local".to_string(),
            Wiring::Remote { url, .. } => url.to_string(),
        }
    }

    fn is(&self, desired: Option<&Url>) -> bool {
        match (self, desired) {
            (Wiring::Local { .. }, None) => true,
            (Wiring::Remote { url, .. }, Some(desired)) => url == desired,
            _ => false,
        }
    }
}

pub struct TargetSwitchController {
    store: PlayerStore,
    opener: Arc<dyn RemoteOpener>,
    wiring: Mutex<Wiring>,
}

impl TargetSwitchController {
    pub fn new(store: PlayerStore, opener: Arc<dyn RemoteOpener>) -> Self {
        Self {
            store,
            opener,
            wiring: Mutex::new(Wiring::Detached),
        }
    }

    /// Follows the desired target (`None` = local) until the sender is
    /// dropped. The current value is applied immediately; later values are
    /// applied one switch at a time, the latest one winning.
    pub async fn run(&self, mut desired: watch::Receiver<Option<Url>>) {
        loop {
            let target = desired.borrow_and_update().clone();
            let transfer = self.store.is_playing();
            if let Err(e) = self.change_target(target, transfer).await {
                error!(error = %e, "target switch failed");
                self.store.collaborators().errors.set(e.to_string());
            }
            if desired.changed().await.is_err() {
                debug!("target watch closed, switch controller stops");
                break;
            }
        }
    }

    /// Switches to `desired` (`None` = local engine).
    ///
    /// The state of the outgoing backend is taken with `unload_player_state`
    /// and replayed on the new one when `transfer` is set. Otherwise a new
    /// remote target contributes its own queue.
    pub async fn change_target(&self, desired: Option<Url>, transfer: bool) -> Result<()> {
        let mut wiring = self.wiring.lock().await;
        if wiring.is(desired.as_ref()) {
            debug!(target_url = ?desired, "already on requested target");
            return Ok(());
        }
        info!(
            from = %wiring.describe(),
            to = %desired.as_ref().map_or_else(|| "local".to_string(), Url::to_string),
            transfer,
            "switching playback target"
        );

        // A target that cannot be opened leaves the current one untouched.
        let incoming = match &desired {
            Some(url) => Some(self.open_remote(url).await?),
            None => None,
        };

        let snapshot = match &*wiring {
            Wiring::Detached => None,
            _ => match self.store.unload_player_state().await {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!(error = %e, "could not take player state from outgoing target");
                    None
                }
            },
        };

        let outgoing = std::mem::replace(&mut *wiring, Wiring::Detached);
        self.teardown(outgoing).await;

        *wiring = match (&desired, incoming) {
            (Some(url), Some(remote)) => self.attach_remote(url, remote),
            _ => self.attach_local().await?,
        };

        match snapshot {
            Some(state) if transfer => self.store.load_player_state(state).await?,
            _ if desired.is_some() => self.store.load_queue().await?,
            _ => {}
        }
        Ok(())
    }

    async fn teardown(&self, wiring: Wiring) {
        self.store.set_target(None);
        match wiring {
            Wiring::Detached => {}
            Wiring::Local { subscription, pump } => {
                let engine = &self.store.collaborators().engine;
                engine.unsubscribe(subscription);
                pump.abort();
                if let Err(e) = engine.stop().await {
                    warn!(error = %e, "failed to stop audio engine");
                }
            }
            Wiring::Remote {
                remote,
                url,
                subscription,
                pump,
            } => {
                remote.unsubscribe(subscription);
                pump.abort();
                tokio::spawn(async move {
                    match tokio::time::timeout(TEARDOWN_TIMEOUT, remote.clear_queue()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(url = %url, error = %e, "failed to clear queue of previous target"),
                        Err(_) => warn!(url = %url, "previous target did not confirm clear-queue"),
                    }
                    remote.dispose();
                });
            }
        }
    }

    async fn open_remote(&self, url: &Url) -> Result<Arc<dyn RemoteControl>> {
        self.opener
            .open(url)
            .await
            .map_err(|e| PlayerError::Switch(format!("cannot open {url}: {e}")))
    }

    fn attach_remote(&self, url: &Url, remote: Arc<dyn RemoteControl>) -> Wiring {
        let mut subscription = remote.subscribe();
        let id = subscription.id();
        let store = self.store.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                store.apply_push(event).await;
            }
        });

        self.store
            .set_target(Some(PlaybackTarget::Remote(remote.clone())));
        info!(url = %url, "remote target attached");
        Wiring::Remote {
            remote,
            url: url.clone(),
            subscription: id,
            pump,
        }
    }

    async fn attach_local(&self) -> Result<Wiring> {
        let engine = self.store.collaborators().engine.clone();
        let (id, mut events) = engine.subscribe();
        let store = self.store.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = store.handle_engine_event(event).await {
                    warn!(error = %e, "failed to handle audio engine event");
                    store.collaborators().errors.set(e.to_string());
                }
            }
        });

        self.store.set_target(Some(PlaybackTarget::Local));

        let model = self.store.snapshot();
        engine.set_volume(model.volume);
        engine.set_replay_gain_mode(model.replay_gain);
        engine.set_playback_rate(model.playback_rate());
        if let Some(track) = model.current_track().filter(|track| track.url.is_some()) {
            if let Err(e) = engine
                .change_track(track, true, model.playback_rate())
                .await
            {
                warn!(track = %track.id, error = %e, "failed to restore current track");
            }
        }
        info!("local target attached");
        Ok(Wiring::Local {
            subscription: id,
            pump,
        })
    }
}

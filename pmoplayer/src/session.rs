//! Player session: store, switch controller and media session wired together.

use std::sync::Arc;
use std::time::Duration;

use pmocast::{RemoteOpener, find_playing_target};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

use crate::collaborators::{ActionDetails, ActionHandler, MediaAction};
use crate::error::Result;
use crate::store::PlayerStore;
use crate::switch::TargetSwitchController;

/// Default offset of the seek-forward / seek-backward media keys.
pub const DEFAULT_SEEK_OFFSET: f64 = 10.0;

pub struct PlayerSession {
    store: PlayerStore,
    opener: Arc<dyn RemoteOpener>,
    candidates: Vec<Url>,
    discovery_timeout: Duration,
    desired: watch::Sender<Option<Url>>,
    controller: JoinHandle<()>,
}

impl PlayerSession {
    /// Attaches the local engine, then hands target changes over to a
    /// switch controller task and registers the media session handlers.
    pub async fn start(
        store: PlayerStore,
        opener: Arc<dyn RemoteOpener>,
        candidates: Vec<Url>,
        discovery_timeout: Duration,
    ) -> Result<Self> {
        let controller = Arc::new(TargetSwitchController::new(store.clone(), opener.clone()));
        controller.change_target(None, false).await?;

        let (desired, rx) = watch::channel(None);
        let task = tokio::spawn(async move { controller.run(rx).await });

        register_media_actions(&store, &Handle::current());

        Ok(Self {
            store,
            opener,
            candidates,
            discovery_timeout,
            desired,
            controller: task,
        })
    }

    pub fn store(&self) -> &PlayerStore {
        &self.store
    }

    /// Requests a switch to `target` (`None` = local engine).
    pub fn select_target(&self, target: Option<Url>) {
        self.desired.send_replace(target);
    }

    pub fn selected_target(&self) -> Option<Url> {
        self.desired.borrow().clone()
    }

    /// Looks for a configured cast target that is already playing and
    /// selects it, unless the player is playing or a target was chosen in
    /// the meantime.
    pub async fn select_playing_target(&self) -> Option<Url> {
        let found =
            find_playing_target(&self.candidates, self.opener.as_ref(), self.discovery_timeout)
                .await?;
        if self.store.is_playing() || self.selected_target().is_some() {
            info!(url = %found, "cast target is playing but another source is active");
            return None;
        }
        info!(url = %found, "attaching to playing cast target");
        self.select_target(Some(found.clone()));
        Some(found)
    }

    pub async fn shutdown(self) {
        drop(self.desired);
        if let Err(e) = self.controller.await {
            warn!(error = %e, "switch controller task failed");
        }
    }
}

fn register_media_actions(store: &PlayerStore, runtime: &Handle) {
    let session = store.collaborators().media_session.clone();
    for action in [
        MediaAction::Play,
        MediaAction::Pause,
        MediaAction::NextTrack,
        MediaAction::PreviousTrack,
        MediaAction::Stop,
        MediaAction::SeekTo,
        MediaAction::SeekForward,
        MediaAction::SeekBackward,
    ] {
        session.set_action_handler(action, action_handler(store, runtime, action));
    }
}

fn action_handler(store: &PlayerStore, runtime: &Handle, action: MediaAction) -> ActionHandler {
    let store = store.clone();
    let runtime = runtime.clone();
    Arc::new(move |details: ActionDetails| {
        let store = store.clone();
        runtime.spawn(async move {
            if let Err(e) = run_media_action(&store, action, details).await {
                warn!(?action, error = %e, "media session action failed");
            }
        });
    })
}

async fn run_media_action(store: &PlayerStore, action: MediaAction, details: ActionDetails) -> Result<()> {
    match action {
        MediaAction::Play => store.resume().await,
        MediaAction::Pause | MediaAction::Stop => store.pause().await,
        MediaAction::NextTrack => store.next().await,
        MediaAction::PreviousTrack => store.previous().await,
        MediaAction::SeekTo => match details.seek_time {
            Some(position) => store.seek(position).await,
            None => Ok(()),
        },
        MediaAction::SeekForward => {
            let offset = details.seek_offset.unwrap_or(DEFAULT_SEEK_OFFSET);
            let position = store.read(|model| (model.elapsed + offset).min(model.duration));
            store.seek(position).await
        }
        MediaAction::SeekBackward => {
            let offset = details.seek_offset.unwrap_or(DEFAULT_SEEK_OFFSET);
            let position = store.read(|model| (model.elapsed - offset).max(0.0));
            store.seek(position).await
        }
    }
}

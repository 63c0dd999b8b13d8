//! Startup probe for a cast target that is already playing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{RemoteControl, RemoteOpener};
use crate::protocol::PushEvent;

pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Single-shot resolution slot shared by the probes and the timer.
struct Resolver {
    slot: Mutex<Option<oneshot::Sender<Option<Url>>>>,
}

impl Resolver {
    fn new(sender: oneshot::Sender<Option<Url>>) -> Self {
        Self {
            slot: Mutex::new(Some(sender)),
        }
    }

    /// Returns false if the discovery was already resolved.
    fn resolve(&self, outcome: Option<Url>) -> bool {
        let sender = self.slot.lock().expect("Resolver mutex poisoned").take();
        match sender {
            Some(sender) => {
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }
}

/// Probes every candidate concurrently and returns the first one whose
/// playback push reports `playing`.
///
/// Returns `None` when nobody reports playing within `timeout`. Every adapter
/// opened for the probe is disposed before returning, the winner included.
pub async fn find_playing_target(
    candidates: &[Url],
    opener: &dyn RemoteOpener,
    timeout: Duration,
) -> Option<Url> {
    let mut adapters: Vec<(Url, Arc<dyn RemoteControl>)> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match opener.open(candidate).await {
            Ok(adapter) => adapters.push((candidate.clone(), adapter)),
            Err(e) => warn!(url = %candidate, error = %e, "cannot probe cast target"),
        }
    }
    if adapters.is_empty() {
        return None;
    }

    let (sender, outcome) = oneshot::channel();
    let resolver = Arc::new(Resolver::new(sender));
    let mut probes = JoinSet::new();

    for (candidate, adapter) in &adapters {
        let mut subscription = adapter.subscribe();
        let resolver = resolver.clone();
        let candidate = candidate.clone();
        probes.spawn(async move {
            while let Some(event) = subscription.recv().await {
                if let PushEvent::Playback(playback) = event {
                    debug!(url = %candidate, playing = playback.playing, "probe playback");
                    if playback.playing {
                        if resolver.resolve(Some(candidate.clone())) {
                            info!(url = %candidate, "found playing cast target");
                        }
                        break;
                    }
                }
            }
        });
    }

    {
        let resolver = resolver.clone();
        probes.spawn(async move {
            tokio::time::sleep(timeout).await;
            if resolver.resolve(None) {
                debug!(?timeout, "no cast target is playing");
            }
        });
    }

    let winner = outcome.await.unwrap_or(None);

    probes.abort_all();
    for (_, adapter) in &adapters {
        adapter.dispose();
    }
    winner
}

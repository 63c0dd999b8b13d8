mod engine;
mod services;

use std::path::Path;
use std::sync::Arc;

use pmocast::{CastConfigExt, CastConnector};
use pmoconfig::{Config, get_config};
use pmoplayer::{Collaborators, ErrorSlot, PlayerConfigExt, PlayerSession, PlayerStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::engine::SimulatedEngine;
use crate::services::{ConfigPreferences, LogHistory, LogMediaSession, QueueFile};

fn init_tracing(config: &Config) {
    if !config.get_log_enable_console().unwrap_or(true) {
        return;
    }
    let level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}

fn cast_candidates(config: &Config) -> anyhow::Result<Vec<Url>> {
    let targets = config.get_cast_targets()?;
    Ok(targets
        .iter()
        .filter_map(|target| match target.parsed_url() {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(name = %target.name, error = %e, "ignoring cast target");
                None
            }
        })
        .collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_config();
    init_tracing(&config);

    let candidates = cast_candidates(&config)?;
    info!(targets = candidates.len(), "🎛️ PMOCast starting");

    let errors = ErrorSlot::new();
    let collaborators = Collaborators {
        engine: Arc::new(SimulatedEngine::start()),
        persistence: Arc::new(QueueFile::new(
            Path::new(config.directory()).join("queue.json"),
        )),
        history: Arc::new(LogHistory),
        preferences: Arc::new(ConfigPreferences::new(config.clone())),
        media_session: Arc::new(LogMediaSession),
        errors: errors.clone(),
    };
    let store = PlayerStore::new(collaborators, config.get_queue_save_interval()?);
    let connector =
        CastConnector::default().with_reconnect_delay(config.get_cast_reconnect_delay()?);

    let session = PlayerSession::start(
        store,
        Arc::new(connector),
        candidates,
        config.get_cast_discovery_timeout()?,
    )
    .await?;

    if let Err(e) = session.store().load_queue().await {
        warn!(error = %e, "could not restore play queue");
    }

    let mut error_feed = errors.subscribe();
    tokio::spawn(async move {
        while error_feed.changed().await.is_ok() {
            if let Some(message) = error_feed.borrow_and_update().clone() {
                warn!(error = %message, "player error");
            }
        }
    });

    match session.select_playing_target().await {
        Some(url) => info!(url = %url, "✅ following playing cast target"),
        None => info!("✅ playing locally"),
    }

    info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    session.shutdown().await;
    Ok(())
}

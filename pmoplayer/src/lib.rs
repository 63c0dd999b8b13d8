//! Player core for PMOCast.
//!
//! [`PlayerStore`] owns the play queue and playback state and routes every
//! command to the active [`PlaybackTarget`], either the local audio engine
//! or a cast target. [`TargetSwitchController`] moves playback between
//! targets, carrying the queue and position along.

mod commands;

pub mod collaborators;
pub mod config_ext;
pub mod error;
pub mod session;
pub mod shuffle;
pub mod store;
pub mod switch;
pub mod target;

pub use collaborators::{
    ActionDetails, ActionHandler, Artwork, AudioEngine, AudioEvent, Collaborators, ErrorSlot,
    ListeningHistory, MediaAction, MediaMetadata, MediaPlaybackState, MediaSession, Preferences,
    QueuePersistence,
};
pub use config_ext::PlayerConfigExt;
pub use error::{PlayerError, Result};
pub use session::PlayerSession;
pub use store::{DEFAULT_QUEUE_SAVE_INTERVAL, PlayerModel, PlayerStore};
pub use switch::TargetSwitchController;
pub use target::PlaybackTarget;

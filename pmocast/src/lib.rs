//! Cast target control for PMOCast.
//!
//! A cast target is a networked player driven over a JSON command channel.
//! This crate provides the wire model, the auto-reconnecting
//! [`CommandChannel`], the [`CastClient`] adapter exposing the
//! [`RemoteControl`] contract, and startup discovery of an already playing
//! target.

mod events;

pub mod channel;
pub mod client;
pub mod config_ext;
pub mod discovery;
pub mod errors;
pub mod model;
pub mod protocol;
pub mod transport;

pub use channel::{CommandChannel, DEFAULT_RECONNECT_DELAY, command_url};
pub use client::{
    CastClient, CastConnector, PushSubscription, RemoteControl, RemoteOpener, SessionAuth,
    TrackNormalizer,
};
pub use config_ext::{CastConfigExt, CastTarget};
pub use discovery::{DEFAULT_DISCOVERY_TIMEOUT, find_playing_target};
pub use errors::{CastError, Result};
pub use events::SubscriptionId;
pub use model::{
    ArtistRef, PlayQueue, PlaybackEvent, PlayerOptions, PlayerState, ReplayGainMode, Track,
    track_list_equals,
};
pub use protocol::{Command, PushEvent};
pub use transport::{Connection, Transport, WebSocketTransport};

//! Shared playback data model.
//!
//! These types are exchanged with cast targets over the command channel and
//! are also the shape the player store works with, so remote and local
//! queues share one `Track` representation.

use serde::{Deserialize, Serialize};

/// Reference to an artist credited on a track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

/// A playable item as returned by the catalog.
///
/// Tracks are immutable once obtained; only the catalog's normalizer may
/// rewrite derived fields (such as absolute URLs) before the track enters a
/// queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Playable URL. Absent for some source types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub is_podcast: bool,
    #[serde(default)]
    pub is_stream: bool,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration,
            artists: Vec::new(),
            album: None,
            album_id: None,
            image: None,
            url: None,
            is_podcast: false,
            is_stream: false,
        }
    }

    /// Artist names joined for display ("A, B").
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Returns true when both lists hold the same track ids in the same order.
pub fn track_list_equals(a: &[Track], b: &[Track]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id == y.id)
}

/// Snapshot of a play queue.
///
/// On the wire the current index uses `-1` for "no current track".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayQueue {
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(
        rename = "currentTrack",
        alias = "currentIndex",
        default,
        with = "wire_index"
    )]
    pub current_track: Option<usize>,
    /// Elapsed seconds in the current track.
    #[serde(
        rename = "currentTrackPosition",
        alias = "currentPosition",
        default
    )]
    pub current_track_position: f64,
}

/// Full player snapshot transferred during a target switch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub tracks: Vec<Track>,
    pub index: usize,
    pub time: f64,
    pub shuffle: bool,
    pub repeat: bool,
    pub playing: bool,
}

/// Point-in-time playback telemetry pushed by a cast target.
///
/// Fields are authoritative replacements, not deltas.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    pub playing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Player options pushed by a cast target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOptions {
    pub volume: f64,
    pub repeat: bool,
    pub shuffle: bool,
    #[serde(default)]
    pub replay_gain: String,
}

impl PlayerOptions {
    pub fn replay_gain_mode(&self) -> ReplayGainMode {
        ReplayGainMode::from_remote(&self.replay_gain)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayGainMode {
    #[default]
    None,
    Track,
    Album,
}

impl ReplayGainMode {
    /// Next mode in the None → Track → Album → None cycle.
    pub fn next(self) -> Self {
        match self {
            ReplayGainMode::None => ReplayGainMode::Track,
            ReplayGainMode::Track => ReplayGainMode::Album,
            ReplayGainMode::Album => ReplayGainMode::None,
        }
    }

    /// Maps a mode string reported by a cast target. `auto` is treated as
    /// album gain, anything unknown as no gain.
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "track" => ReplayGainMode::Track,
            "album" | "auto" => ReplayGainMode::Album,
            _ => ReplayGainMode::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplayGainMode::None => "none",
            ReplayGainMode::Track => "track",
            ReplayGainMode::Album => "album",
        }
    }
}

/// Serde adapter between `Option<usize>` and the `-1`-means-none wire index.
mod wire_index {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(index) => serializer.serialize_i64(*index as i64),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<i64>::deserialize(deserializer)?;
        Ok(raw.and_then(|index| usize::try_from(index).ok()))
    }
}

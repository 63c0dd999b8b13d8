//! JSON wire protocol spoken with cast targets.
//!
//! Client → server: `{"command": {"seq": 1, "name": "seek", "param": {"pos": 30}}}`
//!
//! Server → client, exactly one key per message:
//! `{"playback": ...}`, `{"queue": ...}`, `{"options": ...}` or
//! `{"response": {"seq": 1, "kind": "seek", "data": null}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{PlayQueue, PlaybackEvent, PlayerOptions, PlayerState, ReplayGainMode};

/// Command vocabulary understood by cast targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "param", rename_all = "kebab-case")]
pub enum Command {
    Play,
    Pause,
    SkipNext,
    SkipPrevious,
    Seek {
        pos: f64,
    },
    PlayIndex {
        index: usize,
    },
    PlayTrackList {
        tracks: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shuffle: Option<bool>,
    },
    ResetQueue,
    ClearQueue,
    ShuffleQueue,
    AddToQueue {
        tracks: Vec<String>,
    },
    SetNextInQueue {
        tracks: Vec<String>,
    },
    RemoveFromQueue {
        index: usize,
    },
    /// Returns the target's current [`PlayQueue`].
    Queue,
    LoadPlayerState(PlayerState),
    /// Returns the target's [`PlayerState`].
    UnloadPlayerState,
    ReplayGainMode {
        mode: ReplayGainMode,
    },
    SetRepeat {
        flag: bool,
    },
    SetShuffle {
        flag: bool,
    },
    SetVolume {
        volume: f64,
    },
    SetPlaybackRate {
        rate: f64,
    },
}

impl Command {
    /// Wire name, also the `kind` of a successful response.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play => "play",
            Command::Pause => "pause",
            Command::SkipNext => "skip-next",
            Command::SkipPrevious => "skip-previous",
            Command::Seek { .. } => "seek",
            Command::PlayIndex { .. } => "play-index",
            Command::PlayTrackList { .. } => "play-track-list",
            Command::ResetQueue => "reset-queue",
            Command::ClearQueue => "clear-queue",
            Command::ShuffleQueue => "shuffle-queue",
            Command::AddToQueue { .. } => "add-to-queue",
            Command::SetNextInQueue { .. } => "set-next-in-queue",
            Command::RemoveFromQueue { .. } => "remove-from-queue",
            Command::Queue => "queue",
            Command::LoadPlayerState(_) => "load-player-state",
            Command::UnloadPlayerState => "unload-player-state",
            Command::ReplayGainMode { .. } => "replay-gain-mode",
            Command::SetRepeat { .. } => "set-repeat",
            Command::SetShuffle { .. } => "set-shuffle",
            Command::SetVolume { .. } => "set-volume",
            Command::SetPlaybackRate { .. } => "set-playback-rate",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CommandEnvelope {
    pub seq: u64,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClientMessage {
    pub command: CommandEnvelope,
}

impl ClientMessage {
    pub fn new(seq: u64, command: Command) -> Self {
        Self {
            command: CommandEnvelope { seq, command },
        }
    }
}

/// Reply to a command, correlated by `seq`.
///
/// `kind` is either `"error"` (with `data = {"message": ...}`) or the name
/// of the command being answered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub seq: u64,
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl Response {
    pub const ERROR_KIND: &'static str = "error";

    pub fn is_error(&self) -> bool {
        self.kind == Self::ERROR_KIND
    }

    /// Human readable message of an error response.
    pub fn error_message(&self) -> String {
        match self.data.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => self.data.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMessage {
    Playback(PlaybackEvent),
    Queue(PlayQueue),
    Options(PlayerOptions),
    Response(Response),
}

/// Unsolicited message pushed by a cast target.
#[derive(Clone, Debug, PartialEq)]
pub enum PushEvent {
    Playback(PlaybackEvent),
    Queue(PlayQueue),
    Options(PlayerOptions),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_envelope_layout() {
        let msg = ClientMessage::new(7, Command::Seek { pos: 30.0 });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"command": {"seq": 7, "name": "seek", "param": {"pos": 30.0}}})
        );
    }

    #[test]
    fn test_parameterless_command_has_no_param() {
        let value = serde_json::to_value(ClientMessage::new(1, Command::SkipNext)).unwrap();
        assert_eq!(value, json!({"command": {"seq": 1, "name": "skip-next"}}));
    }

    #[test]
    fn test_play_track_list_omits_unset_options() {
        let command = Command::PlayTrackList {
            tracks: vec!["a".into(), "b".into()],
            index: None,
            shuffle: Some(true),
        };
        let value = serde_json::to_value(ClientMessage::new(2, command)).unwrap();
        assert_eq!(
            value["command"]["param"],
            json!({"tracks": ["a", "b"], "shuffle": true})
        );
        assert_eq!(value["command"]["name"], json!("play-track-list"));
    }

    #[test]
    fn test_serialized_name_matches_command_name() {
        let commands = vec![
            Command::Play,
            Command::RemoveFromQueue { index: 3 },
            Command::LoadPlayerState(PlayerState::default()),
            Command::ReplayGainMode {
                mode: ReplayGainMode::Track,
            },
            Command::SetPlaybackRate { rate: 1.5 },
        ];
        for command in commands {
            let name = command.name();
            let value = serde_json::to_value(&command).unwrap();
            assert_eq!(value["name"], json!(name));
        }
    }

    #[test]
    fn test_server_messages_decode() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"playback": {"playing": true, "position": 12.5}}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Playback(PlaybackEvent {
                playing: true,
                position: Some(12.5),
                duration: None,
            })
        );

        let msg: ServerMessage =
            serde_json::from_str(r#"{"response": {"seq": 4, "kind": "error", "data": {"message": "nope"}}}"#)
                .unwrap();
        match msg {
            ServerMessage::Response(response) => {
                assert!(response.is_error());
                assert_eq!(response.error_message(), "nope");
            }
            other => panic!("unexpected message {other:?}"),
        }

        let msg: ServerMessage =
            serde_json::from_str(r#"{"response": {"seq": 5, "kind": "play"}}"#).unwrap();
        match msg {
            ServerMessage::Response(response) => assert_eq!(response.data, Value::Null),
            other => panic!("unexpected message {other:?}"),
        }
    }
}

//! Message shapes for the real-time control channel of the matrix display.
//!
//! Every frame is a JSON object `{"type": ..., "data": ...}`. Clients send
//! player selection and directional keys; the display pushes its readiness
//! status and advisory errors. Keeping the shapes here lets the session
//! controller and the catalog client agree on `Direction` without copying it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directional input accepted by playable scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ProtoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Direction::ALL
            .into_iter()
            .find(|direction| direction.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ProtoError::UnknownDirection(value.to_string()))
    }
}

/// Readiness reported by the display for the active playable script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Waiting,
    Ready,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Waiting => f.write_str("WAITING"),
            SessionStatus::Ready => f.write_str("READY"),
        }
    }
}

/// Messages sent from the remote to the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    ChoosePlayer { player_number: u32 },
    Key { key: Direction },
}

/// Messages pushed by the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Status(SessionStatus),
    /// Advisory failure, e.g. a slot already taken. The channel stays usable.
    Error(String),
}

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("unknown direction '{0}'")]
    UnknownDirection(String),
}

pub fn encode_client(message: &ClientMessage) -> Result<String, ProtoError> {
    serde_json::to_string(message).map_err(ProtoError::Encode)
}

pub fn decode_server(text: &str) -> Result<ServerMessage, ProtoError> {
    serde_json::from_str(text).map_err(ProtoError::Decode)
}

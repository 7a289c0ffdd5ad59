//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is a JSON envelope `{"type": ..., "payload": ...}`.

use serde::{Deserialize, Serialize};

/// Client -> server message type tags
pub const MSG_JOIN: &str = "join";
pub const MSG_POSITION: &str = "position";
pub const MSG_FIRE: &str = "fire";

/// Horizontal direction of travel, `-1` or `+1` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

impl TryFrom<i32> for Direction {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Left),
            1 => Ok(Self::Right),
            other => Err(format!("direction must be -1 or 1, got {other}")),
        }
    }
}

impl From<Direction> for i32 {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Left => -1,
            Direction::Right => 1,
        }
    }
}

/// Raw envelope, decoded before the payload so unknown types can be told
/// apart from malformed payloads
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Join request payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPayload {
    pub name: String,
}

/// Client-reported kinematics. `health` travels with it but is never applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPayload {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub facing: i32,
    pub on_ground: bool,
    #[serde(default)]
    pub health: i32,
}

/// Fire request payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirePayload {
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMsg {
    /// Request to join the arena
    Join(JoinPayload),
    /// Locally predicted kinematics
    Position(PositionPayload),
    /// Spawn a projectile
    Fire(FirePayload),
}

impl ClientMsg {
    /// Decode a text frame into a typed message
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(DecodeError::Envelope)?;
        let payload = envelope.payload;

        let msg = match envelope.kind.as_str() {
            MSG_JOIN => serde_json::from_value(payload).map(Self::Join),
            MSG_POSITION => serde_json::from_value(payload).map(Self::Position),
            MSG_FIRE => serde_json::from_value(payload).map(Self::Fire),
            _ => return Err(DecodeError::UnknownType(envelope.kind)),
        };

        msg.map_err(|source| DecodeError::Payload {
            kind: envelope.kind,
            source,
        })
    }
}

/// Inbound decoding failures
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("malformed {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Join accepted
    Joined { name: String, color: String },

    /// Protocol violation, sent right before the connection is closed
    Error { message: String },

    /// Full world state, sent every tick
    State(StatePayload),
}

impl ServerMsg {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Visible world state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    pub players: Vec<PlayerSnapshot>,
    pub bullets: Vec<BulletSnapshot>,
}

/// Player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub name: String,
    /// Hex color, e.g. `#FF6B6B`
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub facing: i32,
    pub on_ground: bool,
    /// Health (0-3)
    pub health: u8,
    pub kill_count: u32,
}

/// Projectile state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletSnapshot {
    pub id: String,
    pub owner_name: String,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn decodes_position_payload() {
        let text = json!({
            "type": "position",
            "payload": {
                "x": 10.0, "y": 20.5, "velX": -3.0, "velY": 0.0,
                "facing": -1, "onGround": true, "health": 3
            }
        })
        .to_string();

        let msg = assert_ok!(ClientMsg::decode(&text));
        let ClientMsg::Position(pos) = msg else {
            panic!("expected position");
        };
        assert_eq!(pos.x, 10.0);
        assert_eq!(pos.vel_x, -3.0);
        assert_eq!(pos.facing, -1);
        assert!(pos.on_ground);
    }

    #[test]
    fn unknown_type_is_distinct_from_bad_payload() {
        let unknown = assert_err!(ClientMsg::decode(r#"{"type":"dance","payload":{}}"#));
        assert!(matches!(unknown, DecodeError::UnknownType(ref t) if t == "dance"));

        let bad = assert_err!(ClientMsg::decode(r#"{"type":"fire","payload":{"x":"left"}}"#));
        assert!(matches!(bad, DecodeError::Payload { ref kind, .. } if kind == "fire"));

        let garbage = assert_err!(ClientMsg::decode("not json"));
        assert!(matches!(garbage, DecodeError::Envelope(_)));
    }

    #[test]
    fn fire_direction_must_be_unit() {
        let ok = ClientMsg::decode(r#"{"type":"fire","payload":{"x":1,"y":2,"direction":-1}}"#);
        assert!(matches!(
            ok,
            Ok(ClientMsg::Fire(FirePayload { direction: Direction::Left, .. }))
        ));

        let zero = ClientMsg::decode(r#"{"type":"fire","payload":{"x":1,"y":2,"direction":0}}"#);
        assert!(matches!(zero, Err(DecodeError::Payload { .. })));
    }

    #[test]
    fn server_messages_use_envelope_layout() {
        let joined = serde_json::to_value(ServerMsg::Joined {
            name: "ana".into(),
            color: "#FF6B6B".into(),
        })
        .unwrap();
        assert_eq!(
            joined,
            json!({"type": "joined", "payload": {"name": "ana", "color": "#FF6B6B"}})
        );

        let state = serde_json::to_value(ServerMsg::State(StatePayload {
            players: vec![PlayerSnapshot {
                name: "ana".into(),
                color: "#4ECDC4".into(),
                x: 1.0,
                y: 2.0,
                vel_x: 0.0,
                vel_y: 0.0,
                facing: 1,
                on_ground: false,
                health: 3,
                kill_count: 2,
            }],
            bullets: vec![BulletSnapshot {
                id: "ana_1".into(),
                owner_name: "ana".into(),
                x: 5.0,
                y: 6.0,
                direction: Direction::Right,
            }],
        }))
        .unwrap();
        assert_eq!(state["type"], "state");
        assert_eq!(state["payload"]["players"][0]["killCount"], 2);
        assert_eq!(state["payload"]["players"][0]["onGround"], false);
        assert_eq!(state["payload"]["bullets"][0]["ownerName"], "ana");
        assert_eq!(state["payload"]["bullets"][0]["direction"], 1);
    }
}

//! JSON envelopes exchanged over the live roulette websocket.
//!
//! Every frame is a JSON object with a `type` tag. Inbound frames are decoded
//! in two steps so that an unrecognized tag surfaces as [`Inbound::Unknown`]
//! instead of being folded into a generic parse failure.

use crate::codec::{deserialize_whole, deserialize_whole_opt};
use crate::roulette::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Phase reported by a full snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoundStatus {
    Betting,
    Spinning,
}

/// One bet as listed in a snapshot or round announcement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetEntry {
    pub color: Color,
    pub username: String,
    #[serde(deserialize_with = "deserialize_whole")]
    pub amount: i64,
}

/// Messages pushed by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot, sent on connect and in reply to `get_state`.
    RoundState {
        round_number: u64,
        status: RoundStatus,
        time_remaining: f64,
        #[serde(default)]
        history: Vec<Color>,
        #[serde(default)]
        bets: Vec<BetEntry>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_bets: Option<u64>,
    },
    RoundStarting {
        round_number: u64,
        time_remaining: f64,
        #[serde(default)]
        history: Vec<Color>,
        #[serde(default)]
        bets: Vec<BetEntry>,
    },
    BetPlaced {
        color: Color,
        username: String,
        #[serde(deserialize_with = "deserialize_whole")]
        amount: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        round_number: Option<u64>,
    },
    RoundSpinning {
        winning_slot: u8,
        winning_color: Color,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        round_number: Option<u64>,
    },
    RoundResult {
        winning_color: Color,
        #[serde(deserialize_with = "deserialize_whole")]
        your_payout: i64,
        #[serde(default, deserialize_with = "deserialize_whole_opt")]
        your_balance: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        round_number: Option<u64>,
    },
    BalanceUpdate {
        #[serde(deserialize_with = "deserialize_whole")]
        balance: i64,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Wire tags of every message kind the client understands.
    pub const KINDS: [&'static str; 7] = [
        "round_state",
        "round_starting",
        "bet_placed",
        "round_spinning",
        "round_result",
        "balance_update",
        "error",
    ];

    /// Wire tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::RoundState { .. } => "round_state",
            ServerMessage::RoundStarting { .. } => "round_starting",
            ServerMessage::BetPlaced { .. } => "bet_placed",
            ServerMessage::RoundSpinning { .. } => "round_spinning",
            ServerMessage::RoundResult { .. } => "round_result",
            ServerMessage::BalanceUpdate { .. } => "balance_update",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// Commands sent by the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for a full snapshot.
    GetState,
    PlaceBet { color: Color, amount: u64 },
}

impl ClientMessage {
    pub fn to_json(&self) -> String {
        // Serializing a tagged enum of plain fields cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Result of decoding one inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Message(ServerMessage),
    /// Well-formed envelope with a tag this client does not know.
    Unknown { kind: String },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("envelope is not an object")]
    NotAnObject,
    #[error("envelope has no type tag")]
    MissingType,
}

/// Decode one text frame.
pub fn decode_inbound(text: &str) -> Result<Inbound, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let kind = object
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(DecodeError::MissingType)?;
    if !ServerMessage::KINDS.contains(&kind) {
        return Ok(Inbound::Unknown {
            kind: kind.to_string(),
        });
    }
    let message = serde_json::from_value(value)?;
    Ok(Inbound::Message(message))
}

//! Client-side round synchronization for the live roulette table.
//!
//! A [`ConnectionManager`] owns the websocket and emits [`ConnectionEvent`]s;
//! a [`Session`] applies them to its [`RoundStateMachine`] (ledger, history,
//! wheel, countdown) and answers [`Session::projection`] with everything a
//! renderer needs. Nothing here is authoritative: the server decides rounds,
//! outcomes and balances, and a fresh snapshot always wins.

mod backoff;
pub mod connection;
pub mod history;
pub mod ledger;
pub mod prefs;
pub mod projector;
pub mod round;
pub mod session;
pub mod slip;
pub mod timer;
pub mod wallet;
pub mod wheel;

pub use connection::{
    ConnectionConfig, ConnectionEvent, ConnectionHandle, ConnectionManager, ConnectionState,
};
pub use history::HistoryTrack;
pub use ledger::{BetLedger, Stake};
pub use prefs::{BetMemory, ROULETTE_GAME};
pub use projector::{format_money, project, result_banner, PlayerLine, Projection, TileView};
pub use round::{Effect, Outcome, Phase, RoundStateMachine};
pub use session::{Notice, NoticeLevel, Session, NOTICE_CAPACITY};
pub use slip::BetSlip;
pub use timer::Countdown;
pub use wallet::{RetryPolicy, WalletClient};
pub use wheel::Wheel;

use casino_types::{Color, DecodeError};
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed: {status}: {body}")]
    FailedWithBody {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("dial timeout")]
    DialTimeout,
    #[error("invalid URL scheme: {scheme} (expected {expected})")]
    InvalidScheme {
        scheme: String,
        expected: &'static str,
    },
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A server frame that could not be applied. Logged and discarded; the
/// session always continues.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("undecodable message: {0}")]
    Decode(#[from] DecodeError),
    #[error("unknown message kind: {0}")]
    UnknownKind(String),
    #[error("unexpected binary frame ({0} bytes)")]
    Binary(usize),
    #[error("non-positive amount {amount} from {player} on {color}")]
    NonPositiveAmount {
        color: Color,
        player: String,
        amount: i64,
    },
    #[error("amount {amount} from {player} on {color} overflows the ledger")]
    AmountOverflow {
        color: Color,
        player: String,
        amount: i64,
    },
    #[error("winning slot {0} is off the wheel")]
    SlotOutOfRange(u8),
}

/// A user action refused locally, before anything is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a bet amount first")]
    NonPositiveAmount,
    #[error("Insufficient balance: {amount} exceeds {balance}")]
    InsufficientBalance { amount: i64, balance: i64 },
    #[error("Betting is closed for this round")]
    BettingClosed,
    #[error("Waiting for the table state")]
    NotSynchronized,
    #[error("Not connected")]
    NotConnected,
}

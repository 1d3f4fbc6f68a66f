//! Shared vocabulary for the live roulette table: colors and wheel layout,
//! websocket envelopes, and the REST balance contract.

pub mod api;
pub mod codec;
pub mod roulette;
pub mod wallet;

pub use api::{decode_inbound, BetEntry, ClientMessage, DecodeError, Inbound, RoundStatus, ServerMessage};
pub use roulette::{slot_color, Color, COLORS, HISTORY_CAPACITY, SLOT_COUNT, WHEEL};

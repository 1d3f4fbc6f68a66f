//! REST boundary shared with the single-player games.

use crate::codec::deserialize_whole;
use serde::{Deserialize, Serialize};

/// Body of `GET <api>/balance/`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(deserialize_with = "deserialize_whole")]
    pub balance: i64,
}

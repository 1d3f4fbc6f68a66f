//! Remembered bet amounts.
//!
//! A convenience cache mapping game name to the last amount entered. It is
//! never consulted for anything but pre-filling the bet slip, so a missing or
//! unreadable file just starts empty.

use crate::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key used for the roulette table.
pub const ROULETTE_GAME: &str = "roulette";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetMemory {
    path: PathBuf,
    amounts: BTreeMap<String, i64>,
}

impl BetMemory {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let amounts = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(amounts) => amounts,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring corrupt bet memory");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read bet memory");
                BTreeMap::new()
            }
        };
        Self { path, amounts }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, game: &str) -> Option<i64> {
        self.amounts.get(game).copied()
    }

    /// Store `amount` for `game`, writing through to disk if it changed.
    pub fn remember(&mut self, game: &str, amount: i64) -> Result<()> {
        if self.get(game) == Some(amount) {
            return Ok(());
        }
        self.amounts.insert(game.to_string(), amount);
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&self.amounts)?;
        std::fs::write(&self.path, data)?;
        debug!(path = %self.path.display(), "saved bet memory");
        Ok(())
    }
}

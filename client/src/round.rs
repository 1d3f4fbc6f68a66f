//! Round phase tracking.
//!
//! [`RoundStateMachine::apply`] folds one decoded server message into the
//! local view and reports what changed as an [`Effect`]. Nothing is valid
//! until the first snapshot arrives; after that a snapshot may land at any
//! time and always replaces the round wholesale.

use crate::{
    history::HistoryTrack, ledger::BetLedger, timer::Countdown, wheel::Wheel, ProtocolError,
    ValidationError,
};
use casino_types::{slot_color, BetEntry, ClientMessage, Color, RoundStatus, ServerMessage};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Betting,
    Spinning,
    Result,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Betting => "BETTING",
            Phase::Spinning => "SPINNING",
            Phase::Result => "RESULT",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared round result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub round: u64,
    pub winning_color: Color,
    pub payout: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Spin {
    slot: u8,
    color: Color,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Round {
    number: u64,
    phase: Phase,
    countdown: Countdown,
    spin: Option<Spin>,
}

/// What applying a message did.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Resynced {
        round: u64,
        phase: Phase,
    },
    RoundStarted {
        round: u64,
    },
    BetRecorded {
        color: Color,
        player: String,
        amount: i64,
        own: bool,
    },
    SpinStarted {
        slot: u8,
        color: Color,
        target: f64,
    },
    ResultDeclared(Outcome),
    BalanceChanged(i64),
    /// The server refused something; its message is shown as-is.
    ServerRejected(String),
    /// Well-formed but not applicable right now.
    Ignored {
        kind: &'static str,
        reason: &'static str,
    },
}

#[derive(Clone, Debug)]
pub struct RoundStateMachine {
    round: Option<Round>,
    ledger: BetLedger,
    history: HistoryTrack,
    wheel: Wheel,
    balance: Option<i64>,
    last_outcome: Option<Outcome>,
}

impl RoundStateMachine {
    pub fn new(local_player: impl Into<String>) -> Self {
        Self {
            round: None,
            ledger: BetLedger::new(local_player),
            history: HistoryTrack::new(),
            wheel: Wheel::new(),
            balance: None,
            last_outcome: None,
        }
    }

    /// Whether a snapshot has been applied yet.
    pub fn is_synchronized(&self) -> bool {
        self.round.is_some()
    }

    pub fn round_number(&self) -> Option<u64> {
        self.round.as_ref().map(|round| round.number)
    }

    pub fn phase(&self) -> Option<Phase> {
        self.round.as_ref().map(|round| round.phase)
    }

    pub fn countdown(&self) -> Countdown {
        self.round
            .as_ref()
            .map(|round| round.countdown)
            .unwrap_or_default()
    }

    /// Slot and color of the current round's spin, once announced.
    pub fn spin(&self) -> Option<(u8, Color)> {
        self.round
            .as_ref()
            .and_then(|round| round.spin)
            .map(|spin| (spin.slot, spin.color))
    }

    pub fn ledger(&self) -> &BetLedger {
        &self.ledger
    }

    pub fn history(&self) -> &HistoryTrack {
        &self.history
    }

    pub fn wheel(&self) -> &Wheel {
        &self.wheel
    }

    pub fn balance(&self) -> Option<i64> {
        self.balance
    }

    pub fn set_balance(&mut self, balance: i64) {
        self.balance = Some(balance);
    }

    /// Result of the current round, if declared.
    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }

    /// Apply one server message.
    pub fn apply(&mut self, message: ServerMessage, now: Instant) -> Result<Effect, ProtocolError> {
        let kind = message.kind();
        match message {
            ServerMessage::RoundState {
                round_number,
                status,
                time_remaining,
                history,
                bets,
                ..
            } => Ok(self.resync(round_number, status, time_remaining, &history, &bets, now)),
            ServerMessage::RoundStarting {
                round_number,
                time_remaining,
                history,
                bets,
            } => Ok(self.start_round(round_number, time_remaining, &history, &bets, now)),
            ServerMessage::BetPlaced {
                color,
                username,
                amount,
                round_number,
            } => {
                if let Err(reason) = self.check_round(round_number, Phase::Betting) {
                    return Ok(ignored(kind, reason));
                }
                self.ledger.record(color, &username, amount)?;
                let own = username == self.ledger.local_player();
                Ok(Effect::BetRecorded {
                    color,
                    player: username,
                    amount,
                    own,
                })
            }
            ServerMessage::RoundSpinning {
                winning_slot,
                winning_color,
                round_number,
            } => self.start_spin(winning_slot, winning_color, round_number, now),
            ServerMessage::RoundResult {
                winning_color,
                your_payout,
                your_balance,
                round_number,
            } => Ok(self.declare_result(winning_color, your_payout, your_balance, round_number)),
            ServerMessage::BalanceUpdate { balance } => {
                self.balance = Some(balance);
                Ok(Effect::BalanceChanged(balance))
            }
            ServerMessage::Error { message } => {
                warn!(%message, "server rejected request");
                Ok(Effect::ServerRejected(message))
            }
        }
    }

    /// Check a bet locally and build the command to send.
    ///
    /// Checks run in order: amount, synchronization, phase, balance.
    pub fn validate_bet(&self, color: Color, amount: i64) -> Result<ClientMessage, ValidationError> {
        let wire_amount = u64::try_from(amount)
            .ok()
            .filter(|amount| *amount > 0)
            .ok_or(ValidationError::NonPositiveAmount)?;
        let round = self.round.as_ref().ok_or(ValidationError::NotSynchronized)?;
        if round.phase != Phase::Betting {
            return Err(ValidationError::BettingClosed);
        }
        if let Some(balance) = self.balance {
            if amount > balance {
                return Err(ValidationError::InsufficientBalance { amount, balance });
            }
        }
        Ok(ClientMessage::PlaceBet {
            color,
            amount: wire_amount,
        })
    }

    fn resync(
        &mut self,
        number: u64,
        status: RoundStatus,
        time_remaining: f64,
        history: &[Color],
        bets: &[BetEntry],
        now: Instant,
    ) -> Effect {
        let previous = self.round.take();
        if let Some(previous) = &previous {
            if number < previous.number {
                warn!(round = number, previous = previous.number, "snapshot rewinds round number");
            }
        }

        let (phase, countdown) = match status {
            RoundStatus::Betting => (Phase::Betting, Countdown::start(now, time_remaining)),
            RoundStatus::Spinning => (Phase::Spinning, Countdown::Pinned),
        };
        // A replayed snapshot must not restart an animation already under way.
        let spin = previous
            .filter(|previous| previous.number == number && phase == Phase::Spinning)
            .and_then(|previous| previous.spin);
        self.round = Some(Round {
            number,
            phase,
            countdown,
            spin,
        });
        if spin.is_none() {
            self.last_outcome = None;
        }

        let applied = self.ledger.rebuild_from_snapshot(bets);
        self.history.replace(history);
        info!(round = number, %phase, bets = applied, "resynchronized");
        Effect::Resynced {
            round: number,
            phase,
        }
    }

    fn start_round(
        &mut self,
        number: u64,
        time_remaining: f64,
        history: &[Color],
        bets: &[BetEntry],
        now: Instant,
    ) -> Effect {
        if let Some(current) = self.round_number() {
            if number < current {
                warn!(round = number, current, "dropping stale round start");
                return ignored("round_starting", "stale round");
            }
            if number == current {
                return ignored("round_starting", "duplicate round");
            }
        }

        self.round = Some(Round {
            number,
            phase: Phase::Betting,
            countdown: Countdown::start(now, time_remaining),
            spin: None,
        });
        self.last_outcome = None;
        self.ledger.reset();
        self.ledger.apply_entries(bets);
        if self.history.is_empty() {
            self.history.replace(history);
        }
        debug!(round = number, time_remaining, "round started");
        Effect::RoundStarted { round: number }
    }

    fn start_spin(
        &mut self,
        slot: u8,
        color: Color,
        round_number: Option<u64>,
        now: Instant,
    ) -> Result<Effect, ProtocolError> {
        let expected = slot_color(slot).ok_or(ProtocolError::SlotOutOfRange(slot))?;
        let round = match self.round.as_mut() {
            Some(round) => round,
            None => return Ok(ignored("round_spinning", "not synchronized")),
        };
        if round_number.is_some_and(|number| number != round.number) {
            return Ok(ignored("round_spinning", "stale round"));
        }
        match (round.phase, round.spin) {
            (Phase::Betting, _) | (Phase::Spinning, None) => {}
            (Phase::Spinning, Some(_)) => return Ok(ignored("round_spinning", "already spinning")),
            (Phase::Result, _) => return Ok(ignored("round_spinning", "result already declared")),
        }
        if expected != color {
            warn!(slot, declared = %color, layout = %expected, "winning color does not match wheel layout");
        }

        round.phase = Phase::Spinning;
        round.countdown = Countdown::Pinned;
        round.spin = Some(Spin { slot, color });
        let number = round.number;
        let target = self.wheel.spin(slot, now).to;
        debug!(round = number, slot, %color, target, "spin started");
        Ok(Effect::SpinStarted {
            slot,
            color,
            target,
        })
    }

    fn declare_result(
        &mut self,
        winning_color: Color,
        payout: i64,
        balance: Option<i64>,
        round_number: Option<u64>,
    ) -> Effect {
        let number = match self.check_round(round_number, Phase::Spinning) {
            Ok(number) => number,
            Err("stale round") => return ignored("round_result", "stale round"),
            // Outside a spin only the balance is trusted.
            Err(reason) => {
                return match balance {
                    Some(balance) => {
                        debug!(reason, balance, "result outside spin; keeping balance only");
                        self.balance = Some(balance);
                        Effect::BalanceChanged(balance)
                    }
                    None => ignored("round_result", reason),
                };
            }
        };

        if let Some(round) = self.round.as_mut() {
            round.phase = Phase::Result;
        }
        if let Some(balance) = balance {
            self.balance = Some(balance);
        }
        self.history.push(winning_color);
        let outcome = Outcome {
            round: number,
            winning_color,
            payout,
        };
        info!(round = number, color = %winning_color, payout, "round result");
        self.last_outcome = Some(outcome.clone());
        Effect::ResultDeclared(outcome)
    }

    /// Active round number if the message belongs to it and the round is in
    /// `phase`.
    fn check_round(&self, round_number: Option<u64>, phase: Phase) -> Result<u64, &'static str> {
        let round = self.round.as_ref().ok_or("not synchronized")?;
        if round_number.is_some_and(|number| number != round.number) {
            return Err("stale round");
        }
        if round.phase != phase {
            return Err(match phase {
                Phase::Betting => "betting closed",
                _ => "not spinning",
            });
        }
        Ok(round.number)
    }
}

fn ignored(kind: &'static str, reason: &'static str) -> Effect {
    debug!(kind, reason, "ignoring message");
    Effect::Ignored { kind, reason }
}

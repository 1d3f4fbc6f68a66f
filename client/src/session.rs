use crate::{
    connection::{ConnectionEvent, ConnectionState},
    projector::{format_money, project, result_banner, Projection},
    round::{Effect, RoundStateMachine},
    ValidationError,
};
use casino_types::{ClientMessage, Color};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Oldest notices are dropped past this many.
pub const NOTICE_CAPACITY: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message for the player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// Everything one client knows about the table.
///
/// The session is the only owner of round state: connection events go in
/// through [`Session::apply_event`], bets come out of [`Session::place_bet`],
/// and renderers read [`Session::projection`].
#[derive(Clone, Debug)]
pub struct Session {
    machine: RoundStateMachine,
    connection: ConnectionState,
    epoch: Option<u64>,
    notices: VecDeque<Notice>,
    posted: u64,
}

impl Session {
    pub fn new(local_player: impl Into<String>) -> Self {
        Self {
            machine: RoundStateMachine::new(local_player),
            connection: ConnectionState::Disconnected,
            epoch: None,
            notices: VecDeque::new(),
            posted: 0,
        }
    }

    pub fn machine(&self) -> &RoundStateMachine {
        &self.machine
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Epoch of the connection currently addressed, if any.
    pub fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    pub fn balance(&self) -> Option<i64> {
        self.machine.balance()
    }

    pub fn set_balance(&mut self, balance: i64) {
        self.machine.set_balance(balance);
    }

    pub fn notices(&self) -> impl DoubleEndedIterator<Item = &Notice> {
        self.notices.iter()
    }

    /// Notices posted so far, including any already evicted.
    pub fn posted(&self) -> u64 {
        self.posted
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.posted += 1;
        self.notices.push_back(Notice {
            level,
            text: text.into(),
        });
        while self.notices.len() > NOTICE_CAPACITY {
            self.notices.pop_front();
        }
    }

    /// Apply one event from the connection task. Returns the effect on the
    /// round, if the event carried a message that was applied.
    pub fn apply_event(&mut self, event: ConnectionEvent, now: Instant) -> Option<Effect> {
        let epoch = event.epoch();
        match event {
            ConnectionEvent::Connecting { epoch } => {
                self.epoch = Some(epoch);
                self.connection = ConnectionState::Connecting;
                None
            }
            ConnectionEvent::Connected { .. } if self.is_current(epoch) => {
                self.connection = ConnectionState::Connected;
                self.notify(NoticeLevel::Info, "Connected; syncing table state");
                None
            }
            ConnectionEvent::Disconnected { reason, .. } if self.is_current(epoch) => {
                self.connection = ConnectionState::Disconnected;
                self.notify(
                    NoticeLevel::Warning,
                    format!("Disconnected ({reason}); reconnecting"),
                );
                None
            }
            // The command is lost whichever connection dropped it.
            ConnectionEvent::Discarded { message, .. } => {
                if let ClientMessage::PlaceBet { color, amount } = message {
                    let amount = i64::try_from(amount)
                        .map(format_money)
                        .unwrap_or_else(|_| amount.to_string());
                    self.notify(
                        NoticeLevel::Warning,
                        format!("Bet of ${amount} on {color} was not sent: connection lost"),
                    );
                }
                None
            }
            ConnectionEvent::Protocol { error, .. } if self.is_current(epoch) => {
                warn!(epoch, %error, "discarding message");
                None
            }
            ConnectionEvent::Message { message, .. } if self.is_current(epoch) => {
                match self.machine.apply(message, now) {
                    Ok(effect) => {
                        self.surface(&effect);
                        Some(effect)
                    }
                    Err(error) => {
                        warn!(epoch, %error, "discarding message");
                        None
                    }
                }
            }
            _ => {
                debug!(epoch, current = ?self.epoch, "dropping event from superseded connection");
                None
            }
        }
    }

    /// Check a bet locally. On success the returned command is ready to send;
    /// on failure the reason is also recorded as a notice.
    pub fn place_bet(&mut self, color: Color, amount: i64) -> Result<ClientMessage, ValidationError> {
        let result = if amount > 0 && self.connection != ConnectionState::Connected {
            Err(ValidationError::NotConnected)
        } else {
            self.machine.validate_bet(color, amount)
        };
        match &result {
            Ok(_) => debug!(%color, amount, "bet validated"),
            Err(error) => self.notify(NoticeLevel::Warning, error.to_string()),
        }
        result
    }

    pub fn projection(&self, now: Instant) -> Projection {
        project(&self.machine, self.connection, now)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch == Some(epoch)
    }

    fn surface(&mut self, effect: &Effect) {
        match effect {
            Effect::ResultDeclared(outcome) => {
                let level = if outcome.payout > 0 {
                    info!(payout = outcome.payout, "won");
                    NoticeLevel::Success
                } else {
                    NoticeLevel::Info
                };
                self.notify(level, result_banner(outcome));
            }
            Effect::ServerRejected(message) => {
                self.notify(NoticeLevel::Error, message.clone());
            }
            Effect::Resynced { round, phase } => {
                debug!(round, %phase, "session resynchronized");
            }
            _ => {}
        }
    }
}

//! Pure projection of round state into display values.

use crate::{
    connection::ConnectionState,
    round::{Outcome, Phase, RoundStateMachine},
    wheel::color_under_pointer,
};
use casino_types::{Color, COLORS};
use std::time::Instant;

/// One player's line on a color tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerLine {
    pub player: String,
    pub amount: i64,
    pub own: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileView {
    pub color: Color,
    pub multiplier: u64,
    pub total: i64,
    pub own: i64,
    pub total_label: String,
    pub own_label: String,
    /// Largest stake first.
    pub players: Vec<PlayerLine>,
}

/// Everything a renderer needs for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub connection: ConnectionState,
    pub connection_label: &'static str,
    pub round_label: String,
    pub phase: Option<Phase>,
    pub phase_label: &'static str,
    pub countdown: String,
    pub countdown_ticking: bool,
    pub betting_enabled: bool,
    pub balance_label: String,
    pub tiles: Vec<TileView>,
    pub history: Vec<Color>,
    pub winner: Option<Color>,
    pub banner: Option<String>,
    pub wheel_angle: f64,
    pub pointer_color: Color,
    pub wheel_spinning: bool,
}

/// Render `amount` with thousands separators: `16986566` -> `16,986,566`.
pub fn format_money(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

/// Headline for a declared result.
pub fn result_banner(outcome: &Outcome) -> String {
    if outcome.payout > 0 {
        format!(
            "{} WINS! You won ${}!",
            outcome.winning_color,
            format_money(outcome.payout)
        )
    } else {
        format!("{} wins.", outcome.winning_color)
    }
}

pub fn project(machine: &RoundStateMachine, connection: ConnectionState, now: Instant) -> Projection {
    let phase = machine.phase();
    let countdown = machine.countdown();
    let ledger = machine.ledger();

    let tiles = COLORS
        .iter()
        .map(|&color| {
            let total = ledger.total(color);
            let own = ledger.own_total(color);
            TileView {
                color,
                multiplier: color.multiplier(),
                total,
                own,
                total_label: format!("${}", format_money(total)),
                own_label: format!("${}", format_money(own)),
                players: ledger
                    .ranked(color)
                    .into_iter()
                    .map(|stake| PlayerLine {
                        own: stake.player == ledger.local_player(),
                        player: stake.player,
                        amount: stake.amount,
                    })
                    .collect(),
            }
        })
        .collect();

    let outcome = machine.last_outcome();
    let banner = outcome.map(result_banner);
    // The previous winner is hidden while this round's spin is undecided.
    let winner = match phase {
        Some(Phase::Spinning) => None,
        _ => outcome
            .map(|outcome| outcome.winning_color)
            .or_else(|| machine.history().latest()),
    };

    let wheel = machine.wheel();
    let wheel_angle = wheel.angle_at(now);

    Projection {
        connection,
        connection_label: connection.as_str(),
        round_label: machine
            .round_number()
            .map(|number| format!("Round #{number}"))
            .unwrap_or_else(|| "--".to_string()),
        phase,
        phase_label: phase.map(|phase| phase.as_str()).unwrap_or("WAITING"),
        countdown: countdown.label(now),
        countdown_ticking: countdown.is_ticking(now),
        betting_enabled: phase == Some(Phase::Betting) && connection == ConnectionState::Connected,
        balance_label: machine
            .balance()
            .map(|balance| format!("${}", format_money(balance)))
            .unwrap_or_else(|| "--".to_string()),
        tiles,
        history: machine.history().to_vec(),
        winner,
        banner,
        wheel_angle,
        pointer_color: color_under_pointer(wheel_angle),
        wheel_spinning: wheel.is_spinning(now),
    }
}

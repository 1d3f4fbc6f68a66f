use casino_client::{format_money, Projection, TileView};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color as Tint, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

use crate::commands::COMMANDS;
use crate::App;

pub fn tint(color: casino_types::Color) -> Tint {
    match color {
        casino_types::Color::Gray => Tint::Gray,
        casino_types::Color::Red => Tint::Red,
        casino_types::Color::Blue => Tint::Blue,
        casino_types::Color::Gold => Tint::Yellow,
    }
}

pub fn draw_ui(f: &mut ratatui::Frame, app: &App, view: &Projection) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(6),
            Constraint::Min(6),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(f.area());

    draw_status(f, chunks[0], app, view);
    draw_wheel(f, chunks[1], view);
    draw_tiles(f, chunks[2], view);
    draw_log(f, chunks[3], app);
    draw_input(f, chunks[4], app, view);

    if !app.completion.filtered.is_empty() {
        let height = (app.completion.filtered.len() as u16).min(6) + 2;
        let area = Rect {
            x: chunks[4].x,
            y: chunks[4].y.saturating_sub(height),
            width: chunks[4].width.min(48),
            height,
        };
        let items: Vec<ListItem> = app
            .completion
            .filtered
            .iter()
            .map(|&idx| {
                let cmd = &COMMANDS[idx];
                ListItem::new(Line::from(vec![
                    Span::styled(format!("/{}", cmd.name), Style::default().fg(Tint::Cyan)),
                    Span::raw("  "),
                    Span::styled(cmd.desc, Style::default().fg(Tint::Gray)),
                ]))
            })
            .collect();
        let mut state = ListState::default();
        state.select(Some(app.completion.selected.min(items.len().saturating_sub(1))));
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Commands"))
            .highlight_style(Style::default().fg(Tint::Yellow));
        f.render_widget(Clear, area);
        f.render_stateful_widget(list, area, &mut state);
    }
}

fn draw_status(f: &mut ratatui::Frame, area: Rect, app: &App, view: &Projection) {
    let connection = match view.connection {
        casino_client::ConnectionState::Connected => Tint::Green,
        casino_client::ConnectionState::Connecting => Tint::Yellow,
        casino_client::ConnectionState::Disconnected => Tint::Red,
    };
    let countdown = if view.countdown_ticking {
        Style::default().fg(Tint::White)
    } else {
        Style::default().fg(Tint::DarkGray)
    };
    let line = Line::from(vec![
        Span::styled(view.connection_label, Style::default().fg(connection)),
        Span::raw(" | "),
        Span::raw(view.round_label.clone()),
        Span::raw(" | "),
        Span::styled(view.phase_label, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::styled(view.countdown.clone(), countdown),
        Span::raw(" | Balance "),
        Span::raw(view.balance_label.clone()),
        Span::raw(" | Bet $"),
        Span::raw(format_money(app.slip.amount())),
        Span::raw(" | "),
        Span::raw(app.username.clone()),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn draw_wheel(f: &mut ratatui::Frame, area: Rect, view: &Projection) {
    let add = |lines: &mut Vec<Line<'static>>, label: &str, value: Span<'static>| {
        lines.push(Line::from(vec![
            Span::styled(format!("{label}: "), Style::default().fg(Tint::Yellow)),
            value,
        ]));
    };

    let mut lines = Vec::new();
    add(
        &mut lines,
        "Pointer",
        Span::styled(
            format!(
                "{} ({:.1}°){}",
                view.pointer_color,
                view.wheel_angle.rem_euclid(360.0),
                if view.wheel_spinning { " spinning" } else { "" }
            ),
            Style::default().fg(tint(view.pointer_color)),
        ),
    );
    let winner = match view.winner {
        Some(color) => Span::styled(color.to_string(), Style::default().fg(tint(color))),
        None => Span::raw("--"),
    };
    add(&mut lines, "Winner", winner);
    add(
        &mut lines,
        "Result",
        Span::styled(
            view.banner.clone().unwrap_or_default(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    );

    let mut history = vec![Span::styled("History: ", Style::default().fg(Tint::Yellow))];
    for color in &view.history {
        history.push(Span::styled("■ ", Style::default().fg(tint(*color))));
    }
    lines.push(Line::from(history));

    let wheel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Wheel"));
    f.render_widget(wheel, area);
}

fn draw_tiles(f: &mut ratatui::Frame, area: Rect, view: &Projection) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); 4])
        .split(area);
    for (tile, column) in view.tiles.iter().zip(columns.iter()) {
        f.render_widget(tile_list(tile, view.betting_enabled), *column);
    }
}

fn tile_list(tile: &TileView, enabled: bool) -> List<'static> {
    let mut items = vec![
        ListItem::new(Line::from(vec![
            Span::styled("Total ", Style::default().fg(Tint::Yellow)),
            Span::raw(tile.total_label.clone()),
        ])),
        ListItem::new(Line::from(vec![
            Span::styled("Mine  ", Style::default().fg(Tint::Yellow)),
            Span::raw(tile.own_label.clone()),
        ])),
    ];
    for line in &tile.players {
        let style = if line.own {
            Style::default().fg(Tint::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        items.push(ListItem::new(Line::from(Span::styled(
            format!("{:<12} ${}", line.player, format_money(line.amount)),
            style,
        ))));
    }

    let border = if enabled {
        Style::default().fg(tint(tile.color))
    } else {
        Style::default().fg(Tint::DarkGray)
    };
    List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(format!("{} x{}", tile.color, tile.multiplier)),
    )
}

fn draw_log(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let log_lines: Vec<Line> = app
        .logs
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .rev()
        .map(|l| Line::raw(l.clone()))
        .collect();
    let log = Paragraph::new(log_lines)
        .block(Block::default().borders(Borders::ALL).title("Log"))
        .wrap(Wrap { trim: true });
    f.render_widget(log, area);
}

fn draw_input(f: &mut ratatui::Frame, area: Rect, app: &App, view: &Projection) {
    let title = if app.hint.is_empty() {
        "Input".to_string()
    } else {
        format!("Input · {}", app.hint)
    };
    let prompt_style = if view.betting_enabled {
        Style::default().fg(Tint::Green)
    } else {
        Style::default().fg(Tint::DarkGray)
    };
    let prompt = Line::from(vec![
        Span::styled("roulette $ ", prompt_style),
        Span::raw(app.input.clone()),
    ]);
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(prompt).block(Block::default().borders(Borders::ALL).title(title)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use casino_client::{ConnectionState, RoundStateMachine};
    use casino_types::{BetEntry, Color, RoundStatus, ServerMessage};
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Instant;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn renders_table_state() {
        let now = Instant::now();
        let mut machine = RoundStateMachine::new("me");
        machine
            .apply(
                ServerMessage::RoundState {
                    round_number: 21,
                    status: RoundStatus::Betting,
                    time_remaining: 9.0,
                    history: vec![Color::Gold],
                    bets: vec![BetEntry {
                        color: Color::Blue,
                        username: "alice".into(),
                        amount: 12_000,
                    }],
                    total_bets: None,
                },
                now,
            )
            .unwrap();
        let view = casino_client::project(&machine, ConnectionState::Connected, now);
        let app = App::new("me".into(), 100);

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| draw_ui(f, &app, &view)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Round #21"));
        assert!(text.contains("BETTING"));
        assert!(text.contains("BLUE x5"));
        assert!(text.contains("$12,000"));
        assert!(text.contains("Winner: GOLD"));
    }
}

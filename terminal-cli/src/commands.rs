use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Context, Result};
use casino_types::{Color, COLORS};
use lazy_static::lazy_static;

#[derive(Clone)]
pub struct CommandDef {
    pub name: &'static str,
    pub usage: &'static str,
    pub desc: &'static str,
    pub group: &'static str,
}

const fn cmd(name: &'static str, usage: &'static str, desc: &'static str, group: &'static str) -> CommandDef {
    CommandDef { name, usage, desc, group }
}

lazy_static! {
    pub static ref COMMANDS: Vec<CommandDef> = vec![
        // Table
        cmd("bet", "/bet <color> [amount]", "Bet on GRAY, RED, BLUE or GOLD", "Table"),
        // Slip
        cmd("amount", "/amount <n>", "Set the bet amount", "Slip"),
        cmd("add", "/add <n>", "Add to the bet amount", "Slip"),
        cmd("x", "/x <factor>", "Multiply the bet amount", "Slip"),
        cmd("allin", "/allin", "Bet amount = whole balance", "Slip"),
        // Session
        cmd("reconnect", "/reconnect", "Drop the connection and resync", "Session"),
        cmd("help", "/help", "Show commands", "Session"),
        cmd("quit", "/quit", "Exit", "Session"),
    ];
    static ref HINTS: HashMap<String, String> = COMMANDS
        .iter()
        .map(|c| (format!("/{}", c.name), format!("{} · {}", c.usage, c.desc)))
        .collect();
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandAction {
    /// Bet on `color`; `None` uses the slip amount.
    Bet { color: Color, amount: Option<i64> },
    SetAmount(i64),
    AddAmount(i64),
    Multiply(f64),
    AllIn,
    Reconnect,
    Local(String),
    Quit,
}

pub fn handle_line(line: &str) -> Result<CommandAction> {
    let Some(body) = line.strip_prefix('/') else {
        return Err(anyhow!("Commands start with '/'"));
    };
    let mut parts = body.split_whitespace().map(str::to_string).collect::<Vec<_>>();
    if parts.is_empty() {
        return Ok(CommandAction::Local(String::new()));
    }
    let cmd = parts.remove(0).to_lowercase();
    match cmd.as_str() {
        "quit" | "exit" => Ok(CommandAction::Quit),
        "help" => Ok(CommandAction::Local(render_help())),
        "reconnect" => Ok(CommandAction::Reconnect),
        "bet" => {
            let color = parts
                .first()
                .ok_or_else(|| anyhow!("Usage: /bet <color> [amount]"))?;
            let color: Color = color.parse()?;
            let amount = parts.get(1).map(|n| parse_amount(n)).transpose()?;
            Ok(CommandAction::Bet { color, amount })
        }
        "amount" => Ok(CommandAction::SetAmount(required_amount(&parts, "/amount <n>")?)),
        "add" => Ok(CommandAction::AddAmount(required_amount(&parts, "/add <n>")?)),
        "x" => {
            let factor: f64 = parts
                .first()
                .ok_or_else(|| anyhow!("Usage: /x <factor>"))?
                .parse()
                .context("factor")?;
            if !factor.is_finite() || factor <= 0.0 {
                return Err(anyhow!("Factor must be positive"));
            }
            Ok(CommandAction::Multiply(factor))
        }
        "allin" | "all" => Ok(CommandAction::AllIn),
        _ => Err(anyhow!("Unknown command /{cmd}")),
    }
}

fn required_amount(parts: &[String], usage: &str) -> Result<i64> {
    let raw = parts
        .first()
        .ok_or_else(|| anyhow!("Usage: {usage}"))?;
    parse_amount(raw)
}

/// Whole amounts, with optional `$` and thousands separators.
fn parse_amount(raw: &str) -> Result<i64> {
    let cleaned: String = raw
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    cleaned
        .parse::<i64>()
        .with_context(|| format!("invalid amount: {raw}"))
}

pub fn render_help() -> String {
    let mut by_group: BTreeMap<&str, Vec<&CommandDef>> = BTreeMap::new();
    for c in COMMANDS.iter() {
        by_group.entry(c.group).or_default().push(c);
    }
    let mut out = String::new();
    for (group, cmds) in by_group {
        out.push_str(&format!("[{group}]\n"));
        for c in cmds {
            out.push_str(&format!("  {:<22} {}\n", c.usage, c.desc));
        }
    }
    let colors = COLORS
        .iter()
        .map(|c| format!("{c} x{} ({:.1}%)", c.multiplier(), c.probability()))
        .collect::<Vec<_>>()
        .join(" | ");
    out.push_str(&format!("Payouts: {colors}"));
    out
}

/// Usage hint for whatever is being typed.
pub fn hint_for(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return "Type /help or Tab for completions".into();
    }
    let first = trimmed.split_whitespace().next().unwrap_or("");
    HINTS.get(&first.to_lowercase()).cloned().unwrap_or_default()
}

/// Indices into [`COMMANDS`] matching a partially typed command.
pub fn completions(input: &str) -> Vec<usize> {
    let trimmed = input.trim();
    let Some(needle) = trimmed.strip_prefix('/') else {
        return Vec::new();
    };
    if needle.contains(' ') {
        return Vec::new();
    }
    let needle = needle.to_lowercase();
    COMMANDS
        .iter()
        .enumerate()
        .filter(|(_, c)| c.name.starts_with(&needle))
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bet_commands() {
        assert_eq!(
            handle_line("/bet red 250").unwrap(),
            CommandAction::Bet {
                color: Color::Red,
                amount: Some(250)
            }
        );
        assert_eq!(
            handle_line("/BET grey").unwrap(),
            CommandAction::Bet {
                color: Color::Gray,
                amount: None
            }
        );
        assert_eq!(
            handle_line("/bet gold $1,000").unwrap(),
            CommandAction::Bet {
                color: Color::Gold,
                amount: Some(1_000)
            }
        );
        assert!(handle_line("/bet purple 5").is_err());
        assert!(handle_line("/bet").is_err());
        // Zero is passed through; the session rejects it.
        assert_eq!(
            handle_line("/bet blue 0").unwrap(),
            CommandAction::Bet {
                color: Color::Blue,
                amount: Some(0)
            }
        );
    }

    #[test]
    fn slip_commands() {
        assert_eq!(handle_line("/amount 50").unwrap(), CommandAction::SetAmount(50));
        assert_eq!(handle_line("/add 10").unwrap(), CommandAction::AddAmount(10));
        assert_eq!(handle_line("/x 2").unwrap(), CommandAction::Multiply(2.0));
        assert_eq!(handle_line("/x 0.5").unwrap(), CommandAction::Multiply(0.5));
        assert_eq!(handle_line("/allin").unwrap(), CommandAction::AllIn);
        assert!(handle_line("/x -1").is_err());
        assert!(handle_line("/amount lots").is_err());
    }

    #[test]
    fn session_commands() {
        assert_eq!(handle_line("/quit").unwrap(), CommandAction::Quit);
        assert_eq!(handle_line("/reconnect").unwrap(), CommandAction::Reconnect);
        assert!(matches!(handle_line("/help").unwrap(), CommandAction::Local(text) if text.contains("/bet <color>")));
        assert!(handle_line("bet red 5").is_err());
        assert!(handle_line("/spin").is_err());
    }

    #[test]
    fn completion_and_hints() {
        let names: Vec<_> = completions("/a").into_iter().map(|i| COMMANDS[i].name).collect();
        assert_eq!(names, vec!["amount", "add", "allin"]);
        assert!(completions("/bet red").is_empty());
        assert!(completions("bet").is_empty());
        assert!(hint_for("/bet ").starts_with("/bet <color> [amount]"));
        assert_eq!(hint_for(""), "Type /help or Tab for completions");
    }
}

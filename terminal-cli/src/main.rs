use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use casino_client::{
    timer::REFRESH_INTERVAL, BetMemory, BetSlip, ConnectionConfig, ConnectionHandle,
    ConnectionManager, NoticeLevel, Session, WalletClient, ROULETTE_GAME,
};
use chrono::Local;
use clap::Parser;
use crossterm::event::{Event as CEvent, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use directories::ProjectDirs;
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use serde::{Deserialize, Serialize};
use tokio::select;
use tokio::sync::mpsc;
use tracing::{info, warn};

mod commands;
mod ui;

use commands::{completions, handle_line, hint_for, CommandAction, COMMANDS};

const DEFAULT_URL: &str = "ws://localhost:8000/ws/roulette/";
const DEFAULT_API: &str = "http://localhost:8000/api/";
const DEFAULT_AMOUNT: i64 = 100;
const MAX_LOG_LINES: usize = 300;

/// CLI flags (override persisted config)
#[derive(Parser, Debug)]
#[command(name = "casino-terminal", about = "Live roulette table in the terminal")]
struct Args {
    /// Table websocket URL
    #[arg(long)]
    url: Option<String>,

    /// REST base URL used for the balance query
    #[arg(long)]
    api: Option<String>,

    /// Name the server knows you by; your own bets are highlighted
    #[arg(long)]
    username: Option<String>,

    /// Session cookie sent with every request (e.g. `sessionid=...`)
    #[arg(long)]
    cookie: Option<String>,

    /// Log at debug level
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct PersistedConfig {
    url: Option<String>,
    api: Option<String>,
    username: Option<String>,
    cookie: Option<String>,
    verbose: Option<bool>,
}

/// Effective settings after merging flags over the persisted config.
#[derive(Debug, PartialEq)]
struct Settings {
    url: String,
    api: String,
    username: String,
    cookie: Option<String>,
    verbose: bool,
}

impl Settings {
    fn resolve(args: &Args, cfg: &PersistedConfig) -> Self {
        Self {
            url: args
                .url
                .clone()
                .or_else(|| cfg.url.clone())
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            api: args
                .api
                .clone()
                .or_else(|| cfg.api.clone())
                .unwrap_or_else(|| DEFAULT_API.to_string()),
            username: args
                .username
                .clone()
                .or_else(|| cfg.username.clone())
                .unwrap_or_else(|| "guest".to_string()),
            cookie: args.cookie.clone().or_else(|| cfg.cookie.clone()),
            verbose: args.verbose || cfg.verbose.unwrap_or(false),
        }
    }

    fn persist(&self, cfg: &mut PersistedConfig) {
        cfg.url = Some(self.url.clone());
        cfg.api = Some(self.api.clone());
        cfg.username = Some(self.username.clone());
        cfg.cookie = self.cookie.clone();
        cfg.verbose = Some(self.verbose);
    }
}

#[derive(Default)]
pub struct CompletionState {
    pub filtered: Vec<usize>,
    pub selected: usize,
}

pub struct App {
    pub username: String,
    pub input: String,
    pub hint: String,
    pub logs: Vec<String>,
    pub slip: BetSlip,
    pub completion: CompletionState,
    seen_notices: u64,
}

impl App {
    pub fn new(username: String, amount: i64) -> Self {
        Self {
            username,
            input: String::new(),
            hint: hint_for(""),
            logs: Vec::new(),
            slip: BetSlip::new(amount),
            completion: CompletionState::default(),
            seen_notices: 0,
        }
    }

    fn push_log(&mut self, line: String) {
        let ts = Local::now().format("%H:%M:%S");
        for part in line.lines() {
            self.logs.push(format!("{ts} {part}"));
        }
        if self.logs.len() > MAX_LOG_LINES {
            let excess = self.logs.len() - MAX_LOG_LINES;
            self.logs.drain(0..excess);
        }
    }

    /// Copy notices the session posted since the last call into the log.
    fn sync_notices(&mut self, session: &Session) {
        let fresh = session.posted().saturating_sub(self.seen_notices);
        let fresh = usize::try_from(fresh).unwrap_or(usize::MAX);
        let mut lines: Vec<String> = session
            .notices()
            .rev()
            .take(fresh)
            .map(|notice| {
                let marker = match notice.level {
                    NoticeLevel::Info => "·",
                    NoticeLevel::Success => "★",
                    NoticeLevel::Warning => "!",
                    NoticeLevel::Error => "✗",
                };
                format!("{marker} {}", notice.text)
            })
            .collect();
        lines.reverse();
        for line in lines {
            self.push_log(line);
        }
        self.seen_notices = session.posted();
    }

    fn update_hint(&mut self) {
        self.completion.filtered = completions(&self.input);
        self.completion.selected = 0;
        self.hint = hint_for(&self.input);
    }
}

/// Everything a command may touch.
struct Table<'a> {
    session: &'a mut Session,
    connection: &'a ConnectionHandle,
    memory: &'a mut BetMemory,
}

impl Table<'_> {
    fn remember(&mut self, amount: i64) {
        if let Err(e) = self.memory.remember(ROULETTE_GAME, amount) {
            warn!(error = %e, "failed to save bet amount");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = load_config().unwrap_or_default();
    let settings = Settings::resolve(&args, &cfg);
    settings.persist(&mut cfg);
    save_config(&cfg)?;

    init_logging(settings.verbose)?;
    info!(url = %settings.url, username = %settings.username, "starting");

    let mut memory =
        BetMemory::load(data_path("bets.json").unwrap_or_else(|| PathBuf::from("bets.json")));
    let mut session = Session::new(settings.username.clone());
    let mut app = App::new(
        settings.username.clone(),
        memory.get(ROULETTE_GAME).unwrap_or(DEFAULT_AMOUNT),
    );
    app.push_log(format!("Connecting to {}", settings.url));

    let mut config = ConnectionConfig::new(settings.url.clone());
    if let Some(cookie) = &settings.cookie {
        config = config.with_cookie(cookie.clone());
    }
    let (connection, mut events) =
        ConnectionManager::spawn(config).context("start table connection")?;

    // Seed the balance over REST; the websocket keeps it current afterwards.
    let (balance_tx, mut balance_rx) = mpsc::unbounded_channel::<Result<i64, String>>();
    let wallet = WalletClient::new(&settings.api, settings.cookie.clone())
        .context("wallet client")?;
    tokio::spawn(async move {
        let result = wallet.balance().await.map_err(|e| e.to_string());
        let _ = balance_tx.send(result);
    });

    // TUI setup
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut keys = EventStream::new();
    let mut table = Table {
        session: &mut session,
        connection: &connection,
        memory: &mut memory,
    };

    loop {
        app.sync_notices(table.session);
        let view = table.session.projection(Instant::now());
        terminal.draw(|f| ui::draw_ui(f, &app, &view))?;

        select! {
            maybe_ev = keys.next() => {
                if let Some(Ok(ev)) = maybe_ev {
                    if handle_key_event(ev, &mut app, &mut table) {
                        break;
                    }
                }
            }
            Some(event) = events.recv() => {
                table.session.apply_event(event, Instant::now());
            }
            Some(result) = balance_rx.recv() => match result {
                Ok(balance) => table.session.set_balance(balance),
                Err(e) => {
                    warn!(error = %e, "balance query failed");
                    table.session.notify(NoticeLevel::Warning, format!("Balance unavailable: {e}"));
                }
            },
            _ = tokio::time::sleep(REFRESH_INTERVAL) => {}
        }
    }

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    connection.shutdown();
    info!("stopped");
    Ok(())
}

/// Returns true when the app should exit.
fn handle_key_event(ev: CEvent, app: &mut App, table: &mut Table<'_>) -> bool {
    let CEvent::Key(KeyEvent { code, modifiers, kind, .. }) = ev else {
        return false;
    };
    if kind == KeyEventKind::Release {
        return false;
    }
    match (code, modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => return true,
        (KeyCode::Char('d'), KeyModifiers::CONTROL) => return true,
        (KeyCode::Up, _) => {
            let len = app.completion.filtered.len();
            if len > 0 {
                app.completion.selected = app.completion.selected.saturating_add(len - 1) % len;
            }
        }
        (KeyCode::Down, _) => {
            let len = app.completion.filtered.len();
            if len > 0 {
                app.completion.selected = (app.completion.selected + 1) % len;
            }
        }
        (KeyCode::Tab, _) => {
            if let Some(&idx) = app
                .completion
                .filtered
                .get(app.completion.selected)
                .or_else(|| app.completion.filtered.first())
            {
                app.input = format!("/{} ", COMMANDS[idx].name);
                app.update_hint();
            }
        }
        (KeyCode::Enter, _) => {
            let line = app.input.trim().to_string();
            app.input.clear();
            app.update_hint();
            if line.is_empty() {
                return false;
            }
            match handle_line(&line) {
                Ok(action) => return execute(action, app, table),
                Err(e) => app.push_log(format!("! {e}")),
            }
        }
        (KeyCode::Char(c), _) => {
            app.input.push(c);
            app.update_hint();
        }
        (KeyCode::Backspace, _) => {
            app.input.pop();
            app.update_hint();
        }
        (KeyCode::Esc, _) => {
            app.input.clear();
            app.update_hint();
        }
        _ => {}
    }
    false
}

/// Run one command. Returns true when the app should exit.
fn execute(action: CommandAction, app: &mut App, table: &mut Table<'_>) -> bool {
    match action {
        CommandAction::Bet { color, amount } => {
            if let Some(amount) = amount {
                app.slip.set(amount);
            }
            let amount = app.slip.amount();
            // Rejections are posted as notices by the session.
            if let Ok(message) = table.session.place_bet(color, amount) {
                match table.connection.send(message) {
                    Ok(()) => {
                        let amount_label = casino_client::format_money(amount);
                        app.push_log(format!("→ ${amount_label} on {color} queued"));
                        table.remember(amount);
                    }
                    Err(e) => app.push_log(format!("! send failed: {e}")),
                }
            }
        }
        CommandAction::SetAmount(amount) => {
            app.slip.set(amount);
            table.remember(app.slip.amount());
        }
        CommandAction::AddAmount(delta) => {
            app.slip.add(delta);
            table.remember(app.slip.amount());
        }
        CommandAction::Multiply(factor) => {
            app.slip.multiply(factor);
            table.remember(app.slip.amount());
        }
        CommandAction::AllIn => match table.session.balance() {
            Some(balance) => {
                app.slip.all_in(balance);
                table.remember(app.slip.amount());
            }
            None => app.push_log("! Balance not known yet".into()),
        },
        CommandAction::Reconnect => {
            app.push_log("Reconnect requested…".into());
            if let Err(e) = table.connection.reconnect() {
                app.push_log(format!("! {e}"));
            }
        }
        CommandAction::Local(text) => {
            if !text.is_empty() {
                app.push_log(text);
            }
        }
        CommandAction::Quit => return true,
    }
    false
}

/// Route logs to a file; the terminal belongs to the UI.
fn init_logging(verbose: bool) -> Result<()> {
    let path = data_path("terminal.log").unwrap_or_else(|| PathBuf::from("casino-terminal.log"));
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn load_config() -> Option<PersistedConfig> {
    let path = config_path()?;
    let data = std::fs::read(path).ok()?;
    serde_json::from_slice(&data).ok()
}

fn save_config(cfg: &PersistedConfig) -> Result<()> {
    if let Some(path) = config_path() {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        std::fs::write(path, data)?;
    }
    Ok(())
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "casino", "casino-terminal")
}

fn config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.json"))
}

fn data_path(name: &str) -> Option<PathBuf> {
    project_dirs().map(|d| d.data_dir().join(name))
}

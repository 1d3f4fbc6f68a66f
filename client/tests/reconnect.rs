use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State as AxumState,
    },
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Router,
};
use casino_client::{
    ConnectionConfig, ConnectionEvent, ConnectionHandle, ConnectionManager, ConnectionState,
    ProtocolError, Session,
};
use casino_types::{ClientMessage, Color};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

/// A table that answers `get_state` with a different snapshot per
/// connection. The first connection also emits an unknown frame and then
/// hangs up.
#[derive(Clone)]
struct FakeTable {
    connections: Arc<AtomicUsize>,
    received: mpsc::UnboundedSender<(usize, String)>,
    cookies: mpsc::UnboundedSender<Option<String>>,
    hang_up_first: bool,
}

fn snapshot(bets: serde_json::Value) -> String {
    json!({
        "type": "round_state",
        "round_number": 3,
        "status": "BETTING",
        "time_remaining": 12.5,
        "history": ["RED"],
        "bets": bets,
    })
    .to_string()
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    AxumState(table): AxumState<FakeTable>,
) -> impl IntoResponse {
    let cookie = headers
        .get("cookie")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let _ = table.cookies.send(cookie);
    ws.on_upgrade(move |socket| serve(socket, table))
}

async fn serve(mut socket: WebSocket, table: FakeTable) {
    let connection = table.connections.fetch_add(1, Ordering::SeqCst);
    while let Some(Ok(message)) = socket.recv().await {
        let WsMessage::Text(text) = message else {
            continue;
        };
        let _ = table.received.send((connection, text.clone()));
        let request: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => continue,
        };
        match request["type"].as_str() {
            Some("get_state") if connection == 0 => {
                let bets = json!([
                    {"username": "stale", "color": "GOLD", "amount": 900},
                    {"username": "me", "color": "RED", "amount": 10},
                ]);
                let _ = socket.send(WsMessage::Text(snapshot(bets))).await;
                let _ = socket
                    .send(WsMessage::Text(json!({"type": "jackpot"}).to_string()))
                    .await;
                if table.hang_up_first {
                    let _ = socket.send(WsMessage::Close(None)).await;
                    return;
                }
            }
            Some("get_state") => {
                let bets = json!([
                    {"username": "alice", "color": "BLUE", "amount": 40.0},
                    {"username": "me", "color": "BLUE", "amount": 15},
                ]);
                let _ = socket.send(WsMessage::Text(snapshot(bets))).await;
            }
            Some("place_bet") => {
                let echo = json!({
                    "type": "bet_placed",
                    "username": "me",
                    "color": request["color"],
                    "amount": request["amount"],
                    "round_number": 3,
                });
                let _ = socket.send(WsMessage::Text(echo.to_string())).await;
            }
            _ => {}
        }
    }
}

struct Harness {
    url: String,
    connections: Arc<AtomicUsize>,
    received: mpsc::UnboundedReceiver<(usize, String)>,
    cookies: mpsc::UnboundedReceiver<Option<String>>,
    server: tokio::task::JoinHandle<()>,
}

async fn start_table(hang_up_first: bool) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let (received_tx, received) = mpsc::unbounded_channel();
    let (cookies_tx, cookies) = mpsc::unbounded_channel();
    let connections = Arc::new(AtomicUsize::new(0));
    let table = FakeTable {
        connections: connections.clone(),
        received: received_tx,
        cookies: cookies_tx,
        hang_up_first,
    };
    let router = Router::new()
        .route("/ws/roulette/", get(ws_handler))
        .with_state(table);

    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let actual_addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });
    Harness {
        url: format!("ws://{actual_addr}/ws/roulette/"),
        connections,
        received,
        cookies,
        server,
    }
}

fn connect(url: &str) -> (ConnectionHandle, mpsc::Receiver<ConnectionEvent>) {
    let config = ConnectionConfig::new(url)
        .with_cookie("sessionid=abc")
        .with_reconnect_delay(Duration::from_millis(50));
    ConnectionManager::spawn(config).unwrap()
}

async fn next_event(events: &mut mpsc::Receiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Feed events into `session` until `done` holds; returns everything seen.
async fn drive_until(
    session: &mut Session,
    events: &mut mpsc::Receiver<ConnectionEvent>,
    mut done: impl FnMut(&Session) -> bool,
) -> Vec<String> {
    let mut seen = Vec::new();
    while !done(session) {
        let event = next_event(events).await;
        seen.push(format!("{event:?}"));
        session.apply_event(event, Instant::now());
    }
    seen
}

#[tokio::test]
async fn test_resyncs_from_snapshot_after_server_hangs_up() {
    let mut harness = start_table(true).await;
    let (handle, mut events) = connect(&harness.url);
    let mut session = Session::new("me");

    // First connection: snapshot, an unknown frame, then a hang-up.
    let seen = drive_until(&mut session, &mut events, |session| {
        session.epoch() == Some(1) && session.connection() == ConnectionState::Disconnected
    })
    .await;
    assert!(seen.iter().any(|event| event.contains("UnknownKind(\"jackpot\")")));
    assert_eq!(session.machine().ledger().total(Color::Gold), 900);

    // Second connection replaces the ledger with the new snapshot only.
    drive_until(&mut session, &mut events, |session| {
        session.epoch() == Some(2) && session.machine().ledger().total(Color::Blue) > 0
    })
    .await;
    let ledger = session.machine().ledger();
    assert_eq!(ledger.totals(), [0, 0, 55, 0]);
    assert_eq!(ledger.own_totals(), [0, 0, 15, 0]);
    assert_eq!(session.connection(), ConnectionState::Connected);
    assert_eq!(session.machine().round_number(), Some(3));

    // Every connection opened with a snapshot request and the session cookie.
    let (first, request) = harness.received.recv().await.unwrap();
    assert_eq!((first, request.as_str()), (0, r#"{"type":"get_state"}"#));
    let (second, request) = harness.received.recv().await.unwrap();
    assert_eq!((second, request.as_str()), (1, r#"{"type":"get_state"}"#));
    for _ in 0..2 {
        let cookie = harness.cookies.recv().await.unwrap();
        assert_eq!(cookie.as_deref(), Some("sessionid=abc"));
    }

    drop(handle);
    harness.server.abort();
}

#[tokio::test]
async fn test_bets_round_trip_and_manual_reconnect() {
    let mut harness = start_table(false).await;
    let (handle, mut events) = connect(&harness.url);
    let mut session = Session::new("me");

    drive_until(&mut session, &mut events, |session| {
        session.connection() == ConnectionState::Connected && session.machine().is_synchronized()
    })
    .await;

    let command = session.place_bet(Color::Red, 25).unwrap();
    assert_eq!(
        command,
        ClientMessage::PlaceBet {
            color: Color::Red,
            amount: 25
        }
    );
    handle.send(command).unwrap();
    drive_until(&mut session, &mut events, |session| {
        session.machine().ledger().own_total(Color::Red) == 35
    })
    .await;

    handle.reconnect().unwrap();
    drive_until(&mut session, &mut events, |session| {
        session.epoch() == Some(2)
            && session.connection() == ConnectionState::Connected
            && session.machine().ledger().total(Color::Blue) == 55
    })
    .await;
    assert_eq!(session.machine().ledger().own_total(Color::Red), 0);
    assert_eq!(harness.connections.load(Ordering::SeqCst), 2);

    // Drain what the server saw: the bet went to the first connection.
    let mut requests = Vec::new();
    while let Ok(request) = harness.received.try_recv() {
        requests.push(request);
    }
    assert!(requests
        .iter()
        .any(|(connection, text)| *connection == 0 && text.contains("place_bet")));

    drop(handle);
    harness.server.abort();
}

#[tokio::test]
async fn test_dropping_handle_stops_the_loop() {
    let harness = start_table(false).await;
    let (handle, mut events) = connect(&harness.url);
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connecting { epoch: 1 }
    ));

    handle.shutdown();
    let closed = tokio::time::timeout(WAIT, async {
        while events.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());
    harness.server.abort();
}

#[tokio::test]
async fn test_unreachable_server_keeps_retrying() {
    // Bind and drop to find a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ConnectionConfig::new(format!("ws://{addr}/ws/roulette/"))
        .with_reconnect_delay(Duration::from_millis(10));
    let (_handle, mut events) = ConnectionManager::spawn(config).unwrap();

    let mut epochs = Vec::new();
    while epochs.len() < 3 {
        if let ConnectionEvent::Disconnected { epoch, .. } = next_event(&mut events).await {
            epochs.push(epoch);
        }
    }
    assert_eq!(epochs, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_bet_sent_while_unreachable_is_reported() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ConnectionConfig::new(format!("ws://{addr}/ws/roulette/"))
        .with_reconnect_delay(Duration::from_millis(50));
    let (handle, mut events) = ConnectionManager::spawn(config).unwrap();
    let bet = ClientMessage::PlaceBet {
        color: Color::Gold,
        amount: 5,
    };
    handle.send(bet.clone()).unwrap();

    let mut session = Session::new("me");
    loop {
        let event = next_event(&mut events).await;
        let discarded = matches!(&event, ConnectionEvent::Discarded { message, .. } if *message == bet);
        session.apply_event(event, Instant::now());
        if discarded {
            break;
        }
    }
    assert!(session
        .notices()
        .any(|notice| notice.text == "Bet of $5 on GOLD was not sent: connection lost"));
}

#[test]
fn test_protocol_error_display() {
    let error = ProtocolError::UnknownKind("jackpot".into());
    assert_eq!(error.to_string(), "unknown message kind: jackpot");
}

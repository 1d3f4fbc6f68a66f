//! Persistent websocket to the table server.
//!
//! [`ConnectionManager::spawn`] starts a background task that keeps exactly
//! one connection open. Every dial attempt gets a fresh epoch; every event the
//! task emits carries the epoch it belongs to, so consumers can drop anything
//! left over from a superseded connection. A full snapshot is requested as
//! soon as a connection opens. When it drops the task waits a fixed delay and
//! dials again, forever, until the handle is dropped.

use crate::{Error, ProtocolError, Result};
use casino_types::{decode_inbound, ClientMessage, Inbound, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
};
use tracing::{debug, error, info, trace, warn};
use url::Url;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }
}

/// Options for [`ConnectionManager::spawn`].
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    pub url: String,
    /// Sent verbatim as the handshake's `Cookie` header.
    pub cookie: Option<String>,
    pub reconnect_delay: Duration,
    pub dial_timeout: Duration,
    pub channel_capacity: usize,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cookie: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    fn capacity_or_default(&self) -> usize {
        if self.channel_capacity == 0 {
            DEFAULT_CHANNEL_CAPACITY
        } else {
            self.channel_capacity
        }
    }
}

/// Lifecycle and traffic of the managed connection.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Dialing; `epoch` identifies this attempt from here on.
    Connecting { epoch: u64 },
    /// Open, and `get_state` has been sent.
    Connected { epoch: u64 },
    Message { epoch: u64, message: ServerMessage },
    /// A frame that could not be dispatched.
    Protocol { epoch: u64, error: ProtocolError },
    Disconnected { epoch: u64, reason: String },
    /// A command that was never written to a socket.
    Discarded { epoch: u64, message: ClientMessage },
}

impl ConnectionEvent {
    pub fn epoch(&self) -> u64 {
        match self {
            ConnectionEvent::Connecting { epoch }
            | ConnectionEvent::Connected { epoch }
            | ConnectionEvent::Message { epoch, .. }
            | ConnectionEvent::Protocol { epoch, .. }
            | ConnectionEvent::Disconnected { epoch, .. }
            | ConnectionEvent::Discarded { epoch, .. } => *epoch,
        }
    }
}

#[derive(Debug)]
enum Command {
    Send(ClientMessage),
    Reconnect,
}

/// Control side of a running [`ConnectionManager`]. Dropping it stops the
/// background task and closes the socket.
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    handle: tokio::task::JoinHandle<()>,
}

impl ConnectionHandle {
    /// Queue a message for the live connection. Fire and forget: anything
    /// queued while disconnected is discarded on the next open, which
    /// resynchronizes from a snapshot instead.
    pub fn send(&self, message: ClientMessage) -> Result<()> {
        self.commands
            .send(Command::Send(message))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Drop the live connection (or cut a retry wait short) and dial again.
    pub fn reconnect(&self) -> Result<()> {
        self.commands
            .send(Command::Reconnect)
            .map_err(|_| Error::ConnectionClosed)
    }

    pub fn shutdown(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct ConnectionManager;

impl ConnectionManager {
    /// Validate `config` and start the connection task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: ConnectionConfig,
    ) -> Result<(ConnectionHandle, mpsc::Receiver<ConnectionEvent>)> {
        let url = Url::parse(&config.url)?;
        match url.scheme() {
            "ws" | "wss" => {}
            scheme => {
                return Err(Error::InvalidScheme {
                    scheme: scheme.to_string(),
                    expected: "ws or wss",
                })
            }
        }
        let cookie = config
            .cookie
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|e| Error::InvalidHeader(e.to_string()))?;

        let (event_tx, event_rx) = mpsc::channel(config.capacity_or_default());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let worker = Worker {
            url,
            cookie,
            reconnect_delay: config.reconnect_delay,
            dial_timeout: config.dial_timeout,
            events: event_tx,
            commands: command_rx,
            epoch: 0,
        };
        let handle = tokio::spawn(worker.run());
        Ok((
            ConnectionHandle {
                commands: command_tx,
                handle,
            },
            event_rx,
        ))
    }
}

/// Why a connection ended.
enum Exit {
    /// The event receiver is gone; stop for good.
    Shutdown,
    /// Reconnect at once.
    Requested,
    /// Wait out the reconnect delay first.
    Dropped(String),
}

struct Worker {
    url: Url,
    cookie: Option<HeaderValue>,
    reconnect_delay: Duration,
    dial_timeout: Duration,
    events: mpsc::Sender<ConnectionEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    epoch: u64,
}

impl Worker {
    async fn run(mut self) {
        loop {
            self.epoch += 1;
            let epoch = self.epoch;
            if !self.emit(ConnectionEvent::Connecting { epoch }).await {
                return;
            }

            let exit = match self.dial().await {
                Ok(ws) => {
                    info!(epoch, url = %self.url, "connected");
                    self.session(epoch, ws).await
                }
                Err(e) => {
                    error!(epoch, url = %self.url, error = %e, "connect failed");
                    Exit::Dropped(e.to_string())
                }
            };

            let (reason, immediate) = match exit {
                Exit::Shutdown => return,
                Exit::Requested => ("reconnect requested".to_string(), true),
                Exit::Dropped(reason) => (reason, false),
            };
            if !self
                .emit(ConnectionEvent::Disconnected { epoch, reason })
                .await
            {
                return;
            }
            if immediate {
                continue;
            }
            if !self.wait_before_retry().await {
                return;
            }
        }
    }

    async fn dial(
        &self,
    ) -> Result<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    > {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(tokio_tungstenite::tungstenite::http::header::COOKIE, cookie.clone());
        }
        let (ws, _) = tokio::time::timeout(self.dial_timeout, connect_async(request))
            .await
            .map_err(|_| Error::DialTimeout)??;
        Ok(ws)
    }

    async fn session<S>(&mut self, epoch: u64, ws: tokio_tungstenite::WebSocketStream<S>) -> Exit
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sink, mut stream) = ws.split();

        // Whatever was queued belongs to a connection that no longer exists.
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Send(message) = command {
                if !self.discard(epoch, message).await {
                    return Exit::Shutdown;
                }
            }
        }

        if let Err(e) = sink
            .send(Message::Text(ClientMessage::GetState.to_json()))
            .await
        {
            error!(epoch, error = %e, "failed to request snapshot");
            return Exit::Dropped(e.to_string());
        }
        if !self.emit(ConnectionEvent::Connected { epoch }).await {
            return Exit::Shutdown;
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(message)) => {
                        trace!(epoch, ?message, "sending");
                        if let Err(e) = sink.send(Message::Text(message.to_json())).await {
                            error!(epoch, error = %e, "send failed");
                            return Exit::Dropped(e.to_string());
                        }
                    }
                    Some(Command::Reconnect) => {
                        info!(epoch, "reconnect requested");
                        let _ = sink.close().await;
                        return Exit::Requested;
                    }
                    // Handle dropped; the task is being aborted anyway.
                    None => return Exit::Shutdown,
                },
                frame = stream.next() => {
                    let event = match frame {
                        Some(Ok(Message::Text(text))) => dispatch(epoch, &text),
                        Some(Ok(Message::Binary(data))) => ConnectionEvent::Protocol {
                            epoch,
                            error: ProtocolError::Binary(data.len()),
                        },
                        Some(Ok(Message::Close(frame))) => {
                            debug!(epoch, ?frame, "server closed connection");
                            return Exit::Dropped(Error::ConnectionClosed.to_string());
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            error!(epoch, error = %e, "websocket error");
                            return Exit::Dropped(e.to_string());
                        }
                        None => return Exit::Dropped(Error::ConnectionClosed.to_string()),
                    };
                    if !self.emit(event).await {
                        return Exit::Shutdown;
                    }
                }
            }
        }
    }

    /// Sleep out the reconnect delay. A reconnect request ends the wait
    /// early; sends are discarded. Returns false once the handle is gone.
    async fn wait_before_retry(&mut self) -> bool {
        let sleep = tokio::time::sleep(self.reconnect_delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Reconnect) => return true,
                    Some(Command::Send(message)) => {
                        if !self.discard(self.epoch, message).await {
                            return false;
                        }
                    }
                    None => return false,
                },
            }
        }
    }

    async fn discard(&self, epoch: u64, message: ClientMessage) -> bool {
        warn!(epoch, ?message, "discarding command sent while disconnected");
        self.emit(ConnectionEvent::Discarded { epoch, message }).await
    }

    async fn emit(&self, event: ConnectionEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}

/// Decode one text frame into an event.
fn dispatch(epoch: u64, text: &str) -> ConnectionEvent {
    trace!(epoch, len = text.len(), "received frame");
    match decode_inbound(text) {
        Ok(Inbound::Message(message)) => {
            debug!(epoch, kind = message.kind(), "dispatching");
            ConnectionEvent::Message { epoch, message }
        }
        Ok(Inbound::Unknown { kind }) => {
            warn!(epoch, %kind, "dropping unknown message kind");
            ConnectionEvent::Protocol {
                epoch,
                error: ProtocolError::UnknownKind(kind),
            }
        }
        Err(e) => {
            warn!(epoch, error = %e, "dropping undecodable frame");
            ConnectionEvent::Protocol {
                epoch,
                error: e.into(),
            }
        }
    }
}

//! WebSocket driver for one push topic
//!
//! A single task owns the socket, the [`ConnectionMachine`] and the retry
//! sleep. Commands arrive on an mpsc channel; parsed events leave on another.
//! On teardown the socket is taken out of the read loop before the close
//! frame is sent, so nothing read afterwards is forwarded or can re-arm a
//! reconnect.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use super::frame::{PushEvent, parse_frame};
use super::state::{CloseReason, ConnectionMachine, ConnectionState};
use crate::error::SyncError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Logical stream on the push server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// Mutations of one account's mailbox
    Account(String),
    /// Server-wide notifications
    General,
}

impl Topic {
    fn segments(&self) -> Vec<&str> {
        match self {
            Topic::Account(id) => vec!["accounts", id],
            Topic::General => vec!["general"],
        }
    }
}

/// Build the connection URL. The bearer token travels as a query parameter.
pub fn topic_url(base: &str, topic: &Topic, token: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid push URL: {base}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Push URL cannot carry a path: {base}"))?
        .pop_if_empty()
        .extend(topic.segments());
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

#[derive(Debug)]
enum Command {
    Connect,
    Teardown,
}

/// Handle to a running push channel task
pub struct PushChannel {
    topic: Topic,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl PushChannel {
    /// Spawn the driver task. Nothing is dialled until [`connect`](Self::connect).
    pub fn spawn(
        url: Url,
        topic: Topic,
        reconnect_delay: Duration,
        events: mpsc::UnboundedSender<PushEvent>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let machine = ConnectionMachine::new(reconnect_delay);
        let (state_tx, state) = watch::channel(machine.state());

        let driver = Driver {
            url,
            machine,
            socket: None,
            retry: None,
            events,
            state: state_tx,
        };
        let task = tokio::spawn(driver.run(command_rx));

        Self {
            topic,
            commands,
            state,
            task,
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Open the connection. A no-op while connecting, open, or waiting to
    /// reconnect.
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Close cleanly and cancel any pending reconnect
    pub fn teardown(&self) {
        self.send(Command::Teardown);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Tear down and wait for the driver task to exit
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        let _ = commands.send(Command::Teardown);
        drop(commands);
        if let Err(e) = task.await {
            error!("Push channel task failed: {}", e);
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Push channel for {:?} is no longer running", self.topic);
        }
    }
}

struct Driver {
    url: Url,
    machine: ConnectionMachine,
    socket: Option<WsStream>,
    /// Generation and sleep of the pending reconnect
    retry: Option<(u64, Pin<Box<Sleep>>)>,
    events: mpsc::UnboundedSender<PushEvent>,
    state: watch::Sender<ConnectionState>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect) => {
                        if self.machine.connect() && !self.dial(&mut commands).await {
                            break;
                        }
                    }
                    Some(Command::Teardown) => self.teardown().await,
                    None => {
                        self.teardown().await;
                        break;
                    }
                },
                message = next_message(&mut self.socket) => self.on_message(message).await,
                generation = retry_due(&mut self.retry) => {
                    self.retry = None;
                    if self.machine.on_retry_fired(generation) {
                        info!("Reconnecting push channel");
                        if !self.dial(&mut commands).await {
                            break;
                        }
                    }
                }
            }
            self.publish();
        }
        debug!("Push channel driver stopped");
    }

    /// Dial the server while still servicing commands, so a hanging
    /// connect can be torn down. Returns `false` once the command channel
    /// has closed.
    async fn dial(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) -> bool {
        self.publish();
        let redacted = redact(&self.url);
        let connect = tokio_tungstenite::connect_async(self.url.to_string());
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    match result {
                        Ok((socket, _response)) => {
                            info!("Push channel connected to {}", redacted);
                            self.socket = Some(socket);
                            self.machine.on_open();
                        }
                        Err(e) => {
                            warn!("Push channel connect to {} failed: {}", redacted, e);
                            self.closed(CloseReason::Transport(e.to_string()));
                        }
                    }
                    return true;
                }
                command = commands.recv() => match command {
                    Some(Command::Connect) => debug!("Push channel already connecting"),
                    Some(Command::Teardown) => {
                        info!("Push channel connect to {} abandoned", redacted);
                        self.teardown().await;
                        return true;
                    }
                    None => {
                        self.teardown().await;
                        return false;
                    }
                },
            }
        }
    }

    async fn on_message(
        &mut self,
        message: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) {
        match message {
            Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                Ok(Some(event)) => {
                    if self.events.send(event).is_err() {
                        debug!("Push event receiver dropped");
                    }
                }
                Ok(None) => debug!("Ignoring push frame of unknown type"),
                Err(e) => warn!("Dropping push frame: {}", e),
            },
            Some(Ok(Message::Ping(payload))) => {
                if let Some(socket) = self.socket.as_mut()
                    && let Err(e) = socket.send(Message::Pong(payload)).await
                {
                    self.socket = None;
                    self.closed(CloseReason::Transport(e.to_string()));
                }
            }
            Some(Ok(Message::Close(frame))) => {
                self.socket = None;
                self.closed(CloseReason::Code(frame.map(|f| u16::from(f.code))));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                self.socket = None;
                self.closed(CloseReason::Transport(e.to_string()));
            }
            None => {
                self.socket = None;
                self.closed(CloseReason::Transport("stream ended".to_string()));
            }
        }
    }

    fn closed(&mut self, reason: CloseReason) {
        let code = reason.code();
        if let Some(ticket) = self.machine.on_close(reason) {
            debug!("{}", SyncError::ChannelDrop { code });
            let sleep = Box::pin(tokio::time::sleep(ticket.delay));
            self.retry = Some((ticket.generation, sleep));
        }
    }

    async fn teardown(&mut self) {
        self.machine.teardown();
        self.retry = None;
        if let Some(mut socket) = self.socket.take() {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            };
            if let Err(e) = socket.send(Message::Close(Some(frame))).await {
                debug!("Close frame not delivered: {}", e);
            }
            info!("Push channel torn down");
        }
    }

    fn publish(&self) {
        self.state.send_if_modified(|state| {
            let next = self.machine.state();
            let changed = *state != next;
            *state = next;
            changed
        });
    }
}

async fn next_message(
    socket: &mut Option<WsStream>,
) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
    match socket.as_mut() {
        Some(socket) => socket.next().await,
        None => pending().await,
    }
}

async fn retry_due(retry: &mut Option<(u64, Pin<Box<Sleep>>)>) -> u64 {
    match retry.as_mut() {
        Some((generation, sleep)) => {
            let generation = *generation;
            sleep.as_mut().await;
            generation
        }
        None => pending().await,
    }
}

/// URL for logs, without the token
fn redact(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

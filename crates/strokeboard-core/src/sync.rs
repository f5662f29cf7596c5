//! Wire protocol and WebSocket client for the stroke authority.
//!
//! Messages are JSON text frames tagged by `type`.

use crate::ingest::RemoteEvent;
use crate::stroke::{Board, BoardId, Point, Stroke, StrokeId};
use serde::{Deserialize, Serialize};

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to all strokes; answered with a snapshot
    Subscribe,
    /// Create a stroke
    AddStroke {
        board_id: BoardId,
        color: String,
        thickness: f32,
        points: Vec<Point>,
    },
    /// Delete a stroke
    DeleteStroke { stroke_id: StrokeId },
    /// Move a stroke to another board
    MoveStroke { stroke_id: StrokeId, board_id: BoardId },
    /// Create a named board
    CreateBoard { name: String },
    /// Delete every stroke on a board
    ClearBoard { board_id: BoardId },
}

/// Messages received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Subscription confirmed, with our identity and every stored board and stroke
    Subscribed {
        identity: String,
        #[serde(default)]
        boards: Vec<Board>,
        strokes: Vec<Stroke>,
    },
    /// A board was created
    BoardCreated { board: Board },
    /// A stroke was created
    Insert { stroke: Stroke },
    /// A stroke moved to another board
    Update { old: Stroke, new: Stroke },
    /// A stroke was deleted
    Delete { stroke: Stroke },
    /// Error message, naming the stroke a refused request was about
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stroke_id: Option<StrokeId>,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the WebSocket client
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connected to server
    Connected,
    /// Disconnected from server
    Disconnected,
    /// Subscription snapshot
    Subscribed {
        identity: String,
        boards: Vec<Board>,
        strokes: Vec<Stroke>,
    },
    /// A board was created
    BoardCreated(Board),
    /// Row change from the store
    Remote(RemoteEvent),
    /// Error occurred
    Error {
        message: String,
        stroke_id: Option<StrokeId>,
    },
}

impl From<ServerMessage> for SyncEvent {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Subscribed { identity, boards, strokes } => {
                SyncEvent::Subscribed { identity, boards, strokes }
            }
            ServerMessage::BoardCreated { board } => SyncEvent::BoardCreated(board),
            ServerMessage::Insert { stroke } => SyncEvent::Remote(RemoteEvent::Insert(stroke)),
            ServerMessage::Update { old, new } => SyncEvent::Remote(RemoteEvent::Update { old, new }),
            ServerMessage::Delete { stroke } => SyncEvent::Remote(RemoteEvent::Delete(stroke)),
            ServerMessage::Error { message, stroke_id } => SyncEvent::Error { message, stroke_id },
        }
    }
}

impl From<RemoteEvent> for ServerMessage {
    fn from(event: RemoteEvent) -> Self {
        match event {
            RemoteEvent::Insert(stroke) => ServerMessage::Insert { stroke },
            RemoteEvent::Update { old, new } => ServerMessage::Update { old, new },
            RemoteEvent::Delete(stroke) => ServerMessage::Delete { stroke },
        }
    }
}

/// A non-blocking, message-oriented connection to the authority.
pub trait Transport {
    /// Send a text message.
    fn send(&mut self, msg: &str) -> Result<(), String>;

    /// Poll for pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<SyncEvent>;

    /// Get current connection state.
    fn state(&self) -> ConnectionState;

    /// Check if connected.
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// First 100 characters of a frame, for logging.
#[cfg(not(target_arch = "wasm32"))]
fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}

// ============================================================================
// Native WebSocket Client
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{connect, Message};
    use url::Url;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation.
    pub struct NativeWebSocket {
        state: ConnectionState,
        events: Vec<SyncEvent>,
        /// Channel to send commands to the WebSocket thread.
        cmd_tx: Option<Sender<WsCommand>>,
        /// Channel to receive events from the WebSocket thread.
        event_rx: Option<Receiver<SyncEvent>>,
        /// Handle to the WebSocket thread.
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to a WebSocket server.
        pub fn connect(&mut self, url: &str) -> Result<(), String> {
            if self.cmd_tx.is_some() {
                return Err("Already connected".to_string());
            }

            let parsed_url = Url::parse(url).map_err(|e| format!("Invalid URL: {}", e))?;
            if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
                return Err(format!("Invalid WebSocket URL scheme: {}", parsed_url.scheme()));
            }

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();

            let url = url.to_string();

            let handle = thread::spawn(move || {
                log::info!("WebSocket thread: connecting to {}", url);

                match connect(&url) {
                    Ok((mut socket, response)) => {
                        log::info!("WebSocket connected, status: {}", response.status());
                        let _ = event_tx.send(SyncEvent::Connected);

                        // Short read timeout so the loop can also service outgoing commands
                        if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
                            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                        } else {
                            log::debug!("TLS or other stream - using default timeout handling");
                        }

                        loop {
                            match cmd_rx.try_recv() {
                                Ok(WsCommand::Send(msg)) => {
                                    log::debug!("WebSocket sending: {}", preview(&msg));
                                    if let Err(e) = socket.send(Message::Text(msg)) {
                                        log::error!("WebSocket send error: {}", e);
                                        break;
                                    }
                                }
                                Ok(WsCommand::Close) => {
                                    log::info!("WebSocket close requested");
                                    let _ = socket.close(None);
                                    break;
                                }
                                Err(TryRecvError::Disconnected) => {
                                    log::info!("WebSocket command channel disconnected");
                                    break;
                                }
                                Err(TryRecvError::Empty) => {}
                            }

                            match socket.read() {
                                Ok(Message::Text(txt)) => {
                                    log::debug!("WebSocket received: {}", preview(&txt));
                                    match serde_json::from_str::<ServerMessage>(&txt) {
                                        Ok(server_msg) => {
                                            let _ = event_tx.send(SyncEvent::from(server_msg));
                                        }
                                        Err(e) => log::warn!("Failed to parse server message: {}", e),
                                    }
                                }
                                Ok(Message::Ping(data)) => {
                                    let _ = socket.send(Message::Pong(data));
                                }
                                Ok(Message::Close(_)) => {
                                    log::info!("WebSocket received close frame");
                                    break;
                                }
                                Ok(_) => {}
                                Err(tungstenite::Error::Io(ref e))
                                    if e.kind() == std::io::ErrorKind::WouldBlock
                                        || e.kind() == std::io::ErrorKind::TimedOut =>
                                {
                                    continue;
                                }
                                Err(e) => {
                                    log::error!("WebSocket read error: {}", e);
                                    break;
                                }
                            }
                        }

                        log::info!("WebSocket thread exiting");
                        let _ = event_tx.send(SyncEvent::Disconnected);
                    }
                    Err(e) => {
                        log::error!("WebSocket connection failed: {}", e);
                        let _ = event_tx.send(SyncEvent::Error {
                            message: format!("Connection failed: {}", e),
                            stroke_id: None,
                        });
                    }
                }
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);

            Ok(())
        }

        /// Disconnect from the server.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }
    }

    impl Transport for NativeWebSocket {
        fn send(&mut self, msg: &str) -> Result<(), String> {
            if let Some(ref tx) = self.cmd_tx {
                tx.send(WsCommand::Send(msg.to_string()))
                    .map_err(|e| format!("Send failed: {}", e))
            } else {
                Err("Not connected".to_string())
            }
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        SyncEvent::Connected => self.state = ConnectionState::Connected,
                        SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                        SyncEvent::Error { .. } if self.state != ConnectionState::Connected => {
                            self.state = ConnectionState::Error
                        }
                        _ => {}
                    }
                    self.events.push(event);
                }
            }

            std::mem::take(&mut self.events)
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeWebSocket;

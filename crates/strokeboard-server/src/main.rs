//! Strokeboard WebSocket Authority
//!
//! Owns the stroke table. Assigns identities, authors and timestamps, and
//! broadcasts every change to all subscribed clients, including the one that
//! caused it.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "subscribe" }
//! { "type": "add_stroke", "board_id": 1, "color": "#000000", "thickness": 4.0, "points": [{ "x": 0.0, "y": 0.0 }] }
//! { "type": "delete_stroke", "stroke_id": 7 }
//! { "type": "move_stroke", "stroke_id": 7, "board_id": 2 }
//! { "type": "create_board", "name": "sketches" }
//! { "type": "clear_board", "board_id": 1 }
//! ```

mod state;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use state::{AppState, Outcome};
use std::{net::SocketAddr, sync::Arc};
use strokeboard_core::{ClientMessage, DeletePolicy, ServerMessage};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "strokeboard-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "STROKEBOARD_ADDR", default_value = "0.0.0.0:3030")]
    addr: SocketAddr,

    /// Let any client delete any stroke, not only its own
    #[arg(long)]
    allow_foreign_deletes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strokeboard_server=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let policy = if args.allow_foreign_deletes {
        DeletePolicy::Anyone
    } else {
        DeletePolicy::AuthorOnly
    };
    let state = Arc::new(AppState::new(policy));

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Strokeboard server listening on {} ({:?} deletes)", args.addr, policy);
    info!("WebSocket endpoint: ws://{}/ws", args.addr);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Index page
async fn index() -> &'static str {
    "Strokeboard Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.stats())
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn encode(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!("Failed to encode {:?}: {}", msg, e);
            None
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);
    state.connect(&peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut stroke_rx: Option<broadcast::Receiver<ServerMessage>> = None;

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let outcomes = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if client_msg == ClientMessage::Subscribe && stroke_rx.is_none() {
                                    stroke_rx = Some(state.subscribe(&peer_id));
                                }
                                state.handle(&peer_id, client_msg)
                            }
                            Err(e) => {
                                warn!("Invalid message from {}: {}", peer_id, e);
                                vec![Outcome::Reply(ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                    stroke_id: None,
                                })]
                            }
                        };

                        let mut closed = false;
                        for outcome in outcomes {
                            match outcome {
                                Outcome::Broadcast(msg) => state.broadcast(msg),
                                Outcome::Reply(msg) => {
                                    if let Some(frame) = encode(&msg) {
                                        if sender.send(frame).await.is_err() {
                                            closed = true;
                                            break;
                                        }
                                    }
                                }
                            }
                        }
                        if closed {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary and ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Forward store changes once subscribed
            msg = async {
                match &mut stroke_rx {
                    Some(rx) => Some(rx.recv().await),
                    None => std::future::pending::<Option<Result<ServerMessage, broadcast::error::RecvError>>>().await,
                }
            } => {
                match msg {
                    Some(Ok(server_msg)) => {
                        if let Some(frame) = encode(&server_msg) {
                            if sender.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                        // The client missed changes; a fresh snapshot puts it back in step.
                        warn!("Peer {} lagged by {} messages, resending snapshot", peer_id, skipped);
                        for outcome in state.handle(&peer_id, ClientMessage::Subscribe) {
                            if let Outcome::Reply(msg) = outcome {
                                if let Some(frame) = encode(&msg) {
                                    let _ = sender.send(frame).await;
                                }
                            }
                        }
                    }
                    Some(Err(broadcast::error::RecvError::Closed)) | None => break,
                }
            }
        }
    }

    // Cleanup on disconnect
    state.disconnect(&peer_id);
    info!("Connection closed: {}", peer_id);
}

//! Shared server state: the stroke table, the broadcast channel and the
//! connected peers.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use strokeboard_core::{ClientMessage, DeletePolicy, RemoteEvent, ServerMessage, StrokeDraft, StrokeTable, TableError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub const CHANNEL_CAPACITY: usize = 256;

/// Name of the board created at startup. It gets the first board identity,
/// which is the board clients draw on by default.
pub const MAIN_BOARD: &str = "main";

/// What a handled message produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Send only to the requesting peer.
    Reply(ServerMessage),
    /// Send to every subscribed peer, the requester included.
    Broadcast(ServerMessage),
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub peers: usize,
    pub subscribed: usize,
    pub boards: usize,
    pub strokes: usize,
}

/// Shared application state
pub struct AppState {
    table: Mutex<StrokeTable>,
    tx: broadcast::Sender<ServerMessage>,
    /// Connected peer IDs, and whether each has subscribed.
    peers: DashMap<String, bool>,
    policy: DeletePolicy,
}

impl AppState {
    pub fn new(policy: DeletePolicy) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let mut table = StrokeTable::new();
        let main = table.create_board(MAIN_BOARD);
        info!("Created board {} ({})", main.name, main.id);
        Self {
            table: Mutex::new(table),
            tx,
            peers: DashMap::new(),
            policy,
        }
    }

    pub fn connect(&self, peer_id: &str) {
        self.peers.insert(peer_id.to_string(), false);
    }

    pub fn disconnect(&self, peer_id: &str) {
        self.peers.remove(peer_id);
    }

    /// Start receiving broadcasts for `peer_id`.
    pub fn subscribe(&self, peer_id: &str) -> broadcast::Receiver<ServerMessage> {
        if let Some(mut subscribed) = self.peers.get_mut(peer_id) {
            *subscribed = true;
        }
        self.tx.subscribe()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            peers: self.peers.len(),
            subscribed: self.peers.iter().filter(|entry| *entry.value()).count(),
            boards: self.table().boards().len(),
            strokes: self.table().len(),
        }
    }

    /// Apply one client message on behalf of `peer_id`.
    ///
    /// `Subscribe` only produces the snapshot reply; the caller attaches the
    /// broadcast receiver with [`AppState::subscribe`] before sending it.
    pub fn handle(&self, peer_id: &str, msg: ClientMessage) -> Vec<Outcome> {
        match msg {
            ClientMessage::Subscribe => {
                let (boards, strokes) = {
                    let table = self.table();
                    (table.boards(), table.snapshot())
                };
                info!("Peer {} subscribed ({} strokes)", peer_id, strokes.len());
                vec![Outcome::Reply(ServerMessage::Subscribed {
                    identity: peer_id.to_string(),
                    boards,
                    strokes,
                })]
            }
            ClientMessage::AddStroke { board_id, color, thickness, points } => {
                if points.is_empty() {
                    return vec![Outcome::Reply(ServerMessage::Error {
                        message: "A stroke needs at least one point".to_string(),
                        stroke_id: None,
                    })];
                }
                let draft = StrokeDraft::new(board_id, color, thickness, points);
                if !draft.is_finite() {
                    return vec![Outcome::Reply(ServerMessage::Error {
                        message: "Stroke coordinates and thickness must be finite".to_string(),
                        stroke_id: None,
                    })];
                }
                let stroke = self.table().insert(draft, peer_id, now_millis());
                debug!("Peer {} added stroke {} on {}", peer_id, stroke.id, stroke.board_id);
                vec![Outcome::Broadcast(RemoteEvent::Insert(stroke).into())]
            }
            ClientMessage::DeleteStroke { stroke_id } => {
                let result = self.table().delete(stroke_id, peer_id, self.policy);
                match result {
                    Ok(stroke) => {
                        debug!("Peer {} deleted stroke {}", peer_id, stroke_id);
                        vec![Outcome::Broadcast(RemoteEvent::Delete(stroke).into())]
                    }
                    Err(e @ (TableError::NotAuthor { .. } | TableError::NoSuchBoard(_))) => {
                        warn!("Refused delete: {}", e);
                        vec![Outcome::Reply(ServerMessage::Error {
                            message: e.to_string(),
                            stroke_id: Some(stroke_id),
                        })]
                    }
                    Err(TableError::NotFound(_)) => {
                        debug!("Peer {} deleted unknown stroke {}", peer_id, stroke_id);
                        Vec::new()
                    }
                }
            }
            ClientMessage::MoveStroke { stroke_id, board_id } => {
                let result = self.table().move_to_board(stroke_id, board_id);
                match result {
                    Ok((old, new)) => {
                        debug!("Peer {} moved stroke {} to {}", peer_id, stroke_id, board_id);
                        vec![Outcome::Broadcast(RemoteEvent::Update { old, new }.into())]
                    }
                    Err(e) => vec![Outcome::Reply(ServerMessage::Error {
                        message: e.to_string(),
                        stroke_id: Some(stroke_id),
                    })],
                }
            }
            ClientMessage::CreateBoard { name } => {
                let board = self.table().create_board(name);
                info!("Peer {} created board {} ({})", peer_id, board.name, board.id);
                vec![Outcome::Broadcast(ServerMessage::BoardCreated { board })]
            }
            ClientMessage::ClearBoard { board_id } => {
                let result = self.table().clear_board(board_id);
                match result {
                    Ok(removed) => {
                        info!("Peer {} cleared {} ({} strokes)", peer_id, board_id, removed.len());
                        removed
                            .into_iter()
                            .map(|stroke| Outcome::Broadcast(RemoteEvent::Delete(stroke).into()))
                            .collect()
                    }
                    Err(e) => {
                        warn!("Peer {} could not clear {}: {}", peer_id, board_id, e);
                        vec![Outcome::Reply(ServerMessage::Error {
                            message: e.to_string(),
                            stroke_id: None,
                        })]
                    }
                }
            }
        }
    }

    /// Broadcast to every subscriber.
    pub fn broadcast(&self, msg: ServerMessage) {
        // No receivers is fine.
        let _ = self.tx.send(msg);
    }

    fn table(&self) -> MutexGuard<'_, StrokeTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strokeboard_core::{BoardId, Point, StrokeId};

    fn add(board: u64) -> ClientMessage {
        ClientMessage::AddStroke {
            board_id: BoardId(board),
            color: "#000000".to_string(),
            thickness: 2.0,
            points: vec![Point::new(1.0, 1.0)],
        }
    }

    fn inserted(outcomes: &[Outcome]) -> StrokeId {
        match outcomes {
            [Outcome::Broadcast(ServerMessage::Insert { stroke })] => stroke.id,
            other => panic!("Expected insert broadcast, got {:?}", other),
        }
    }

    #[test]
    fn test_add_assigns_ids_and_author() {
        let state = AppState::new(DeletePolicy::AuthorOnly);
        assert_eq!(inserted(&state.handle("alice", add(1))), StrokeId(1));
        let out = state.handle("bob", add(2));
        match &out[..] {
            [Outcome::Broadcast(ServerMessage::Insert { stroke })] => {
                assert_eq!(stroke.id, StrokeId(2));
                assert_eq!(stroke.author, "bob");
                assert!(stroke.timestamp > 0);
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn test_subscribe_returns_snapshot() {
        let state = AppState::new(DeletePolicy::AuthorOnly);
        state.handle("alice", add(1));
        state.handle("alice", add(2));
        match &state.handle("bob", ClientMessage::Subscribe)[..] {
            [Outcome::Reply(ServerMessage::Subscribed { identity, boards, strokes })] => {
                assert_eq!(identity, "bob");
                assert_eq!(boards.len(), 1);
                assert_eq!(boards[0].id, BoardId(1));
                assert_eq!(strokes.len(), 2);
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn test_author_only_delete() {
        let state = AppState::new(DeletePolicy::AuthorOnly);
        let id = inserted(&state.handle("alice", add(1)));

        match &state.handle("bob", ClientMessage::DeleteStroke { stroke_id: id })[..] {
            [Outcome::Reply(ServerMessage::Error { stroke_id, .. })] => assert_eq!(*stroke_id, Some(id)),
            other => panic!("Unexpected {:?}", other),
        }
        assert_eq!(state.stats().strokes, 1);

        let out = state.handle("alice", ClientMessage::DeleteStroke { stroke_id: id });
        assert!(matches!(&out[..], [Outcome::Broadcast(ServerMessage::Delete { .. })]));
        assert_eq!(state.stats().strokes, 0);
    }

    #[test]
    fn test_foreign_delete_allowed() {
        let state = AppState::new(DeletePolicy::Anyone);
        let id = inserted(&state.handle("alice", add(1)));
        let out = state.handle("bob", ClientMessage::DeleteStroke { stroke_id: id });
        assert!(matches!(&out[..], [Outcome::Broadcast(ServerMessage::Delete { .. })]));
    }

    #[test]
    fn test_unknown_delete_is_noop() {
        let state = AppState::new(DeletePolicy::AuthorOnly);
        assert!(state.handle("alice", ClientMessage::DeleteStroke { stroke_id: StrokeId(9) }).is_empty());
    }

    #[test]
    fn test_move_broadcasts_update() {
        let state = AppState::new(DeletePolicy::AuthorOnly);
        let id = inserted(&state.handle("alice", add(1)));
        match &state.handle("bob", ClientMessage::MoveStroke { stroke_id: id, board_id: BoardId(4) })[..] {
            [Outcome::Broadcast(ServerMessage::Update { old, new })] => {
                assert_eq!(old.board_id, BoardId(1));
                assert_eq!(new.board_id, BoardId(4));
                assert_eq!(new.id, id);
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_stroke_refused() {
        let state = AppState::new(DeletePolicy::AuthorOnly);
        let msg = ClientMessage::AddStroke {
            board_id: BoardId(1),
            color: "#000000".to_string(),
            thickness: 1.0,
            points: Vec::new(),
        };
        assert!(matches!(&state.handle("alice", msg)[..], [Outcome::Reply(ServerMessage::Error { .. })]));
        assert_eq!(state.stats().strokes, 0);
    }

    #[test]
    fn test_non_finite_stroke_refused() {
        let state = AppState::new(DeletePolicy::AuthorOnly);
        let msg = ClientMessage::AddStroke {
            board_id: BoardId(1),
            color: "#000000".to_string(),
            thickness: f32::NAN,
            points: vec![Point::new(1.0, 1.0)],
        };
        assert!(matches!(&state.handle("alice", msg)[..], [Outcome::Reply(ServerMessage::Error { .. })]));
        assert_eq!(state.stats().strokes, 0);
    }

    #[test]
    fn test_create_board_broadcasts() {
        let state = AppState::new(DeletePolicy::AuthorOnly);
        let out = state.handle("alice", ClientMessage::CreateBoard { name: "sketches".to_string() });
        match &out[..] {
            [Outcome::Broadcast(ServerMessage::BoardCreated { board })] => {
                assert_eq!(board.id, BoardId(2));
                assert_eq!(board.name, "sketches");
            }
            other => panic!("Unexpected {:?}", other),
        }
        assert_eq!(state.stats().boards, 2);
    }

    #[test]
    fn test_clear_board_deletes_every_author() {
        let state = AppState::new(DeletePolicy::AuthorOnly);
        let a = inserted(&state.handle("alice", add(1)));
        let b = inserted(&state.handle("bob", add(1)));
        let other = inserted(&state.handle("bob", add(2)));

        let out = state.handle("carol", ClientMessage::ClearBoard { board_id: BoardId(1) });
        let deleted: Vec<StrokeId> = out
            .iter()
            .map(|outcome| match outcome {
                Outcome::Broadcast(ServerMessage::Delete { stroke }) => stroke.id,
                other => panic!("Unexpected {:?}", other),
            })
            .collect();
        assert_eq!(deleted, vec![a, b]);
        assert_eq!(state.stats().strokes, 1);

        let out = state.handle("carol", ClientMessage::DeleteStroke { stroke_id: other });
        assert!(matches!(&out[..], [Outcome::Reply(ServerMessage::Error { .. })]));
    }

    #[test]
    fn test_clear_unknown_board_refused() {
        let state = AppState::new(DeletePolicy::AuthorOnly);
        state.handle("alice", add(5));
        let out = state.handle("alice", ClientMessage::ClearBoard { board_id: BoardId(5) });
        assert!(matches!(
            &out[..],
            [Outcome::Reply(ServerMessage::Error { stroke_id: None, .. })]
        ));
        assert_eq!(state.stats().strokes, 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let state = AppState::new(DeletePolicy::AuthorOnly);
        state.connect("alice");
        let mut rx = state.subscribe("alice");
        assert_eq!(state.stats().subscribed, 1);

        for outcome in state.handle("alice", add(1)) {
            if let Outcome::Broadcast(msg) = outcome {
                state.broadcast(msg);
            }
        }
        assert!(matches!(rx.recv().await.unwrap(), ServerMessage::Insert { .. }));

        state.disconnect("alice");
        assert_eq!(state.stats().peers, 0);
    }
}

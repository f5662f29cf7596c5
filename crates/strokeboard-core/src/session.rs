//! A live board: reconciliation engine wired to a transport.

use crate::display::StrokeDisplay;
use crate::engine::ReconciliationEngine;
use crate::error::ReconcileResult;
use crate::store::OutboundQueue;
use crate::stroke::{Board, BoardId, Point, StrokeId};
use crate::sync::{ClientMessage, ConnectionState, SyncEvent, Transport};
use std::collections::BTreeMap;

/// One board's engine plus the connection that feeds it.
///
/// Writes the engine makes are queued in an [`OutboundQueue`] and flushed to
/// the transport after every user call and every [`BoardSession::poll`].
/// Messages that cannot be sent stay queued until the next flush.
pub struct BoardSession<T, D> {
    transport: T,
    engine: ReconciliationEngine<OutboundQueue, D>,
    /// Boards the authority knows about.
    boards: BTreeMap<BoardId, Board>,
}

impl<T: Transport, D: StrokeDisplay> BoardSession<T, D> {
    pub fn new(transport: T, board_id: BoardId, display: D) -> Self {
        Self {
            transport,
            engine: ReconciliationEngine::new(board_id, OutboundQueue::new(), display),
            boards: BTreeMap::new(),
        }
    }

    pub fn engine(&self) -> &ReconciliationEngine<OutboundQueue, D> {
        &self.engine
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn display(&self) -> &D {
        self.engine.display()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Author identity assigned by the authority, once subscribed.
    pub fn identity(&self) -> Option<&str> {
        self.engine.local_author()
    }

    /// Boards known to the authority, in identity order.
    pub fn boards(&self) -> impl Iterator<Item = &Board> {
        self.boards.values()
    }

    /// Process everything the transport has received. Returns the number of
    /// events handled.
    pub fn poll(&mut self) -> usize {
        let events = self.transport.poll_events();
        let count = events.len();

        for event in events {
            match event {
                SyncEvent::Connected => {
                    log::info!("Connected, subscribing to {}", self.engine.board_id());
                    self.engine.store_mut().push(&ClientMessage::Subscribe);
                }
                SyncEvent::Disconnected => {
                    log::info!("Disconnected");
                }
                SyncEvent::Subscribed { identity, boards, strokes } => {
                    log::info!(
                        "Subscribed as {} ({} boards, {} strokes stored)",
                        identity,
                        boards.len(),
                        strokes.len()
                    );
                    self.boards = boards.into_iter().map(|b| (b.id, b)).collect();
                    if !self.boards.is_empty() && !self.boards.contains_key(&self.engine.board_id()) {
                        log::warn!("{} has not been created on the server", self.engine.board_id());
                    }
                    self.engine.set_local_author(identity);
                    self.engine.apply_snapshot(strokes);
                }
                SyncEvent::BoardCreated(board) => {
                    log::info!("Board created: {} ({})", board.name, board.id);
                    self.boards.insert(board.id, board);
                }
                SyncEvent::Remote(event) => {
                    if let Err(e) = self.engine.apply_remote(event) {
                        log::debug!("Remote event not applied: {}", e);
                    }
                }
                SyncEvent::Error { message, stroke_id } => {
                    log::error!("Sync error: {}", message);
                    if let Some(id) = stroke_id {
                        if self.engine.forget_delete_request(id) {
                            log::warn!("Delete of {} refused", id);
                        }
                    }
                }
            }
        }

        self.flush();
        count
    }

    pub fn draw(&mut self, points: Vec<Point>, color: impl Into<String>, thickness: f32) -> ReconcileResult<()> {
        let result = self.engine.user_finished_stroke(points, color, thickness);
        self.flush();
        result
    }

    pub fn delete(&mut self, id: StrokeId) -> ReconcileResult<()> {
        let result = self.engine.user_requested_delete(id);
        self.flush();
        result
    }

    pub fn erase_at(&mut self, point: Point) -> ReconcileResult<Option<StrokeId>> {
        let result = self.engine.user_requested_delete_at(point);
        self.flush();
        result
    }

    pub fn undo(&mut self) -> ReconcileResult<()> {
        let result = self.engine.user_requested_undo();
        self.flush();
        result
    }

    pub fn redo(&mut self) -> ReconcileResult<()> {
        let result = self.engine.user_requested_redo();
        self.flush();
        result
    }

    /// Ask the authority to move a stroke to another board.
    ///
    /// Not recorded in history; the resulting `update` only changes what is
    /// displayed.
    pub fn move_stroke(&mut self, id: StrokeId, board_id: BoardId) {
        self.engine
            .store_mut()
            .push(&ClientMessage::MoveStroke { stroke_id: id, board_id });
        self.flush();
    }

    /// Ask the authority to create a named board.
    pub fn create_board(&mut self, name: impl Into<String>) {
        self.engine
            .store_mut()
            .push(&ClientMessage::CreateBoard { name: name.into() });
        self.flush();
    }

    /// Ask the authority to delete every stroke on this board.
    ///
    /// The resulting deletes are not recorded in history, and history entries
    /// for the cleared strokes are dropped as they arrive.
    pub fn clear_board(&mut self) {
        let board_id = self.engine.board_id();
        log::info!("Clearing {}", board_id);
        self.engine.store_mut().push(&ClientMessage::ClearBoard { board_id });
        self.flush();
    }

    fn flush(&mut self) {
        if !self.transport.is_connected() || !self.engine.store().has_outgoing() {
            return;
        }

        let mut pending = self.engine.store_mut().take_outgoing().into_iter();
        while let Some(msg) = pending.next() {
            if let Err(e) = self.transport.send(&msg) {
                log::warn!("Send failed, keeping message queued: {}", e);
                let mut unsent = vec![msg];
                unsent.extend(pending);
                self.engine.store_mut().requeue_front(unsent);
                return;
            }
        }
    }
}

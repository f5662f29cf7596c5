//! In-memory stroke store.

use super::{DeletePolicy, StrokeStore, StrokeTable, TableResult};
use crate::ingest::RemoteEvent;
use crate::stroke::{Board, BoardId, Stroke, StrokeDraft, StrokeId};

/// An authority living in the same process, for tests and offline use.
///
/// Writes are applied to a [`StrokeTable`] immediately, but their events are
/// only queued. The caller decides when (and in which order) to deliver them
/// by draining [`MemoryStore::take_events`], which is how confirmation latency
/// is simulated.
#[derive(Debug)]
pub struct MemoryStore {
    table: StrokeTable,
    author: String,
    policy: DeletePolicy,
    clock: u64,
    events: Vec<RemoteEvent>,
}

impl MemoryStore {
    /// Create an empty store writing on behalf of `author`.
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            table: StrokeTable::new(),
            author: author.into(),
            policy: DeletePolicy::Anyone,
            clock: 0,
            events: Vec::new(),
        }
    }

    /// Set who may delete strokes.
    pub fn with_policy(mut self, policy: DeletePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn table(&self) -> &StrokeTable {
        &self.table
    }

    /// Drain queued events in the order the writes happened.
    pub fn take_events(&mut self) -> Vec<RemoteEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Create a stroke as another participant would.
    pub fn insert_as(&mut self, author: &str, draft: StrokeDraft) -> Stroke {
        let timestamp = self.tick();
        let stroke = self.table.insert(draft, author, timestamp);
        self.events.push(RemoteEvent::Insert(stroke.clone()));
        stroke
    }

    /// Delete a stroke as another participant would.
    pub fn delete_as(&mut self, author: &str, id: StrokeId) -> TableResult<Stroke> {
        let stroke = self.table.delete(id, author, self.policy)?;
        self.events.push(RemoteEvent::Delete(stroke.clone()));
        Ok(stroke)
    }

    /// Remove every stroke on a board, as a clear by another participant.
    pub fn clear_board(&mut self, board_id: BoardId) -> TableResult<usize> {
        let removed = self.table.clear_board(board_id)?;
        let count = removed.len();
        self.events.extend(removed.into_iter().map(RemoteEvent::Delete));
        Ok(count)
    }

    pub fn create_board(&mut self, name: &str) -> Board {
        self.table.create_board(name)
    }

    /// Move a stroke to another board.
    pub fn move_stroke(&mut self, id: StrokeId, board_id: BoardId) -> TableResult<()> {
        let (old, new) = self.table.move_to_board(id, board_id)?;
        self.events.push(RemoteEvent::Update { old, new });
        Ok(())
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl StrokeStore for MemoryStore {
    fn submit_create(&mut self, draft: &StrokeDraft) {
        let author = self.author.clone();
        self.insert_as(&author, draft.clone());
    }

    fn submit_delete(&mut self, id: StrokeId) {
        let author = self.author.clone();
        if let Err(e) = self.delete_as(&author, id) {
            log::warn!("Delete of {} refused: {}", id, e);
        }
    }
}

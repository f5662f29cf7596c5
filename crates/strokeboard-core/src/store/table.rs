//! Authoritative stroke table.
//!
//! The single source of truth for which strokes and boards exist. Identities
//! are assigned here, counting up from 1, and are never reused.

use crate::stroke::{Board, BoardId, Stroke, StrokeDraft, StrokeId};
use std::collections::BTreeMap;
use thiserror::Error;

/// Stroke table errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Stroke not found: {0}")]
    NotFound(StrokeId),
    #[error("{requester} may not delete stroke {id} owned by {author}")]
    NotAuthor {
        id: StrokeId,
        author: String,
        requester: String,
    },
    #[error("{0} does not exist")]
    NoSuchBoard(BoardId),
}

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Who may delete a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Only the stroke's author.
    #[default]
    AuthorOnly,
    /// Any participant.
    Anyone,
}

/// Strokes keyed by identity, and the boards they are drawn on.
///
/// Strokes may name a board that was never created; only clearing needs the
/// board to exist.
#[derive(Debug, Clone)]
pub struct StrokeTable {
    strokes: BTreeMap<StrokeId, Stroke>,
    next_id: u64,
    boards: BTreeMap<BoardId, Board>,
    next_board_id: u64,
}

impl Default for StrokeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StrokeTable {
    pub fn new() -> Self {
        Self {
            strokes: BTreeMap::new(),
            next_id: 1,
            boards: BTreeMap::new(),
            next_board_id: 1,
        }
    }

    /// Create a board under a fresh identity.
    pub fn create_board(&mut self, name: impl Into<String>) -> Board {
        let board = Board {
            id: BoardId(self.next_board_id),
            name: name.into(),
        };
        self.next_board_id += 1;
        self.boards.insert(board.id, board.clone());
        board
    }

    /// Every board, in identity order.
    pub fn boards(&self) -> Vec<Board> {
        self.boards.values().cloned().collect()
    }

    pub fn has_board(&self, board_id: BoardId) -> bool {
        self.boards.contains_key(&board_id)
    }

    /// Remove every stroke on a board, whoever drew it.
    ///
    /// Returns the removed strokes in identity order. The board itself stays.
    pub fn clear_board(&mut self, board_id: BoardId) -> TableResult<Vec<Stroke>> {
        if !self.has_board(board_id) {
            return Err(TableError::NoSuchBoard(board_id));
        }
        let ids: Vec<StrokeId> = self.board(board_id).map(|s| s.id).collect();
        Ok(ids.into_iter().filter_map(|id| self.strokes.remove(&id)).collect())
    }

    /// Store a new stroke under a fresh identity.
    pub fn insert(&mut self, draft: StrokeDraft, author: &str, timestamp: u64) -> Stroke {
        let id = StrokeId(self.next_id);
        self.next_id += 1;
        let stroke = Stroke::from_draft(id, draft, author, timestamp);
        self.strokes.insert(id, stroke.clone());
        stroke
    }

    /// Remove a stroke on behalf of `requester`.
    pub fn delete(&mut self, id: StrokeId, requester: &str, policy: DeletePolicy) -> TableResult<Stroke> {
        let stroke = self.strokes.get(&id).ok_or(TableError::NotFound(id))?;
        if policy == DeletePolicy::AuthorOnly && stroke.author != requester {
            return Err(TableError::NotAuthor {
                id,
                author: stroke.author.clone(),
                requester: requester.to_string(),
            });
        }
        self.strokes.remove(&id).ok_or(TableError::NotFound(id))
    }

    /// Move a stroke to another board, returning the old and new rows.
    pub fn move_to_board(&mut self, id: StrokeId, board_id: BoardId) -> TableResult<(Stroke, Stroke)> {
        let stroke = self.strokes.get_mut(&id).ok_or(TableError::NotFound(id))?;
        let old = stroke.clone();
        stroke.board_id = board_id;
        Ok((old, stroke.clone()))
    }

    pub fn get(&self, id: StrokeId) -> Option<&Stroke> {
        self.strokes.get(&id)
    }

    /// Every stroke, in identity order.
    pub fn snapshot(&self) -> Vec<Stroke> {
        self.strokes.values().cloned().collect()
    }

    /// Strokes on one board, in identity order.
    pub fn board(&self, board_id: BoardId) -> impl Iterator<Item = &Stroke> {
        self.strokes.values().filter(move |s| s.board_id == board_id)
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

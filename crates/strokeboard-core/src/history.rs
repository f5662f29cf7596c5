//! Undo/redo history for strokes confirmed by a remote authority.
//!
//! Undoing or redoing never changes local state directly. It issues the
//! inverse (or repeated) remote write, parks the action in the
//! [`PendingSlot`], and only moves it to the opposite stack once the authority
//! confirms the write. Re-creating a deleted stroke yields a new identity, so
//! history entries refer to strokes through a [`StrokeArena`] and a single
//! rewrite retargets every entry that mentions the stale identity.

use crate::arena::{StrokeArena, StrokeRef};
use crate::error::{ReconcileError, ReconcileResult};
use crate::pending::PendingSlot;
use crate::stroke::{Stroke, StrokeDraft, StrokeId};

/// What a user action did to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Add,
    Delete,
}

/// Which way a round trip is travelling through history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Undo,
    Redo,
}

/// Where a confirmed insert came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOrigin {
    /// The local user's own freshly drawn stroke.
    Local,
    /// Another participant, or anything we did not ask for.
    Remote,
}

/// A remote write the history wants issued.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteRequest {
    Create(StrokeDraft),
    Delete(StrokeId),
}

/// A reversible user action, resolved against the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoAction {
    pub kind: ActionKind,
    pub stroke: Stroke,
    /// True while the action sits on the undo stack.
    pub needs_undo: bool,
}

#[derive(Debug)]
struct HistoryEntry {
    kind: ActionKind,
    stroke: StrokeRef,
    needs_undo: bool,
}

/// An undo or redo whose remote write awaits confirmation.
#[derive(Debug)]
pub struct PendingUndoRedo {
    entry: HistoryEntry,
    direction: Direction,
    request: RemoteRequest,
}

impl PendingUndoRedo {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> ActionKind {
        self.entry.kind
    }

    pub fn request(&self) -> &RemoteRequest {
        &self.request
    }

    fn awaits_delete_of(&self, id: StrokeId) -> bool {
        self.request == RemoteRequest::Delete(id)
    }

    /// A re-creation matches on content and, once our identity is known, on
    /// authorship.
    fn awaits_creation_of(&self, stroke: &Stroke, local_author: Option<&str>) -> bool {
        matches!(&self.request, RemoteRequest::Create(draft) if stroke.has_content(draft))
            && local_author.is_none_or(|author| author == stroke.author)
    }
}

/// How the history reacted to a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The pending undo/redo completed.
    RoundTripFinished(Direction),
    /// A new action was pushed onto the undo stack.
    Recorded,
    /// Nothing in the history cared about this confirmation.
    Ignored,
}

/// Two stacks of reversible actions plus the stroke arena they point into.
#[derive(Debug, Default)]
pub struct UndoRedoCoordinator {
    arena: StrokeArena,
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
}

impl UndoRedoCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a locally initiated action the authority has confirmed.
    ///
    /// Pushes onto the undo stack and discards the redo stack. Does nothing
    /// while an undo/redo round trip is in flight, since that confirmation
    /// belongs to the round trip.
    pub fn register_completed_action(&mut self, slot: &PendingSlot, stroke: Stroke, kind: ActionKind) -> bool {
        if slot.is_awaiting_undo_redo() {
            log::debug!("Not recording {:?} of {} during undo/redo", kind, stroke.id);
            return false;
        }

        let stroke = self.arena.acquire(stroke);
        self.undo_stack.push(HistoryEntry {
            kind,
            stroke,
            needs_undo: true,
        });
        self.clear_redo();
        true
    }

    /// Start undoing the most recent action.
    ///
    /// Returns the remote write to issue: a delete when undoing an `Add`, a
    /// re-creation when undoing a `Delete`.
    pub fn undo(&mut self, slot: &mut PendingSlot) -> ReconcileResult<RemoteRequest> {
        slot.ensure_idle()?;
        let entry = self.undo_stack.pop().ok_or(ReconcileError::NothingToUndo)?;
        self.begin_round_trip(slot, entry, Direction::Undo)
    }

    /// Start redoing the most recently undone action.
    ///
    /// Returns the remote write to issue: a re-creation when redoing an
    /// `Add`, a delete when redoing a `Delete`.
    pub fn redo(&mut self, slot: &mut PendingSlot) -> ReconcileResult<RemoteRequest> {
        slot.ensure_idle()?;
        let entry = self.redo_stack.pop().ok_or(ReconcileError::NothingToRedo)?;
        self.begin_round_trip(slot, entry, Direction::Redo)
    }

    fn begin_round_trip(
        &mut self,
        slot: &mut PendingSlot,
        entry: HistoryEntry,
        direction: Direction,
    ) -> ReconcileResult<RemoteRequest> {
        let Some(stroke) = self.arena.get(entry.stroke) else {
            log::error!("History entry refers to a released stroke, dropping it");
            return Err(match direction {
                Direction::Undo => ReconcileError::NothingToUndo,
                Direction::Redo => ReconcileError::NothingToRedo,
            });
        };

        let request = match (entry.kind, direction) {
            (ActionKind::Add, Direction::Undo) | (ActionKind::Delete, Direction::Redo) => {
                RemoteRequest::Delete(stroke.id)
            }
            (ActionKind::Delete, Direction::Undo) | (ActionKind::Add, Direction::Redo) => {
                RemoteRequest::Create(stroke.draft())
            }
        };

        slot.begin_undo_redo(PendingUndoRedo {
            entry,
            direction,
            request: request.clone(),
        })?;
        Ok(request)
    }

    /// React to the authority confirming the delete of `stroke`.
    ///
    /// `user_requested` tells whether the local user asked for this delete
    /// directly (not through undo/redo).
    pub fn on_remote_delete_confirmed(
        &mut self,
        slot: &mut PendingSlot,
        stroke: &Stroke,
        user_requested: bool,
    ) -> Confirmation {
        if slot.undo_redo().is_some_and(|p| p.awaits_delete_of(stroke.id)) {
            if let Some(pending) = slot.take_undo_redo() {
                return Confirmation::RoundTripFinished(self.finish_round_trip(pending));
            }
        }

        if user_requested && self.register_completed_action(slot, stroke.clone(), ActionKind::Delete) {
            return Confirmation::Recorded;
        }
        Confirmation::Ignored
    }

    /// React to the authority confirming the insert of `stroke`.
    ///
    /// A re-creation requested by undo/redo retargets every history entry
    /// from the stale identity to the new one before completing the round
    /// trip. The local user's own fresh strokes are recorded as `Add`.
    pub fn on_remote_create_confirmed(
        &mut self,
        slot: &mut PendingSlot,
        stroke: &Stroke,
        origin: InsertOrigin,
        local_author: Option<&str>,
    ) -> Confirmation {
        if slot.undo_redo().is_some_and(|p| p.awaits_creation_of(stroke, local_author)) {
            if let Some(pending) = slot.take_undo_redo() {
                if let Some(stale) = self.arena.get(pending.entry.stroke).map(|s| s.id) {
                    if let Err(e) = self.rewrite_identity(stale, stroke) {
                        log::warn!("Identity rewrite {} -> {} failed: {}", stale, stroke.id, e);
                    }
                }
                return Confirmation::RoundTripFinished(self.finish_round_trip(pending));
            }
        }

        if origin == InsertOrigin::Local && self.register_completed_action(slot, stroke.clone(), ActionKind::Add) {
            return Confirmation::Recorded;
        }
        Confirmation::Ignored
    }

    /// Retarget every history entry referring to `stale` at `replacement`.
    pub fn rewrite_identity(&mut self, stale: StrokeId, replacement: &Stroke) -> ReconcileResult<()> {
        if stale == replacement.id {
            return Ok(());
        }
        self.arena.rewrite(stale, replacement.clone())?;
        log::debug!("Rewrote history references {} -> {}", stale, replacement.id);
        Ok(())
    }

    /// Drop every stacked entry referring to the stroke with identity `id`.
    ///
    /// Used once a stroke can no longer be undone or redone from this board:
    /// it was deleted by someone else, or moved away. Returns the number of
    /// entries dropped. An undo/redo parked in the slot is left alone.
    pub fn forget_stroke(&mut self, id: StrokeId) -> usize {
        let Some(target) = self.arena.lookup(id) else {
            return 0;
        };

        let before = self.undo_stack.len() + self.redo_stack.len();
        let mut dropped = Vec::new();
        for stack in [&mut self.undo_stack, &mut self.redo_stack] {
            stack.retain(|entry| {
                if entry.stroke == target {
                    dropped.push(entry.stroke);
                    false
                } else {
                    true
                }
            });
        }
        for stroke in dropped {
            self.arena.release(stroke);
        }

        let count = before - self.undo_stack.len() - self.redo_stack.len();
        if count > 0 {
            log::debug!("Dropped {} history entries for {}", count, id);
        }
        count
    }

    fn finish_round_trip(&mut self, pending: PendingUndoRedo) -> Direction {
        let PendingUndoRedo { mut entry, direction, .. } = pending;
        entry.needs_undo = !entry.needs_undo;
        match direction {
            Direction::Undo => self.redo_stack.push(entry),
            Direction::Redo => self.undo_stack.push(entry),
        }
        direction
    }

    fn clear_redo(&mut self) {
        for entry in self.redo_stack.drain(..) {
            self.arena.release(entry.stroke);
        }
    }

    /// Drop all history.
    pub fn clear(&mut self) {
        self.clear_redo();
        for entry in self.undo_stack.drain(..) {
            self.arena.release(entry.stroke);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Undo stack, bottom first.
    pub fn undo_actions(&self) -> Vec<UndoAction> {
        self.resolve_all(&self.undo_stack)
    }

    /// Redo stack, bottom first.
    pub fn redo_actions(&self) -> Vec<UndoAction> {
        self.resolve_all(&self.redo_stack)
    }

    /// The action parked in the slot by an in-flight undo/redo.
    pub fn pending_action(&self, slot: &PendingSlot) -> Option<UndoAction> {
        slot.undo_redo().and_then(|p| self.resolve(&p.entry))
    }

    /// Number of distinct logical strokes referenced by history.
    pub fn tracked_strokes(&self) -> usize {
        self.arena.len()
    }

    fn resolve_all(&self, stack: &[HistoryEntry]) -> Vec<UndoAction> {
        stack.iter().filter_map(|entry| self.resolve(entry)).collect()
    }

    fn resolve(&self, entry: &HistoryEntry) -> Option<UndoAction> {
        self.arena.get(entry.stroke).map(|stroke| UndoAction {
            kind: entry.kind,
            stroke: stroke.clone(),
            needs_undo: entry.needs_undo,
        })
    }
}

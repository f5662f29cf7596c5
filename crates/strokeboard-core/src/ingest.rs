//! Remote event ingestion.
//!
//! Translates the store's insert/update/delete events into registry, display
//! and history operations. Events arrive for every board; the filter to the
//! engine's own board is applied here.

use crate::display::StrokeDisplay;
use crate::engine::ReconciliationEngine;
use crate::error::{ReconcileError, ReconcileResult};
use crate::history::{Confirmation, InsertOrigin, RemoteRequest};
use crate::pending::CreationResolution;
use crate::store::StrokeStore;
use crate::stroke::{BoardId, Stroke, StrokeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A row change delivered by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteEvent {
    Insert(Stroke),
    /// Only used to signal that a stroke moved to another board.
    Update { old: Stroke, new: Stroke },
    Delete(Stroke),
}

impl<S: StrokeStore, D: StrokeDisplay> ReconciliationEngine<S, D> {
    /// Apply one remote event.
    pub fn apply_remote(&mut self, event: RemoteEvent) -> ReconcileResult<()> {
        match event {
            RemoteEvent::Insert(stroke) => self.on_insert(stroke),
            RemoteEvent::Update { old, new } => self.on_update(old, new),
            RemoteEvent::Delete(stroke) => self.on_delete(stroke),
        }
    }

    /// A stroke was inserted into the store.
    pub fn on_insert(&mut self, stroke: Stroke) -> ReconcileResult<()> {
        if stroke.board_id != self.board_id {
            log::trace!("Ignoring insert of {} on {}", stroke.id, stroke.board_id);
            return Ok(());
        }
        if let Some(shown) = self.registry.stroke(stroke.id) {
            // Subscribing and snapshotting race on the server, so an insert
            // may repeat a stroke the snapshot already delivered.
            if *shown == stroke {
                log::debug!("Insert repeats displayed stroke {}", stroke.id);
            } else {
                log::error!("Insert for already displayed stroke {}", stroke.id);
            }
            return Err(ReconcileError::DuplicateIdentity(stroke.id));
        }

        let (stroke, origin) = match self.slot.resolve_creation(stroke, self.local_author.as_deref()) {
            CreationResolution::Own(stroke) => (stroke, InsertOrigin::Local),
            CreationResolution::Foreign(stroke) => (stroke, InsertOrigin::Remote),
        };

        self.admit(&stroke)?;
        if origin == InsertOrigin::Local {
            log::debug!("Own stroke confirmed as {}", stroke.id);
            self.display.draft_resolved();
        }
        self.history
            .on_remote_create_confirmed(&mut self.slot, &stroke, origin, self.local_author.as_deref());
        Ok(())
    }

    /// A stroke changed board.
    ///
    /// Treated as a delete of the old row and an insert of the new one, each
    /// checked against the board filter on its own. Moves between boards are
    /// outside undo/redo: a stroke leaving this board takes its history
    /// entries with it, and a stroke arriving is not recorded.
    pub fn on_update(&mut self, old: Stroke, new: Stroke) -> ReconcileResult<()> {
        let mut result = Ok(());
        if old.board_id == self.board_id && new.board_id != self.board_id {
            log::debug!("Stroke {} left {}", old.id, self.board_id);
            result = self.retire(old.id);
            self.history.forget_stroke(old.id);
        }
        if new.board_id == self.board_id && old.board_id != self.board_id {
            log::debug!("Stroke {} arrived on {}", new.id, self.board_id);
            if self.registry.contains(new.id) {
                log::error!("Update for already displayed stroke {}", new.id);
                return Err(ReconcileError::DuplicateIdentity(new.id));
            }
            self.admit(&new)?;
        }
        result
    }

    /// A stroke was deleted from the store.
    ///
    /// Safe to call twice for the same stroke; the second call reports
    /// `NotFound` and changes nothing. Deletes on other boards are not
    /// displayed, but still settle our own outstanding requests for strokes
    /// that moved away after we asked.
    pub fn on_delete(&mut self, stroke: Stroke) -> ReconcileResult<()> {
        let on_board = stroke.board_id == self.board_id;
        let user_requested = self.requested_deletes.remove(&stroke.id);
        let retired = if on_board {
            self.retire(stroke.id)
        } else {
            log::trace!("Ignoring delete of {} on {}", stroke.id, stroke.board_id);
            Ok(())
        };

        let confirmation =
            self.history
                .on_remote_delete_confirmed(&mut self.slot, &stroke, user_requested && on_board);
        match confirmation {
            Confirmation::Recorded => {}
            Confirmation::RoundTripFinished(_) if on_board => {}
            // Gone for good, or gone from this board: nothing left to undo.
            _ => {
                self.history.forget_stroke(stroke.id);
            }
        }
        retired
    }

    /// Apply a full-state snapshot, as received on (re)subscription.
    ///
    /// Strokes of this board that are not displayed yet go through
    /// [`Self::on_insert`]. Displayed strokes missing from the snapshot were
    /// deleted while we were away and go through [`Self::on_delete`]; those
    /// now on another board are handled as moves. Returns the number of
    /// strokes newly shown.
    pub fn apply_snapshot(&mut self, strokes: Vec<Stroke>) -> usize {
        let stored: HashMap<StrokeId, BoardId> = strokes.iter().map(|s| (s.id, s.board_id)).collect();

        for id in self.registry.ids() {
            let Some(shown) = self.registry.stroke(id).cloned() else {
                continue;
            };
            match stored.get(&id) {
                Some(&board_id) if board_id == self.board_id => {}
                Some(&board_id) => {
                    log::debug!("Stroke {} moved to {} while disconnected", id, board_id);
                    let mut moved = shown.clone();
                    moved.board_id = board_id;
                    let _ = self.on_update(shown, moved);
                }
                None => {
                    log::debug!("Stroke {} vanished while disconnected", id);
                    let _ = self.on_delete(shown);
                }
            }
        }

        // An undo/redo delete whose confirmation was lost with the connection.
        let lost_delete = match self.slot.undo_redo().map(|p| p.request()) {
            Some(RemoteRequest::Delete(id)) => !stored.contains_key(id),
            _ => false,
        };
        if lost_delete {
            if let Some(action) = self.pending_action() {
                let _ = self.on_delete(action.stroke);
            }
        }
        self.requested_deletes.retain(|id| stored.contains_key(id));

        let mut shown = 0;
        for stroke in strokes {
            if stroke.board_id != self.board_id || self.registry.contains(stroke.id) {
                continue;
            }
            match self.on_insert(stroke) {
                Ok(()) => shown += 1,
                Err(e) => log::warn!("Snapshot stroke skipped: {}", e),
            }
        }
        log::info!("Snapshot applied: {} strokes on {}", self.registry.len(), self.board_id);
        shown
    }

    fn admit(&mut self, stroke: &Stroke) -> ReconcileResult<()> {
        self.registry.register(stroke)?;
        self.display.show(stroke.id, stroke);
        Ok(())
    }

    fn retire(&mut self, id: StrokeId) -> ReconcileResult<()> {
        match self.registry.unregister(id) {
            Ok(_) => {
                self.display.hide(id);
                Ok(())
            }
            Err(e) => {
                log::debug!("Nothing to hide for {}", id);
                Err(e)
            }
        }
    }
}

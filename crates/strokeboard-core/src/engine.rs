//! The reconciliation engine.
//!
//! One engine exists per board session. It owns the display registry, the
//! single-flight slot and the undo/redo history, and is driven from two sides:
//! user intent (the `user_*` methods here) and remote confirmations (the
//! ingester methods in [`crate::ingest`]). Neither side blocks; a request that
//! cannot be accepted right now is rejected immediately.

use crate::display::StrokeDisplay;
use crate::error::{ReconcileError, ReconcileResult};
use crate::history::{RemoteRequest, UndoAction, UndoRedoCoordinator};
use crate::pending::PendingSlot;
use crate::registry::DisplayRegistry;
use crate::store::StrokeStore;
use crate::stroke::{BoardId, Point, StrokeDraft, StrokeId};
use std::collections::HashSet;

/// Optimistic-write / eventual-confirmation engine for one board.
pub struct ReconciliationEngine<S, D> {
    pub(crate) board_id: BoardId,
    pub(crate) store: S,
    pub(crate) display: D,
    pub(crate) registry: DisplayRegistry,
    pub(crate) slot: PendingSlot,
    pub(crate) history: UndoRedoCoordinator,
    /// Deletes the user asked for directly, awaiting confirmation.
    pub(crate) requested_deletes: HashSet<StrokeId>,
    /// Our author identity as assigned by the authority, once known.
    pub(crate) local_author: Option<String>,
}

impl<S: StrokeStore, D: StrokeDisplay> ReconciliationEngine<S, D> {
    /// Create an engine for `board_id` writing to `store` and drawing on
    /// `display`.
    pub fn new(board_id: BoardId, store: S, display: D) -> Self {
        Self {
            board_id,
            store,
            display,
            registry: DisplayRegistry::new(),
            slot: PendingSlot::Idle,
            history: UndoRedoCoordinator::new(),
            requested_deletes: HashSet::new(),
            local_author: None,
        }
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn registry(&self) -> &DisplayRegistry {
        &self.registry
    }

    pub fn history(&self) -> &UndoRedoCoordinator {
        &self.history
    }

    pub fn pending(&self) -> &PendingSlot {
        &self.slot
    }

    /// The action parked by an in-flight undo/redo.
    pub fn pending_action(&self) -> Option<UndoAction> {
        self.history.pending_action(&self.slot)
    }

    /// Record the author identity the authority assigned to us.
    ///
    /// Once set, only inserts authored by us can resolve a pending creation.
    pub fn set_local_author(&mut self, author: impl Into<String>) {
        self.local_author = Some(author.into());
    }

    pub fn local_author(&self) -> Option<&str> {
        self.local_author.as_deref()
    }

    /// Whether a new stroke, undo or redo would be accepted right now.
    pub fn can_accept_user_action(&self) -> bool {
        self.slot.is_idle()
    }

    /// The user finished drawing a stroke.
    ///
    /// Submits it for creation and waits for the authority to assign it an
    /// identity; nothing is registered until then.
    pub fn user_finished_stroke(
        &mut self,
        points: Vec<Point>,
        color: impl Into<String>,
        thickness: f32,
    ) -> ReconcileResult<()> {
        if points.is_empty() {
            return Err(rejected("stroke", ReconcileError::EmptyStroke));
        }
        let draft = StrokeDraft::new(self.board_id, color, thickness, points);
        if !draft.is_finite() {
            return Err(rejected("stroke", ReconcileError::NonFiniteStroke));
        }
        self.slot
            .begin_creation(draft.clone())
            .map_err(|e| rejected("stroke", e))?;

        log::debug!("Submitting stroke with {} points", draft.points.len());
        self.store.submit_create(&draft);
        Ok(())
    }

    /// The user asked to delete a displayed stroke.
    ///
    /// The stroke stays displayed until the authority confirms the delete.
    /// Rejected while an undo/redo is in flight, since its confirmation could
    /// not be recorded in history.
    pub fn user_requested_delete(&mut self, id: StrokeId) -> ReconcileResult<()> {
        if self.slot.is_awaiting_undo_redo() {
            return Err(rejected("delete", ReconcileError::UndoRedoAlreadyInFlight));
        }
        if !self.registry.contains(id) {
            log::debug!("Delete of {} ignored: not displayed", id);
            return Err(ReconcileError::NotFound(id));
        }
        if self.requested_deletes.insert(id) {
            log::debug!("Submitting delete of {}", id);
            self.store.submit_delete(id);
        }
        Ok(())
    }

    /// The user erased at `point`; deletes the stroke drawn there, if any.
    pub fn user_requested_delete_at(&mut self, point: Point) -> ReconcileResult<Option<StrokeId>> {
        match self.registry.stroke_at(point.into()) {
            Some(id) => self.user_requested_delete(id).map(|()| Some(id)),
            None => Ok(None),
        }
    }

    /// Undo the most recent confirmed action.
    pub fn user_requested_undo(&mut self) -> ReconcileResult<()> {
        let request = self
            .history
            .undo(&mut self.slot)
            .map_err(|e| rejected("undo", e))?;
        self.issue(request);
        Ok(())
    }

    /// Redo the most recently undone action.
    pub fn user_requested_redo(&mut self) -> ReconcileResult<()> {
        let request = self
            .history
            .redo(&mut self.slot)
            .map_err(|e| rejected("redo", e))?;
        self.issue(request);
        Ok(())
    }

    /// Forget a direct delete request the authority refused.
    pub fn forget_delete_request(&mut self, id: StrokeId) -> bool {
        self.requested_deletes.remove(&id)
    }

    /// Identities the user asked to delete that are not confirmed yet.
    pub fn outstanding_deletes(&self) -> Vec<StrokeId> {
        let mut ids: Vec<StrokeId> = self.requested_deletes.iter().copied().collect();
        ids.sort();
        ids
    }

    fn issue(&mut self, request: RemoteRequest) {
        match request {
            RemoteRequest::Create(draft) => {
                log::debug!("Re-creating stroke with {} points", draft.points.len());
                self.store.submit_create(&draft);
            }
            RemoteRequest::Delete(id) => {
                log::debug!("Deleting {} for undo/redo", id);
                self.store.submit_delete(id);
            }
        }
    }
}

fn rejected(action: &str, e: ReconcileError) -> ReconcileError {
    log::debug!("{} rejected: {}", action, e);
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayCall, RecordingDisplay};
    use crate::history::ActionKind;
    use crate::store::MemoryStore;
    use proptest::prelude::*;

    type TestEngine = ReconciliationEngine<MemoryStore, RecordingDisplay>;

    const BOARD: BoardId = BoardId(1);

    fn engine() -> TestEngine {
        let mut engine = ReconciliationEngine::new(BOARD, MemoryStore::new("me"), RecordingDisplay::new());
        engine.set_local_author("me");
        engine
    }

    /// Deliver every queued store event to the engine.
    fn deliver(engine: &mut TestEngine) {
        for event in engine.store_mut().take_events() {
            let _ = engine.apply_remote(event);
        }
    }

    fn line(offset: f32) -> Vec<Point> {
        vec![Point::new(offset, 0.0), Point::new(offset + 10.0, 10.0)]
    }

    fn foreign(engine: &mut TestEngine, offset: f32) -> StrokeId {
        engine
            .store_mut()
            .insert_as("them", StrokeDraft::new(BOARD, "#0000ff", 2.0, line(offset)))
            .id
    }

    #[test]
    fn test_draw_then_undo() {
        let mut engine = engine();
        engine
            .user_finished_stroke(vec![Point::new(0.0, 0.0)], "#000000", 4.0)
            .unwrap();
        assert!(engine.registry().is_empty());
        assert!(!engine.can_accept_user_action());

        deliver(&mut engine);
        assert_eq!(engine.registry().ids(), vec![StrokeId(1)]);
        assert!(engine.can_accept_user_action());
        assert_eq!(engine.history().undo_len(), 1);

        engine.user_requested_undo().unwrap();
        assert!(engine.store().table().get(StrokeId(1)).is_none());
        assert_eq!(engine.registry().ids(), vec![StrokeId(1)]);

        deliver(&mut engine);
        assert!(engine.registry().is_empty());
        let redo = engine.history().redo_actions();
        assert_eq!(redo.len(), 1);
        assert_eq!(redo[0].kind, ActionKind::Add);
        assert_eq!(redo[0].stroke.id, StrokeId(1));
        assert_eq!(redo[0].stroke.points, vec![Point::new(0.0, 0.0)]);
        assert!(!redo[0].needs_undo);
        assert!(engine.can_accept_user_action());
    }

    #[test]
    fn test_direct_delete_recorded() {
        let mut engine = engine();
        foreign(&mut engine, 0.0);
        let target = foreign(&mut engine, 50.0);
        assert_eq!(target, StrokeId(2));
        deliver(&mut engine);

        engine.user_requested_delete(target).unwrap();
        assert!(engine.registry().contains(target));
        deliver(&mut engine);

        assert!(!engine.registry().contains(target));
        let top = engine.history().undo_actions().pop().unwrap();
        assert_eq!(top.kind, ActionKind::Delete);
        assert_eq!(top.stroke.id, StrokeId(2));
        assert!(top.needs_undo);
        assert_eq!(engine.history().redo_len(), 0);
    }

    #[test]
    fn test_undo_delete_rewrites_identity() {
        let mut engine = engine();
        foreign(&mut engine, 0.0);
        deliver(&mut engine);

        engine.user_finished_stroke(line(20.0), "#ff0000", 3.0).unwrap();
        deliver(&mut engine);
        assert!(engine.registry().contains(StrokeId(2)));

        engine.user_requested_delete(StrokeId(2)).unwrap();
        deliver(&mut engine);
        for offset in [100.0, 200.0, 300.0, 400.0] {
            foreign(&mut engine, offset);
        }
        deliver(&mut engine);

        engine.user_requested_undo().unwrap();
        deliver(&mut engine);

        assert!(engine.registry().contains(StrokeId(7)));
        assert!(!engine.registry().contains(StrokeId(2)));
        let undo = engine.history().undo_actions();
        let redo = engine.history().redo_actions();
        assert_eq!(undo.len(), 1);
        assert_eq!(redo.len(), 1);
        assert!(undo.iter().chain(redo.iter()).all(|a| a.stroke.id == StrokeId(7)));
        assert_eq!(undo[0].kind, ActionKind::Add);
        assert_eq!(redo[0].kind, ActionKind::Delete);
    }

    #[test]
    fn test_undo_then_redo_restores_content() {
        let mut engine = engine();
        engine.user_finished_stroke(line(5.0), "#00ff00", 6.0).unwrap();
        deliver(&mut engine);
        let before = engine.store().table().get(StrokeId(1)).cloned().unwrap();

        engine.user_requested_undo().unwrap();
        deliver(&mut engine);
        engine.user_requested_redo().unwrap();
        deliver(&mut engine);

        let ids = engine.registry().ids();
        assert_eq!(ids.len(), 1);
        let after = engine.store().table().get(ids[0]).cloned().unwrap();
        assert_ne!(after.id, before.id);
        assert!(after.same_content(&before));
        assert_eq!(engine.history().undo_actions()[0].stroke.id, after.id);
    }

    #[test]
    fn test_single_flight() {
        let mut engine = engine();
        engine.user_finished_stroke(line(0.0), "#000000", 1.0).unwrap();
        deliver(&mut engine);

        engine.user_finished_stroke(line(30.0), "#000000", 1.0).unwrap();
        assert_eq!(
            engine.user_finished_stroke(line(60.0), "#000000", 1.0).unwrap_err(),
            ReconcileError::CreationAlreadyInFlight
        );
        assert_eq!(
            engine.user_requested_undo().unwrap_err(),
            ReconcileError::CreationAlreadyInFlight
        );
        deliver(&mut engine);

        engine.user_requested_undo().unwrap();
        assert!(engine.pending().is_awaiting_undo_redo());
        assert_eq!(
            engine.user_finished_stroke(line(90.0), "#000000", 1.0).unwrap_err(),
            ReconcileError::UndoRedoAlreadyInFlight
        );
        assert_eq!(
            engine.user_requested_redo().unwrap_err(),
            ReconcileError::UndoRedoAlreadyInFlight
        );
        assert_eq!(
            engine.user_requested_delete(StrokeId(1)).unwrap_err(),
            ReconcileError::UndoRedoAlreadyInFlight
        );
    }

    #[test]
    fn test_empty_stroke_rejected() {
        let mut engine = engine();
        assert_eq!(
            engine.user_finished_stroke(Vec::new(), "#000000", 1.0).unwrap_err(),
            ReconcileError::EmptyStroke
        );
        assert!(engine.can_accept_user_action());
        assert!(!engine.store().has_events());
    }

    #[test]
    fn test_non_finite_stroke_rejected() {
        let mut engine = engine();
        let bad_point = vec![Point::new(0.0, 0.0), Point::new(f32::NAN, 3.0)];
        assert_eq!(
            engine.user_finished_stroke(bad_point, "#000000", 1.0).unwrap_err(),
            ReconcileError::NonFiniteStroke
        );
        assert_eq!(
            engine.user_finished_stroke(line(0.0), "#000000", f32::INFINITY).unwrap_err(),
            ReconcileError::NonFiniteStroke
        );
        assert!(ReconcileError::NonFiniteStroke.is_rejection());
        assert!(engine.can_accept_user_action());
        assert!(!engine.store().has_events());

        engine.user_finished_stroke(line(0.0), "#000000", 1.0).unwrap();
        deliver(&mut engine);
        assert_eq!(engine.registry().ids(), vec![StrokeId(1)]);
    }

    #[test]
    fn test_cleared_board_is_not_undoable() {
        let mut engine = engine();
        let board = engine.store_mut().create_board("main");
        assert_eq!(board.id, BOARD);

        engine.user_finished_stroke(line(0.0), "#000000", 1.0).unwrap();
        deliver(&mut engine);
        engine.user_requested_undo().unwrap();
        deliver(&mut engine);
        engine.user_requested_redo().unwrap();
        deliver(&mut engine);
        foreign(&mut engine, 40.0);
        deliver(&mut engine);
        assert_eq!(engine.registry().len(), 2);

        engine.store_mut().clear_board(BOARD).unwrap();
        deliver(&mut engine);
        assert!(engine.registry().is_empty());
        assert_eq!(engine.history().undo_len(), 0);
        assert_eq!(engine.history().redo_len(), 0);
        assert_eq!(engine.history().tracked_strokes(), 0);
        assert_eq!(engine.user_requested_undo().unwrap_err(), ReconcileError::NothingToUndo);
    }

    #[test]
    fn test_delete_of_undisplayed_stroke() {
        let mut engine = engine();
        assert_eq!(
            engine.user_requested_delete(StrokeId(42)).unwrap_err(),
            ReconcileError::NotFound(StrokeId(42))
        );
        assert!(!engine.store().has_events());
    }

    #[test]
    fn test_repeated_delete_request_submitted_once() {
        let mut engine = engine();
        let id = foreign(&mut engine, 0.0);
        deliver(&mut engine);

        engine.user_requested_delete(id).unwrap();
        engine.user_requested_delete(id).unwrap();
        assert_eq!(engine.outstanding_deletes(), vec![id]);
        assert_eq!(engine.store_mut().take_events().len(), 1);
    }

    #[test]
    fn test_delete_at_point() {
        let mut engine = engine();
        foreign(&mut engine, 0.0);
        deliver(&mut engine);

        assert_eq!(engine.user_requested_delete_at(Point::new(500.0, 500.0)).unwrap(), None);
        assert_eq!(
            engine.user_requested_delete_at(Point::new(5.0, 5.0)).unwrap(),
            Some(StrokeId(1))
        );
        deliver(&mut engine);
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_draft_resolved_on_own_stroke() {
        let mut engine = engine();
        engine.user_finished_stroke(line(0.0), "#000000", 1.0).unwrap();
        deliver(&mut engine);
        assert_eq!(
            engine.display().calls(),
            &[DisplayCall::Show(StrokeId(1)), DisplayCall::DraftResolved]
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Draw(u8),
        Foreign(u8),
        Delete(u8),
        Deliver,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Draw),
            any::<u8>().prop_map(Op::Foreign),
            any::<u8>().prop_map(Op::Delete),
            Just(Op::Deliver),
        ]
    }

    proptest! {
        #[test]
        fn prop_registry_tracks_confirmed_strokes(ops in proptest::collection::vec(op(), 1..40)) {
            let mut engine = engine();
            for op in ops {
                match op {
                    Op::Draw(n) => {
                        let _ = engine.user_finished_stroke(line(n as f32), "#000000", 2.0);
                    }
                    Op::Foreign(n) => {
                        foreign(&mut engine, n as f32);
                    }
                    Op::Delete(n) => {
                        let ids = engine.registry().ids();
                        if !ids.is_empty() {
                            let _ = engine.user_requested_delete(ids[n as usize % ids.len()]);
                        }
                    }
                    Op::Deliver => deliver(&mut engine),
                }
                prop_assert_eq!(engine.history().redo_len(), 0);
            }
            deliver(&mut engine);

            let expected: Vec<StrokeId> = engine.store().table().board(BOARD).map(|s| s.id).collect();
            prop_assert_eq!(engine.registry().ids(), expected);
            prop_assert!(engine.can_accept_user_action());
        }
    }
}

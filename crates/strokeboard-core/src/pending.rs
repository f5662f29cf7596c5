//! Single-flight slot for requests awaiting confirmation.
//!
//! At any instant the engine waits for at most one thing: either the
//! confirmation of a freshly drawn stroke, or the confirmation of the remote
//! write issued by an undo/redo. Both live in one [`PendingSlot`] so the two can
//! never be outstanding together.

use crate::error::{ReconcileError, ReconcileResult};
use crate::history::PendingUndoRedo;
use crate::stroke::{Stroke, StrokeDraft};

/// What the engine is currently waiting on.
#[derive(Debug, Default)]
pub enum PendingSlot {
    /// Nothing outstanding.
    #[default]
    Idle,
    /// A locally drawn stroke was submitted and awaits its identity.
    AwaitingCreation(StrokeDraft),
    /// An undo or redo issued a remote write and awaits its confirmation.
    AwaitingUndoRedo(PendingUndoRedo),
}

/// Outcome of routing a confirmed insert through the creation tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum CreationResolution {
    /// The insert confirms the stroke we were waiting for.
    Own(Stroke),
    /// Somebody else's stroke, or not a creation we asked for.
    Foreign(Stroke),
}

impl CreationResolution {
    pub fn into_stroke(self) -> Stroke {
        match self {
            CreationResolution::Own(stroke) | CreationResolution::Foreign(stroke) => stroke,
        }
    }
}

impl PendingSlot {
    pub fn is_idle(&self) -> bool {
        matches!(self, PendingSlot::Idle)
    }

    pub fn is_awaiting_creation(&self) -> bool {
        matches!(self, PendingSlot::AwaitingCreation(_))
    }

    pub fn is_awaiting_undo_redo(&self) -> bool {
        matches!(self, PendingSlot::AwaitingUndoRedo(_))
    }

    /// The submitted draft, while a creation is in flight.
    pub fn creation(&self) -> Option<&StrokeDraft> {
        match self {
            PendingSlot::AwaitingCreation(draft) => Some(draft),
            _ => None,
        }
    }

    /// The undo/redo round trip in flight, if any.
    pub fn undo_redo(&self) -> Option<&PendingUndoRedo> {
        match self {
            PendingSlot::AwaitingUndoRedo(pending) => Some(pending),
            _ => None,
        }
    }

    /// Fail with the error matching whatever currently occupies the slot.
    pub fn ensure_idle(&self) -> ReconcileResult<()> {
        match self {
            PendingSlot::Idle => Ok(()),
            PendingSlot::AwaitingCreation(_) => Err(ReconcileError::CreationAlreadyInFlight),
            PendingSlot::AwaitingUndoRedo(_) => Err(ReconcileError::UndoRedoAlreadyInFlight),
        }
    }

    /// Arm the slot for a freshly drawn stroke.
    pub fn begin_creation(&mut self, draft: StrokeDraft) -> ReconcileResult<()> {
        self.ensure_idle()?;
        *self = PendingSlot::AwaitingCreation(draft);
        Ok(())
    }

    /// Route a confirmed insert through the tracker.
    ///
    /// The insert resolves the pending creation when it carries the submitted
    /// content and, once our author identity is known, our authorship. A
    /// resolved creation clears the slot.
    pub fn resolve_creation(&mut self, stroke: Stroke, local_author: Option<&str>) -> CreationResolution {
        let matches = match self {
            PendingSlot::AwaitingCreation(draft) => {
                stroke.has_content(draft) && local_author.is_none_or(|author| author == stroke.author)
            }
            _ => false,
        };

        if matches {
            *self = PendingSlot::Idle;
            CreationResolution::Own(stroke)
        } else {
            CreationResolution::Foreign(stroke)
        }
    }

    pub(crate) fn begin_undo_redo(&mut self, pending: PendingUndoRedo) -> ReconcileResult<()> {
        self.ensure_idle()?;
        *self = PendingSlot::AwaitingUndoRedo(pending);
        Ok(())
    }

    pub(crate) fn take_undo_redo(&mut self) -> Option<PendingUndoRedo> {
        match std::mem::take(self) {
            PendingSlot::AwaitingUndoRedo(pending) => Some(pending),
            other => {
                *self = other;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{BoardId, Point, StrokeId};

    fn draft() -> StrokeDraft {
        StrokeDraft::new(BoardId(1), "#00ff00", 2.0, vec![Point::new(1.0, 1.0), Point::new(2.0, 3.0)])
    }

    #[test]
    fn test_single_creation_in_flight() {
        let mut slot = PendingSlot::default();
        slot.begin_creation(draft()).unwrap();
        assert_eq!(
            slot.begin_creation(draft()).unwrap_err(),
            ReconcileError::CreationAlreadyInFlight
        );
        assert!(slot.is_awaiting_creation());
    }

    #[test]
    fn test_resolve_own_creation() {
        let mut slot = PendingSlot::default();
        slot.begin_creation(draft()).unwrap();

        let confirmed = Stroke::from_draft(StrokeId(1), draft(), "me", 10);
        let resolution = slot.resolve_creation(confirmed.clone(), Some("me"));
        assert_eq!(resolution, CreationResolution::Own(confirmed));
        assert!(slot.is_idle());
    }

    #[test]
    fn test_foreign_insert_leaves_slot_armed() {
        let mut slot = PendingSlot::default();
        slot.begin_creation(draft()).unwrap();

        // Same content, different author.
        let theirs = Stroke::from_draft(StrokeId(2), draft(), "them", 10);
        assert!(matches!(
            slot.resolve_creation(theirs, Some("me")),
            CreationResolution::Foreign(_)
        ));

        // Different content.
        let mut other = draft();
        other.color = "#ffffff".to_string();
        let other = Stroke::from_draft(StrokeId(3), other, "me", 11);
        assert!(matches!(
            slot.resolve_creation(other, Some("me")),
            CreationResolution::Foreign(_)
        ));
        assert!(slot.is_awaiting_creation());
    }

    #[test]
    fn test_unknown_author_matches_on_content() {
        let mut slot = PendingSlot::default();
        slot.begin_creation(draft()).unwrap();
        let confirmed = Stroke::from_draft(StrokeId(4), draft(), "whoever", 0);
        assert!(matches!(
            slot.resolve_creation(confirmed, None),
            CreationResolution::Own(_)
        ));
    }

    #[test]
    fn test_insert_without_pending_is_foreign() {
        let mut slot = PendingSlot::default();
        let stroke = Stroke::from_draft(StrokeId(1), draft(), "me", 0);
        assert!(matches!(
            slot.resolve_creation(stroke, Some("me")),
            CreationResolution::Foreign(_)
        ));
        assert!(slot.is_idle());
    }
}

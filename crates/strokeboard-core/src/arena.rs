//! Arena of logical strokes referenced by undo/redo history.
//!
//! Every history entry that talks about the same logical stroke holds the same
//! [`StrokeRef`]. When a stroke is re-created under a new identity, updating
//! the one arena slot updates every entry at once, whichever stack it sits on.

use crate::error::{ReconcileError, ReconcileResult};
use crate::stroke::{Stroke, StrokeId};
use std::collections::HashMap;

/// Stable index of a logical stroke in a [`StrokeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrokeRef(usize);

#[derive(Debug)]
struct Slot {
    stroke: Stroke,
    /// Number of history entries holding this slot.
    refs: usize,
}

/// Reference-counted storage of the strokes history entries point at.
#[derive(Debug, Default)]
pub struct StrokeArena {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    by_identity: HashMap<StrokeId, StrokeRef>,
}

impl StrokeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reference to the logical stroke with `stroke`'s identity,
    /// allocating a slot if none holds it yet.
    pub fn acquire(&mut self, stroke: Stroke) -> StrokeRef {
        if let Some(&existing) = self.by_identity.get(&stroke.id) {
            if let Some(Some(slot)) = self.slots.get_mut(existing.0) {
                slot.refs += 1;
                return existing;
            }
        }

        let id = stroke.id;
        let slot = Slot { stroke, refs: 1 };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        let stroke_ref = StrokeRef(index);
        self.by_identity.insert(id, stroke_ref);
        stroke_ref
    }

    /// Drop one reference; the slot is recycled when none remain.
    pub fn release(&mut self, stroke_ref: StrokeRef) {
        let Some(entry) = self.slots.get_mut(stroke_ref.0) else {
            return;
        };
        let Some(slot) = entry.as_mut() else {
            return;
        };
        slot.refs -= 1;
        if slot.refs == 0 {
            let id = slot.stroke.id;
            *entry = None;
            self.free.push(stroke_ref.0);
            if self.by_identity.get(&id) == Some(&stroke_ref) {
                self.by_identity.remove(&id);
            }
        }
    }

    pub fn get(&self, stroke_ref: StrokeRef) -> Option<&Stroke> {
        self.slots
            .get(stroke_ref.0)
            .and_then(|slot| slot.as_ref())
            .map(|slot| &slot.stroke)
    }

    /// Slot currently holding the stroke with identity `id`.
    pub fn lookup(&self, id: StrokeId) -> Option<StrokeRef> {
        self.by_identity.get(&id).copied()
    }

    /// Point the slot holding `stale` at `replacement` instead.
    ///
    /// Every history entry referring to the stale identity now refers to the
    /// replacement. Fails with `IdentityRewriteMismatch` when no slot holds the
    /// stale identity.
    pub fn rewrite(&mut self, stale: StrokeId, replacement: Stroke) -> ReconcileResult<StrokeRef> {
        let stroke_ref = self
            .by_identity
            .get(&stale)
            .copied()
            .ok_or(ReconcileError::IdentityRewriteMismatch(stale))?;
        let slot = self
            .slots
            .get_mut(stroke_ref.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(ReconcileError::IdentityRewriteMismatch(stale))?;

        self.by_identity.remove(&stale);
        self.by_identity.insert(replacement.id, stroke_ref);
        slot.stroke = replacement;
        Ok(stroke_ref)
    }

    /// Number of live logical strokes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{BoardId, Point, StrokeDraft};

    fn stroke(id: u64) -> Stroke {
        Stroke::from_draft(
            StrokeId(id),
            StrokeDraft::new(BoardId(1), "#000000", 2.0, vec![Point::new(id as f32, 0.0)]),
            "tester",
            0,
        )
    }

    #[test]
    fn test_same_identity_shares_slot() {
        let mut arena = StrokeArena::new();
        let a = arena.acquire(stroke(1));
        let b = arena.acquire(stroke(1));
        assert_eq!(a, b);
        assert_eq!(arena.len(), 1);

        arena.release(a);
        assert_eq!(arena.get(b).map(|s| s.id), Some(StrokeId(1)));
        arena.release(b);
        assert!(arena.is_empty());
        assert_eq!(arena.lookup(StrokeId(1)), None);
    }

    #[test]
    fn test_released_slot_is_recycled() {
        let mut arena = StrokeArena::new();
        let a = arena.acquire(stroke(1));
        arena.release(a);
        let b = arena.acquire(stroke(2));
        assert_eq!(a, b);
        assert_eq!(arena.get(b).map(|s| s.id), Some(StrokeId(2)));
    }

    #[test]
    fn test_rewrite_updates_lookup() {
        let mut arena = StrokeArena::new();
        let r = arena.acquire(stroke(2));

        let rewritten = arena.rewrite(StrokeId(2), stroke(7)).unwrap();
        assert_eq!(rewritten, r);
        assert_eq!(arena.get(r).map(|s| s.id), Some(StrokeId(7)));
        assert_eq!(arena.lookup(StrokeId(7)), Some(r));
        assert_eq!(arena.lookup(StrokeId(2)), None);
    }

    #[test]
    fn test_rewrite_unknown_identity() {
        let mut arena = StrokeArena::new();
        assert_eq!(
            arena.rewrite(StrokeId(5), stroke(6)).unwrap_err(),
            ReconcileError::IdentityRewriteMismatch(StrokeId(5))
        );
    }
}

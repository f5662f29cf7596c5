//! Reconciliation errors.

use crate::stroke::StrokeId;
use thiserror::Error;

/// Errors raised by the reconciliation engine and its components.
///
/// None of these are surfaced to the user. Rejections are dropped by the
/// caller, `NotFound` is expected under board filtering, and the rest are
/// logged as broken protocol assumptions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("Stroke {0} is already displayed")]
    DuplicateIdentity(StrokeId),
    #[error("Stroke {0} is not displayed")]
    NotFound(StrokeId),
    #[error("A stroke creation is already awaiting confirmation")]
    CreationAlreadyInFlight,
    #[error("An undo/redo is already awaiting confirmation")]
    UndoRedoAlreadyInFlight,
    #[error("No history entry refers to stroke {0}")]
    IdentityRewriteMismatch(StrokeId),
    #[error("A stroke needs at least one point")]
    EmptyStroke,
    #[error("Stroke coordinates and thickness must be finite")]
    NonFiniteStroke,
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("Nothing to redo")]
    NothingToRedo,
}

impl ReconcileError {
    /// Whether this is a rejected user action rather than a reconciliation
    /// problem.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ReconcileError::CreationAlreadyInFlight
                | ReconcileError::UndoRedoAlreadyInFlight
                | ReconcileError::EmptyStroke
                | ReconcileError::NonFiniteStroke
                | ReconcileError::NothingToUndo
                | ReconcileError::NothingToRedo
        )
    }
}

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

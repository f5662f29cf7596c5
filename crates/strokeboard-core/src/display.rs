//! Display callbacks the engine drives.

use crate::stroke::{Stroke, StrokeId};

/// Rendering side of the board.
///
/// The engine calls `show` exactly once per confirmed stroke on the board and
/// `hide` once when it goes away.
pub trait StrokeDisplay {
    /// Start showing a confirmed stroke.
    fn show(&mut self, id: StrokeId, stroke: &Stroke);

    /// Stop showing a stroke.
    fn hide(&mut self, id: StrokeId);

    /// The locally drawn preview has been confirmed and is now shown through
    /// `show`; the preview can be dropped.
    fn draft_resolved(&mut self) {}
}

/// A call received by a [`RecordingDisplay`].
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCall {
    Show(StrokeId),
    Hide(StrokeId),
    DraftResolved,
}

/// Display that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    calls: Vec<DisplayCall>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[DisplayCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<DisplayCall> {
        std::mem::take(&mut self.calls)
    }
}

impl StrokeDisplay for RecordingDisplay {
    fn show(&mut self, id: StrokeId, _stroke: &Stroke) {
        self.calls.push(DisplayCall::Show(id));
    }

    fn hide(&mut self, id: StrokeId) {
        self.calls.push(DisplayCall::Hide(id));
    }

    fn draft_resolved(&mut self) {
        self.calls.push(DisplayCall::DraftResolved);
    }
}

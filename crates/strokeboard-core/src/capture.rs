//! Freehand point capture for strokes being drawn.

use crate::stroke::Point;

/// Default minimum spacing between kept points.
pub const DEFAULT_MIN_POINT_SPACING: f32 = 2.0;

/// Accumulates pointer positions between press and release.
#[derive(Debug, Clone)]
pub struct StrokeCapture {
    points: Vec<Point>,
    active: bool,
    min_spacing: f32,
}

impl Default for StrokeCapture {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_POINT_SPACING)
    }
}

impl StrokeCapture {
    pub fn new(min_spacing: f32) -> Self {
        Self {
            points: Vec::new(),
            active: false,
            min_spacing: min_spacing.max(0.0),
        }
    }

    /// Begin a stroke at `point`, discarding anything captured before.
    pub fn begin(&mut self, point: Point) {
        self.points.clear();
        self.points.push(point);
        self.active = true;
    }

    /// Add a point if it moved far enough from the last kept one.
    /// Returns whether the point was kept.
    pub fn extend(&mut self, point: Point) -> bool {
        if !self.active {
            return false;
        }
        match self.points.last() {
            Some(last) if last.distance(point) <= self.min_spacing => false,
            _ => {
                self.points.push(point);
                true
            }
        }
    }

    /// End the stroke and hand over its points.
    pub fn finish(&mut self) -> Option<Vec<Point>> {
        if !self.active {
            return None;
        }
        self.active = false;
        let points = std::mem::take(&mut self.points);
        (!points.is_empty()).then_some(points)
    }

    /// Cancel the current stroke.
    pub fn cancel(&mut self) {
        self.active = false;
        self.points.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Points captured so far, for drawing a preview.
    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

//! Display registry: confirmed stroke identities and what is shown for them.

use crate::error::{ReconcileError, ReconcileResult};
use crate::stroke::{Stroke, StrokeId};
use kurbo::{Point, Vec2};
use std::collections::HashMap;

/// Locally displayed form of a confirmed stroke.
#[derive(Debug, Clone, PartialEq)]
pub enum Representation {
    /// Single-point stroke drawn as a filled circle.
    Dot {
        center: Point,
        radius: f64,
        color: String,
    },
    /// Multi-point stroke drawn as a connected line.
    Polyline {
        points: Vec<Point>,
        width: f64,
        color: String,
    },
}

impl Representation {
    /// Build the representation for a confirmed stroke.
    pub fn for_stroke(stroke: &Stroke) -> Self {
        match stroke.points.as_slice() {
            [only] => Representation::Dot {
                center: (*only).into(),
                radius: stroke.thickness as f64 / 2.0,
                color: stroke.color.clone(),
            },
            points => Representation::Polyline {
                points: points.iter().map(|&p| p.into()).collect(),
                width: stroke.thickness as f64,
                color: stroke.color.clone(),
            },
        }
    }

    pub fn is_dot(&self) -> bool {
        matches!(self, Representation::Dot { .. })
    }

    pub fn color(&self) -> &str {
        match self {
            Representation::Dot { color, .. } | Representation::Polyline { color, .. } => color,
        }
    }

    /// Whether `point` lies on the drawn stroke.
    pub fn hit_test(&self, point: Point) -> bool {
        match self {
            Representation::Dot { center, radius, .. } => center.distance(point) <= *radius,
            Representation::Polyline { points, width, .. } => {
                let half = width / 2.0;
                if let [only] = points.as_slice() {
                    return only.distance(point) <= half;
                }
                points
                    .windows(2)
                    .any(|w| segment_distance(point, w[0], w[1]) <= half)
            }
        }
    }
}

/// Distance from `point` to the segment `start..end`.
fn segment_distance(point: Point, start: Point, end: Point) -> f64 {
    let line_vec = Vec2::new(end.x - start.x, end.y - start.y);
    let point_vec = Vec2::new(point.x - start.x, point.y - start.y);

    let line_len_sq = line_vec.hypot2();
    if line_len_sq < f64::EPSILON {
        return point_vec.hypot();
    }

    let t = (point_vec.dot(line_vec) / line_len_sq).clamp(0.0, 1.0);
    let projection = Point::new(start.x + t * line_vec.x, start.y + t * line_vec.y);
    projection.distance(point)
}

#[derive(Debug)]
struct Displayed {
    stroke: Stroke,
    representation: Representation,
}

/// Maps confirmed stroke identities to the stroke and its displayed
/// representation.
///
/// An identity is only ever registered after the authority confirmed it, and
/// at most once.
#[derive(Debug, Default)]
pub struct DisplayRegistry {
    entries: HashMap<StrokeId, Displayed>,
}

impl DisplayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a confirmed stroke and build what is shown for it.
    pub fn register(&mut self, stroke: &Stroke) -> ReconcileResult<()> {
        if self.entries.contains_key(&stroke.id) {
            return Err(ReconcileError::DuplicateIdentity(stroke.id));
        }
        self.entries.insert(
            stroke.id,
            Displayed {
                stroke: stroke.clone(),
                representation: Representation::for_stroke(stroke),
            },
        );
        Ok(())
    }

    /// Forget `id`, returning the stroke that was shown for it.
    pub fn unregister(&mut self, id: StrokeId) -> ReconcileResult<Stroke> {
        self.entries
            .remove(&id)
            .map(|displayed| displayed.stroke)
            .ok_or(ReconcileError::NotFound(id))
    }

    pub fn contains(&self, id: StrokeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: StrokeId) -> Option<&Representation> {
        self.entries.get(&id).map(|displayed| &displayed.representation)
    }

    /// The confirmed stroke registered under `id`.
    pub fn stroke(&self, id: StrokeId) -> Option<&Stroke> {
        self.entries.get(&id).map(|displayed| &displayed.stroke)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered identities in ascending order.
    pub fn ids(&self) -> Vec<StrokeId> {
        let mut ids: Vec<StrokeId> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Find the stroke drawn under `point`.
    ///
    /// Dots win over polylines; among strokes of the same kind the most
    /// recently created (highest identity) wins.
    pub fn stroke_at(&self, point: Point) -> Option<StrokeId> {
        let topmost = |want_dot: bool| {
            self.entries
                .iter()
                .filter(|(_, displayed)| {
                    let rep = &displayed.representation;
                    rep.is_dot() == want_dot && rep.hit_test(point)
                })
                .map(|(id, _)| *id)
                .max()
        };
        topmost(true).or_else(|| topmost(false))
    }
}

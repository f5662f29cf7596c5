//! Stroke data model.
//!
//! A stroke is an ordered run of points with a colour and a thickness, drawn on
//! one board. Before the authority confirms it, a stroke exists only as a
//! [`StrokeDraft`]; once confirmed it becomes a [`Stroke`] carrying the identity
//! the authority assigned. Confirmed strokes are never mutated.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity assigned to a stroke by the authority. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrokeId(pub u64);

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Logical canvas a stroke belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(pub u64);

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "board {}", self.0)
    }
}

/// A named board known to the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
}

/// A point in board coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<Point> for kurbo::Point {
    fn from(p: Point) -> Self {
        kurbo::Point::new(p.x as f64, p.y as f64)
    }
}

impl From<kurbo::Point> for Point {
    fn from(p: kurbo::Point) -> Self {
        Point::new(p.x as f32, p.y as f32)
    }
}

/// Geometric flavour of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeShape {
    /// A single point, drawn as a filled circle.
    Dot,
    /// Two or more points, drawn as a polyline.
    Polyline,
}

/// Stroke content that has been submitted but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeDraft {
    pub board_id: BoardId,
    pub color: String,
    pub thickness: f32,
    pub points: Vec<Point>,
}

impl StrokeDraft {
    pub fn new(board_id: BoardId, color: impl Into<String>, thickness: f32, points: Vec<Point>) -> Self {
        Self {
            board_id,
            color: color.into(),
            thickness,
            points,
        }
    }

    pub fn shape(&self) -> StrokeShape {
        shape_of(&self.points)
    }

    /// Whether every coordinate and the thickness are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.thickness.is_finite() && self.points.iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }
}

/// A confirmed stroke as stored by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub board_id: BoardId,
    /// Identity of the participant that created the stroke.
    pub author: String,
    pub color: String,
    pub thickness: f32,
    pub points: Vec<Point>,
    /// Creation time, Unix milliseconds.
    pub timestamp: u64,
}

impl Stroke {
    /// Confirm a draft under the given identity.
    pub fn from_draft(id: StrokeId, draft: StrokeDraft, author: impl Into<String>, timestamp: u64) -> Self {
        Self {
            id,
            board_id: draft.board_id,
            author: author.into(),
            color: draft.color,
            thickness: draft.thickness,
            points: draft.points,
            timestamp,
        }
    }

    /// The content of this stroke without its identity, suitable for
    /// re-submitting it as a new stroke.
    pub fn draft(&self) -> StrokeDraft {
        StrokeDraft {
            board_id: self.board_id,
            color: self.color.clone(),
            thickness: self.thickness,
            points: self.points.clone(),
        }
    }

    /// Whether this stroke carries exactly the given content.
    pub fn has_content(&self, draft: &StrokeDraft) -> bool {
        self.board_id == draft.board_id
            && self.color == draft.color
            && self.thickness == draft.thickness
            && self.points == draft.points
    }

    /// Whether two strokes look the same, ignoring identity, author and time.
    pub fn same_content(&self, other: &Stroke) -> bool {
        self.has_content(&other.draft())
    }

    pub fn shape(&self) -> StrokeShape {
        shape_of(&self.points)
    }
}

fn shape_of(points: &[Point]) -> StrokeShape {
    if points.len() == 1 {
        StrokeShape::Dot
    } else {
        StrokeShape::Polyline
    }
}

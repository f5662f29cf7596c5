//! Text display of the board.

use std::collections::BTreeMap;
use strokeboard_core::{Stroke, StrokeDisplay, StrokeId};

/// Prints board changes and keeps what is shown for `list`.
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    shown: BTreeMap<StrokeId, Stroke>,
    quiet: bool,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop printing changes as they happen.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.shown.values()
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}

pub fn describe(stroke: &Stroke) -> String {
    let first = stroke.points.first().map(|p| format!(" at {:.1},{:.1}", p.x, p.y)).unwrap_or_default();
    let shape = match stroke.points.len() {
        1 => "dot".to_string(),
        n => format!("line of {} points", n),
    };
    let author: String = stroke.author.chars().take(8).collect();
    format!(
        "{} {}{} {} w{} by {}",
        stroke.id, shape, first, stroke.color, stroke.thickness, author
    )
}

impl StrokeDisplay for ConsoleDisplay {
    fn show(&mut self, id: StrokeId, stroke: &Stroke) {
        if !self.quiet {
            println!("+ {}", describe(stroke));
        }
        self.shown.insert(id, stroke.clone());
    }

    fn hide(&mut self, id: StrokeId) {
        if !self.quiet {
            println!("- {}", id);
        }
        self.shown.remove(&id);
    }

    fn draft_resolved(&mut self) {
        log::debug!("Draft confirmed");
    }
}

//! Command execution against a board session.

use crate::command::{Command, HELP};
use crate::console::{describe, ConsoleDisplay};
use strokeboard_core::{
    BoardSession, ClientConfig, ReconcileError, StrokeCapture, Transport,
};

/// Whether the loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App<T> {
    session: BoardSession<T, ConsoleDisplay>,
    capture: StrokeCapture,
    color: String,
    thickness: f32,
}

impl<T: Transport> App<T> {
    pub fn new(transport: T, config: &ClientConfig, display: ConsoleDisplay) -> Self {
        Self {
            session: BoardSession::new(transport, config.board_id, display),
            capture: StrokeCapture::new(config.min_point_spacing),
            color: config.default_color.clone(),
            thickness: config.default_thickness,
        }
    }

    pub fn session(&self) -> &BoardSession<T, ConsoleDisplay> {
        &self.session
    }

    pub fn poll(&mut self) -> usize {
        self.session.poll()
    }

    pub fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::Draw(points) => {
                let mut points = points.into_iter();
                if let Some(first) = points.next() {
                    self.capture.begin(first);
                    for point in points {
                        self.capture.extend(point);
                    }
                }
                if let Some(points) = self.capture.finish() {
                    report(self.session.draw(points, self.color.clone(), self.thickness));
                }
            }
            Command::Erase(point) => match self.session.erase_at(point) {
                Ok(Some(id)) => println!("deleting {}", id),
                Ok(None) => println!("nothing there"),
                Err(e) => report::<()>(Err(e)),
            },
            Command::Delete(id) => report(self.session.delete(id)),
            Command::Undo => report(self.session.undo()),
            Command::Redo => report(self.session.redo()),
            Command::Move(id, board) => self.session.move_stroke(id, board),
            Command::Clear => self.session.clear_board(),
            Command::NewBoard(name) => self.session.create_board(name),
            Command::Boards => {
                let current = self.session.engine().board_id();
                let mut any = false;
                for board in self.session.boards() {
                    any = true;
                    let marker = if board.id == current { "*" } else { " " };
                    println!("{} {} {}", marker, board.id.0, board.name);
                }
                if !any {
                    println!("(no boards)");
                }
            }
            Command::Color(color) => self.color = color,
            Command::Width(width) => self.thickness = width,
            Command::List => {
                let display = self.session.display();
                if display.is_empty() {
                    println!("(board is empty)");
                }
                for stroke in display.strokes() {
                    println!("  {}", describe(stroke));
                }
            }
            Command::Status => self.print_status(),
            Command::Help => println!("{}", HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn print_status(&self) {
        let engine = self.session.engine();
        println!("connection: {:?}", self.session.connection_state());
        println!("identity:   {}", self.session.identity().unwrap_or("(not subscribed)"));
        println!("board:      {} ({} strokes shown)", engine.board_id(), engine.registry().len());
        println!("pen:        {} w{}", self.color, self.thickness);
        let pending = if engine.pending().is_awaiting_creation() {
            "stroke awaiting confirmation"
        } else if engine.pending().is_awaiting_undo_redo() {
            "undo/redo awaiting confirmation"
        } else {
            "none"
        };
        println!("pending:    {}", pending);
        println!(
            "history:    {} undo, {} redo",
            engine.history().undo_len(),
            engine.history().redo_len()
        );
        let deletes = engine.outstanding_deletes();
        if !deletes.is_empty() {
            let ids: Vec<String> = deletes.iter().map(ToString::to_string).collect();
            println!("deleting:   {}", ids.join(" "));
        }
    }
}

fn report<V>(result: Result<V, ReconcileError>) {
    match result {
        Ok(_) => {}
        Err(e) if e.is_rejection() => println!("busy: {}", e),
        Err(e) => println!("rejected: {}", e),
    }
}

//! Console command parsing.

use anyhow::{anyhow, bail, Context, Result};
use strokeboard_core::{BoardId, Point, StrokeId};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Draw a stroke through the given points
    Draw(Vec<Point>),
    /// Delete whatever is drawn at a point
    Erase(Point),
    Delete(StrokeId),
    Undo,
    Redo,
    Move(StrokeId, BoardId),
    /// Delete every stroke on the current board
    Clear,
    NewBoard(String),
    Boards,
    Color(String),
    Width(f32),
    List,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  draw x,y [x,y ...]   draw a stroke (one point draws a dot)
  erase x,y            delete the stroke under a point
  delete <id>          delete a stroke by id
  undo | redo
  move <id> <board>    move a stroke to another board
  clear                delete every stroke on this board (not undoable)
  newboard <name>      create a board
  boards               list boards
  color <#rrggbb>      set the pen color
  width <n>            set the pen thickness
  list | status | help | quit";

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (name, args.as_slice()) {
        ("draw" | "d", []) => bail!("draw needs at least one point"),
        ("draw" | "d", points) => Command::Draw(points.iter().map(|p| parse_point(p)).collect::<Result<_>>()?),
        ("erase" | "e", [point]) => Command::Erase(parse_point(point)?),
        ("delete" | "rm", [id]) => Command::Delete(parse_stroke_id(id)?),
        ("undo" | "u", []) => Command::Undo,
        ("redo" | "r", []) => Command::Redo,
        ("move" | "mv", [id, board]) => Command::Move(
            parse_stroke_id(id)?,
            BoardId(board.parse().with_context(|| format!("bad board id: {}", board))?),
        ),
        ("clear", []) => Command::Clear,
        ("newboard", []) => bail!("newboard needs a name"),
        ("newboard", name) => Command::NewBoard(name.join(" ")),
        ("boards", []) => Command::Boards,
        ("color", [color]) => Command::Color(parse_color(color)?),
        ("width", [width]) => {
            let width: f32 = width.parse().with_context(|| format!("bad width: {}", width))?;
            if !(width > 0.0 && width.is_finite()) {
                bail!("width must be positive");
            }
            Command::Width(width)
        }
        ("list" | "ls", []) => Command::List,
        ("status", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        (name, _) => bail!("unknown command or wrong arguments: {} (try help)", name),
    };
    Ok(Some(command))
}

fn parse_point(text: &str) -> Result<Point> {
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| anyhow!("expected x,y but got {}", text))?;
    let x: f32 = x.trim().parse().with_context(|| format!("bad x in {}", text))?;
    let y: f32 = y.trim().parse().with_context(|| format!("bad y in {}", text))?;
    if !(x.is_finite() && y.is_finite()) {
        bail!("coordinates must be finite numbers: {}", text);
    }
    Ok(Point::new(x, y))
}

fn parse_stroke_id(text: &str) -> Result<StrokeId> {
    let digits = text.strip_prefix('#').unwrap_or(text);
    Ok(StrokeId(digits.parse().with_context(|| format!("bad stroke id: {}", text))?))
}

fn parse_color(text: &str) -> Result<String> {
    let hex = text.strip_prefix('#').unwrap_or(text);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("expected a color like #ff8800, got {}", text);
    }
    Ok(format!("#{}", hex.to_ascii_lowercase()))
}

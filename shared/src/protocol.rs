//! Client commands and server map frames
//!
//! Commands are short ASCII messages. Frames start with a one-byte tag; the
//! two map frames carry a header of little-endian int32 fields followed by
//! raw cell bytes, row-major.

use crate::grid::{Direction, FogMatrix, Grid, Position};
use serde::{Deserialize, Serialize};

pub const TAG_ADJACENT: u8 = b'A';
pub const TAG_FOGGED: u8 = b'B';
pub const TAG_EXIT_FOUND: u8 = b'M';
pub const TAG_SESSION_OVER: u8 = b'E';
pub const TAG_WON: u8 = b'W';
pub const TAG_LOST: u8 = b'L';

/// Upper bound on cells in a decoded fogged frame
pub const MAX_FRAME_CELLS: usize = 1 << 20;

const MAP_HEADER_LEN: usize = 16;
const WINDOW_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Quit,
}

impl Command {
    pub fn parse(message: &str) -> Option<Command> {
        match message {
            "W" => Some(Command::Move(Direction::Up)),
            "S" => Some(Command::Move(Direction::Down)),
            "A" => Some(Command::Move(Direction::Left)),
            "D" => Some(Command::Move(Direction::Right)),
            "exit" => Some(Command::Quit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Move(Direction::Up) => "W",
            Command::Move(Direction::Down) => "S",
            Command::Move(Direction::Left) => "A",
            Command::Move(Direction::Right) => "D",
            Command::Quit => "exit",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),
    #[error("frame dimensions out of range")]
    BadDimensions,
    #[error("frame header codec: {0}")]
    Codec(#[from] bincode::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct MapHeader {
    width: i32,
    height: i32,
    x: i32,
    y: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WindowHeader {
    rows: i32,
    cols: i32,
}

/// Messages sent from the server to one player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Clipped 3x3 window around the player
    Adjacent {
        width: usize,
        height: usize,
        position: Position,
        rows: usize,
        cols: usize,
        cells: Vec<u8>,
    },
    /// Whole grid with unseen cells masked
    Fogged {
        width: usize,
        height: usize,
        position: Position,
        cells: Vec<u8>,
    },
    /// The player stepped off the grid
    ExitFound,
    /// The player's game is over, a result follows
    SessionOver,
    Won,
    Lost,
}

impl Frame {
    pub fn adjacent(grid: &Grid, position: Position) -> Frame {
        let (rows, cols, cells) = grid.render_window(position);
        Frame::Adjacent {
            width: grid.width(),
            height: grid.height(),
            position,
            rows,
            cols,
            cells,
        }
    }

    pub fn fogged(grid: &Grid, position: Position, fog: &FogMatrix) -> Frame {
        Frame::Fogged {
            width: grid.width(),
            height: grid.height(),
            position,
            cells: grid.render_fogged(position, fog),
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Frame::Adjacent { .. } => TAG_ADJACENT,
            Frame::Fogged { .. } => TAG_FOGGED,
            Frame::ExitFound => TAG_EXIT_FOUND,
            Frame::SessionOver => TAG_SESSION_OVER,
            Frame::Won => TAG_WON,
            Frame::Lost => TAG_LOST,
        }
    }

    /// True for the frames that carry map cells
    pub fn is_view(&self) -> bool {
        matches!(self, Frame::Adjacent { .. } | Frame::Fogged { .. })
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let mut out = vec![self.tag()];
        match self {
            Frame::Adjacent {
                width,
                height,
                position,
                rows,
                cols,
                cells,
            } => {
                out.extend(bincode::serialize(&map_header(*width, *height, *position)?)?);
                out.extend(bincode::serialize(&WindowHeader {
                    rows: to_wire(*rows)?,
                    cols: to_wire(*cols)?,
                })?);
                out.extend_from_slice(cells);
            }
            Frame::Fogged {
                width,
                height,
                position,
                cells,
            } => {
                out.extend(bincode::serialize(&map_header(*width, *height, *position)?)?);
                out.extend_from_slice(cells);
            }
            Frame::ExitFound | Frame::SessionOver | Frame::Won | Frame::Lost => {}
        }
        Ok(out)
    }

    /// Decodes one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` while more bytes are needed, otherwise the frame and
    /// the number of bytes it used.
    pub fn decode(buf: &[u8]) -> Result<Option<(Frame, usize)>, FrameError> {
        let Some(&tag) = buf.first() else {
            return Ok(None);
        };

        match tag {
            TAG_EXIT_FOUND => Ok(Some((Frame::ExitFound, 1))),
            TAG_SESSION_OVER => Ok(Some((Frame::SessionOver, 1))),
            TAG_WON => Ok(Some((Frame::Won, 1))),
            TAG_LOST => Ok(Some((Frame::Lost, 1))),
            TAG_ADJACENT => {
                let body_start = 1 + MAP_HEADER_LEN + WINDOW_HEADER_LEN;
                if buf.len() < body_start {
                    return Ok(None);
                }
                let (width, height, position) = read_map_header(&buf[1..1 + MAP_HEADER_LEN])?;
                let window: WindowHeader =
                    bincode::deserialize(&buf[1 + MAP_HEADER_LEN..body_start])?;
                let rows = from_wire(window.rows)?;
                let cols = from_wire(window.cols)?;
                if rows > 3 || cols > 3 {
                    return Err(FrameError::BadDimensions);
                }

                let end = body_start + rows * cols;
                if buf.len() < end {
                    return Ok(None);
                }
                Ok(Some((
                    Frame::Adjacent {
                        width,
                        height,
                        position,
                        rows,
                        cols,
                        cells: buf[body_start..end].to_vec(),
                    },
                    end,
                )))
            }
            TAG_FOGGED => {
                let body_start = 1 + MAP_HEADER_LEN;
                if buf.len() < body_start {
                    return Ok(None);
                }
                let (width, height, position) = read_map_header(&buf[1..body_start])?;
                let cell_count = width
                    .checked_mul(height)
                    .filter(|count| *count <= MAX_FRAME_CELLS)
                    .ok_or(FrameError::BadDimensions)?;

                let end = body_start + cell_count;
                if buf.len() < end {
                    return Ok(None);
                }
                Ok(Some((
                    Frame::Fogged {
                        width,
                        height,
                        position,
                        cells: buf[body_start..end].to_vec(),
                    },
                    end,
                )))
            }
            other => Err(FrameError::UnknownTag(other)),
        }
    }

    /// Text rendering of a map frame, one line per row
    pub fn render_text(&self) -> Option<String> {
        let (cols, cells) = match self {
            Frame::Adjacent { cols, cells, .. } => (*cols, cells),
            Frame::Fogged { width, cells, .. } => (*width, cells),
            _ => return None,
        };

        let mut out = String::new();
        for row in cells.chunks(cols.max(1)) {
            out.push_str(&String::from_utf8_lossy(row));
            out.push('\n');
        }
        Some(out)
    }
}

fn to_wire(value: usize) -> Result<i32, FrameError> {
    i32::try_from(value).map_err(|_| FrameError::BadDimensions)
}

fn from_wire(value: i32) -> Result<usize, FrameError> {
    usize::try_from(value).map_err(|_| FrameError::BadDimensions)
}

fn map_header(width: usize, height: usize, position: Position) -> Result<MapHeader, FrameError> {
    Ok(MapHeader {
        width: to_wire(width)?,
        height: to_wire(height)?,
        x: to_wire(position.row)?,
        y: to_wire(position.col)?,
    })
}

fn read_map_header(bytes: &[u8]) -> Result<(usize, usize, Position), FrameError> {
    let header: MapHeader = bincode::deserialize(bytes)?;
    Ok((
        from_wire(header.width)?,
        from_wire(header.height)?,
        Position::new(from_wire(header.x)?, from_wire(header.y)?),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid() -> Grid {
        Grid::from_rows(&["#####", "# + #", "#   #", "#####"]).unwrap()
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("W"), Some(Command::Move(Direction::Up)));
        assert_eq!(Command::parse("A"), Some(Command::Move(Direction::Left)));
        assert_eq!(Command::parse("S"), Some(Command::Move(Direction::Down)));
        assert_eq!(Command::parse("D"), Some(Command::Move(Direction::Right)));
        assert_eq!(Command::parse("exit"), Some(Command::Quit));
        assert_eq!(Command::parse("w"), None);
        assert_eq!(Command::parse("WW"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::Quit.as_str(), "exit");
    }

    #[test]
    fn test_adjacent_frame_layout() {
        let frame = Frame::adjacent(&open_grid(), Position::new(2, 2));
        let bytes = frame.encode().unwrap();

        let mut expected = vec![b'A'];
        for value in [5i32, 4, 2, 2, 3, 3] {
            expected.extend_from_slice(&value.to_le_bytes());
        }
        expected.extend_from_slice(b" +  X ###");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_fogged_frame_layout() {
        let grid = open_grid();
        let mut fog = FogMatrix::new(grid.width(), grid.height());
        fog.reveal_around(Position::new(1, 1));

        let bytes = Frame::fogged(&grid, Position::new(1, 1), &fog).encode().unwrap();
        assert_eq!(bytes[0], b'B');
        assert_eq!(&bytes[1..5], &5i32.to_le_bytes());
        assert_eq!(&bytes[5..9], &4i32.to_le_bytes());
        assert_eq!(&bytes[9..13], &1i32.to_le_bytes());
        assert_eq!(&bytes[13..17], &1i32.to_le_bytes());
        assert_eq!(bytes.len(), 17 + 20);
        assert_eq!(&bytes[17..22], b"###??");
    }

    #[test]
    fn test_single_byte_frames() {
        assert_eq!(Frame::ExitFound.encode().unwrap(), b"M");
        assert_eq!(Frame::SessionOver.encode().unwrap(), b"E");
        assert_eq!(Frame::Won.encode().unwrap(), b"W");
        assert_eq!(Frame::Lost.encode().unwrap(), b"L");
    }

    #[test]
    fn test_decode_waits_for_complete_frame() {
        let bytes = Frame::adjacent(&open_grid(), Position::new(1, 1)).encode().unwrap();
        assert!(Frame::decode(&[]).unwrap().is_none());
        assert!(Frame::decode(&bytes[..10]).unwrap().is_none());
        assert!(Frame::decode(&bytes[..bytes.len() - 1]).unwrap().is_none());

        let (frame, used) = Frame::decode(&bytes).unwrap().unwrap();
        assert_eq!(used, bytes.len());
        assert!(frame.is_view());
    }

    #[test]
    fn test_decode_stream_of_frames() {
        let mut stream = Frame::adjacent(&open_grid(), Position::new(2, 3)).encode().unwrap();
        stream.extend(Frame::ExitFound.encode().unwrap());
        stream.extend(Frame::SessionOver.encode().unwrap());
        stream.extend(Frame::Won.encode().unwrap());

        let mut tags = Vec::new();
        let mut offset = 0;
        while let Some((frame, used)) = Frame::decode(&stream[offset..]).unwrap() {
            tags.push(frame.tag());
            offset += used;
        }
        assert_eq!(tags, b"AMEW".to_vec());
        assert_eq!(offset, stream.len());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Frame::decode(b"Z"),
            Err(FrameError::UnknownTag(b'Z'))
        ));

        let mut bad = vec![b'B'];
        for value in [-1i32, 4, 0, 0] {
            bad.extend_from_slice(&value.to_le_bytes());
        }
        assert!(matches!(Frame::decode(&bad), Err(FrameError::BadDimensions)));
    }

    #[test]
    fn test_render_text() {
        let frame = Frame::adjacent(&open_grid(), Position::new(0, 0));
        assert_eq!(frame.render_text().unwrap(), "X#\n# \n");
        assert!(Frame::Won.render_text().is_none());
    }
}

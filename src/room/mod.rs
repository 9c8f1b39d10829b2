//! Game rooms: authoritative board state for one match between two
//! seats, plus the registry that owns every live room.

pub mod board;
pub mod manager;
#[allow(clippy::module_inception)]
pub mod room;

pub use board::{Board, PlaceError, Stone, BOARD_COLS, BOARD_ROWS};
pub use manager::{RoomCreateError, RoomManager};
pub use room::{Room, RoomStatus};

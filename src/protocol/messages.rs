use serde::{Deserialize, Serialize};

/// `winner` value meaning the game is still running.
pub const NO_WINNER: u64 = 0;

/// Sentinel row/col used in the synthetic forfeit broadcast.
pub const INVALID_COORD: i32 = -1;

/// Requests a client may send on the hall channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "optype", rename_all = "snake_case")]
pub enum HallRequest {
    /// Enter the matchmaking queue for the caller's tier.
    MatchStart,
    /// Leave the matchmaking queue.
    MatchStop,
}

/// Replies and notifications sent on the hall channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "optype", rename_all = "snake_case")]
pub enum HallReply {
    /// Sent once after the hall connection is admitted (or rejected).
    HallReady {
        result: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Ack for a `match_start` request.
    MatchStart {
        result: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Ack for a `match_stop` request.
    MatchStop { result: bool },
    /// Pushed to both players once the matchmaker has paired them.
    MatchSuccess { result: bool },
}

impl HallReply {
    pub fn ready() -> Self {
        Self::HallReady {
            result: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::HallReady {
            result: false,
            reason: Some(reason.into()),
        }
    }
}

/// Requests a client may send on the room channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "optype", rename_all = "snake_case")]
pub enum RoomRequest {
    /// Place a stone at (row, col).
    PutChess {
        room_id: u64,
        uid: u64,
        row: i32,
        col: i32,
    },
    /// Send a chat line to the room.
    Chat { room_id: u64, message: String },
}

impl RoomRequest {
    /// The `room_id` the client claims to be talking to.
    pub fn room_id(&self) -> u64 {
        match self {
            Self::PutChess { room_id, .. } | Self::Chat { room_id, .. } => *room_id,
        }
    }

    pub fn optype(&self) -> &'static str {
        match self {
            Self::PutChess { .. } => "put_chess",
            Self::Chat { .. } => "chat",
        }
    }
}

/// Replies broadcast on the room channel. Both seats receive every reply
/// so the clients stay in lockstep with the authoritative board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "optype", rename_all = "snake_case")]
pub enum RoomReply {
    /// Sent once after the room connection is admitted (or rejected).
    RoomReady {
        result: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        uid: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        white_id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        black_id: Option<u64>,
    },
    /// Outcome of a move. `winner` is [`NO_WINNER`] while the game runs;
    /// the forfeit broadcast reuses this shape with `row = col = -1`.
    PutChess {
        result: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        room_id: u64,
        uid: u64,
        row: i32,
        col: i32,
        winner: u64,
    },
    /// Chat echo (or the rejection of a filtered message).
    Chat {
        result: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        room_id: u64,
        uid: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl RoomReply {
    pub fn ready(room_id: u64, uid: u64, white_id: u64, black_id: u64) -> Self {
        Self::RoomReady {
            result: true,
            reason: None,
            room_id: Some(room_id),
            uid: Some(uid),
            white_id: Some(white_id),
            black_id: Some(black_id),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::RoomReady {
            result: false,
            reason: Some(reason.into()),
            room_id: None,
            uid: None,
            white_id: None,
            black_id: None,
        }
    }
}

/// Catch-all error envelope echoing the offending `optype`, used when a
/// request cannot be decoded into one of the typed shapes above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub optype: String,
    pub result: bool,
    pub reason: String,
}

impl ErrorReply {
    pub fn unknown_optype(optype: impl Into<String>) -> Self {
        Self {
            optype: optype.into(),
            result: false,
            reason: "unknown request type".to_string(),
        }
    }
}

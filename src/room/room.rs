use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::database::UserDatabase;
use crate::presence::PresenceRegistry;
use crate::protocol::{encode, ErrorReply, RoomReply, RoomRequest, INVALID_COORD, NO_WINNER};

use super::board::{Board, PlaceError, Stone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// Stones are being placed.
    Playing,
    /// Somebody won (or forfeited); the room only drains exits now.
    Over,
}

struct GameState {
    board: Board,
    status: RoomStatus,
    player_count: u8,
    white_uid: u64,
    black_uid: u64,
}

/// One match between two seats. The server is authoritative: every move
/// is validated here, every reply is broadcast to both seats so the
/// clients stay in lockstep, and the match outcome is persisted exactly
/// once at the `Playing -> Over` transition.
pub struct Room {
    room_id: u64,
    database: Arc<dyn UserDatabase>,
    presence: Arc<PresenceRegistry>,
    banned_words: Arc<Vec<String>>,
    state: Mutex<GameState>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("room_id", &self.room_id).finish_non_exhaustive()
    }
}

impl Room {
    pub fn new(
        room_id: u64,
        database: Arc<dyn UserDatabase>,
        presence: Arc<PresenceRegistry>,
        banned_words: Arc<Vec<String>>,
    ) -> Self {
        tracing::debug!(room_id, "Room created");
        Self {
            room_id,
            database,
            presence,
            banned_words,
            state: Mutex::new(GameState {
                board: Board::new(),
                status: RoomStatus::Playing,
                player_count: 0,
                white_uid: 0,
                black_uid: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn room_id(&self) -> u64 {
        self.room_id
    }

    pub fn status(&self) -> RoomStatus {
        self.lock().status
    }

    pub fn player_count(&self) -> u8 {
        self.lock().player_count
    }

    /// Seat the white player. Called once by the matchmaker.
    pub fn add_white(&self, uid: u64) {
        let mut state = self.lock();
        state.white_uid = uid;
        state.player_count += 1;
    }

    /// Seat the black player. Called once by the matchmaker.
    pub fn add_black(&self, uid: u64) {
        let mut state = self.lock();
        state.black_uid = uid;
        state.player_count += 1;
    }

    pub fn white_uid(&self) -> u64 {
        self.lock().white_uid
    }

    pub fn black_uid(&self) -> u64 {
        self.lock().black_uid
    }

    fn seats(&self) -> (u64, u64) {
        let state = self.lock();
        (state.white_uid, state.black_uid)
    }

    /// Entry point for a raw in-room text frame. Frames that do not
    /// decode into a known request shape are answered with an error
    /// envelope echoing the offending `optype`.
    pub async fn handle_frame(&self, sender_uid: u64, text: &str) {
        match serde_json::from_str::<RoomRequest>(text) {
            Ok(request) => self.handle_request(sender_uid, &request).await,
            Err(_) => {
                let optype = serde_json::from_str::<serde_json::Value>(text)
                    .ok()
                    .and_then(|v| v.get("optype").and_then(|o| o.as_str()).map(String::from))
                    .unwrap_or_default();
                tracing::warn!(room_id = self.room_id, sender_uid, %optype, "Unknown room request");
                self.broadcast(&ErrorReply::unknown_optype(optype)).await;
            }
        }
    }

    /// Dispatch a decoded in-room request.
    pub async fn handle_request(&self, sender_uid: u64, request: &RoomRequest) {
        if request.room_id() != self.room_id {
            let reply = ErrorReply {
                optype: request.optype().to_string(),
                result: false,
                reason: "room id mismatch".to_string(),
            };
            self.broadcast(&reply).await;
            return;
        }

        match request {
            RoomRequest::PutChess { uid, row, col, .. } => {
                self.handle_chess(*uid, *row, *col).await;
            }
            RoomRequest::Chat { message, .. } => {
                self.handle_chat(sender_uid, message).await;
            }
        }
    }

    /// Place a stone for `uid` at (row, col), detecting disconnects,
    /// rejecting bad cells, and running win detection. The reply is
    /// broadcast to both seats.
    async fn handle_chess(&self, uid: u64, row: i32, col: i32) {
        let (white, black) = self.seats();
        // Presence is consulted before touching the board: a vanished
        // opponent forfeits the game to whoever is still seated.
        let white_present = self.presence.in_room(white);
        let black_present = self.presence.in_room(black);

        let mut ended: Option<(u64, u64)> = None;
        let reply = {
            let mut state = self.lock();
            if state.status == RoomStatus::Over {
                self.chess_reply(uid, row, col, false, NO_WINNER, Some("game is over"))
            } else if !white_present || !black_present {
                let winner = if white_present { white } else { black };
                let loser = if white_present { black } else { white };
                state.status = RoomStatus::Over;
                ended = Some((winner, loser));
                self.chess_reply(
                    uid,
                    INVALID_COORD,
                    INVALID_COORD,
                    true,
                    winner,
                    Some("opponent disconnected"),
                )
            } else {
                let stone = if uid == white { Stone::White } else { Stone::Black };
                match state.board.place(row, col, stone) {
                    Err(PlaceError::Occupied) => {
                        self.chess_reply(uid, row, col, false, NO_WINNER, Some("cell occupied"))
                    }
                    Err(PlaceError::OutOfRange) => {
                        self.chess_reply(uid, row, col, false, NO_WINNER, Some("cell out of range"))
                    }
                    Ok(()) => {
                        if state.board.wins_at(row, col) {
                            let winner = if stone == Stone::White { white } else { black };
                            let loser = if winner == white { black } else { white };
                            state.status = RoomStatus::Over;
                            ended = Some((winner, loser));
                            self.chess_reply(uid, row, col, true, winner, Some("five in a row"))
                        } else {
                            self.chess_reply(uid, row, col, true, NO_WINNER, None)
                        }
                    }
                }
            }
        };

        if let Some((winner, loser)) = ended {
            self.persist_outcome(winner, loser).await;
        }
        self.broadcast(&reply).await;
    }

    /// Echo a chat line to both seats unless it trips the banned-word
    /// predicate.
    async fn handle_chat(&self, sender_uid: u64, message: &str) {
        let banned = self.banned_words.iter().any(|word| message.contains(word));
        let reply = if banned {
            RoomReply::Chat {
                result: false,
                reason: Some("contains forbidden word".to_string()),
                room_id: self.room_id,
                uid: sender_uid,
                message: None,
            }
        } else {
            RoomReply::Chat {
                result: true,
                reason: None,
                room_id: self.room_id,
                uid: sender_uid,
                message: Some(message.to_string()),
            }
        };
        self.broadcast(&reply).await;
    }

    /// A player's room connection closed. Mid-game this forfeits the
    /// match to the remaining seat; afterwards it only drains the count.
    /// Returns the number of players still attached.
    pub async fn handle_exit(&self, uid: u64) -> u8 {
        let mut ended: Option<(u64, u64)> = None;
        let mut reply: Option<RoomReply> = None;
        let remaining = {
            let mut state = self.lock();
            if state.status == RoomStatus::Playing {
                let (winner, loser) = if uid == state.white_uid {
                    (state.black_uid, state.white_uid)
                } else {
                    (state.white_uid, state.black_uid)
                };
                state.status = RoomStatus::Over;
                ended = Some((winner, loser));
                reply = Some(self.chess_reply(
                    uid,
                    INVALID_COORD,
                    INVALID_COORD,
                    true,
                    winner,
                    Some("opponent disconnected"),
                ));
            }
            state.player_count = state.player_count.saturating_sub(1);
            state.player_count
        };

        if let Some((winner, loser)) = ended {
            self.persist_outcome(winner, loser).await;
        }
        if let Some(reply) = reply {
            self.broadcast(&reply).await;
        }
        remaining
    }

    fn chess_reply(
        &self,
        uid: u64,
        row: i32,
        col: i32,
        result: bool,
        winner: u64,
        reason: Option<&str>,
    ) -> RoomReply {
        RoomReply::PutChess {
            result,
            reason: reason.map(String::from),
            room_id: self.room_id,
            uid,
            row,
            col,
            winner,
        }
    }

    /// Record the match outcome. Runs exactly once per game because the
    /// `Playing -> Over` transition that gates it happens under the room
    /// lock. Store failures are transient: log and keep serving.
    async fn persist_outcome(&self, winner: u64, loser: u64) {
        if let Err(err) = self.database.record_win(winner).await {
            tracing::warn!(room_id = self.room_id, winner, error = %err, "Failed to record win");
        }
        if let Err(err) = self.database.record_loss(loser).await {
            tracing::warn!(room_id = self.room_id, loser, error = %err, "Failed to record loss");
        }
    }

    /// Send a reply to both seats. A seat with no live room connection
    /// is skipped; the forfeit paths take care of the game outcome.
    async fn broadcast<T: Serialize>(&self, reply: &T) {
        let frame = encode(reply);
        let (white, black) = self.seats();
        for uid in [white, black] {
            match self.presence.room_sender(uid) {
                Some(sender) => {
                    if sender.send(Arc::clone(&frame)).is_err() {
                        tracing::debug!(room_id = self.room_id, uid, "Room recipient closed");
                    }
                }
                None => {
                    tracing::debug!(room_id = self.room_id, uid, "Room recipient not connected");
                }
            }
        }
    }
}

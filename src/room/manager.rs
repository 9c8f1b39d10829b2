use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::database::UserDatabase;
use crate::presence::PresenceRegistry;

use super::room::Room;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomCreateError {
    /// The user left the hall between matching and room creation.
    #[error("user {0} is not in the hall")]
    NotInHall(u64),
}

#[derive(Default)]
struct RoomMaps {
    next_room_id: u64,
    rooms: HashMap<u64, Arc<Room>>,
    /// Reverse index: uid -> room_id, one entry per seat.
    users: HashMap<u64, u64>,
}

/// Registry owning every live room plus the uid -> room reverse index.
/// Rooms are identified by monotonically assigned ids; entities hold ids
/// back to the registry, never owning pointers.
pub struct RoomManager {
    database: Arc<dyn UserDatabase>,
    presence: Arc<PresenceRegistry>,
    banned_words: Arc<Vec<String>>,
    inner: Mutex<RoomMaps>,
}

impl RoomManager {
    pub fn new(
        database: Arc<dyn UserDatabase>,
        presence: Arc<PresenceRegistry>,
        banned_words: Vec<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            database,
            presence,
            banned_words: Arc::new(banned_words),
            inner: Mutex::new(RoomMaps {
                next_room_id: 1,
                rooms: HashMap::new(),
                users: HashMap::new(),
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RoomMaps> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pair two hall users into a fresh room: white seat for `white_uid`,
    /// black seat for `black_uid`. Fails when either user is no longer
    /// in the hall, which the matchmaker handles by re-enqueueing.
    pub fn create_room(
        &self,
        white_uid: u64,
        black_uid: u64,
    ) -> Result<Arc<Room>, RoomCreateError> {
        if !self.presence.in_hall(white_uid) {
            return Err(RoomCreateError::NotInHall(white_uid));
        }
        if !self.presence.in_hall(black_uid) {
            return Err(RoomCreateError::NotInHall(black_uid));
        }

        let mut maps = self.lock();
        let room_id = maps.next_room_id;
        maps.next_room_id += 1;

        let room = Arc::new(Room::new(
            room_id,
            Arc::clone(&self.database),
            Arc::clone(&self.presence),
            Arc::clone(&self.banned_words),
        ));
        room.add_white(white_uid);
        room.add_black(black_uid);

        maps.rooms.insert(room_id, Arc::clone(&room));
        maps.users.insert(white_uid, room_id);
        maps.users.insert(black_uid, room_id);

        tracing::info!(room_id, white_uid, black_uid, "Room created");
        Ok(room)
    }

    pub fn room_by_id(&self, room_id: u64) -> Option<Arc<Room>> {
        self.lock().rooms.get(&room_id).cloned()
    }

    pub fn room_by_user(&self, uid: u64) -> Option<Arc<Room>> {
        let maps = self.lock();
        maps.users
            .get(&uid)
            .and_then(|room_id| maps.rooms.get(room_id))
            .cloned()
    }

    /// Remove the forward mapping and both reverse mappings atomically.
    pub fn remove_room(&self, room_id: u64) {
        let Some(room) = self.room_by_id(room_id) else {
            return;
        };
        let white_uid = room.white_uid();
        let black_uid = room.black_uid();

        let mut maps = self.lock();
        maps.users.remove(&white_uid);
        maps.users.remove(&black_uid);
        maps.rooms.remove(&room_id);
        tracing::info!(room_id, "Room removed");
    }

    /// A user's room connection closed: run the exit protocol on their
    /// room and reap it once the last seat empties.
    pub async fn remove_user(&self, uid: u64) {
        let Some(room) = self.room_by_user(uid) else {
            return;
        };
        let remaining = room.handle_exit(uid).await;
        if remaining == 0 {
            self.remove_room(room.room_id());
        }
    }

    #[cfg(test)]
    fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryUserDatabase;
    use crate::presence::ClientSender;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        manager: Arc<RoomManager>,
        presence: Arc<PresenceRegistry>,
        white: u64,
        black: u64,
    }

    fn hall_conn(presence: &PresenceRegistry, uid: u64) -> UnboundedReceiver<Arc<str>> {
        let (tx, rx): (ClientSender, _) = tokio::sync::mpsc::unbounded_channel();
        presence.enter_hall(uid, tx).expect("hall admission");
        rx
    }

    async fn fixture() -> (Fixture, UnboundedReceiver<Arc<str>>, UnboundedReceiver<Arc<str>>) {
        let database = Arc::new(InMemoryUserDatabase::new());
        let white = database.register("white", "p").await.expect("register");
        let black = database.register("black", "p").await.expect("register");
        let presence = PresenceRegistry::new();
        let white_rx = hall_conn(&presence, white);
        let black_rx = hall_conn(&presence, black);

        let manager = RoomManager::new(
            Arc::clone(&database) as Arc<dyn UserDatabase>,
            Arc::clone(&presence),
            Vec::new(),
        );
        (
            Fixture {
                manager,
                presence,
                white,
                black,
            },
            white_rx,
            black_rx,
        )
    }

    #[tokio::test]
    async fn test_create_room_requires_both_users_in_hall() {
        let (fx, _w, _b) = fixture().await;
        fx.presence.exit_hall(fx.black);

        let err = fx
            .manager
            .create_room(fx.white, fx.black)
            .expect_err("creation must fail when a user left the hall");
        assert_eq!(err, RoomCreateError::NotInHall(fx.black));
        assert_eq!(fx.manager.room_count(), 0);
    }

    #[tokio::test]
    async fn test_create_room_seats_players_and_indexes_both_ways() {
        let (fx, _w, _b) = fixture().await;
        let room = fx
            .manager
            .create_room(fx.white, fx.black)
            .expect("both users are in the hall");

        assert_eq!(room.room_id(), 1);
        assert_eq!(room.white_uid(), fx.white);
        assert_eq!(room.black_uid(), fx.black);
        assert_eq!(room.player_count(), 2);

        let by_id = fx.manager.room_by_id(1).expect("forward lookup");
        assert_eq!(by_id.room_id(), 1);
        for uid in [fx.white, fx.black] {
            let by_user = fx.manager.room_by_user(uid).expect("reverse lookup");
            assert_eq!(by_user.room_id(), 1);
        }
    }

    #[tokio::test]
    async fn test_room_ids_are_monotonic() {
        let (fx, _w, _b) = fixture().await;
        let first = fx.manager.create_room(fx.white, fx.black).expect("create");
        assert_eq!(first.room_id(), 1);

        fx.manager.remove_room(1);
        // Re-admit the users, who remained in the hall maps throughout.
        let second = fx.manager.create_room(fx.white, fx.black).expect("create");
        assert_eq!(second.room_id(), 2, "ids are never reused");
    }

    #[tokio::test]
    async fn test_remove_room_clears_reverse_mappings() {
        let (fx, _w, _b) = fixture().await;
        fx.manager.create_room(fx.white, fx.black).expect("create");
        fx.manager.remove_room(1);

        assert!(fx.manager.room_by_id(1).is_none());
        assert!(fx.manager.room_by_user(fx.white).is_none());
        assert!(fx.manager.room_by_user(fx.black).is_none());
        // Removing again is harmless.
        fx.manager.remove_room(1);
    }

    #[tokio::test]
    async fn test_remove_user_reaps_the_room_after_the_last_exit() {
        let (fx, _w, _b) = fixture().await;
        fx.manager.create_room(fx.white, fx.black).expect("create");

        fx.manager.remove_user(fx.white).await;
        assert!(
            fx.manager.room_by_id(1).is_some(),
            "one seat remains, room survives"
        );

        fx.manager.remove_user(fx.black).await;
        assert!(fx.manager.room_by_id(1).is_none(), "empty room is reaped");
        assert_eq!(fx.manager.room_count(), 0);

        // Unknown users are a no-op.
        fx.manager.remove_user(999).await;
    }
}

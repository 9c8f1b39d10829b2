//! Presence registry: who is connected to the hall and who is inside a
//! game room.
//!
//! Both maps live under a single lock so the disjointness invariant (a
//! uid is in at most one location at any instant) can be enforced at the
//! admission point rather than assumed. Traffic here is admission events
//! only, never per-message work, so one mutex is plenty.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;

/// Handle used to push serialized text frames to a connected client.
/// The receiving half is drained by the connection's writer task.
pub type ClientSender = mpsc::UnboundedSender<Arc<str>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresenceError {
    /// The uid already has a live hall or room connection.
    #[error("user {0} is already connected")]
    AlreadyConnected(u64),
}

#[derive(Default)]
struct PresenceMaps {
    hall: HashMap<u64, ClientSender>,
    room: HashMap<u64, ClientSender>,
}

/// Process-wide `(uid -> connection)` registry, split by location.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: Mutex<PresenceMaps>,
}

impl PresenceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PresenceMaps> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a hall connection. Fails if the uid is present anywhere,
    /// which is how duplicate logins are detected.
    pub fn enter_hall(&self, uid: u64, sender: ClientSender) -> Result<(), PresenceError> {
        let mut maps = self.lock();
        if maps.hall.contains_key(&uid) || maps.room.contains_key(&uid) {
            return Err(PresenceError::AlreadyConnected(uid));
        }
        maps.hall.insert(uid, sender);
        Ok(())
    }

    /// Admit a room connection. Same duplicate rule as the hall.
    pub fn enter_room(&self, uid: u64, sender: ClientSender) -> Result<(), PresenceError> {
        let mut maps = self.lock();
        if maps.hall.contains_key(&uid) || maps.room.contains_key(&uid) {
            return Err(PresenceError::AlreadyConnected(uid));
        }
        maps.room.insert(uid, sender);
        Ok(())
    }

    /// Idempotent removal from the hall map.
    pub fn exit_hall(&self, uid: u64) {
        self.lock().hall.remove(&uid);
    }

    /// Idempotent removal from the room map.
    pub fn exit_room(&self, uid: u64) {
        self.lock().room.remove(&uid);
    }

    pub fn in_hall(&self, uid: u64) -> bool {
        self.lock().hall.contains_key(&uid)
    }

    pub fn in_room(&self, uid: u64) -> bool {
        self.lock().room.contains_key(&uid)
    }

    /// Connection handle for a hall user, if connected. The clone is
    /// taken under lock; callers send only after the lock is released.
    pub fn hall_sender(&self, uid: u64) -> Option<ClientSender> {
        self.lock().hall.get(&uid).cloned()
    }

    /// Connection handle for an in-room user, if connected.
    pub fn room_sender(&self, uid: u64) -> Option<ClientSender> {
        self.lock().room.get(&uid).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> (ClientSender, mpsc::UnboundedReceiver<Arc<str>>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_enter_and_exit_hall() {
        let presence = PresenceRegistry::new();
        let (tx, _rx) = sender();

        presence.enter_hall(1, tx).expect("first admission succeeds");
        assert!(presence.in_hall(1));
        assert!(!presence.in_room(1));
        assert!(presence.hall_sender(1).is_some());

        presence.exit_hall(1);
        assert!(!presence.in_hall(1));
        assert!(presence.hall_sender(1).is_none());
    }

    #[test]
    fn test_presence_is_disjoint_across_locations() {
        let presence = PresenceRegistry::new();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        presence.enter_hall(1, tx1).expect("hall admission");
        assert_eq!(
            presence.enter_room(1, tx2),
            Err(PresenceError::AlreadyConnected(1)),
            "a hall user cannot also enter a room"
        );

        presence.exit_hall(1);
        let (tx3, _rx3) = sender();
        presence.enter_room(1, tx3).expect("room admission after hall exit");
        assert!(presence.in_room(1));

        let (tx4, _rx4) = sender();
        assert_eq!(
            presence.enter_hall(1, tx4),
            Err(PresenceError::AlreadyConnected(1)),
            "a room user cannot also enter the hall"
        );
    }

    #[test]
    fn test_duplicate_hall_admission_is_rejected() {
        let presence = PresenceRegistry::new();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        presence.enter_hall(1, tx1).expect("first admission");
        assert_eq!(
            presence.enter_hall(1, tx2),
            Err(PresenceError::AlreadyConnected(1))
        );
        // The original connection is untouched by the rejected attempt.
        assert!(presence.hall_sender(1).is_some());
    }

    #[test]
    fn test_exits_are_idempotent() {
        let presence = PresenceRegistry::new();
        presence.exit_hall(42);
        presence.exit_room(42);

        let (tx, _rx) = sender();
        presence.enter_room(42, tx).expect("room admission");
        presence.exit_room(42);
        presence.exit_room(42);
        assert!(!presence.in_room(42));
    }

    #[test]
    fn test_sender_reaches_the_connection() {
        let presence = PresenceRegistry::new();
        let (tx, mut rx) = sender();
        presence.enter_hall(9, tx).expect("admission");

        let handle = presence.hall_sender(9).expect("sender present");
        handle.send(Arc::from("hello")).expect("receiver alive");
        assert_eq!(rx.try_recv().expect("frame queued").as_ref(), "hello");
    }
}

//! Tiered matchmaking.
//!
//! Three FIFO waiting queues keyed by score tier, each drained by its own
//! worker task. Producers push and signal; the worker sleeps until a
//! queue holds at least two waiters, then pops a pair and validates it.
//! Popping before validating keeps the queue lock out of connection
//! lookups and room creation; the price is the occasional re-enqueue
//! when a pop races a cancel, which punishes the canceller and not the
//! cancellee.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::Notify;

use crate::database::{DatabaseError, UserDatabase};
use crate::presence::PresenceRegistry;
use crate::protocol::{encode, HallReply};
use crate::room::RoomManager;

/// Scores below this play in Bronze.
pub const SILVER_THRESHOLD: u64 = 2000;
/// Scores below this (and at least [`SILVER_THRESHOLD`]) play in Silver;
/// everything above plays in Gold.
pub const GOLD_THRESHOLD: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Bronze = 0,
    Silver = 1,
    Gold = 2,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Bronze, Tier::Silver, Tier::Gold];

    pub fn for_score(score: u64) -> Self {
        if score < SILVER_THRESHOLD {
            Tier::Bronze
        } else if score < GOLD_THRESHOLD {
            Tier::Silver
        } else {
            Tier::Gold
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
        }
    }
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("unknown user {0}")]
    UnknownUser(u64),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// One FIFO waiting queue with condition-variable-style signalling.
struct MatchQueue {
    entries: Mutex<VecDeque<u64>>,
    ready: Notify,
}

impl MatchQueue {
    fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<u64>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn push(&self, uid: u64) {
        self.lock().push_back(uid);
        self.ready.notify_one();
    }

    fn pop(&self) -> Option<u64> {
        self.lock().pop_front()
    }

    /// Remove the first occurrence of `uid`. A miss is fine: the worker
    /// may have popped the entry already, or the user's tier shifted.
    fn remove(&self, uid: u64) -> bool {
        let mut entries = self.lock();
        match entries.iter().position(|&waiting| waiting == uid) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Sleep until the queue plausibly holds a pair. The condition is
    /// re-checked on every wake because cancellers may drain the queue
    /// between signal and wake; spurious wakeups are benign.
    async fn wait_until_pair(&self) {
        loop {
            if self.len() >= 2 {
                return;
            }
            self.ready.notified().await;
        }
    }
}

/// The matchmaker: three tier queues plus one pairing worker per tier.
pub struct Matchmaker {
    database: Arc<dyn UserDatabase>,
    presence: Arc<PresenceRegistry>,
    rooms: Arc<RoomManager>,
    queues: [MatchQueue; 3],
}

impl Matchmaker {
    pub fn new(
        database: Arc<dyn UserDatabase>,
        presence: Arc<PresenceRegistry>,
        rooms: Arc<RoomManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            database,
            presence,
            rooms,
            queues: [MatchQueue::new(), MatchQueue::new(), MatchQueue::new()],
        })
    }

    fn queue(&self, tier: Tier) -> &MatchQueue {
        &self.queues[tier as usize]
    }

    /// Drain one tier's queue forever. The server spawns one of these
    /// per tier at startup; the loop never returns.
    pub async fn run_worker(&self, tier: Tier) {
        tracing::info!(tier = tier.as_str(), "Matchmaking worker started");
        loop {
            self.queue(tier).wait_until_pair().await;
            self.match_pair(tier).await;
        }
    }

    /// One pairing attempt: pop two waiters, validate both are still in
    /// the hall, create their room, and notify them. Every failure path
    /// re-enqueues the survivors and lets the loop retry.
    async fn match_pair(&self, tier: Tier) {
        let queue = self.queue(tier);
        let Some(first) = queue.pop() else {
            return;
        };
        let Some(second) = queue.pop() else {
            self.requeue(first).await;
            return;
        };

        let Some(first_conn) = self.presence.hall_sender(first) else {
            tracing::debug!(uid = first, "Popped user left the hall");
            self.requeue(second).await;
            return;
        };
        let Some(second_conn) = self.presence.hall_sender(second) else {
            tracing::debug!(uid = second, "Popped user left the hall");
            self.requeue(first).await;
            return;
        };

        let room = match self.rooms.create_room(first, second) {
            Ok(room) => room,
            Err(err) => {
                tracing::debug!(error = %err, "Room creation failed, re-enqueueing pair");
                self.requeue(first).await;
                self.requeue(second).await;
                return;
            }
        };

        let frame = encode(&HallReply::MatchSuccess { result: true });
        for (uid, conn) in [(first, &first_conn), (second, &second_conn)] {
            if conn.send(Arc::clone(&frame)).is_err() {
                tracing::warn!(uid, "Matched user's hall connection closed before notify");
            }
        }
        tracing::info!(
            room_id = room.room_id(),
            white_uid = first,
            black_uid = second,
            tier = tier.as_str(),
            "Players matched"
        );
    }

    async fn requeue(&self, uid: u64) {
        if let Err(err) = self.add(uid).await {
            tracing::warn!(uid, error = %err, "Failed to re-enqueue user after broken pairing");
        }
    }

    /// Enqueue `uid` in the tier matching their current score.
    pub async fn add(&self, uid: u64) -> Result<Tier, MatchError> {
        let tier = self.tier_of(uid).await?;
        self.queue(tier).push(uid);
        tracing::debug!(uid, tier = tier.as_str(), "User enqueued for matching");
        Ok(tier)
    }

    /// Cancel a pending match request. A missing entry counts as success;
    /// the worker validates hall presence anyway.
    pub async fn del(&self, uid: u64) -> Result<(), MatchError> {
        let tier = self.tier_of(uid).await?;
        let removed = self.queue(tier).remove(uid);
        tracing::debug!(uid, tier = tier.as_str(), removed, "Match request cancelled");
        Ok(())
    }

    async fn tier_of(&self, uid: u64) -> Result<Tier, MatchError> {
        let profile = self
            .database
            .lookup(uid)
            .await?
            .ok_or(MatchError::UnknownUser(uid))?;
        Ok(Tier::for_score(profile.score))
    }

    #[cfg(test)]
    fn queue_len(&self, tier: Tier) -> usize {
        self.queue(tier).len()
    }
}

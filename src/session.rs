//! Session registry with per-session TTL timers.
//!
//! A session is created at login and normally expires after a quiet
//! period; entering a game room suspends expiry entirely and leaving
//! re-arms it. Expiry is driven by spawned sleep tasks that re-acquire
//! the registry lock before acting, so a timer can never remove a
//! session whose lifetime was extended after the timer was armed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default quiet period before a logged-in session is dropped.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unlogin,
    Login,
}

/// Session lifetime policy passed to [`SessionRegistry::set_expire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Never auto-remove (a player inside a game room).
    Forever,
    /// Remove after the given quiet period.
    After(Duration),
}

/// Snapshot of a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub ssid: u64,
    pub uid: u64,
    pub status: SessionStatus,
}

impl Session {
    pub fn is_login(&self) -> bool {
        self.status == SessionStatus::Login
    }
}

struct SessionEntry {
    session: Session,
    /// Bumped on every `set_expire`; a pending timer only fires if its
    /// epoch still matches, which neutralises the cancel/fire race.
    epoch: u64,
    timer: Option<JoinHandle<()>>,
}

impl Drop for SessionEntry {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct SessionMap {
    next_ssid: u64,
    entries: HashMap<u64, SessionEntry>,
}

/// Process-wide registry of `(ssid -> session)` plus one expiry timer
/// per session.
pub struct SessionRegistry {
    inner: Mutex<SessionMap>,
    /// Handed to timer tasks so a late firing after shutdown is a no-op
    /// instead of keeping the registry alive.
    weak_self: Weak<SessionRegistry>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            inner: Mutex::new(SessionMap {
                next_ssid: 1,
                entries: HashMap::new(),
            }),
            weak_self: weak_self.clone(),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a session for `uid` with the next ssid. No timer is armed
    /// yet; callers follow up with [`set_expire`](Self::set_expire).
    pub fn create(&self, uid: u64, status: SessionStatus) -> Session {
        let mut map = self.lock();
        let ssid = map.next_ssid;
        map.next_ssid += 1;

        let session = Session { ssid, uid, status };
        map.entries.insert(
            ssid,
            SessionEntry {
                session: session.clone(),
                epoch: 0,
                timer: None,
            },
        );
        tracing::debug!(ssid, uid, "Session created");
        session
    }

    pub fn get(&self, ssid: u64) -> Option<Session> {
        self.lock().entries.get(&ssid).map(|e| e.session.clone())
    }

    /// Idempotent erase. Any pending timer is aborted.
    pub fn remove(&self, ssid: u64) {
        let removed = self.lock().entries.remove(&ssid);
        if removed.is_some() {
            tracing::debug!(ssid, "Session removed");
        }
    }

    /// Arm, re-arm, or cancel the expiry timer for `ssid`.
    ///
    /// After this returns, either the session is scheduled for removal
    /// exactly `duration` from now and no earlier, or with
    /// [`Expiry::Forever`] it will not be auto-removed. The epoch bump
    /// and the timer's own re-check both happen under the registry lock,
    /// so an already-sleeping timer that loses the race wakes up, sees a
    /// stale epoch, and backs off without touching the session.
    pub fn set_expire(&self, ssid: u64, expiry: Expiry) {
        let mut map = self.lock();
        let Some(entry) = map.entries.get_mut(&ssid) else {
            return;
        };

        entry.epoch += 1;
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }

        if let Expiry::After(duration) = expiry {
            let epoch = entry.epoch;
            let registry = self.weak_self.clone();
            entry.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                if let Some(registry) = registry.upgrade() {
                    registry.expire(ssid, epoch);
                }
            }));
        }
    }

    /// Timer callback: remove the session only if no newer `set_expire`
    /// superseded the timer that fired.
    fn expire(&self, ssid: u64, epoch: u64) {
        let mut map = self.lock();
        let current = map.entries.get(&ssid).is_some_and(|entry| entry.epoch == epoch);
        if current {
            map.entries.remove(&ssid);
            tracing::info!(ssid, "Session expired");
        }
    }

    #[cfg(test)]
    fn live_count(&self) -> usize {
        self.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ssids_are_monotonic_and_unique() {
        let registry = SessionRegistry::new();
        let first = registry.create(10, SessionStatus::Login);
        let second = registry.create(11, SessionStatus::Login);
        let third = registry.create(10, SessionStatus::Unlogin);

        assert_eq!(first.ssid, 1);
        assert_eq!(second.ssid, 2);
        assert_eq!(third.ssid, 3);
        assert_eq!(registry.live_count(), 3);

        assert!(first.is_login());
        assert!(
            !third.is_login(),
            "a pre-auth session must not count as logged in"
        );
    }

    #[tokio::test]
    async fn test_get_and_remove_are_idempotent() {
        let registry = SessionRegistry::new();
        let session = registry.create(7, SessionStatus::Login);

        assert_eq!(registry.get(session.ssid), Some(session.clone()));
        registry.remove(session.ssid);
        assert_eq!(registry.get(session.ssid), None);
        registry.remove(session.ssid);
        assert_eq!(registry.get(session.ssid), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finite_expiry_removes_session() {
        let registry = SessionRegistry::new();
        let session = registry.create(1, SessionStatus::Login);
        registry.set_expire(session.ssid, Expiry::After(Duration::from_millis(100)));

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert!(registry.get(session.ssid).is_some(), "not yet expired");

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(registry.get(session.ssid).is_none(), "expired at 100ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_forever_cancels_pending_timer() {
        let registry = SessionRegistry::new();
        let session = registry.create(1, SessionStatus::Login);
        registry.set_expire(session.ssid, Expiry::After(Duration::from_millis(100)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.set_expire(session.ssid, Expiry::Forever);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(
            registry.get(session.ssid).is_some(),
            "session with Forever expiry must survive"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_restarts_the_clock() {
        let registry = SessionRegistry::new();
        let session = registry.create(1, SessionStatus::Login);
        registry.set_expire(session.ssid, Expiry::After(Duration::from_millis(100)));

        tokio::time::sleep(Duration::from_millis(80)).await;
        registry.set_expire(session.ssid, Expiry::After(Duration::from_millis(100)));

        // 150ms after creation: the original deadline has passed but the
        // re-armed timer has 30ms to go.
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(registry.get(session.ssid).is_some(), "old deadline is dead");

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(registry.get(session.ssid).is_none(), "new deadline fired");
    }

    #[tokio::test(start_paused = true)]
    async fn test_forever_on_session_without_timer_is_noop() {
        let registry = SessionRegistry::new();
        let session = registry.create(1, SessionStatus::Login);
        registry.set_expire(session.ssid, Expiry::Forever);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(registry.get(session.ssid).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_race_never_loses_an_extended_session() {
        // Cancel repeatedly with the timer one tick away from its
        // deadline; whatever the interleaving, a session whose last
        // `set_expire` was Forever must still be retrievable afterwards.
        let registry = SessionRegistry::new();
        let session = registry.create(1, SessionStatus::Login);

        for _ in 0..50 {
            registry.set_expire(session.ssid, Expiry::After(Duration::from_millis(2)));
            tokio::time::sleep(Duration::from_millis(1)).await;
            registry.set_expire(session.ssid, Expiry::Forever);
        }

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(
            registry.get(session.ssid).is_some(),
            "session must survive any cancel/fire interleaving that ends on Forever"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_cannot_remove_recreated_epoch() {
        let registry = SessionRegistry::new();
        let session = registry.create(1, SessionStatus::Login);

        registry.set_expire(session.ssid, Expiry::After(Duration::from_millis(100)));
        registry.set_expire(session.ssid, Expiry::After(Duration::from_secs(300)));

        // Past the first (aborted) deadline, well before the second.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(registry.get(session.ssid).is_some());
    }
}

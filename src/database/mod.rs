use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Score granted to every freshly registered user.
pub const INITIAL_SCORE: u64 = 1000;

/// Score delta applied on a win (added) and on a loss (subtracted,
/// saturating at zero).
pub const SCORE_DELTA: u64 = 30;

/// A user's public profile as stored in the user table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub score: u64,
    pub total_count: u32,
    pub win_count: u32,
}

/// Errors surfaced by the user store adapter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("username already taken")]
    UsernameTaken,
    #[error("username and password must be non-empty")]
    EmptyCredentials,
    #[error("invalid username or password")]
    AuthFailed,
    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

/// User store abstraction.
///
/// The relational backend is an external collaborator; this trait is the
/// seam the rest of the server talks through. All calls may block on I/O
/// in a real backend, so everything is async.
#[async_trait]
pub trait UserDatabase: Send + Sync {
    /// Insert a new user with the default score. Fails with
    /// [`DatabaseError::UsernameTaken`] on a name collision and
    /// [`DatabaseError::EmptyCredentials`] when either field is blank.
    async fn register(&self, username: &str, password: &str) -> Result<u64, DatabaseError>;

    /// Credential check against the stored one-way hash. Returns the full
    /// profile on success.
    async fn login(&self, username: &str, password: &str) -> Result<UserProfile, DatabaseError>;

    /// Profile lookup by id.
    async fn lookup(&self, uid: u64) -> Result<Option<UserProfile>, DatabaseError>;

    /// Match won: score +30, total +1, wins +1.
    async fn record_win(&self, uid: u64) -> Result<(), DatabaseError>;

    /// Match lost: score -30 saturating at 0, total +1.
    async fn record_loss(&self, uid: u64) -> Result<(), DatabaseError>;
}

/// One-way password transform. Login applies the same transform and
/// compares hashes; the cleartext is never stored.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// User store configuration. In-memory only for gobang-arena-server.
#[derive(Debug, Clone, Default)]
pub enum DatabaseConfig {
    #[default]
    InMemory,
}

/// Create a user store instance based on configuration.
pub fn create_database(config: DatabaseConfig) -> Arc<dyn UserDatabase> {
    match config {
        DatabaseConfig::InMemory => Arc::new(InMemoryUserDatabase::new()),
    }
}

#[derive(Debug, Clone)]
struct UserRecord {
    profile: UserProfile,
    password_hash: String,
}

#[derive(Debug, Default)]
struct UserMaps {
    next_uid: u64,
    users: HashMap<u64, UserRecord>,
    by_name: HashMap<String, u64>,
}

/// Simple in-memory user table for testing and single-instance
/// deployments. Both indexes live behind one lock so registration is
/// atomic: no task can observe a name reservation without its record.
pub struct InMemoryUserDatabase {
    inner: RwLock<UserMaps>,
}

impl InMemoryUserDatabase {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(UserMaps {
                next_uid: 1,
                users: HashMap::new(),
                by_name: HashMap::new(),
            }),
        }
    }
}

impl Default for InMemoryUserDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDatabase for InMemoryUserDatabase {
    async fn register(&self, username: &str, password: &str) -> Result<u64, DatabaseError> {
        if username.is_empty() || password.is_empty() {
            return Err(DatabaseError::EmptyCredentials);
        }

        let mut maps = self.inner.write().await;
        if maps.by_name.contains_key(username) {
            return Err(DatabaseError::UsernameTaken);
        }

        let uid = maps.next_uid;
        maps.next_uid += 1;

        let record = UserRecord {
            profile: UserProfile {
                id: uid,
                username: username.to_string(),
                score: INITIAL_SCORE,
                total_count: 0,
                win_count: 0,
            },
            password_hash: hash_password(password),
        };
        maps.users.insert(uid, record);
        maps.by_name.insert(username.to_string(), uid);

        tracing::debug!(uid, username, "User registered");
        Ok(uid)
    }

    async fn login(&self, username: &str, password: &str) -> Result<UserProfile, DatabaseError> {
        let maps = self.inner.read().await;
        let record = maps
            .by_name
            .get(username)
            .and_then(|uid| maps.users.get(uid))
            .ok_or(DatabaseError::AuthFailed)?;

        if record.password_hash != hash_password(password) {
            return Err(DatabaseError::AuthFailed);
        }
        Ok(record.profile.clone())
    }

    async fn lookup(&self, uid: u64) -> Result<Option<UserProfile>, DatabaseError> {
        let maps = self.inner.read().await;
        Ok(maps.users.get(&uid).map(|record| record.profile.clone()))
    }

    async fn record_win(&self, uid: u64) -> Result<(), DatabaseError> {
        let mut maps = self.inner.write().await;
        match maps.users.get_mut(&uid) {
            Some(record) => {
                record.profile.score += SCORE_DELTA;
                record.profile.total_count += 1;
                record.profile.win_count += 1;
                Ok(())
            }
            None => Err(DatabaseError::Unavailable(format!("unknown user {uid}"))),
        }
    }

    async fn record_loss(&self, uid: u64) -> Result<(), DatabaseError> {
        let mut maps = self.inner.write().await;
        match maps.users.get_mut(&uid) {
            Some(record) => {
                record.profile.score = record.profile.score.saturating_sub(SCORE_DELTA);
                record.profile.total_count += 1;
                Ok(())
            }
            None => Err(DatabaseError::Unavailable(format!("unknown user {uid}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_register_then_login_returns_default_profile() {
        let db = InMemoryUserDatabase::new();
        let uid = db.register("alice", "secret").await.expect("register");
        assert_eq!(uid, 1);

        let profile = db.login("alice", "secret").await.expect("login");
        assert_eq!(profile.id, uid);
        assert_eq!(profile.score, INITIAL_SCORE);
        assert_eq!(profile.total_count, 0);
        assert_eq!(profile.win_count, 0);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_username() {
        let db = InMemoryUserDatabase::new();
        db.register("alice", "secret").await.expect("first register");
        let err = db
            .register("alice", "other")
            .await
            .expect_err("duplicate username must be rejected");
        assert_eq!(err, DatabaseError::UsernameTaken);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_credentials() {
        let db = InMemoryUserDatabase::new();
        assert_eq!(
            db.register("", "p").await.expect_err("empty username"),
            DatabaseError::EmptyCredentials
        );
        assert_eq!(
            db.register("u", "").await.expect_err("empty password"),
            DatabaseError::EmptyCredentials
        );
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password_and_unknown_user() {
        let db = InMemoryUserDatabase::new();
        db.register("alice", "secret").await.expect("register");

        assert_eq!(
            db.login("alice", "wrong").await.expect_err("wrong password"),
            DatabaseError::AuthFailed
        );
        assert_eq!(
            db.login("bob", "secret").await.expect_err("unknown user"),
            DatabaseError::AuthFailed
        );
    }

    #[tokio::test]
    async fn test_password_is_stored_hashed() {
        let db = InMemoryUserDatabase::new();
        db.register("alice", "secret").await.expect("register");

        let maps = db.inner.read().await;
        let record = maps.users.get(&1).expect("record exists");
        assert_ne!(record.password_hash, "secret");
        assert_eq!(record.password_hash, hash_password("secret"));
    }

    #[tokio::test]
    async fn test_win_and_loss_update_score_and_counters() {
        let db = InMemoryUserDatabase::new();
        let winner = db.register("winner", "p").await.expect("register");
        let loser = db.register("loser", "p").await.expect("register");

        db.record_win(winner).await.expect("record win");
        db.record_loss(loser).await.expect("record loss");

        let w = db.lookup(winner).await.expect("lookup").expect("exists");
        assert_eq!(
            (w.score, w.total_count, w.win_count),
            (INITIAL_SCORE + SCORE_DELTA, 1, 1)
        );

        let l = db.lookup(loser).await.expect("lookup").expect("exists");
        assert_eq!(
            (l.score, l.total_count, l.win_count),
            (INITIAL_SCORE - SCORE_DELTA, 1, 0)
        );
    }

    #[tokio::test]
    async fn test_loss_saturates_at_zero_score() {
        let db = InMemoryUserDatabase::new();
        let uid = db.register("unlucky", "p").await.expect("register");

        // 1000 / 30 = 33 full losses, the 34th reaches 10 -> 0, then stay.
        for _ in 0..40 {
            db.record_loss(uid).await.expect("record loss");
        }
        let profile = db.lookup(uid).await.expect("lookup").expect("exists");
        assert_eq!(profile.score, 0, "score must clamp at zero");
        assert_eq!(profile.total_count, 40);
    }

    #[tokio::test]
    async fn test_lookup_unknown_uid_is_none() {
        let db = InMemoryUserDatabase::new();
        assert!(db.lookup(99).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_registration_assigns_unique_ids() {
        let db = Arc::new(InMemoryUserDatabase::new());
        let task_count = 32;
        let barrier = Arc::new(tokio::sync::Barrier::new(task_count));

        let mut handles = Vec::with_capacity(task_count);
        for i in 0..task_count {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                db.register(&format!("user{i}"), "p").await
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            let uid = handle
                .await
                .expect("task should not panic")
                .expect("registration should succeed");
            ids.insert(uid);
        }
        assert_eq!(ids.len(), task_count, "all uids must be distinct");
    }
}

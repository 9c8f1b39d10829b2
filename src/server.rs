//! Server orchestration: one [`GobangServer`] owns the user store, the
//! five registries, and the matchmaker workers, and is shared with every
//! connection handler through axum state.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::database::{create_database, DatabaseConfig, UserDatabase};
use crate::matcher::{Matchmaker, Tier};
use crate::presence::PresenceRegistry;
use crate::room::RoomManager;
use crate::session::{Expiry, SessionRegistry};

pub struct GobangServer {
    config: Config,
    database: Arc<dyn UserDatabase>,
    sessions: Arc<SessionRegistry>,
    presence: Arc<PresenceRegistry>,
    rooms: Arc<RoomManager>,
    matcher: Arc<Matchmaker>,
}

impl GobangServer {
    /// Assemble the server and spawn the matchmaking workers. Must run
    /// inside a tokio runtime.
    pub fn new(config: Config) -> Arc<Self> {
        Self::with_database(config, create_database(DatabaseConfig::InMemory))
    }

    /// Same as [`new`](Self::new) but with a caller-provided user store,
    /// which tests use to pre-seed accounts.
    pub fn with_database(config: Config, database: Arc<dyn UserDatabase>) -> Arc<Self> {
        let sessions = SessionRegistry::new();
        let presence = PresenceRegistry::new();
        let rooms = RoomManager::new(
            Arc::clone(&database),
            Arc::clone(&presence),
            config.server.banned_words.clone(),
        );
        let matcher = Matchmaker::new(
            Arc::clone(&database),
            Arc::clone(&presence),
            Arc::clone(&rooms),
        );

        for tier in Tier::ALL {
            let matcher = Arc::clone(&matcher);
            tokio::spawn(async move {
                matcher.run_worker(tier).await;
            });
        }

        Arc::new(Self {
            config,
            database,
            sessions,
            presence,
            rooms,
            matcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Arc<dyn UserDatabase> {
        &self.database
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn matcher(&self) -> &Matchmaker {
        &self.matcher
    }

    /// The finite TTL applied to sessions outside a game room.
    pub fn session_ttl(&self) -> Expiry {
        Expiry::After(Duration::from_secs(self.config.server.session_timeout_secs))
    }
}

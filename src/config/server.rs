//! Server behavior configuration types.

use super::defaults::{
    default_banned_words, default_cors_origins, default_session_timeout_secs, default_web_root,
};
use serde::{Deserialize, Serialize};

/// Configuration for session lifetimes, the static web root, and chat
/// filtering.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Directory served for plain GET requests (login page, assets)
    #[serde(default = "default_web_root")]
    pub web_root: String,
    /// Quiet period before an idle session is dropped (seconds)
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    /// Substrings that make a chat message undeliverable
    #[serde(default = "default_banned_words")]
    pub banned_words: Vec<String>,
    /// Comma-separated allowed CORS origins, or "*" for permissive
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            web_root: default_web_root(),
            session_timeout_secs: default_session_timeout_secs(),
            banned_words: default_banned_words(),
            cors_origins: default_cors_origins(),
        }
    }
}

//! Default value functions referenced by the `serde(default = ...)`
//! attributes across the configuration types.

use super::logging::LogFormat;

pub fn default_port() -> u16 {
    3489
}

pub fn default_web_root() -> String {
    "wwwroot".to_string()
}

pub fn default_session_timeout_secs() -> u64 {
    crate::session::SESSION_TIMEOUT.as_secs()
}

pub fn default_banned_words() -> Vec<String> {
    vec!["垃圾".to_string()]
}

pub fn default_cors_origins() -> String {
    "*".to_string()
}

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub fn default_enable_file_logging() -> bool {
    false
}

pub fn default_log_format() -> LogFormat {
    LogFormat::Text
}

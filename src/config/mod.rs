//! Configuration module.
//!
//! Settings come from `config.json` (or `GOBANG_CONFIG_PATH`) merged
//! over compiled defaults, with `GOBANG__*` environment variable
//! overrides using `__` as the nested separator.

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod server;
pub mod types;

pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use server::ServerConfig;
pub use types::{validate, Config};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 3489);
        assert_eq!(config.server.web_root, "wwwroot");
        assert_eq!(config.server.session_timeout_secs, 30);
        assert_eq!(config.server.banned_words, vec!["垃圾".to_string()]);
        assert_eq!(config.server.cors_origins, "*");

        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.filename, "server.log");
        assert_eq!(config.logging.rotation, "daily");
        assert!(!config.logging.enable_file_logging);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).expect("serialize");
        let deserialized: Config = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(config.port, deserialized.port);
        assert_eq!(config.server.web_root, deserialized.server.web_root);
        assert_eq!(
            config.server.session_timeout_secs,
            deserialized.server.session_timeout_secs
        );
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"port": 9000, "server": {"session_timeout_secs": 60}}"#)
                .expect("partial config deserializes");
        assert_eq!(config.port, 9000);
        assert_eq!(config.server.session_timeout_secs, 60);
        assert_eq!(config.server.web_root, "wwwroot");
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let mut config = Config::default();
        assert!(validate(&config).is_ok());

        config.server.session_timeout_secs = 0;
        assert!(validate(&config).is_err());

        config = Config::default();
        config.server.web_root = "  ".to_string();
        assert!(validate(&config).is_err());
    }
}

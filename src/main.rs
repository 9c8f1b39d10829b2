#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use gobang_arena_server::config;
use gobang_arena_server::logging;
use gobang_arena_server::websocket;
use std::net::SocketAddr;

/// Gobang Arena -- authoritative five-in-a-row game server
#[derive(Parser, Debug)]
#[command(name = "gobang-arena-server")]
#[command(about = "An authoritative real-time Gobang server with tiered matchmaking")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json if present; otherwise use
    // code defaults.
    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate(&cfg);
    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Web root: {}", cfg.server.web_root);
                println!("  Session timeout: {}s", cfg.server.session_timeout_secs);
                println!("  Banned chat words: {}", cfg.server.banned_words.len());
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }
    validation_result?;

    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    websocket::run_server(addr, cfg).await
}

#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines
)]

//! # Gobang Arena Server
//!
//! An authoritative server for real-time online Gobang (five-in-a-row).
//!
//! Players authenticate over HTTP, wait in a hall, are paired by score
//! tier, and play on a 15x15 board over a WebSocket connection. The server
//! owns move validation, win detection, scoring, and lifecycle transitions.

/// Server configuration and environment variables
pub mod config;

/// User store adapter (in-memory backed)
pub mod database;

/// Structured logging configuration
pub mod logging;

/// Tiered matchmaking queues and workers
pub mod matcher;

/// Hall/room presence registry
pub mod presence;

/// WebSocket message protocol definitions
pub mod protocol;

/// Game rooms, board state, and win detection
pub mod room;

/// Session registry with per-session TTL timers
pub mod session;

/// Main server orchestration
pub mod server;

/// HTTP and WebSocket connection handling
pub mod websocket;

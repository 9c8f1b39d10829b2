//! The dual-protocol connection surface: plain HTTP for login,
//! registration, profile lookup and static pages, and WebSocket
//! upgrades for the hall and room channels, all on one listening port.

pub mod hall;
pub mod http;
pub mod room;
pub mod routes;

pub use routes::{create_router, run_server};

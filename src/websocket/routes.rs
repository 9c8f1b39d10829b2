use axum::routing::{get, post};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::Config;
use crate::server::GobangServer;

use super::{hall, http, room};

/// Create the axum router carrying the whole connection surface: the
/// three HTTP endpoints, the two WebSocket upgrade paths, and the
/// static web root with `login.html` as the index document and
/// `404.html` as the not-found fallback.
pub fn create_router(config: &Config) -> axum::Router<Arc<GobangServer>> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = if config.server.cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = config
            .server
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    let web_root = Path::new(&config.server.web_root);
    let static_files = ServeDir::new(web_root)
        .not_found_service(ServeFile::new(web_root.join("404.html")));

    axum::Router::new()
        .route("/login", post(http::login))
        .route("/reg", post(http::register))
        .route("/information", get(http::information))
        .route("/hall", get(hall::hall_handler))
        .route("/room", get(room::room_handler))
        .route_service("/", ServeFile::new(web_root.join("login.html")))
        .fallback_service(static_files)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Assemble a server from `config` and serve it on `addr` until the
/// process ends.
pub async fn run_server(addr: SocketAddr, config: Config) -> anyhow::Result<()> {
    let game_server = GobangServer::new(config.clone());
    let app = create_router(&config).with_state(game_server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Starting Gobang Arena server");

    axum::serve(listener, app).await?;
    Ok(())
}

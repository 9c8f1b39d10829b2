//! Plain HTTP endpoints: `POST /login`, `POST /reg`, and
//! `GET /information`. Authentication state travels in the `SSID`
//! cookie, which names a server-side session.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::database::{DatabaseError, UserDatabase};
use crate::server::GobangServer;
use crate::session::{Session, SessionStatus};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "SSID";

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

fn envelope(result: bool, reason: Option<&str>) -> serde_json::Value {
    match reason {
        Some(reason) => json!({ "result": result, "reason": reason }),
        None => json!({ "result": result }),
    }
}

fn error_response(status: StatusCode, reason: &str) -> Response {
    (status, Json(envelope(false, Some(reason)))).into_response()
}

/// Extract a cookie value from the request headers.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Resolve the live session named by the request's `SSID` cookie.
pub(crate) fn session_from_headers(server: &GobangServer, headers: &HeaderMap) -> Option<Session> {
    let ssid = cookie_value(headers, SESSION_COOKIE)?.parse::<u64>().ok()?;
    server.sessions().get(ssid)
}

/// `POST /login`: verify credentials, mint a session with a finite TTL,
/// and hand the ssid back as a cookie.
pub async fn login(State(server): State<Arc<GobangServer>>, body: String) -> Response {
    let Ok(credentials) = serde_json::from_str::<Credentials>(&body) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body");
    };

    match server
        .database()
        .login(&credentials.username, &credentials.password)
        .await
    {
        Ok(profile) => {
            let session = server.sessions().create(profile.id, SessionStatus::Login);
            server.sessions().set_expire(session.ssid, server.session_ttl());
            tracing::info!(uid = profile.id, ssid = session.ssid, "User logged in");

            let cookie = format!("{SESSION_COOKIE}={}; Path=/", session.ssid);
            (
                [(header::SET_COOKIE, cookie)],
                Json(envelope(true, None)),
            )
                .into_response()
        }
        Err(DatabaseError::AuthFailed) => {
            error_response(StatusCode::FORBIDDEN, "invalid username or password")
        }
        Err(err) => {
            tracing::error!(error = %err, "Login failed against the user store");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "user store unavailable")
        }
    }
}

/// `POST /reg`: create an account with the default score.
pub async fn register(State(server): State<Arc<GobangServer>>, body: String) -> Response {
    let Ok(credentials) = serde_json::from_str::<Credentials>(&body) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body");
    };

    match server
        .database()
        .register(&credentials.username, &credentials.password)
        .await
    {
        Ok(uid) => {
            tracing::info!(uid, username = %credentials.username, "User registered");
            Json(envelope(true, None)).into_response()
        }
        Err(DatabaseError::UsernameTaken) => {
            error_response(StatusCode::CONFLICT, "username already taken")
        }
        Err(DatabaseError::EmptyCredentials) => {
            error_response(StatusCode::BAD_REQUEST, "username and password must be non-empty")
        }
        Err(err) => {
            tracing::error!(error = %err, "Registration failed against the user store");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "user store unavailable")
        }
    }
}

/// `GET /information`: profile of the logged-in user, refreshing the
/// session TTL as a side effect.
pub async fn information(
    State(server): State<Arc<GobangServer>>,
    headers: HeaderMap,
) -> Response {
    let Some(session) = session_from_headers(&server, &headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "not logged in");
    };

    match server.database().lookup(session.uid).await {
        Ok(Some(profile)) => {
            server.sessions().set_expire(session.ssid, server.session_ttl());
            Json(profile).into_response()
        }
        Ok(None) => {
            tracing::warn!(uid = session.uid, "Session names a user the store no longer has");
            error_response(StatusCode::NOT_FOUND, "user not found")
        }
        Err(err) => {
            tracing::error!(error = %err, "Profile lookup failed against the user store");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "user store unavailable")
        }
    }
}

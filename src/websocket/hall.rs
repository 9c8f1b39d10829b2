//! The hall (lobby) WebSocket channel: users wait here and ask the
//! matchmaker for opponents.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::presence::ClientSender;
use crate::protocol::{encode, ErrorReply, HallReply, HallRequest};
use crate::server::GobangServer;
use crate::session::Session;

use super::http::session_from_headers;

/// `GET /hall` upgrade handler. The session is resolved from the
/// upgrade request's cookie before the protocol switch.
pub async fn hall_handler(
    State(server): State<Arc<GobangServer>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let session = session_from_headers(&server, &headers);
    ws.on_upgrade(move |socket| handle_hall_socket(socket, server, session))
}

/// Send one frame and close, for connections rejected at admission.
pub(super) async fn reject_socket(mut sink: SplitSink<WebSocket, Message>, frame: Arc<str>) {
    let _ = sink.send(Message::Text(frame.as_ref().into())).await;
    let _ = sink.close().await;
}

async fn handle_hall_socket(
    socket: WebSocket,
    server: Arc<GobangServer>,
    session: Option<Session>,
) {
    let (mut sink, mut stream) = socket.split();

    let Some(session) = session else {
        reject_socket(sink, encode(&HallReply::rejected("invalid session"))).await;
        return;
    };
    if !session.is_login() {
        reject_socket(sink, encode(&HallReply::rejected("not logged in"))).await;
        return;
    }
    let uid = session.uid;

    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<str>>();
    if server.presence().enter_hall(uid, tx.clone()).is_err() {
        tracing::warn!(uid, "Rejected duplicate hall login");
        reject_socket(sink, encode(&HallReply::rejected("duplicate login"))).await;
        return;
    }

    // Writer task: every frame for this user funnels through the queue,
    // so registries never block on socket I/O and the client sees
    // replies in emission order.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.as_ref().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let _ = tx.send(encode(&HallReply::ready()));
    server.sessions().set_expire(session.ssid, server.session_ttl());
    tracing::info!(uid, ssid = session.ssid, "Hall connection established");

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                handle_hall_message(&server, uid, &tx, text.as_str()).await;
            }
            Ok(Message::Close(_)) => break,
            Err(err) => {
                tracing::debug!(uid, error = %err, "Hall socket error");
                break;
            }
            _ => {}
        }
    }

    server.presence().exit_hall(uid);
    server.sessions().set_expire(session.ssid, server.session_ttl());
    tracing::info!(uid, "Hall connection closed");

    drop(tx);
    let _ = send_task.await;
}

async fn handle_hall_message(server: &GobangServer, uid: u64, tx: &ClientSender, text: &str) {
    match serde_json::from_str::<HallRequest>(text) {
        Ok(HallRequest::MatchStart) => {
            let reply = match server.matcher().add(uid).await {
                Ok(tier) => {
                    tracing::debug!(uid, tier = tier.as_str(), "Match requested");
                    HallReply::MatchStart {
                        result: true,
                        reason: None,
                    }
                }
                Err(err) => {
                    tracing::warn!(uid, error = %err, "Match start failed");
                    HallReply::MatchStart {
                        result: false,
                        reason: Some("matchmaking unavailable".to_string()),
                    }
                }
            };
            let _ = tx.send(encode(&reply));
        }
        Ok(HallRequest::MatchStop) => {
            // Cancellation is best-effort: a miss means the worker
            // already popped the entry and will validate presence.
            if let Err(err) = server.matcher().del(uid).await {
                tracing::warn!(uid, error = %err, "Match stop failed");
            }
            let _ = tx.send(encode(&HallReply::MatchStop { result: true }));
        }
        Err(_) => {
            let optype = serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .and_then(|v| v.get("optype").and_then(|o| o.as_str()).map(String::from))
                .unwrap_or_default();
            tracing::warn!(uid, %optype, "Unknown hall request");
            let _ = tx.send(encode(&ErrorReply::unknown_optype(optype)));
        }
    }
}

//! The room WebSocket channel: in-game traffic for one seated player.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{encode, RoomReply};
use crate::server::GobangServer;
use crate::session::{Expiry, Session};

use super::hall::reject_socket;
use super::http::session_from_headers;

/// `GET /room` upgrade handler.
pub async fn room_handler(
    State(server): State<Arc<GobangServer>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let session = session_from_headers(&server, &headers);
    ws.on_upgrade(move |socket| handle_room_socket(socket, server, session))
}

async fn handle_room_socket(
    socket: WebSocket,
    server: Arc<GobangServer>,
    session: Option<Session>,
) {
    let (mut sink, mut stream) = socket.split();

    let Some(session) = session else {
        reject_socket(sink, encode(&RoomReply::rejected("invalid session"))).await;
        return;
    };
    if !session.is_login() {
        reject_socket(sink, encode(&RoomReply::rejected("not logged in"))).await;
        return;
    }
    let uid = session.uid;

    if server.presence().in_hall(uid) || server.presence().in_room(uid) {
        tracing::warn!(uid, "Rejected duplicate room login");
        reject_socket(sink, encode(&RoomReply::rejected("duplicate login"))).await;
        return;
    }

    let Some(room) = server.rooms().room_by_user(uid) else {
        tracing::warn!(uid, "Room connection without a matched room");
        reject_socket(sink, encode(&RoomReply::rejected("no active room"))).await;
        return;
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<str>>();
    if server.presence().enter_room(uid, tx.clone()).is_err() {
        // Lost an admission race since the check above.
        reject_socket(sink, encode(&RoomReply::rejected("duplicate login"))).await;
        return;
    }

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.as_ref().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // A seated player's session must survive however long the game runs.
    server.sessions().set_expire(session.ssid, Expiry::Forever);
    let _ = tx.send(encode(&RoomReply::ready(
        room.room_id(),
        uid,
        room.white_uid(),
        room.black_uid(),
    )));
    tracing::info!(uid, room_id = room.room_id(), "Room connection established");

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                room.handle_frame(uid, text.as_str()).await;
            }
            Ok(Message::Close(_)) => break,
            Err(err) => {
                tracing::debug!(uid, error = %err, "Room socket error");
                break;
            }
            _ => {}
        }
    }

    // Close path: presence first so the exit protocol sees this seat as
    // gone, then the TTL comes back, then the room drains the player.
    server.presence().exit_room(uid);
    server.sessions().set_expire(session.ssid, server.session_ttl());
    server.rooms().remove_user(uid).await;
    tracing::info!(uid, room_id = room.room_id(), "Room connection closed");

    drop(tx);
    let _ = send_task.await;
}

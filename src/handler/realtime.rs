use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::{middleware::JWTAuthMiddeware, service::realtime_service::RealtimeService, AppState};

pub fn realtime_handler() -> Router {
    Router::new().route("/ws", get(realtime_ws))
}

/// Upgrades to a WebSocket bound to the authenticated identity. The channel
/// is registered once per connection and receives only events addressed to
/// this user; clients never pick their own room.
pub async fn realtime_ws(
    ws: WebSocketUpgrade,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> impl IntoResponse {
    let user_id = auth.user.id;
    let realtime_service = app_state.realtime_service.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, realtime_service, user_id))
}

async fn handle_socket(socket: WebSocket, realtime_service: Arc<RealtimeService>, user_id: Uuid) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let subscription = realtime_service.subscribe(user_id);
    let session_id = subscription.session_id;
    let mut rx = subscription.receiver;

    tracing::info!("realtime session {} opened for user {}", session_id, user_id);

    // Forward published events to this session's socket.
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    // The server is the only publisher; inbound frames besides close are
    // ignored (ping/pong is handled by the protocol layer).
    while let Some(Ok(msg)) = ws_receiver.next().await {
        if let Message::Close(_) = msg {
            break;
        }
    }

    realtime_service.unsubscribe(user_id, session_id);
    sender_task.abort();
    tracing::info!("realtime session {} closed for user {}", session_id, user_id);
}

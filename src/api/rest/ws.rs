use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsParams {
    pub user: Uuid,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.user))
}

/// One live connection: registered in presence for the upgrade's lifetime,
/// fed by its own bounded channel so one slow client never holds up fanout
/// to anyone else.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();

    let connection_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(state.connection_buffer_size);

    state.transport.attach(connection_id, tx);
    state.presence.register(user_id, connection_id);
    state.metrics.live_connections.inc();

    info!(user_id = %user_id, connection_id = %connection_id, "websocket client connected");

    let mut outbound = ReceiverStream::new(rx);
    let send_task = tokio::spawn(async move {
        while let Some(payload) = outbound.next().await {
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.presence.unregister(connection_id);
    state.transport.detach(connection_id);
    state.metrics.live_connections.dec();

    info!(user_id = %user_id, connection_id = %connection_id, "websocket client disconnected");
}

use crate::models::{FeedEvent, PushPayload};
use crate::state::FeedState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::atomic::Ordering;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PushQuery {
    #[serde(rename = "eventId")]
    pub event_id: Option<String>,
}

/// WebSocket handler pushing remaining counts
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<PushQuery>,
    State(state): State<FeedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.event_id))
}

async fn handle_socket(socket: WebSocket, state: FeedState, event_id: Option<String>) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the first send so no sale falls between the two.
    let mut events = state.event_bus.subscribe();
    state.push_connections.fetch_add(1, Ordering::SeqCst);
    tracing::info!(%connection_id, event_id = ?event_id, "Push client connected");

    let initial = state.push_payload();
    if wanted(&event_id, &initial) {
        if let Ok(msg) = serde_json::to_string(&initial) {
            let _ = sender.send(Message::Text(msg)).await;
        }
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(FeedEvent::RemainingChanged(payload)) => {
                    if !wanted(&event_id, &payload) {
                        continue;
                    }
                    match serde_json::to_string(&payload) {
                        Ok(msg) => {
                            if sender.send(Message::Text(msg)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!("Failed to serialize push payload: {}", e);
                        }
                    }
                }
                Ok(FeedEvent::DisconnectPush) => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                Ok(FeedEvent::SalesStateChanged(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Push connection lagged by {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                Message::Text(text) => {
                    tracing::trace!("Ignoring client message: {}", text);
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!("Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!("Receive task completed");
            send_task.abort();
        }
    }

    state.push_connections.fetch_sub(1, Ordering::SeqCst);
    tracing::info!(%connection_id, "Push client disconnected");
}

/// A connection without an event id receives every event
fn wanted(event_id: &Option<String>, payload: &PushPayload) -> bool {
    event_id
        .as_deref()
        .map_or(true, |id| id == payload.identifier)
}

//! WebSocket stream of round events
//!
//! Every connected client gets the current session status on connect, then
//! each `RoundEvent` as JSON, plus a heartbeat frame while idle.

use super::handlers::AppState;
use crate::game::{events::RoundEvent, types::SessionStatus};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, time::interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Frames that are not round events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    Connected { status: SessionStatus },
    Heartbeat { timestamp: DateTime<Utc> },
    /// The client fell behind and missed `skipped` events
    Lagged { skipped: u64 },
}

/// GET /ws
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

fn to_message<T: Serialize>(frame: &T) -> Option<Message> {
    match serde_json::to_string(frame) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            warn!("Failed to serialize websocket frame: {}", e);
            None
        }
    }
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let client_id = Uuid::new_v4();
    // Subscribe before reading status so no event between the two is lost
    let mut rx = state.coordinator.subscribe();
    state.metrics.websocket_opened();
    info!(%client_id, "websocket client connected");

    let (mut sender, mut receiver) = socket.split();

    let status = state
        .coordinator
        .get_status()
        .await
        .unwrap_or_else(|_| SessionStatus::idle());
    let welcome = to_message(&ControlFrame::Connected { status });
    let mut open = match welcome {
        Some(message) => sender.send(message).await.is_ok(),
        None => true,
    };

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    while open {
        let outgoing: Option<Message> = tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => to_message::<RoundEvent>(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%client_id, skipped, "websocket client lagged");
                    to_message(&ControlFrame::Lagged { skipped })
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = heartbeat.tick() => to_message(&ControlFrame::Heartbeat { timestamp: Utc::now() }),
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Text(text))) => {
                    debug!(%client_id, "ignoring client message: {}", text);
                    None
                }
                Some(Ok(_)) => None,
                Some(Err(e)) => {
                    debug!(%client_id, "websocket receive error: {}", e);
                    break;
                }
            },
        };

        if let Some(message) = outgoing {
            open = sender.send(message).await.is_ok();
        }
    }

    state.metrics.websocket_closed();
    info!(%client_id, "websocket client disconnected");
}

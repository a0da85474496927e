//! WebSocket stream of core events.
//!
//! Every [`EventEnvelope`] published on the event bus is forwarded to each
//! connected client as one JSON text frame, e.g.
//! `{"timestamp":"..","type":"job_progress","id":3,"percent":40}`.
//! A `{"type":"heartbeat","timestamp":<unix secs>}` frame is sent when the
//! stream has been idle for [`HEARTBEAT_INTERVAL`].

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use convertino_core::EventEnvelope;

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Keep-alive frame.
#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub timestamp: i64,
}

impl Heartbeat {
    pub fn now() -> Self {
        Self {
            kind: "heartbeat",
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut rx = state.context().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        // First tick completes immediately
        heartbeat.tick().await;

        loop {
            let (kind, json) = tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(envelope) => {
                            heartbeat.reset();
                            (envelope.event.kind(), encode_event(&envelope))
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("WebSocket client lagged, skipped {} events", n);
                            WS_LAG_EVENTS.inc();
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Event bus closed");
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => ("heartbeat", serde_json::to_string(&Heartbeat::now())),
            };

            match json {
                Ok(json) => {
                    WS_MESSAGES_SENT.with_label_values(&[kind]).inc();
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize {} message: {}", kind, e);
                }
            }
        }
    });

    // Clients only send control frames
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by axum
                debug!("Received ping: {:?}", data);
            }
            Ok(Message::Text(text)) => {
                debug!("Ignoring text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

/// Serialized form of an event as sent to clients.
pub fn encode_event(envelope: &EventEnvelope) -> serde_json::Result<String> {
    serde_json::to_string(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use convertino_core::{Event, FileId};

    #[test]
    fn test_heartbeat_serialization() {
        let json = serde_json::to_value(Heartbeat::now()).unwrap();
        assert_eq!(json["type"], "heartbeat");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_event_frame_is_flat() {
        let envelope = EventEnvelope {
            timestamp: chrono::Utc::now(),
            event: Event::JobProgress {
                id: FileId::new(3),
                percent: 40,
            },
        };
        let json: serde_json::Value =
            serde_json::from_str(&encode_event(&envelope).unwrap()).unwrap();
        assert_eq!(json["type"], "job_progress");
        assert_eq!(json["id"], 3);
        assert_eq!(json["percent"], 40);
        assert!(json["timestamp"].is_string());
    }
}

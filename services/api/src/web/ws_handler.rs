//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for an alarm-screen
//! WebSocket connection. It pushes workflow events to the client and relays
//! the client's alarm commands to the workflow.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, Mutex};
use tracing::{error, info, warn};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Serializes and sends one message. Returns `false` once the client is gone.
async fn send_message(ws_sender: &WsSender, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return true;
        }
    };
    ws_sender.lock().await.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New alarm-screen WebSocket connection established.");

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable access across tasks.
    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Initial State ---
    // Subscribe before taking the snapshot so no event falls in between.
    let mut events = app_state.workflow.subscribe();
    let snapshot = ServerMessage::Snapshot {
        state: app_state.workflow.snapshot().await,
    };
    if !send_message(&ws_sender, &snapshot).await {
        error!("Failed to send initial snapshot.");
        return;
    }

    // --- 2. Event Forwarding Task ---
    let forward_task = {
        let ws_sender = ws_sender.clone();
        let workflow = app_state.workflow.clone();
        tokio::spawn(async move {
            loop {
                let message = match events.recv().await {
                    Ok(event) => ServerMessage::Event { event },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Client lagged behind; resending snapshot.");
                        ServerMessage::Snapshot {
                            state: workflow.snapshot().await,
                        }
                    }
                    Err(RecvError::Closed) => break,
                };
                if !send_message(&ws_sender, &message).await {
                    break;
                }
            }
        })
    };

    // --- 3. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                handle_text_message(text.as_str(), &app_state, &ws_sender).await;
            }
            Message::Binary(data) => {
                let outcome = app_state
                    .workflow
                    .submit_photo(data, "image/jpeg")
                    .await;
                if !send_message(&ws_sender, &ServerMessage::PhotoResult { outcome }).await {
                    break;
                }
            }
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- 4. Cleanup ---
    forward_task.abort();
    info!("WebSocket connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(text: &str, app_state: &Arc<AppState>, ws_sender: &WsSender) {
    let workflow = &app_state.workflow;
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::TriggerAlarm { task_id }) => {
            if !workflow.trigger_alarm_manually(task_id).await {
                let message = ServerMessage::Error {
                    message: "The alarm could not be raised for this task.".to_string(),
                };
                send_message(ws_sender, &message).await;
            }
        }
        Ok(ClientMessage::TestAlarm) => {
            if workflow.trigger_test_alarm().await.is_none() {
                let message = ServerMessage::Error {
                    message: "A test alarm needs at least one task and no active alarm.".to_string(),
                };
                send_message(ws_sender, &message).await;
            }
        }
        Ok(ClientMessage::CancelAlarm) => {
            info!("CancelAlarm message received.");
            if !workflow.cancel_alarm().await {
                let message = ServerMessage::Error {
                    message: "There is no alarm that can be cancelled right now.".to_string(),
                };
                send_message(ws_sender, &message).await;
            }
        }
        Ok(ClientMessage::DismissAlarm) => {
            if !workflow.dismiss_alarm().await {
                let message = ServerMessage::Error {
                    message: "There is no alarm that can be dismissed right now.".to_string(),
                };
                send_message(ws_sender, &message).await;
            }
        }
        Ok(ClientMessage::ClearNotice) => workflow.clear_notice().await,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
}

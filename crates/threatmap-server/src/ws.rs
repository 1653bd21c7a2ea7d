//! # WebSocket Fan-out
//!
//! Each client gets the bootstrap events and then every simulation event
//! as a JSON text frame.

use std::fmt::Display;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{Sink, SinkExt, StreamExt};
use threatmap_domain::SimEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::AppState;

/// Upgrade handler for `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    // subscribe first so nothing published during bootstrap is lost
    let mut rx = state.events.subscribe();
    let (mut sender, mut receiver) = socket.split();
    info!(clients = state.events.receiver_count(), "Client connected");

    for event in state.bootstrap_events() {
        if send_event(&mut sender, &event).await.is_err() {
            debug!("Client left during bootstrap");
            return;
        }
    }

    let mut send_task = tokio::spawn(async move { forward_events(&mut rx, &mut sender).await });
    let mut recv_task = tokio::spawn(async move {
        // clients only listen; drain until close
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    info!("Client disconnected");
}

/// Forward broadcast events to `sink` until the channel closes or the
/// client goes away. Returns the number of events sent.
pub async fn forward_events<S>(rx: &mut broadcast::Receiver<SimEvent>, sink: &mut S) -> usize
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut sent = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                if send_event(sink, &event).await.is_err() {
                    break;
                }
                sent += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Client lagging behind, events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    sent
}

async fn send_event<S>(sink: &mut S, event: &SimEvent) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(err) => {
            warn!(event = event.name(), error = %err, "Failed to encode event");
            return Ok(());
        }
    };
    sink.send(Message::Text(text.into())).await.map_err(|err| {
        debug!(error = %err, "Failed to send event to client");
        err
    })
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use switchboard_types::events::ClientCommand;
use switchboard_types::models::Session;

use crate::hub::Hub;
use crate::identity::Identity;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a WebSocket connection whose identity was already resolved at the
/// HTTP upgrade layer. A failed resolution arrives here as a guest identity,
/// never as a rejection.
pub async fn handle_connection(socket: WebSocket, hub: Hub, identity: Identity) {
    let (mut sender, mut receiver) = socket.split();

    let connection_id = Uuid::new_v4();
    let session = Session {
        connection_id,
        user_id: identity.user_id,
        role: identity.role,
        display_name: identity.display_name,
        locale: identity.locale,
    };

    info!(
        "{} ({}) connected as {:?}",
        session.display_name, connection_id, session.role
    );

    // Register the session; all hub deliveries to this connection flow
    // through this channel.
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.connect(session.clone(), tx);

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward hub events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = rx.recv() => {
                    let Some(event) = result else { break };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let hub_recv = hub.clone();
    let name_recv = session.display_name.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    match serde_json::from_str::<ClientCommand>(&text) {
                        Ok(command) => {
                            hub_recv.handle_command(connection_id, command).await;
                        }
                        Err(e) => {
                            let preview: String = text.chars().take(200).collect();
                            warn!(
                                "{} ({}) bad command: {} -- raw: {}",
                                name_recv, connection_id, e, preview
                            );
                        }
                    }
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(connection_id);
    info!(
        "{} ({}) disconnected",
        session.display_name, connection_id
    );
}

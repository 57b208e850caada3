use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use chairside_service::{ReservationService, ServiceError};
use chairside_types::api::AuthUser;
use chairside_types::events::{ClientCommand, ErrorPayload, ServerEvent};

use crate::broadcaster::Broadcaster;
use crate::registry::{Outbound, OutboundSender, Registry};

/// Handle a pre-authenticated WebSocket connection. Basic auth was already
/// resolved at the HTTP upgrade layer, so the loop starts immediately.
pub async fn handle_connection(
    socket: WebSocket,
    registry: Registry,
    service: Arc<ReservationService>,
    broadcaster: Broadcaster,
    user: AuthUser,
) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn_id = registry.register(tx.clone()).await;

    info!("{} connected to gateway ({})", user.username, conn_id);

    // Forward outbound events -> client; a Close from the idle sweep ends
    // the connection.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg {
                Outbound::Event(event) => {
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Read commands from client. Each command runs to completion before
    // the next is dispatched; a malformed frame never drops the connection.
    let username = user.username.clone();
    let recv_registry = registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    recv_registry.touch(conn_id).await;
                    match serde_json::from_str::<ClientCommand>(&text) {
                        Ok(cmd) => {
                            handle_command(&recv_registry, &service, &broadcaster, conn_id, &tx, cmd)
                                .await;
                        }
                        Err(e) => {
                            warn!(
                                "{} ({}) bad command: {} -- raw: {}",
                                username,
                                conn_id,
                                e,
                                truncate_for_log(&text, 200)
                            );
                            let _ = tx.send(Outbound::Event(ServerEvent::Error(ErrorPayload {
                                code: "VALIDATION_ERROR".into(),
                                message: "Malformed command".into(),
                                conflicting_reservation: None,
                            })));
                        }
                    }
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

    registry.on_disconnect(conn_id).await;
    info!("{} disconnected from gateway ({})", user.username, conn_id);
}

/// Translate one inbound command into Service/Registry calls. Success of a
/// state-changing command is announced through the Broadcaster (the
/// originator learns of its own success from the room publish); every
/// error is replied to the invoking connection only.
async fn handle_command(
    registry: &Registry,
    service: &ReservationService,
    broadcaster: &Broadcaster,
    conn_id: Uuid,
    tx: &OutboundSender,
    cmd: ClientCommand,
) {
    match cmd {
        ClientCommand::JoinDateRoom { date } => {
            registry.join(conn_id, &date).await;
        }

        ClientCommand::LeaveDateRoom { date } => {
            registry.leave(conn_id, &date).await;
        }

        ClientCommand::FetchReservations { date } => match service.list_for_date(&date).await {
            Ok(reservations) => {
                let _ = tx.send(Outbound::Event(ServerEvent::ReservationsUpdated(reservations)));
            }
            Err(e) => reply_error(tx, conn_id, "fetch-reservations", &e),
        },

        ClientCommand::SaveReservation(save) => match service.save(save).await {
            Ok(saved) => {
                info!("Reservation {} saved by {}", saved.id, conn_id);
                broadcaster.publish_for_date(&saved.date).await;
            }
            Err(e) => reply_error(tx, conn_id, "save-reservation", &e),
        },

        ClientCommand::DeleteReservation { id } => match service.delete(id).await {
            Ok(deleted) => {
                info!("Reservation {} deleted by {}", id, conn_id);
                broadcaster.publish_for_date(&deleted.date).await;
            }
            Err(e) => reply_error(tx, conn_id, "delete-reservation", &e),
        },
    }
}

fn reply_error(tx: &OutboundSender, conn_id: Uuid, context: &str, err: &ServiceError) {
    match err {
        ServiceError::Database(detail) => {
            error!("Database error in {} from {}: {:#}", context, conn_id, detail);
        }
        recoverable => {
            info!("Rejected {} from {}: {}", context, conn_id, recoverable);
        }
    }
    let _ = tx.send(Outbound::Event(ServerEvent::Error(err.client_payload())));
}

// Truncates on a char boundary so multibyte frames never split a codepoint.
fn truncate_for_log(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

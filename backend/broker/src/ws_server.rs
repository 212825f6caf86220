//! Duplex transport adapter.
//!
//! Upgrades HTTP to WebSocket, assigns each connection an opaque id, and
//! bridges inbound messages to the session registry and the OCR pipeline.
//! Frame delivery to viewers is initiated before OCR starts and never
//! depends on its outcome; OCR runs in a spawned task and replies to the
//! originating connection only.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vigil_core::{
    metrics::OperationKind, ClientMessage, Metrics, ServerMessage,
};
use vigil_ocr::OcrPipeline;

use crate::capture::CaptureBroker;
use crate::connection::ConnectionRegistry;
use crate::registry::{ConnectionId, SessionId, SessionRegistry};

/// Shared state for the duplex adapter.
#[derive(Clone)]
pub struct BrokerState {
    pub connections: ConnectionRegistry,
    pub sessions: Arc<SessionRegistry>,
    pub pipeline: Arc<OcrPipeline>,
    pub capture: Arc<CaptureBroker>,
    pub metrics: Arc<Metrics>,
}

/// Per-connection state: id, the session it belongs to, and its role in it.
#[derive(Debug)]
pub struct ConnState {
    pub id: ConnectionId,
    pub session: Option<SessionId>,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    None,
    Host,
    Viewer,
}

impl ConnState {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            session: None,
            role: Role::None,
        }
    }
}

/// Build the WebSocket router for mounting on the HTTP listener.
pub fn router(state: BrokerState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<BrokerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: BrokerState) {
    let connection_id = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.connections.register(connection_id, tx).await;
    info!(%connection_id, "peer connected");

    // Forward queued outbound messages onto the socket.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize outbound message"),
            }
        }
    });

    let mut capture_rx = state.capture.subscribe();
    let mut conn = ConnState::new(connection_id);

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(parsed) => handle_message(parsed, &mut conn, &state).await,
                            Err(e) => {
                                state.metrics.record_error();
                                let _ = state.connections.send_to(&connection_id, ServerMessage::Error {
                                    message: format!("unrecognized message: {e}"),
                                }).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(%connection_id, error = %e, "websocket error");
                        break;
                    }
                    _ => {}
                }
            }
            req = capture_rx.recv() => {
                match req {
                    // Capture requests go to producers only.
                    Ok(request_id) if conn.role == Role::Host => {
                        let _ = state.connections.send_to(&connection_id, ServerMessage::CaptureRequest { request_id }).await;
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(%connection_id, skipped, "capture announcements lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {}
                }
            }
        }
    }

    disconnect(&conn, &state).await;
    send_task.abort();
    info!(%connection_id, "peer disconnected");
}

/// Dispatch one inbound message. Component-local failures become `error`
/// events on the originating connection; nothing here tears down sessions.
pub async fn handle_message(msg: ClientMessage, conn: &mut ConnState, state: &BrokerState) {
    state.metrics.record_request();
    match msg {
        ClientMessage::CreateSession => {
            let session_id = state.sessions.create_session(conn.id).await;
            conn.session = Some(session_id.clone());
            conn.role = Role::Host;
            info!(connection_id = %conn.id, %session_id, "session created");
            state
                .connections
                .send_to(&conn.id, ServerMessage::SessionCreated { session_id })
                .await;
        }

        ClientMessage::JoinSession { session_id } => {
            match state.sessions.join_session(&session_id, conn.id).await {
                Ok(snapshot) => {
                    conn.session = Some(session_id.clone());
                    conn.role = Role::Viewer;
                    info!(connection_id = %conn.id, %session_id, "viewer joined");
                    state
                        .connections
                        .send_to(&conn.id, ServerMessage::SessionJoined { session_id })
                        .await;
                    state
                        .connections
                        .send_to(
                            &snapshot.host,
                            ServerMessage::ViewerJoined {
                                viewer_id: conn.id.to_string(),
                            },
                        )
                        .await;
                }
                Err(e) => {
                    state.metrics.record_error();
                    state
                        .connections
                        .send_to(
                            &conn.id,
                            ServerMessage::Error {
                                message: e.to_string(),
                            },
                        )
                        .await;
                }
            }
        }

        ClientMessage::ScreenData { session_id, chunk } => {
            let Some(snapshot) = state.sessions.get(&session_id).await else {
                state.metrics.record_error();
                state
                    .connections
                    .send_to(
                        &conn.id,
                        ServerMessage::Error {
                            message: format!("session not found: {session_id}"),
                        },
                    )
                    .await;
                return;
            };

            // Broadcast to the other session members first; viewers get the
            // frame whether or not recognition succeeds.
            let others: Vec<ConnectionId> = snapshot
                .members()
                .into_iter()
                .filter(|id| *id != conn.id)
                .collect();
            state
                .connections
                .send_to_many(
                    &others,
                    &ServerMessage::ScreenData {
                        session_id: session_id.clone(),
                        chunk: chunk.clone(),
                    },
                )
                .await;

            state.metrics.record_operation(OperationKind::Ocr);
            spawn_ocr(state.clone(), conn.id, session_id, chunk.payload);
        }

        ClientMessage::RequestOcr {
            session_id,
            image_data,
        } => {
            state.metrics.record_operation(OperationKind::Ocr);
            spawn_ocr(state.clone(), conn.id, session_id, image_data);
        }

        ClientMessage::CaptureResponse {
            request_id,
            image_data,
            error,
        } => {
            let outcome = match (image_data, error) {
                (Some(data), _) => Ok(data),
                (None, Some(message)) => Err(message),
                (None, None) => Err("empty capture response".to_string()),
            };
            state.capture.resolve(&request_id, outcome).await;
        }
    }
}

/// Run one image through the pipeline off the event path. The result goes
/// to the originator only; if it disconnected while recognition was in
/// flight the send is dropped silently.
fn spawn_ocr(state: BrokerState, origin: ConnectionId, session_id: String, payload: String) {
    tokio::spawn(async move {
        match state.pipeline.extract(&payload).await {
            Ok(result) => {
                let delivered = state
                    .connections
                    .send_to(
                        &origin,
                        ServerMessage::OcrResult {
                            session_id,
                            timestamp: Utc::now(),
                            result,
                        },
                    )
                    .await;
                if !delivered {
                    debug!(%origin, "dropping OCR result for disconnected peer");
                }
            }
            Err(e) => {
                state.metrics.record_error();
                let _ = state
                    .connections
                    .send_to(
                        &origin,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
            }
        }
    });
}

/// Tear down a connection. Idempotent: only the call that actually removes
/// the sender runs the notification sequence, so a second run neither
/// errors nor double-notifies.
pub async fn disconnect(conn: &ConnState, state: &BrokerState) {
    if !state.connections.unregister(&conn.id).await {
        return;
    }

    // Host: the registry hands back each ended session's viewer set so
    // session-ended reaches every viewer even though the entry is gone.
    for ended in state.sessions.end_sessions_for_host(conn.id).await {
        info!(session_id = %ended.id, "session ended by host disconnect");
        state
            .connections
            .send_to_many(
                &ended.viewers,
                &ServerMessage::SessionEnded {
                    session_id: ended.id.clone(),
                },
            )
            .await;
    }

    // Viewer: leave and tell the host.
    if conn.role == Role::Viewer {
        if let Some(session_id) = &conn.session {
            if let Some(host) = state.sessions.leave_session(session_id, conn.id).await {
                state
                    .connections
                    .send_to(
                        &host,
                        ServerMessage::ViewerLeft {
                            viewer_id: conn.id.to_string(),
                        },
                    )
                    .await;
            }
        }
    }
}

/// Reap sessions whose host connection vanished without a disconnect event,
/// delivering `session-ended` to their viewers. Returns how many were ended.
pub async fn sweep_orphans(state: &BrokerState) -> usize {
    let live = state.connections.ids().await;
    let ended = state.sessions.end_sessions_missing_hosts(&live).await;
    for session in &ended {
        warn!(session_id = %session.id, "sweeping orphaned session");
        state
            .connections
            .send_to_many(
                &session.viewers,
                &ServerMessage::SessionEnded {
                    session_id: session.id.clone(),
                },
            )
            .await;
    }
    ended.len()
}

/// Periodic orphan sweep. The interval is a config knob; there is no TTL on
/// healthy sessions.
pub fn spawn_sweeper(state: BrokerState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let ended = sweep_orphans(&state).await;
            if ended > 0 {
                info!(ended, "session sweep complete");
            }
        }
    })
}

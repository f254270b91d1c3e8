//! WebSocket connection lifecycle — slot handshake, ingress and egress loops.
//!
//! Each connection runs one task per direction. Ingress decodes inbound
//! frames and submits mutation intents to the hub; egress drains the slot's
//! bounded outbound queue onto the wire. Neither side mutates canvas or
//! pool state directly.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pixelhub_core::protocol::{PING, PONG, PixelUpdate};

use crate::hub::{OutboundFrame, SlotHandle};
use crate::state::GatewayState;

/// HTTP status for a full slot pool, matching the original server's 509.
/// Distinct from the 5xx server-error family on purpose.
const STATUS_SERVER_FULL: u16 = 509;

/// Upgrade handler for `/ws`. The slot is reserved before the upgrade so a
/// full pool is answered with a plain HTTP status and existing connections
/// are never affected.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    match state.hub.connect().await {
        Some(handle) => ws
            .on_upgrade(move |socket| handle_socket(state, handle, socket))
            .into_response(),
        None => {
            warn!("slot pool exhausted, rejecting viewer");
            (
                StatusCode::from_u16(STATUS_SERVER_FULL)
                    .unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
                "Server full",
            )
                .into_response()
        }
    }
}

async fn handle_socket(state: Arc<GatewayState>, handle: SlotHandle, socket: WebSocket) {
    let SlotHandle {
        slot,
        generation,
        frames,
        frame_tx,
        cancel,
    } = handle;
    info!(slot, "viewer connected");

    let (ws_tx, ws_rx) = socket.split();
    let egress = tokio::spawn(run_egress(slot, frames, cancel, ws_tx));

    run_ingress(&state, slot, &frame_tx, ws_rx).await;

    // One release per occupancy. If the hub already recycled the slot
    // (slow-viewer disconnect), the stale generation makes this a no-op.
    state.hub.release(slot, generation);
    let _ = egress.await;
    info!(slot, "viewer disconnected");
}

/// Read inbound frames until the peer closes, the transport fails, or the
/// viewer violates the protocol.
async fn run_ingress(
    state: &Arc<GatewayState>,
    slot: usize,
    frame_tx: &mpsc::Sender<OutboundFrame>,
    mut ws_rx: SplitStream<WebSocket>,
) {
    while let Some(msg) = ws_rx.next().await {
        let payload: Vec<u8> = match msg {
            Ok(Message::Text(text)) => text.as_bytes().to_vec(),
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Close(_)) => {
                debug!(slot, "close request received");
                break;
            }
            // Transport-level ping/pong is answered by axum itself.
            Ok(_) => continue,
            Err(e) => {
                debug!(slot, %e, "websocket read error");
                break;
            }
        };

        if payload == PING {
            debug!(slot, "liveness probe");
            if frame_tx.send(OutboundFrame::Pong).await.is_err() {
                break;
            }
            continue;
        }

        let update: PixelUpdate = match serde_json::from_slice(&payload) {
            Ok(update) => update,
            Err(e) => {
                warn!(slot, %e, "undecodable frame, closing connection");
                break;
            }
        };

        if update.is_blank() {
            continue;
        }

        match state.hub.paint(update).await {
            Some(true) => {
                debug!(slot, x = update.x, y = update.y, "pixel placed");
            }
            Some(false) => {
                // Out of bounds is a protocol violation: the client is
                // kicked, not merely ignored.
                warn!(
                    slot,
                    x = update.x,
                    y = update.y,
                    "invalid placement, closing connection"
                );
                break;
            }
            None => break,
        }
    }
}

/// Drain the slot's outbound queue onto the wire, in order, until the slot
/// is released or the peer goes away. Termination closes the socket but
/// never frees the slot itself.
async fn run_egress(
    slot: usize,
    mut frames: mpsc::Receiver<OutboundFrame>,
    cancel: CancellationToken,
    mut ws_tx: SplitSink<WebSocket, Message>,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let result = match frame {
            OutboundFrame::Change(update) => match serde_json::to_string(&update) {
                Ok(json) => ws_tx.send(Message::Text(json.into())).await,
                Err(e) => {
                    warn!(slot, %e, "failed to serialize change");
                    continue;
                }
            },
            OutboundFrame::Pong => ws_tx.send(Message::Text(PONG.into())).await,
        };

        if let Err(e) = result {
            debug!(slot, %e, "websocket write error");
            break;
        }
    }

    let _ = ws_tx.close().await;
    debug!(slot, "egress pipeline exited");
}

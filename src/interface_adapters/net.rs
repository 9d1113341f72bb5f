use crate::interface_adapters::protocol::decode_command;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{ClientHandle, ClientId, Hub};

use axum::{
    Error,
    body::Bytes,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Notify, mpsc};
use tracing::{Instrument, debug, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    OutboundClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = ClientId::new();
    let span = info_span!("conn", %conn_id);
    serve_connection(socket, state, conn_id)
        .instrument(span)
        .await
}

async fn serve_connection(mut socket: WebSocket, state: Arc<AppState>, conn_id: ClientId) {
    let (handle, outbound_rx) = ClientHandle::new(state.outbound_capacity);
    let shutdown = handle.shutdown_signal();
    state.hub.connect(conn_id, handle.clone()).await;
    info!("client connected");

    let mut ctx = ConnCtx::new(conn_id, state, handle, outbound_rx, shutdown);

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

struct ConnCtx {
    pub conn_id: ClientId,
    pub hub: Arc<Hub>,
    pub echo_frames: bool,
    // Own handle, used for the legacy echo so it queues behind broadcasts.
    pub handle: ClientHandle,
    pub outbound_rx: mpsc::Receiver<Utf8Bytes>,
    // Raised when the hub evicts or shuts down this connection.
    pub shutdown: Arc<Notify>,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_frames: u32,
    pub failed_commands: u32,

    pub last_invalid_frame_log: Instant,
    pub last_command_error_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

impl ConnCtx {
    fn new(
        conn_id: ClientId,
        state: Arc<AppState>,
        handle: ClientHandle,
        outbound_rx: mpsc::Receiver<Utf8Bytes>,
        shutdown: Arc<Notify>,
    ) -> Self {
        let now = Instant::now();
        Self {
            conn_id,
            hub: state.hub.clone(),
            echo_frames: state.echo_frames,
            handle,
            outbound_rx,
            shutdown,
            msgs_in: 0,
            msgs_out: 0,
            bytes_in: 0,
            bytes_out: 0,
            invalid_frames: 0,
            failed_commands: 0,
            last_invalid_frame_log: now,
            last_command_error_log: now,
            close_frame: None,
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming command from the client
            incoming = socket.recv() => {
                match handle_incoming_ws(incoming, ctx).await {
                    LoopControl::Continue => false,
                    LoopControl::Disconnect => true,
                }
            }

            // Outgoing broadcast or echo
            outbound = ctx.outbound_rx.recv() => {
                match outbound {
                    Some(frame) => match forward_frame(frame, socket, ctx).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    None => {
                        fatal = Some(NetError::OutboundClosed);
                        true
                    }
                }
            }

            // Evicted by a failed delivery or closed by shutdown.
            _ = ctx.shutdown.notified() => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::AWAY,
                    reason: "connection closed by server".into(),
                });
                info!("connection closed by hub");
                true
            }
        };

        if disconnect {
            break;
        }
    }

    disconnect_cleanup(socket, ctx).await;

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> LoopControl {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => handle_command_frame(text, ctx).await,
            Message::Binary(bytes) => match binary_as_text(bytes) {
                // Some clients send their JSON commands as binary frames.
                Some(text) => handle_command_frame(text, ctx).await,
                None => {
                    ctx.msgs_in += 1;
                    record_invalid_frame(ctx, &"binary frame is not valid UTF-8");
                    LoopControl::Continue
                }
            },
            Message::Ping(_) | Message::Pong(_) => LoopControl::Continue,
            Message::Close(_) => LoopControl::Disconnect,
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            LoopControl::Disconnect
        }
        None => {
            info!("websocket closed");
            LoopControl::Disconnect
        }
    }
}

fn binary_as_text(bytes: Bytes) -> Option<Utf8Bytes> {
    std::str::from_utf8(&bytes)
        .ok()
        .map(|text| Utf8Bytes::from(text.to_owned()))
}

async fn handle_command_frame(text: Utf8Bytes, ctx: &mut ConnCtx) -> LoopControl {
    ctx.msgs_in += 1;
    ctx.bytes_in += text.len() as u64;

    process_text_frame(text.as_str(), ctx).await;
    if ctx.echo_frames {
        return echo_frame(text, ctx);
    }
    LoopControl::Continue
}

// Undecodable frames are skipped; the connection stays open.
fn record_invalid_frame(ctx: &mut ConnCtx, error: &dyn std::fmt::Display) {
    ctx.invalid_frames += 1;
    if should_log(&mut ctx.last_invalid_frame_log) {
        warn!(
            error = %error,
            invalid_frames = ctx.invalid_frames,
            "failed to decode client frame"
        );
    }
}

async fn process_text_frame(text: &str, ctx: &mut ConnCtx) {
    let command = match decode_command(text) {
        Ok(command) => command,
        Err(err) => {
            record_invalid_frame(ctx, &err);
            return;
        }
    };

    let action = command.action();
    let channel = command.channel();
    match ctx.hub.dispatch(&ctx.conn_id, command).await {
        Ok(outcome) => {
            debug!(action, %channel, ?outcome, "command handled");
        }
        Err(err) => {
            // The command is abandoned; the connection stays open.
            ctx.failed_commands += 1;
            if should_log(&mut ctx.last_command_error_log) {
                warn!(action, %channel, error = %err, "command failed");
            }
        }
    }
}

fn echo_frame(text: Utf8Bytes, ctx: &mut ConnCtx) -> LoopControl {
    match ctx.handle.deliver(text) {
        Ok(()) => LoopControl::Continue,
        Err(err) => {
            warn!(error = %err, "failed to queue echo; disconnecting");
            LoopControl::Disconnect
        }
    }
}

async fn forward_frame(
    frame: Utf8Bytes,
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
) -> LoopControl {
    let bytes_len = frame.len();
    match socket.send(Message::Text(frame)).await.map_err(NetError::Ws) {
        Ok(()) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send frame");
            LoopControl::Disconnect
        }
    }
}

async fn disconnect_cleanup(socket: &mut WebSocket, ctx: &mut ConnCtx) {
    // Leave the registry before the socket goes so no broadcast targets a dead connection.
    if !ctx.hub.disconnect(&ctx.conn_id).await {
        debug!("client was already evicted");
    }

    if let Some(frame) = ctx.close_frame.take() {
        let _ = socket.send(Message::Close(Some(frame))).await;
    }
    if let Err(err) = socket.close().await.map_err(NetError::Ws) {
        debug!(error = ?err, "socket close error");
    }

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_frames = ctx.invalid_frames,
        failed_commands = ctx.failed_commands,
        "connection stats"
    );
    info!("client disconnected");
}

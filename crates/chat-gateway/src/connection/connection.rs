//! One physical gateway connection
//!
//! Dial, wait for Hello, identify or resume, then pump frames until the
//! socket drops, the server asks for a reconnect, or the session closes.
//! The socket is split: a writer task owns the sink and drains an mpsc
//! channel that the receive loop and the heartbeat monitor both send into.

use chat_core::{ReadyEvent, User};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::heartbeat::{HeartbeatExit, HeartbeatMonitor};
use super::state::ConnectionPhase;
use crate::error::{GatewayError, GatewayResult};
use crate::events::GatewayEventType;
use crate::protocol::{
    CloseCode, GatewayMessage, IdentifyPayload, OpCode, ResumePayload, NORMAL_CLOSURE,
};
use crate::session::SessionShared;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSource = SplitStream<WsStream>;
type WsSink = SplitSink<WsStream, Message>;

const OUTBOUND_BUFFER: usize = 64;

/// Work queued for the writer task
#[derive(Debug)]
pub(crate) enum Outbound {
    Frame(GatewayMessage),
    /// Send a close frame with this code, then stop writing
    Close(u16),
}

/// How a connection ended once it was established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionEnd {
    /// The session is closing
    Shutdown,
    /// Connect again, resuming if the session is still held
    Reconnect(&'static str),
    /// The server closed with a code that forbids reconnecting
    Fatal(u16),
}

/// What the receive loop does after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameAction {
    Continue,
    Reconnect(&'static str),
}

/// Run one connection to completion
///
/// `Err` means the attempt failed before or during the handshake; `Ok`
/// reports how an established connection ended.
pub(crate) async fn run(
    shared: &SessionShared,
    url: &str,
    shutdown: &mut watch::Receiver<bool>,
) -> GatewayResult<ConnectionEnd> {
    let state = &shared.state;
    let options = &shared.options;

    state.set_phase(ConnectionPhase::Connecting);
    tracing::debug!(url, "Dialing gateway");

    let dial = timeout(options.connect_timeout, tokio_tungstenite::connect_async(url));
    let (ws, _response) = tokio::select! {
        dialed = dial => dialed.map_err(|_| GatewayError::Timeout("connect"))??,
        _ = shutdown.changed() => {
            state.set_phase(ConnectionPhase::Disconnected);
            return Ok(ConnectionEnd::Shutdown);
        }
    };

    let (sink, mut source) = ws.split();
    let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let writer = tokio::spawn(write_loop(sink, outbound_rx));

    let connection = Connection { shared, outbound };
    let result = connection.drive(&mut source, shutdown).await;

    let code = match result {
        Ok(ConnectionEnd::Shutdown) => NORMAL_CLOSURE,
        _ => CloseCode::UnknownError.as_u16(),
    };
    state.set_phase(ConnectionPhase::Closing);
    let _ = connection.outbound.send(Outbound::Close(code)).await;
    drop(connection);

    finish_writer(writer, options.close_timeout).await;
    state.set_phase(ConnectionPhase::Disconnected);

    result
}

pub(crate) struct Connection<'a> {
    shared: &'a SessionShared,
    outbound: mpsc::Sender<Outbound>,
}

impl<'a> Connection<'a> {
    #[cfg(test)]
    pub(crate) fn new(shared: &'a SessionShared, outbound: mpsc::Sender<Outbound>) -> Self {
        Self { shared, outbound }
    }

    async fn drive(
        &self,
        source: &mut WsSource,
        shutdown: &mut watch::Receiver<bool>,
    ) -> GatewayResult<ConnectionEnd> {
        let state = &self.shared.state;
        state.set_phase(ConnectionPhase::AwaitingHello);

        let hello = tokio::select! {
            frame = timeout(self.shared.options.hello_timeout, next_frame(source)) => {
                frame.map_err(|_| GatewayError::Timeout("hello"))??
            }
            _ = shutdown.changed() => return Ok(ConnectionEnd::Shutdown),
        };

        let interval = match hello.as_hello() {
            Some(payload) if payload.heartbeat_interval > 0 => payload.heartbeat_interval,
            Some(_) => {
                return Err(GatewayError::Protocol(
                    "Hello with zero heartbeat interval".to_string(),
                ));
            }
            None => {
                return Err(GatewayError::Protocol(format!(
                    "expected Hello as first frame, got {hello}"
                )));
            }
        };
        tracing::info!(heartbeat_interval_ms = interval, "Received Hello");

        state.reset_heartbeat();
        let (stop_heartbeat, stop_rx) = watch::channel(false);
        let mut heartbeat = HeartbeatMonitor::new(
            Duration::from_millis(interval),
            Arc::clone(state),
            self.outbound.clone(),
        )
        .spawn(stop_rx);

        let result = match self.handshake().await {
            Ok(()) => self.receive(source, &mut heartbeat, shutdown).await,
            Err(e) => Err(e),
        };

        stop_heartbeat.send_replace(true);
        heartbeat.abort();
        result
    }

    /// Send Resume when a session is held, Identify otherwise
    async fn handshake(&self) -> GatewayResult<()> {
        let shared = self.shared;
        let state = &shared.state;

        let frame = match state.session_id().filter(|_| state.can_resume()) {
            Some(session_id) => {
                let seq = state.sequence();
                state.set_phase(ConnectionPhase::Resuming);
                tracing::info!(session_id = %session_id, seq, "Resuming gateway session");
                GatewayMessage::resume(&ResumePayload {
                    token: shared.token.clone(),
                    session_id,
                    seq,
                })?
            }
            None => {
                state.set_phase(ConnectionPhase::Identifying);
                tracing::info!(intents = %shared.intents, "Identifying new gateway session");
                GatewayMessage::identify(&IdentifyPayload {
                    token: shared.token.clone(),
                    properties: shared.options.properties.clone(),
                    intents: shared.intents,
                })?
            }
        };

        self.send(frame).await
    }

    async fn receive(
        &self,
        source: &mut WsSource,
        heartbeat: &mut JoinHandle<HeartbeatExit>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> GatewayResult<ConnectionEnd> {
        loop {
            tokio::select! {
                frame = source.next() => {
                    let action = match frame {
                        None => FrameAction::Reconnect("stream ended"),
                        Some(Err(e)) => return Err(e.into()),
                        Some(Ok(Message::Text(text))) => self.handle_text(text.as_bytes()).await,
                        Some(Ok(Message::Binary(bytes))) => self.handle_text(&bytes).await,
                        Some(Ok(Message::Close(frame))) => {
                            return Ok(self.handle_close(frame.as_ref()));
                        }
                        Some(Ok(_)) => FrameAction::Continue,
                    };
                    if let FrameAction::Reconnect(reason) = action {
                        return Ok(ConnectionEnd::Reconnect(reason));
                    }
                }
                exit = &mut *heartbeat => {
                    return match exit {
                        Ok(HeartbeatExit::Zombied) => {
                            Ok(ConnectionEnd::Reconnect("heartbeat not acknowledged"))
                        }
                        Ok(HeartbeatExit::SendFailed | HeartbeatExit::Stopped) | Err(_) => {
                            Err(GatewayError::Closed)
                        }
                    };
                }
                _ = shutdown.changed() => return Ok(ConnectionEnd::Shutdown),
            }
        }
    }

    async fn handle_text(&self, raw: &[u8]) -> FrameAction {
        match serde_json::from_slice::<GatewayMessage>(raw) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping undecodable gateway frame");
                FrameAction::Continue
            }
        }
    }

    pub(crate) async fn handle_message(&self, message: GatewayMessage) -> FrameAction {
        tracing::trace!(op = %message.op, seq = message.s, "Gateway frame received");
        let state = &self.shared.state;

        match message.op {
            OpCode::Dispatch => self.handle_dispatch(message).await,
            OpCode::Heartbeat => {
                let seq = state.sequence();
                tracing::debug!(seq, "Server requested a heartbeat");
                match self.send(GatewayMessage::heartbeat(seq)).await {
                    Ok(()) => FrameAction::Continue,
                    Err(_) => FrameAction::Reconnect("writer closed"),
                }
            }
            OpCode::Reconnect => {
                tracing::info!("Server requested reconnect");
                FrameAction::Reconnect("server requested reconnect")
            }
            OpCode::InvalidSession => {
                let resumable = message.as_invalid_session().unwrap_or(false);
                if !resumable {
                    state.invalidate();
                }
                tracing::warn!(resumable, "Gateway session invalidated");
                FrameAction::Reconnect("invalid session")
            }
            OpCode::HeartbeatAck => {
                state.record_heartbeat_ack(Instant::now());
                tracing::trace!("Heartbeat acknowledged");
                FrameAction::Continue
            }
            OpCode::Hello | OpCode::Identify | OpCode::Resume => {
                tracing::debug!(op = %message.op, "Ignoring unexpected frame");
                FrameAction::Continue
            }
        }
    }

    async fn handle_dispatch(&self, message: GatewayMessage) -> FrameAction {
        let state = &self.shared.state;
        if let Some(seq) = message.s {
            state.record_sequence(seq);
        }

        let name = message.t.unwrap_or_default();
        let data = message.d.unwrap_or(Value::Null);

        match GatewayEventType::from_str(&name) {
            Some(GatewayEventType::Ready) => match ReadyEvent::deserialize(&data) {
                Ok(ready) => {
                    tracing::info!(
                        session_id = %ready.session_id,
                        user = ready.user.as_ref().map(User::tag),
                        guilds = ready.guilds.len(),
                        "Gateway session ready"
                    );
                    state.set_session(ready.session_id, ready.resume_gateway_url);
                    state.set_phase(ConnectionPhase::Connected);
                }
                Err(e) => {
                    // No session to resume from, so this attempt is abandoned
                    tracing::warn!(error = %e, "READY without a usable session id");
                    return FrameAction::Reconnect("malformed READY");
                }
            },
            Some(GatewayEventType::Resumed) => {
                tracing::info!(seq = state.sequence(), "Gateway session resumed");
                state.set_phase(ConnectionPhase::Connected);
            }
            _ => {}
        }

        self.shared.handler.on_event(&name, &data).await;
        FrameAction::Continue
    }

    fn handle_close(&self, frame: Option<&CloseFrame<'_>>) -> ConnectionEnd {
        let Some(frame) = frame else {
            tracing::info!("Gateway closed without a code");
            return ConnectionEnd::Reconnect("server closed connection");
        };

        let code = u16::from(frame.code);
        match CloseCode::from_u16(code) {
            Some(close) if !close.should_reconnect() => {
                tracing::error!(
                    code,
                    reason = close.description(),
                    "Gateway closed with a fatal code"
                );
                ConnectionEnd::Fatal(code)
            }
            Some(close) if close.invalidates_session() => {
                tracing::warn!(
                    code,
                    reason = close.description(),
                    "Gateway closed and dropped the session"
                );
                self.shared.state.invalidate();
                ConnectionEnd::Reconnect("session dropped by server")
            }
            _ => {
                tracing::info!(code, reason = %frame.reason, "Gateway closed connection");
                ConnectionEnd::Reconnect("server closed connection")
            }
        }
    }

    async fn send(&self, frame: GatewayMessage) -> GatewayResult<()> {
        self.outbound
            .send(Outbound::Frame(frame))
            .await
            .map_err(|_| GatewayError::Closed)
    }
}

/// Read until the first data frame
async fn next_frame(source: &mut WsSource) -> GatewayResult<GatewayMessage> {
    while let Some(frame) = source.next().await {
        match frame? {
            Message::Text(text) => return Ok(GatewayMessage::from_json(&text)?),
            Message::Binary(bytes) => return Ok(serde_json::from_slice(&bytes)?),
            Message::Close(frame) => {
                let code = frame.map_or(0, |f| u16::from(f.code));
                if CloseCode::from_u16(code).is_some_and(|close| !close.should_reconnect()) {
                    return Err(GatewayError::FatalClose(code));
                }
                return Err(GatewayError::Protocol(format!("closed with code {code} before Hello")));
            }
            _ => {}
        }
    }
    Err(GatewayError::Closed)
}

/// Give the writer `limit` to flush the close frame, then stop it
async fn finish_writer(mut writer: JoinHandle<()>, limit: Duration) {
    if timeout(limit, &mut writer).await.is_err() {
        writer.abort();
        tracing::debug!("Gateway writer did not finish within the close timeout");
    }
}

async fn write_loop(mut sink: WsSink, mut outbound: mpsc::Receiver<Outbound>) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Frame(message) => {
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to encode gateway frame");
                        continue;
                    }
                };
                tracing::trace!(op = %message.op, "Gateway frame sent");
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::debug!(error = %e, "Gateway write failed");
                    break;
                }
            }
            Outbound::Close(code) => {
                let frame = CloseFrame {
                    code: WsCloseCode::from(code),
                    reason: "".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    tracing::debug!(error = %e, code, "Gateway close frame not sent");
                }
                break;
            }
        }
    }
    let _ = sink.close().await;
}

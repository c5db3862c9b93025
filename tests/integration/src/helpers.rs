//! Mock servers for integration tests
//!
//! `MockApi` is an axum app answering the REST routes the client uses,
//! with rate-limit headers. `MockGateway` accepts WebSocket connections and
//! hands each one to the test as a scripted `GatewayPeer`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chat_gateway::{GatewayMessage, OpCode};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response as WsResponse,
};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Upper bound on any single wait in a test
pub const WAIT: Duration = Duration::from_secs(5);

/// Token the mock API accepts
pub const TOKEN: &str = "test-token";

/// Channel whose bucket allows one request per window
pub const LIMITED_CHANNEL: u64 = 1;
/// Channel that answers the first request with a 429
pub const THROTTLED_CHANNEL: u64 = 2;

/// Window of the limited channel's bucket
pub const RESET_AFTER: Duration = Duration::from_millis(500);
/// Retry-After sent with the throttled channel's 429
pub const RETRY_AFTER: Duration = Duration::from_millis(200);

// ============================================================================
// REST mock
// ============================================================================

/// A request seen by the mock API
#[derive(Debug, Clone)]
pub struct Hit {
    pub channel_id: u64,
    pub content: String,
    pub status: u16,
    pub at: Instant,
}

struct ApiState {
    gateway_url: String,
    hits: Mutex<Vec<Hit>>,
}

pub struct MockApi {
    pub addr: SocketAddr,
    state: Arc<ApiState>,
    _handle: JoinHandle<()>,
}

impl MockApi {
    /// Start on an ephemeral port; `/gateway/bot` advertises `gateway_url`
    pub async fn start(gateway_url: impl Into<String>) -> Result<Self> {
        let state = Arc::new(ApiState {
            gateway_url: gateway_url.into(),
            hits: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/gateway/bot", get(gateway_bot))
            .route("/channels/:channel_id/messages", post(create_message))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.state.hits.lock().clone()
    }

    pub fn hits_for(&self, channel_id: u64) -> Vec<Hit> {
        self.state
            .hits
            .lock()
            .iter()
            .filter(|h| h.channel_id == channel_id)
            .cloned()
            .collect()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bot {TOKEN}"))
}

async fn gateway_bot(State(state): State<Arc<ApiState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        let body = Json(json!({"message": "401: Unauthorized"}));
        return (StatusCode::UNAUTHORIZED, body).into_response();
    }

    Json(json!({
        "url": state.gateway_url,
        "shards": 1,
        "session_start_limit": {
            "total": 1000,
            "remaining": 999,
            "reset_after": 0,
            "max_concurrency": 1
        }
    }))
    .into_response()
}

async fn create_message(
    State(state): State<Arc<ApiState>>,
    Path(channel_id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let content = body["content"].as_str().unwrap_or_default().to_string();
    let seen = state.hits.lock().iter().filter(|h| h.channel_id == channel_id).count();

    let response = if !authorized(&headers) {
        (StatusCode::UNAUTHORIZED, Json(json!({"message": "401: Unauthorized"}))).into_response()
    } else if channel_id == LIMITED_CHANNEL {
        (
            [
                ("x-ratelimit-limit", "1".to_string()),
                ("x-ratelimit-remaining", "0".to_string()),
                ("x-ratelimit-reset-after", RESET_AFTER.as_secs_f64().to_string()),
            ],
            Json(json!({"id": "100", "content": content})),
        )
            .into_response()
    } else if channel_id == THROTTLED_CHANNEL && seen == 0 {
        (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", RETRY_AFTER.as_secs_f64().to_string())],
            Json(json!({"message": "You are being rate limited.", "global": false})),
        )
            .into_response()
    } else {
        (
            [
                ("x-ratelimit-limit", "5".to_string()),
                ("x-ratelimit-remaining", "4".to_string()),
                ("x-ratelimit-reset-after", "1.0".to_string()),
            ],
            Json(json!({"id": "100", "content": content})),
        )
            .into_response()
    };

    state.hits.lock().push(Hit {
        channel_id,
        content,
        status: response.status().as_u16(),
        at: Instant::now(),
    });
    response
}

// ============================================================================
// Gateway mock
// ============================================================================

pub struct MockGateway {
    pub addr: SocketAddr,
    peers: mpsc::UnboundedReceiver<GatewayPeer>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, peers) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                match GatewayPeer::accept(stream).await {
                    Ok(peer) => {
                        if tx.send(peer).is_err() {
                            break;
                        }
                    }
                    Err(e) => eprintln!("gateway mock handshake failed: {e}"),
                }
            }
        });

        Ok(Self {
            addr,
            peers,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait for the client's next connection
    pub async fn accept(&mut self) -> Result<GatewayPeer> {
        timeout(WAIT, self.peers.recv())
            .await
            .context("no gateway connection arrived")?
            .context("gateway mock stopped")
    }
}

/// Server side of one client connection
pub struct GatewayPeer {
    /// Request target of the upgrade, including the query
    pub uri: String,
    ws: WebSocketStream<TcpStream>,
}

impl GatewayPeer {
    async fn accept(stream: TcpStream) -> Result<Self> {
        let mut uri = String::new();
        let ws = tokio_tungstenite::accept_hdr_async(
            stream,
            |request: &Request, response: WsResponse| -> Result<WsResponse, ErrorResponse> {
                uri = request.uri().to_string();
                Ok(response)
            },
        )
        .await?;
        Ok(Self { uri, ws })
    }

    pub async fn send(&mut self, message: &GatewayMessage) -> Result<()> {
        self.ws.send(Message::Text(message.to_json()?)).await?;
        Ok(())
    }

    /// Next gateway frame from the client
    pub async fn recv(&mut self) -> Result<GatewayMessage> {
        loop {
            let frame = timeout(WAIT, self.ws.next())
                .await
                .context("client sent nothing")?
                .context("client disconnected")??;
            match frame {
                Message::Text(text) => return Ok(GatewayMessage::from_json(&text)?),
                Message::Close(frame) => bail!("client closed: {frame:?}"),
                _ => {}
            }
        }
    }

    /// Next frame with the given op code, skipping others
    pub async fn recv_op(&mut self, op: OpCode) -> Result<GatewayMessage> {
        loop {
            let message = self.recv().await?;
            if message.op == op {
                return Ok(message);
            }
        }
    }

    /// Send Hello and return the Identify or Resume that follows
    pub async fn handshake(&mut self, heartbeat_interval_ms: u64) -> Result<GatewayMessage> {
        self.send(&GatewayMessage::hello(heartbeat_interval_ms)).await?;
        loop {
            let message = self.recv().await?;
            if matches!(message.op, OpCode::Identify | OpCode::Resume) {
                return Ok(message);
            }
        }
    }

    /// Wait for the client's close frame and return its code
    pub async fn recv_close(&mut self) -> Result<Option<u16>> {
        loop {
            let frame = timeout(WAIT, self.ws.next())
                .await
                .context("client never closed")?
                .context("client dropped without a close frame")??;
            if let Message::Close(frame) = frame {
                return Ok(frame.map(|f| u16::from(f.code)));
            }
        }
    }

    /// Close from the server side with a code
    pub async fn close(&mut self, code: u16) -> Result<()> {
        self.ws
            .close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: "".into(),
            }))
            .await?;
        Ok(())
    }
}

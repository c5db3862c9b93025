//! Gateway session
//!
//! A [`GatewaySession`] is one logical session that outlives its physical
//! connections. A supervisor task dials, runs a connection to completion,
//! backs off and dials again, resuming when the server let us keep the
//! session. It stops when the session is closed or the server closes with
//! a fatal code.

use chat_core::Intents;
use chat_rest::RequestDispatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::connection::{
    self, BackoffConfig, ConnectionEnd, ConnectionPhase, ReconnectBackoff, SessionState,
};
use crate::error::{GatewayError, GatewayResult};
use crate::events::EventHandler;
use crate::protocol::IdentifyProperties;

/// Gateway API version the session speaks
pub const GATEWAY_VERSION: u8 = 10;

/// Tunables for a gateway session
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub version: u8,
    pub properties: IdentifyProperties,
    pub connect_timeout: Duration,
    /// How long to wait for Hello after the socket opens
    pub hello_timeout: Duration,
    /// How long `close` waits for the connection to wind down
    pub close_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            version: GATEWAY_VERSION,
            properties: IdentifyProperties::default(),
            connect_timeout: Duration::from_secs(30),
            hello_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(1),
            backoff: BackoffConfig::default(),
        }
    }
}

/// How the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Closed,
    /// The server closed with a code that forbids reconnecting
    Fatal(u16),
}

/// Everything a connection needs from its session
pub(crate) struct SessionShared {
    pub token: String,
    pub intents: Intents,
    pub options: GatewayOptions,
    pub state: Arc<SessionState>,
    pub handler: Arc<dyn EventHandler>,
}

/// Handle to a running gateway session
pub struct GatewaySession {
    state: Arc<SessionState>,
    close_timeout: Duration,
    shutdown: watch::Sender<bool>,
    finished: watch::Receiver<Option<SessionOutcome>>,
}

impl GatewaySession {
    /// Discover the gateway URL over REST, then start the session
    pub async fn connect(
        dispatcher: &RequestDispatcher,
        token: impl Into<String>,
        intents: Intents,
        handler: Arc<dyn EventHandler>,
        options: GatewayOptions,
    ) -> GatewayResult<Self> {
        let info = dispatcher.get_gateway_bot().await?;
        if info.session_start_limit.is_exhausted() {
            tracing::warn!(
                reset_after_ms = info.session_start_limit.reset_after,
                "Session start limit exhausted, identify may be rejected"
            );
        }
        Ok(Self::connect_to(info.url, token, intents, handler, options))
    }

    /// Start a session against a known gateway URL
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_to(
        url: impl Into<String>,
        token: impl Into<String>,
        intents: Intents,
        handler: Arc<dyn EventHandler>,
        options: GatewayOptions,
    ) -> Self {
        let state = Arc::new(SessionState::new());
        let close_timeout = options.close_timeout;
        let url = gateway_url(&url.into(), options.version);

        let shared = SessionShared {
            token: token.into(),
            intents,
            options,
            state: Arc::clone(&state),
            handler,
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (finished_tx, finished) = watch::channel(None);

        tracing::info!(url = %url, intents = %intents, "Starting gateway session");
        tokio::spawn(async move {
            let outcome = supervise(&shared, &url, shutdown_rx).await;
            shared.state.set_phase(ConnectionPhase::Disconnected);
            finished_tx.send_replace(Some(outcome));
        });

        Self {
            state,
            close_timeout,
            shutdown,
            finished,
        }
    }

    /// Stop the session, closing the connection normally
    ///
    /// Waits at most the configured close timeout. Calling it again is a
    /// no-op.
    pub async fn close(&self) {
        if self.state.deactivate() {
            tracing::info!("Closing gateway session");
        }
        self.shutdown.send_replace(true);

        let mut finished = self.finished.clone();
        let wait = finished.wait_for(Option::is_some);
        if tokio::time::timeout(self.close_timeout, wait).await.is_err() {
            tracing::debug!("Gateway session did not stop within the close timeout");
        }
    }

    /// Wait until the session stops for good
    pub async fn wait_closed(&self) -> GatewayResult<()> {
        let mut finished = self.finished.clone();
        let outcome = match finished.wait_for(Option::is_some).await {
            Ok(outcome) => *outcome,
            Err(_) => Some(SessionOutcome::Closed),
        };
        match outcome {
            Some(SessionOutcome::Fatal(code)) => Err(GatewayError::FatalClose(code)),
            _ => Ok(()),
        }
    }

    /// How the session ended, if it has
    pub fn outcome(&self) -> Option<SessionOutcome> {
        *self.finished.borrow()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.state.phase()
    }

    pub fn sequence(&self) -> u64 {
        self.state.sequence()
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.session_id()
    }

    pub fn last_heartbeat_ack(&self) -> Option<Instant> {
        self.state.last_heartbeat_ack()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        self.state.deactivate();
        self.shutdown.send_replace(true);
    }
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("phase", &self.state.phase())
            .field("sequence", &self.state.sequence())
            .field("active", &self.state.is_active())
            .finish_non_exhaustive()
    }
}

/// Reconnect loop
async fn supervise(
    shared: &SessionShared,
    url: &str,
    mut shutdown: watch::Receiver<bool>,
) -> SessionOutcome {
    let mut backoff = ReconnectBackoff::new(shared.options.backoff);

    loop {
        if !shared.state.is_active() || *shutdown.borrow() {
            return SessionOutcome::Closed;
        }

        if let Some(delay) = backoff.delay_before(Instant::now()) {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Backing off before reconnect");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return SessionOutcome::Closed,
            }
        }
        backoff.attempt_started(Instant::now());

        let target = match shared.state.resume_url().filter(|_| shared.state.can_resume()) {
            Some(resume_url) => gateway_url(&resume_url, shared.options.version),
            None => url.to_string(),
        };

        match connection::run(shared, &target, &mut shutdown).await {
            Ok(ConnectionEnd::Shutdown) => return SessionOutcome::Closed,
            Ok(ConnectionEnd::Fatal(code)) => {
                shared.state.deactivate();
                tracing::error!(code, "Gateway session ended by fatal close code");
                return SessionOutcome::Fatal(code);
            }
            Ok(ConnectionEnd::Reconnect(reason)) => {
                tracing::info!(
                    reason,
                    resumable = shared.state.can_resume(),
                    "Reconnecting to gateway"
                );
            }
            Err(e) if !e.is_recoverable() => {
                shared.state.deactivate();
                tracing::error!(error = %e, "Gateway session ended before the handshake");
                return match e {
                    GatewayError::FatalClose(code) => SessionOutcome::Fatal(code),
                    _ => SessionOutcome::Closed,
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, "Gateway connection attempt failed");
            }
        }

        backoff.attempt_finished();
    }
}

/// Append the version and encoding query unless the URL carries one
pub fn gateway_url(base: &str, version: u8) -> String {
    if base.contains('?') {
        return base.to_string();
    }
    format!("{}/?v={version}&encoding=json", base.trim_end_matches('/'))
}

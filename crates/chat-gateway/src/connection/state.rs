//! Session state shared by the receive loop and the heartbeat monitor
//!
//! The receive loop writes the sequence, session id and acknowledgment
//! time; the heartbeat monitor reads them. Scalars are atomics, the rest
//! sit behind short `parking_lot` locks that are never held across an
//! await.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::time::Instant;

/// Lifecycle of the current physical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionPhase {
    Disconnected,
    /// Dialing the gateway
    Connecting,
    /// Socket open, waiting for Hello
    AwaitingHello,
    /// Identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for RESUMED
    Resuming,
    Connected,
    Closing,
}

impl ConnectionPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::Closing => "closing",
        }
    }
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical session state, surviving reconnects
#[derive(Debug)]
pub struct SessionState {
    sequence: AtomicU64,
    session_id: RwLock<Option<String>>,
    resume_url: RwLock<Option<String>>,
    last_heartbeat_ack: Mutex<Option<Instant>>,
    last_heartbeat_sent: Mutex<Option<Instant>>,
    phase: RwLock<ConnectionPhase>,
    active: AtomicBool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
            session_id: RwLock::new(None),
            resume_url: RwLock::new(None),
            last_heartbeat_ack: Mutex::new(None),
            last_heartbeat_sent: Mutex::new(None),
            phase: RwLock::new(ConnectionPhase::Disconnected),
            active: AtomicBool::new(true),
        }
    }

    // === Sequence ===

    /// Last sequence number received, 0 if none
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Record a dispatch sequence; the stored value never decreases
    ///
    /// Returns the sequence after the update.
    pub fn record_sequence(&self, seq: u64) -> u64 {
        self.sequence.fetch_max(seq, Ordering::AcqRel).max(seq)
    }

    // === Session identity ===

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Resume URL announced by READY, if any
    pub fn resume_url(&self) -> Option<String> {
        self.resume_url.read().clone()
    }

    /// Store the identity from a READY event
    pub fn set_session(&self, session_id: String, resume_url: Option<String>) {
        *self.session_id.write() = Some(session_id);
        *self.resume_url.write() = resume_url;
    }

    /// Forget the session so the next connection identifies fresh
    pub fn invalidate(&self) {
        *self.session_id.write() = None;
        *self.resume_url.write() = None;
        self.sequence.store(0, Ordering::Release);
    }

    /// Resume is possible once a sequence and a session id are held
    pub fn can_resume(&self) -> bool {
        self.sequence() != 0 && self.session_id.read().is_some()
    }

    // === Heartbeat bookkeeping ===

    pub fn last_heartbeat_ack(&self) -> Option<Instant> {
        *self.last_heartbeat_ack.lock()
    }

    pub fn record_heartbeat_ack(&self, at: Instant) {
        *self.last_heartbeat_ack.lock() = Some(at);
    }

    pub fn last_heartbeat_sent(&self) -> Option<Instant> {
        *self.last_heartbeat_sent.lock()
    }

    pub fn record_heartbeat_sent(&self, at: Instant) {
        *self.last_heartbeat_sent.lock() = Some(at);
    }

    /// Clear heartbeat timestamps before a new connection starts its monitor
    pub fn reset_heartbeat(&self) {
        *self.last_heartbeat_ack.lock() = None;
        *self.last_heartbeat_sent.lock() = None;
    }

    // === Lifecycle ===

    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.read()
    }

    pub fn set_phase(&self, phase: ConnectionPhase) {
        let previous = std::mem::replace(&mut *self.phase.write(), phase);
        if previous != phase {
            tracing::debug!(from = %previous, to = %phase, "Gateway phase changed");
        }
    }

    /// False once the session was closed or hit a fatal close code
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark inactive; returns whether this call changed anything
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }
}

//! Heartbeat monitor
//!
//! Runs beside the receive loop once Hello supplied the interval. Each tick
//! first checks that the server acknowledged recent heartbeats, then sends
//! the next one. The monitor never closes the socket itself: it returns why
//! it stopped and the connection driver acts on that.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::connection::Outbound;
use super::state::SessionState;
use crate::protocol::GatewayMessage;

/// Why the monitor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// Asked to stop by the connection
    Stopped,
    /// No acknowledgment within an interval; the connection is dead
    Zombied,
    /// The writer is gone
    SendFailed,
}

pub struct HeartbeatMonitor {
    interval: Duration,
    state: Arc<SessionState>,
    outbound: mpsc::Sender<Outbound>,
}

impl HeartbeatMonitor {
    pub(crate) fn new(
        interval: Duration,
        state: Arc<SessionState>,
        outbound: mpsc::Sender<Outbound>,
    ) -> Self {
        Self {
            interval,
            state,
            outbound,
        }
    }

    /// Start on its own task; stops when `stop` flips or its sender drops
    pub fn spawn(self, stop: watch::Receiver<bool>) -> JoinHandle<HeartbeatExit> {
        tokio::spawn(self.run(stop))
    }

    async fn run(self, mut stop: watch::Receiver<bool>) -> HeartbeatExit {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.changed() => return HeartbeatExit::Stopped,
            }

            let now = Instant::now();
            if self.is_zombied(now) {
                tracing::warn!(
                    interval_ms = self.interval.as_millis() as u64,
                    "No heartbeat acknowledgment within interval, connection is zombied"
                );
                return HeartbeatExit::Zombied;
            }

            let seq = self.state.sequence();
            self.state.record_heartbeat_sent(now);
            if self
                .outbound
                .send(Outbound::Frame(GatewayMessage::heartbeat(seq)))
                .await
                .is_err()
            {
                tracing::warn!("Heartbeat send failed, writer closed");
                return HeartbeatExit::SendFailed;
            }
            tracing::trace!(seq, "Heartbeat sent");
        }
    }

    /// Dead if the last ack is older than one interval, or if the last
    /// heartbeat has not been acknowledged at all
    fn is_zombied(&self, now: Instant) -> bool {
        let last_ack = self.state.last_heartbeat_ack();

        if let Some(ack) = last_ack {
            if now.saturating_duration_since(ack) > self.interval {
                return true;
            }
        }

        match self.state.last_heartbeat_sent() {
            Some(sent) => last_ack.map_or(true, |ack| ack < sent),
            None => false,
        }
    }
}

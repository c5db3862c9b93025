//! Per-route rate-limit bucket and its drain loop
//!
//! Producers only append to a bucket's queue. A single drain task per
//! bucket, started lazily on admission, executes the queue head by head and
//! is the only writer of the quota counters. It exits when the queue runs
//! empty; the counters stay on the bucket for the next drain task.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};

use super::headers::RateLimitHeaders;
use super::retry::RetryPolicy;
use crate::error::{RestError, RestResult};
use crate::request::{RestRequest, RestResponse};
use crate::route::BucketKey;
use crate::transport::HttpTransport;

/// Sending half of a request's result slot
pub type ResponseSender = oneshot::Sender<RestResult<RestResponse>>;

/// Receiving half of a request's result slot
pub type ResponseReceiver = oneshot::Receiver<RestResult<RestResponse>>;

/// Wait applied after a 429 that reported no timing at all
const THROTTLE_FALLBACK: Duration = Duration::from_secs(1);

/// Last known quota of a bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
    /// Set once any response reported a remaining count
    pub observed: bool,
}

impl Quota {
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.observed && self.remaining == 0
    }

    /// Fold in the headers of any response, whatever its status
    fn observe(&mut self, headers: &RateLimitHeaders) {
        if let Some(limit) = headers.limit {
            self.limit = limit;
        }
        if let Some(reset_after) = headers.reset_after {
            self.reset_after = reset_after;
        }
        if let Some(remaining) = headers.remaining {
            self.remaining = remaining;
            self.observed = true;
        }
    }

    /// Force a wait before the next attempt after a 429
    fn throttle(&mut self, headers: &RateLimitHeaders) {
        self.reset_after = match headers.retry_after.max(headers.reset_after) {
            Some(wait) => wait,
            None if self.reset_after.is_zero() => THROTTLE_FALLBACK,
            None => self.reset_after,
        };
        self.remaining = 0;
        self.observed = true;
    }
}

struct Pending {
    request: RestRequest,
    reply: ResponseSender,
    failures: u32,
}

struct BucketState {
    queue: VecDeque<Pending>,
    quota: Quota,
    draining: bool,
}

/// Everything a drain task needs besides its bucket
#[derive(Clone)]
pub(crate) struct DrainContext {
    pub transport: Arc<dyn HttpTransport>,
    pub retry: RetryPolicy,
    pub shutdown: watch::Receiver<bool>,
}

/// FIFO queue of requests sharing one server-side quota
pub struct Bucket {
    key: BucketKey,
    state: Mutex<BucketState>,
}

impl Bucket {
    pub fn new(key: BucketKey) -> Self {
        Self {
            key,
            state: Mutex::new(BucketState {
                queue: VecDeque::new(),
                quota: Quota::default(),
                draining: false,
            }),
        }
    }

    pub fn key(&self) -> &BucketKey {
        &self.key
    }

    /// Snapshot of the quota counters
    pub fn quota(&self) -> Quota {
        self.state.lock().quota
    }

    /// Requests waiting, including the one in flight
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_draining(&self) -> bool {
        self.state.lock().draining
    }

    /// Append a request and make sure a drain task is running
    pub(crate) fn admit(
        self: &Arc<Self>,
        request: RestRequest,
        reply: ResponseSender,
        ctx: &DrainContext,
    ) {
        let stopping = *ctx.shutdown.borrow();
        if stopping {
            let _ = reply.send(Err(RestError::Shutdown));
            return;
        }

        let start = {
            let mut state = self.state.lock();
            state.queue.push_back(Pending {
                request,
                reply,
                failures: 0,
            });
            !std::mem::replace(&mut state.draining, true)
        };

        if start {
            tracing::debug!(bucket = %self.key, "Starting drain task");
            tokio::spawn(Arc::clone(self).drain(ctx.clone()));
        }
    }

    async fn drain(self: Arc<Self>, mut ctx: DrainContext) {
        loop {
            let stopping = *ctx.shutdown.borrow();
            if stopping {
                self.fail_queued();
                return;
            }

            let (request, wait) = {
                let mut state = self.state.lock();
                let Some(request) = state.queue.front().map(|head| head.request.clone()) else {
                    state.draining = false;
                    tracing::debug!(bucket = %self.key, "Queue empty, drain task exiting");
                    return;
                };
                let wait = state.quota.is_exhausted().then_some(state.quota.reset_after);
                (request, wait)
            };

            if let Some(wait) = wait {
                tracing::debug!(
                    bucket = %self.key,
                    wait_ms = wait.as_millis() as u64,
                    "Quota exhausted, waiting for reset"
                );
                if !sleep_unless_shutdown(wait, &mut ctx.shutdown).await {
                    continue;
                }
                let mut state = self.state.lock();
                state.quota.remaining = state.quota.limit;
            }

            {
                let mut state = self.state.lock();
                state.quota.remaining = state.quota.remaining.saturating_sub(1);
            }

            match ctx.transport.execute(&request).await {
                Err(err) => self.handle_failure(err, &mut ctx).await,
                Ok(response) => {
                    let headers = RateLimitHeaders::parse(&response.headers);
                    let throttled = response.is_rate_limited();
                    {
                        let mut state = self.state.lock();
                        state.quota.observe(&headers);
                        if throttled {
                            state.quota.throttle(&headers);
                        }
                    }

                    if throttled {
                        tracing::warn!(
                            bucket = %self.key,
                            global = headers.global,
                            retry_after_ms = headers.retry_after.map(|d| d.as_millis() as u64),
                            "Rate limited, request stays queued"
                        );
                        continue;
                    }

                    self.deliver(Ok(response));
                }
            }
        }
    }

    /// Keep the head queued for another attempt, or fail it once the
    /// retry budget is spent
    async fn handle_failure(&self, err: RestError, ctx: &mut DrainContext) {
        let failures = {
            let mut state = self.state.lock();
            let Some(head) = state.queue.front_mut() else {
                return;
            };
            head.failures += 1;
            head.failures
        };

        if err.is_transport() && ctx.retry.should_retry(failures) {
            let delay = ctx.retry.delay_for(failures);
            tracing::warn!(
                bucket = %self.key,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "REST transport failure, retrying"
            );
            sleep_unless_shutdown(delay, &mut ctx.shutdown).await;
        } else {
            tracing::error!(
                bucket = %self.key,
                attempts = failures,
                error = %err,
                "REST request failed permanently"
            );
            self.deliver(Err(RestError::RetriesExhausted {
                attempts: failures,
                last_error: err.to_string(),
            }));
        }
    }

    /// Pop the head and hand it its terminal outcome
    fn deliver(&self, outcome: RestResult<RestResponse>) {
        let head = self.state.lock().queue.pop_front();
        if let Some(head) = head {
            if head.reply.send(outcome).is_err() {
                tracing::debug!(bucket = %self.key, "Caller dropped its response receiver");
            }
        }
    }

    fn fail_queued(&self) {
        let pending: Vec<Pending> = {
            let mut state = self.state.lock();
            state.draining = false;
            state.queue.drain(..).collect()
        };

        if !pending.is_empty() {
            tracing::debug!(
                bucket = %self.key,
                count = pending.len(),
                "Failing queued requests on shutdown"
            );
        }
        for request in pending {
            let _ = request.reply.send(Err(RestError::Shutdown));
        }
    }
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Bucket")
            .field("key", &self.key)
            .field("quota", &state.quota)
            .field("queued", &state.queue.len())
            .field("draining", &state.draining)
            .finish()
    }
}

/// Sleep for `delay`; false if shutdown was signalled first
async fn sleep_unless_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => true,
        Ok(_) = shutdown.wait_for(|stop| *stop) => false,
    }
}

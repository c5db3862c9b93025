//! Bucket registry
//!
//! Maps bucket keys to buckets. Creation on first use goes through the
//! `DashMap` entry API so concurrent first requests on a route end up in the
//! same bucket.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

use super::bucket::{Bucket, DrainContext, ResponseReceiver};
use super::retry::RetryPolicy;
use crate::request::RestRequest;
use crate::route::BucketKey;
use crate::transport::HttpTransport;

/// Shared map of buckets plus the drain context handed to their tasks
pub struct BucketRegistry {
    buckets: DashMap<BucketKey, Arc<Bucket>>,
    context: DrainContext,
    shutdown: watch::Sender<bool>,
}

impl BucketRegistry {
    pub fn new(transport: Arc<dyn HttpTransport>, retry: RetryPolicy) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        Self {
            buckets: DashMap::new(),
            context: DrainContext {
                transport,
                retry,
                shutdown: shutdown_rx,
            },
            shutdown,
        }
    }

    /// Get or atomically create the bucket for a key
    pub fn bucket(&self, key: &BucketKey) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(bucket.value());
        }

        let bucket = self
            .buckets
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::debug!(bucket = %key, "Creating rate-limit bucket");
                Arc::new(Bucket::new(key.clone()))
            });
        Arc::clone(bucket.value())
    }

    pub fn get(&self, key: &BucketKey) -> Option<Arc<Bucket>> {
        self.buckets.get(key).map(|b| Arc::clone(b.value()))
    }

    /// Queue a request on its bucket
    pub fn admit(&self, request: RestRequest) -> ResponseReceiver {
        let (reply, receiver) = oneshot::channel();
        let bucket = self.bucket(&request.bucket_key());
        bucket.admit(request, reply, &self.context);
        receiver
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Stop all drain tasks; queued and later requests fail with `Shutdown`
    pub fn shutdown(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!(buckets = self.buckets.len(), "REST dispatcher shutting down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl std::fmt::Debug for BucketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketRegistry")
            .field("buckets", &self.buckets.len())
            .field("retry", &self.context.retry)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

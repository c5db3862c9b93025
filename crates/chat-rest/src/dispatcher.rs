//! Request dispatcher
//!
//! Front door of the REST client: routes each request to its bucket and
//! hands back the result slot. Cloning is cheap; clones share buckets.

use chat_core::GatewayBotInfo;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::{RestError, RestResult};
use crate::ratelimit::{BucketRegistry, ResponseReceiver, RetryPolicy};
use crate::request::{RestRequest, RestResponse};
use crate::route::Route;
use crate::transport::{HttpTransport, ReqwestTransport, TransportOptions};

/// Settings for a [`RequestDispatcher`]
#[derive(Debug, Clone, Default)]
pub struct RestOptions {
    pub transport: TransportOptions,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    registry: Arc<BucketRegistry>,
}

impl RequestDispatcher {
    /// Dispatcher over the production HTTP transport
    pub fn new(token: &str, options: RestOptions) -> RestResult<Self> {
        let transport = ReqwestTransport::new(token, &options.transport)?;
        Ok(Self::with_transport(Arc::new(transport), options.retry))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, retry: RetryPolicy) -> Self {
        Self {
            registry: Arc::new(BucketRegistry::new(transport, retry)),
        }
    }

    /// Queue a request and return its result slot
    ///
    /// The slot receives exactly one outcome: the first non-429 response,
    /// or the error that ended the request.
    pub fn enqueue(&self, request: RestRequest) -> ResponseReceiver {
        tracing::trace!(method = %request.method, path = %request.route, "Enqueue REST request");
        self.registry.admit(request)
    }

    /// Queue a request and wait for its outcome
    pub async fn execute(&self, request: RestRequest) -> RestResult<RestResponse> {
        self.enqueue(request).await.map_err(|_| RestError::Cancelled)?
    }

    /// Execute, require a 2xx status, and decode the JSON body
    pub async fn execute_json<T: DeserializeOwned>(&self, request: RestRequest) -> RestResult<T> {
        self.execute(request).await?.error_for_status()?.json()
    }

    /// Gateway endpoint discovery
    pub async fn get_gateway_bot(&self) -> RestResult<GatewayBotInfo> {
        let info: GatewayBotInfo = self.execute_json(RestRequest::get(Route::gateway_bot())).await?;
        tracing::debug!(
            url = %info.url,
            shards = info.shards,
            sessions_remaining = info.session_start_limit.remaining,
            "Gateway endpoint discovered"
        );
        Ok(info)
    }

    pub fn registry(&self) -> &BucketRegistry {
        &self.registry
    }

    /// Stop all buckets; see [`BucketRegistry::shutdown`]
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}

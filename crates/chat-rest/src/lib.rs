//! REST client
//!
//! Requests are grouped into rate-limit buckets keyed by route. Each bucket
//! serializes its requests in admission order and respects the quota the
//! platform reports through response headers:
//!
//! - [`Route`] / [`BucketKey`]: path builder and bucket derivation
//! - [`RequestDispatcher`]: enqueue requests, await responses
//! - [`BucketRegistry`] / [`Bucket`]: per-route queues and drain tasks
//! - [`HttpTransport`]: the network seam, implemented by [`ReqwestTransport`]

pub mod dispatcher;
pub mod error;
pub mod ratelimit;
pub mod request;
pub mod route;
pub mod transport;


pub use dispatcher::{RequestDispatcher, RestOptions};
pub use error::{RestError, RestResult};
pub use ratelimit::{Bucket, BucketRegistry, Quota, RateLimitHeaders, ResponseReceiver, RetryPolicy};
pub use request::{RestRequest, RestResponse};
pub use route::{BucketKey, Route};
pub use transport::{HttpTransport, ReqwestTransport, TransportOptions};

// Re-exported so callers can build requests without a direct reqwest dependency
pub use reqwest::{Method, StatusCode};

//! Rate limiting: per-route buckets drained by one task each

mod bucket;
mod headers;
mod registry;
mod retry;

pub use bucket::{Bucket, Quota, ResponseReceiver, ResponseSender};
pub use headers::RateLimitHeaders;
pub use registry::BucketRegistry;
pub use retry::RetryPolicy;

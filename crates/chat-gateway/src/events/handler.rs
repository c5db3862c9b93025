//! Event handler seam
//!
//! Every Dispatch frame is handed to an [`EventHandler`] with its event name
//! and raw payload. Handlers run inline on the receive loop, so anything slow
//! should be moved onto a task of its own.

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn on_event(&self, event: &str, data: &Value);
}

/// Adapter for plain closures
pub struct HandlerFn<F>(pub F);

#[async_trait]
impl<F> EventHandler for HandlerFn<F>
where
    F: Fn(&str, &Value) + Send + Sync + 'static,
{
    async fn on_event(&self, event: &str, data: &Value) {
        (self.0)(event, data);
    }
}

/// Wrap a closure as an [`EventHandler`]
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&str, &Value) + Send + Sync + 'static,
{
    HandlerFn(f)
}

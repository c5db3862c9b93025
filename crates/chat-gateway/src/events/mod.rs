//! Gateway events

mod event_types;
mod handler;

pub use event_types::GatewayEventType;
pub use handler::{handler_fn, EventHandler, HandlerFn};

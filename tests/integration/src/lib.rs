//! Integration test utilities for the chat client
//!
//! In-process mock servers for the REST API and the gateway, plus payload
//! fixtures, so the client can be driven end to end over real sockets.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;

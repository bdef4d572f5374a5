//! NATS plumbing: connection setup, authentication, and the per-operation
//! client traits the bridge is generic over.
//!
//! Depend only on the operations you need:
//!
//! ```rust,ignore
//! pub struct Router<P: PublishClient> { client: P }
//! ```

pub mod auth;
pub mod client;
pub mod connect;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use auth::{NatsAuth, NatsConfig};
pub use client::{FlushClient, NatsMessages, PublishClient, SubscribeClient};
pub use connect::{ConnectError, connect};

#[cfg(any(test, feature = "test-support"))]
pub use mocks::{MockError, MockNatsClient};

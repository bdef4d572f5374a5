//! # nats-http-connector
//!
//! Bridges a NATS subject to a synchronous HTTP service.
//!
//! ```text
//! NATS  TOPIC ──► [Bridge] ──► HTTP_ENDPOINT (POST, raw payload)
//!                    │
//!                    ├── body  ──► RESPONSE_TOPIC (when configured)
//!                    └── error ──► ERROR_TOPIC
//! ```
//!
//! Every message is forwarded once and its outcome published once. HTTP
//! status codes are passed through untouched: a `500` response body lands on
//! the response topic just like a `200`. Only transport failures (refused
//! connections, timeouts, unreadable bodies) go to the error topic.
//!
//! ## Testing without NATS
//!
//! The bridge is generic over the per-operation client traits in [`nats`], so
//! tests can swap in [`nats::MockNatsClient`] (feature `test-support`):
//!
//! ```rust,ignore
//! let mock = MockNatsClient::new();
//! let bridge = Bridge::new(mock.clone(), &connector, forwarder, BridgeSettings::default());
//! let subscription = bridge.subscribe().await?;
//! mock.deliver("events", "hello");
//! mock.end_subscription();
//! subscription.run(std::future::pending()).await;
//! assert_eq!(mock.published_subjects(), vec!["acks"]);
//! ```

pub mod bridge;
pub mod config;
pub mod env;
pub mod error;
pub mod forwarder;
pub mod message;
pub mod nats;
pub mod router;

#[cfg(test)]
mod test_support;

pub use bridge::{Bridge, RunSummary, Subscription};
pub use config::{BridgeSettings, Config, ConnectorConfig, HttpSettings};
pub use error::{BridgeError, ConfigError, ForwardError, error_chain};
pub use forwarder::{ForwardOutcome, RequestForwarder};
pub use message::InboundMessage;
pub use router::ResultRouter;

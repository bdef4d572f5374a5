//! Publishes forwarding outcomes back to NATS.

use bytes::Bytes;
use reqwest::Url;
use tracing::{debug, error};

use crate::config::ConnectorConfig;
use crate::error::error_chain;
use crate::forwarder::ForwardOutcome;
use crate::nats::PublishClient;

/// Routes each [`ForwardOutcome`] to exactly one topic, or to none.
///
/// A failed publish is logged and dropped. It is never retried and never
/// rerouted to the error topic.
#[derive(Clone)]
pub struct ResultRouter<P: PublishClient> {
    client: P,
    response_topic: Option<String>,
    error_topic: String,
    source_name: String,
    http_endpoint: Url,
}

impl<P: PublishClient> ResultRouter<P> {
    pub fn new(client: P, connector: &ConnectorConfig) -> Self {
        Self {
            client,
            response_topic: connector.response_topic().map(str::to_string),
            error_topic: connector.error_topic().to_string(),
            source_name: connector.source_name().to_string(),
            http_endpoint: connector.http_endpoint().clone(),
        }
    }

    pub async fn route(&self, outcome: ForwardOutcome) {
        match outcome {
            ForwardOutcome::Success(body) => match &self.response_topic {
                Some(topic) => self.publish(topic, body).await,
                None => debug!(
                    bytes = body.len(),
                    "No response topic configured, dropping response body"
                ),
            },
            ForwardOutcome::Failure(err) => {
                let description = error_chain(&err);
                self.publish(&self.error_topic, Bytes::from(description))
                    .await;
            }
        }
    }

    async fn publish(&self, topic: &str, payload: Bytes) {
        let bytes = payload.len();
        match self.client.publish(topic.to_string(), payload).await {
            Ok(()) => debug!(topic, bytes, "Published outcome"),
            Err(e) => error!(
                topic,
                source_name = %self.source_name,
                http_endpoint = %self.http_endpoint,
                error = %e,
                "Failed to publish to NATS"
            ),
        }
    }
}

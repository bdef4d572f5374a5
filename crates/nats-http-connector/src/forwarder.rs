//! Sends inbound messages to the HTTP endpoint.
//!
//! The request is fully determined by configuration except for its body,
//! which is the message payload untouched. The response status is logged but
//! never interpreted: any response whose body could be read is a success.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, Url};
use tracing::{debug, instrument, warn};

use crate::config::{ConnectorConfig, HttpSettings};
use crate::error::{ConfigError, ForwardError};
use crate::message::InboundMessage;

pub const HEADER_TOPIC: &str = "Topic";
pub const HEADER_RESP_TOPIC: &str = "RespTopic";
pub const HEADER_ERROR_TOPIC: &str = "ErrorTopic";
pub const HEADER_SOURCE_NAME: &str = "Source-Name";

/// Result of forwarding one message. Consumed by [`crate::router::ResultRouter`].
#[derive(Debug)]
pub enum ForwardOutcome {
    /// The endpoint answered and its full body was read. Any status code.
    Success(Bytes),
    /// The request could not be completed.
    Failure(ForwardError),
}

#[derive(Debug, Clone)]
pub struct RequestForwarder {
    http_client: ReqwestClient,
    method: Method,
    endpoint: Url,
    headers: HeaderMap,
    timeout: Duration,
}

impl RequestForwarder {
    /// Fails if a configured value cannot be sent as an HTTP header.
    pub fn new(
        http_client: ReqwestClient,
        connector: &ConnectorConfig,
        http: &HttpSettings,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            http_client,
            method: http.method.clone(),
            endpoint: connector.http_endpoint().clone(),
            headers: forwarding_headers(connector)?,
            timeout: http.timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[instrument(
        name = "connector.forward",
        skip(self, message),
        fields(topic = %message.topic, bytes = message.payload.len(), method = %self.method)
    )]
    pub async fn forward(&self, message: &InboundMessage) -> ForwardOutcome {
        match self.send(message).await {
            Ok(body) => ForwardOutcome::Success(body),
            Err(e) => {
                warn!(error = %e, endpoint = %self.endpoint, "Forwarding message failed");
                ForwardOutcome::Failure(e)
            }
        }
    }

    async fn send(&self, message: &InboundMessage) -> Result<Bytes, ForwardError> {
        let response = self
            .http_client
            .request(self.method.clone(), self.endpoint.clone())
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .body(message.payload.clone())
            .send()
            .await
            .map_err(|e| self.classify(e, ForwardError::Transport))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Endpoint responded");

        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(e, ForwardError::Body))?;

        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            "Read endpoint response body"
        );
        Ok(body)
    }

    fn classify(
        &self,
        source: reqwest::Error,
        otherwise: fn(reqwest::Error) -> ForwardError,
    ) -> ForwardError {
        if source.is_timeout() {
            ForwardError::Timeout {
                timeout: self.timeout,
                source,
            }
        } else {
            otherwise(source)
        }
    }
}

fn forwarding_headers(connector: &ConnectorConfig) -> Result<HeaderMap, ConfigError> {
    let pairs = [
        (HeaderName::from_static("topic"), HEADER_TOPIC, connector.topic()),
        (
            HeaderName::from_static("resptopic"),
            HEADER_RESP_TOPIC,
            connector.response_topic_raw(),
        ),
        (
            HeaderName::from_static("errortopic"),
            HEADER_ERROR_TOPIC,
            connector.error_topic(),
        ),
        (CONTENT_TYPE, "Content-Type", connector.content_type()),
        (
            HeaderName::from_static("source-name"),
            HEADER_SOURCE_NAME,
            connector.source_name(),
        ),
    ];

    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, label, value) in pairs {
        let value = HeaderValue::from_str(value)
            .map_err(|source| ConfigError::InvalidHeader { header: label, source })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
#[path = "forwarder_tests.rs"]
mod forwarder_tests;

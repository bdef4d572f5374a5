//! Error types for the connector.
//!
//! Startup errors ([`ConfigError`], [`BridgeError`], [`crate::nats::ConnectError`])
//! are fatal. [`ForwardError`] is per message and ends up on the error topic.

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    EmptyValue(&'static str),

    #[error("{0}=true is not supported by the NATS connector")]
    UnsupportedFeature(&'static str),

    #[error("{field} contains invalid character: {ch:?}")]
    InvalidSubject { field: &'static str, ch: char },

    #[error("{field}={subject:?} contains an empty token")]
    EmptySubjectToken {
        field: &'static str,
        subject: String,
    },

    #[error("{field} is not a valid http(s) URL: {value:?} ({reason})")]
    InvalidEndpoint {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{header} header value is not valid")]
    InvalidHeader {
        header: &'static str,
        #[source]
        source: reqwest::header::InvalidHeaderValue,
    },

    #[error("{field}={value:?} is not a valid HTTP method")]
    InvalidMethod { field: &'static str, value: String },

    #[error("{field}={value:?} must be an integer >= {min}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        min: u64,
    },
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("HTTP request failed")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP request timed out after {timeout:?}")]
    Timeout {
        timeout: Duration,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read HTTP response body")]
    Body(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to subscribe to {topic}")]
    Subscribe {
        topic: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

/// Renders an error and all of its sources as `outer: inner: root`.
///
/// This is the text published to the error topic, so consumers see the root
/// cause (e.g. `Connection refused`) and not only the outermost wrapper.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        // Some libraries repeat their source in their own Display.
        if !text.ends_with(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

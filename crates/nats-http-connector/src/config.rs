//! Connector configuration, loaded from the environment with optional CLI
//! overrides.
//!
//! | Variable                    | Default               | Description                              |
//! |-----------------------------|-----------------------|------------------------------------------|
//! | `HOST`                      | required              | NATS server address(es), comma separated |
//! | `TOPIC`                     | required              | Subject to consume                       |
//! | `ERROR_TOPIC`               | required              | Subject for forwarding failures          |
//! | `RESPONSE_TOPIC`            | empty (drop)          | Subject for HTTP response bodies         |
//! | `HTTP_ENDPOINT`             | required              | URL every message is sent to             |
//! | `CONTENT_TYPE`              | `application/json`    | Outgoing `Content-Type`                  |
//! | `SOURCE_NAME`               | `nats-http-connector` | Outgoing `Source-Name`                   |
//! | `INCLUDE_UNACKED`           | unset                 | `true` is rejected                       |
//! | `HTTP_METHOD`               | `POST`                | Outgoing HTTP method                     |
//! | `HTTP_TIMEOUT_SECS`         | `30`                  | Whole-request timeout                    |
//! | `CONNECTOR_CONCURRENCY`     | `1`                   | Messages handled at once                 |
//! | `SHUTDOWN_GRACE_SECS`       | `30`                  | Drain deadline on shutdown               |
//! | `NATS_CONNECT_TIMEOUT_SECS` | `10`                  | First connection timeout                 |

use std::time::Duration;

use clap::Parser;
use reqwest::{Method, Url};

use crate::env::ReadEnv;
use crate::error::ConfigError;
use crate::nats::auth::parse_servers;
use crate::nats::{NatsAuth, NatsConfig};

const ENV_HOST: &str = "HOST";
const ENV_TOPIC: &str = "TOPIC";
const ENV_RESPONSE_TOPIC: &str = "RESPONSE_TOPIC";
const ENV_ERROR_TOPIC: &str = "ERROR_TOPIC";
const ENV_HTTP_ENDPOINT: &str = "HTTP_ENDPOINT";
const ENV_CONTENT_TYPE: &str = "CONTENT_TYPE";
const ENV_SOURCE_NAME: &str = "SOURCE_NAME";
const ENV_INCLUDE_UNACKED: &str = "INCLUDE_UNACKED";
const ENV_HTTP_METHOD: &str = "HTTP_METHOD";
const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
const ENV_CONCURRENCY: &str = "CONNECTOR_CONCURRENCY";
const ENV_SHUTDOWN_GRACE_SECS: &str = "SHUTDOWN_GRACE_SECS";
const ENV_CONNECT_TIMEOUT_SECS: &str = "NATS_CONNECT_TIMEOUT_SECS";

const DEFAULT_CONTENT_TYPE: &str = "application/json";
const DEFAULT_SOURCE_NAME: &str = "nats-http-connector";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONCURRENCY: usize = 1;
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What to consume, where to forward it, and where results go.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    topic: String,
    response_topic: String,
    error_topic: String,
    content_type: String,
    source_name: String,
    http_endpoint: Url,
}

impl ConnectorConfig {
    pub fn new(
        topic: impl Into<String>,
        error_topic: impl Into<String>,
        http_endpoint: &str,
    ) -> Result<Self, ConfigError> {
        let topic = topic.into();
        let error_topic = error_topic.into();

        if topic.is_empty() {
            return Err(ConfigError::EmptyValue(ENV_TOPIC));
        }
        if let Some(ch) = topic.chars().find(|ch| ch.is_whitespace()) {
            return Err(ConfigError::InvalidSubject {
                field: ENV_TOPIC,
                ch,
            });
        }
        validate_subject_tokens(ENV_TOPIC, &topic)?;
        if error_topic.is_empty() {
            return Err(ConfigError::EmptyValue(ENV_ERROR_TOPIC));
        }
        validate_publish_subject(ENV_ERROR_TOPIC, &error_topic)?;

        Ok(Self {
            topic,
            response_topic: String::new(),
            error_topic,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            source_name: DEFAULT_SOURCE_NAME.to_string(),
            http_endpoint: parse_endpoint(http_endpoint)?,
        })
    }

    /// An empty topic disables publishing of successful responses.
    pub fn with_response_topic(mut self, topic: impl Into<String>) -> Result<Self, ConfigError> {
        let topic = topic.into();
        validate_publish_subject(ENV_RESPONSE_TOPIC, &topic)?;
        self.response_topic = topic;
        Ok(self)
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// `None` when successful responses are dropped.
    pub fn response_topic(&self) -> Option<&str> {
        Some(self.response_topic.as_str()).filter(|t| !t.is_empty())
    }

    /// The configured value verbatim, empty when unset. Sent as `RespTopic`.
    pub fn response_topic_raw(&self) -> &str {
        &self.response_topic
    }

    pub fn error_topic(&self) -> &str {
        &self.error_topic
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn http_endpoint(&self) -> &Url {
        &self.http_endpoint
    }
}

fn validate_publish_subject(field: &'static str, subject: &str) -> Result<(), ConfigError> {
    if let Some(ch) = subject
        .chars()
        .find(|ch| *ch == '*' || *ch == '>' || ch.is_whitespace())
    {
        return Err(ConfigError::InvalidSubject { field, ch });
    }
    validate_subject_tokens(field, subject)
}

/// Rejects `.a`, `a.` and `a..b`. An empty subject has no tokens to check.
fn validate_subject_tokens(field: &'static str, subject: &str) -> Result<(), ConfigError> {
    if !subject.is_empty() && subject.split('.').any(str::is_empty) {
        return Err(ConfigError::EmptySubjectToken {
            field,
            subject: subject.to_string(),
        });
    }
    Ok(())
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::EmptyValue(ENV_HTTP_ENDPOINT));
    }
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        field: ENV_HTTP_ENDPOINT,
        value: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

/// How requests are sent to the endpoint.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub method: Method,
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            method: Method::POST,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Delivery concurrency and shutdown behaviour of the bridge.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Maximum messages handled at once. `1` keeps delivery order.
    pub concurrency: usize,
    /// How long shutdown waits for in-flight messages before aborting them.
    pub drain_timeout: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) connector: ConnectorConfig,
    pub(crate) nats: NatsConfig,
    pub(crate) http: HttpSettings,
    pub(crate) bridge: BridgeSettings,
    pub(crate) nats_connect_timeout: Duration,
}

impl Config {
    pub fn connector(&self) -> &ConnectorConfig {
        &self.connector
    }

    pub fn nats(&self) -> &NatsConfig {
        &self.nats
    }

    pub fn http(&self) -> &HttpSettings {
        &self.http
    }

    pub fn bridge(&self) -> &BridgeSettings {
        &self.bridge
    }

    pub fn nats_connect_timeout(&self) -> Duration {
        self.nats_connect_timeout
    }
}

#[derive(Parser, Debug, Default)]
#[command(name = "nats-http-connector")]
#[command(about = "Forwards NATS messages to an HTTP endpoint and publishes the responses", long_about = None)]
pub struct Args {
    /// NATS server(s); overrides HOST
    #[arg(long)]
    pub host: Option<String>,

    /// Subject to consume; overrides TOPIC
    #[arg(long)]
    pub topic: Option<String>,

    /// Target URL; overrides HTTP_ENDPOINT
    #[arg(long = "http-endpoint")]
    pub http_endpoint: Option<String>,
}

pub fn from_env_with_provider<E: ReadEnv>(env: &E) -> Result<Config, ConfigError> {
    from_args(Args::parse(), env)
}

/// Builds the configuration. Rejections happen in the order the connector
/// would otherwise act on them: feature flags, bus target, then connector
/// metadata.
pub fn from_args<E: ReadEnv>(args: Args, env: &E) -> Result<Config, ConfigError> {
    if env
        .var(ENV_INCLUDE_UNACKED)
        .is_ok_and(|v| v.trim().eq_ignore_ascii_case("true"))
    {
        return Err(ConfigError::UnsupportedFeature(ENV_INCLUDE_UNACKED));
    }

    let host = args
        .host
        .or_else(|| env.var(ENV_HOST).ok())
        .unwrap_or_default();
    let servers = parse_servers(&host);
    if servers.is_empty() {
        return Err(ConfigError::EmptyValue(ENV_HOST));
    }
    let nats = NatsConfig::new(servers, NatsAuth::from_env(env));

    let topic = args
        .topic
        .or_else(|| env.var(ENV_TOPIC).ok())
        .unwrap_or_default();
    let http_endpoint = args
        .http_endpoint
        .or_else(|| env.var(ENV_HTTP_ENDPOINT).ok())
        .unwrap_or_default();
    let error_topic = env.var(ENV_ERROR_TOPIC).unwrap_or_default();

    let mut connector = ConnectorConfig::new(topic, error_topic, &http_endpoint)?
        .with_response_topic(env.var(ENV_RESPONSE_TOPIC).unwrap_or_default())?;
    if let Some(content_type) = non_empty_var(env, ENV_CONTENT_TYPE) {
        connector = connector.with_content_type(content_type);
    }
    if let Some(source_name) = non_empty_var(env, ENV_SOURCE_NAME) {
        connector = connector.with_source_name(source_name);
    }

    let method = match non_empty_var(env, ENV_HTTP_METHOD) {
        Some(raw) => Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).map_err(|_| {
            ConfigError::InvalidMethod {
                field: ENV_HTTP_METHOD,
                value: raw,
            }
        })?,
        None => Method::POST,
    };

    let http = HttpSettings {
        method,
        timeout: secs_from_env(env, ENV_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT, 1)?,
    };

    let bridge = BridgeSettings {
        concurrency: number_from_env(env, ENV_CONCURRENCY, DEFAULT_CONCURRENCY as u64, 1)?
            as usize,
        drain_timeout: secs_from_env(env, ENV_SHUTDOWN_GRACE_SECS, DEFAULT_DRAIN_TIMEOUT, 0)?,
    };

    Ok(Config {
        connector,
        nats,
        http,
        bridge,
        nats_connect_timeout: secs_from_env(
            env,
            ENV_CONNECT_TIMEOUT_SECS,
            DEFAULT_CONNECT_TIMEOUT,
            1,
        )?,
    })
}

fn non_empty_var<E: ReadEnv>(env: &E, key: &str) -> Option<String> {
    env.var(key).ok().filter(|v| !v.is_empty())
}

fn number_from_env<E: ReadEnv>(
    env: &E,
    key: &'static str,
    default: u64,
    min: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = non_empty_var(env, key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value >= min => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            field: key,
            value: raw,
            min,
        }),
    }
}

fn secs_from_env<E: ReadEnv>(
    env: &E,
    key: &'static str,
    default: Duration,
    min: u64,
) -> Result<Duration, ConfigError> {
    number_from_env(env, key, default.as_secs(), min).map(Duration::from_secs)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

use std::path::PathBuf;
use std::time::Duration;

use async_nats::{Client, ConnectOptions, Event};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::nats::auth::{NatsAuth, NatsConfig};

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to load credentials file {}", path.display())]
    InvalidCredentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to NATS servers {servers:?}")]
    ConnectionFailed {
        servers: Vec<String>,
        #[source]
        source: async_nats::ConnectError,
    },
}

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

fn reconnect_delay(attempts: usize) -> Duration {
    let exp = u32::try_from(attempts).unwrap_or(u32::MAX);
    let delay = Duration::from_secs(std::cmp::min(
        MAX_RECONNECT_DELAY.as_secs(),
        2u64.saturating_pow(exp),
    ));
    info!(
        attempts,
        delay_secs = delay.as_secs(),
        "NATS reconnect delay"
    );
    delay
}

fn handle_event(event: Event) {
    match event {
        Event::Connected => info!("NATS connected"),
        Event::Disconnected => warn!("NATS disconnected - will attempt reconnect"),
        Event::ServerError(err) => warn!(error = %err, "NATS server error"),
        Event::ClientError(err) => warn!(error = %err, "NATS client error"),
        Event::SlowConsumer(sid) => warn!(sid, "NATS slow consumer detected, messages dropped"),
        Event::LameDuckMode => warn!("NATS server entering lame duck mode"),
        other => info!(event = %other, "NATS connection event"),
    }
}

/// Connect to NATS, failing fast if the first connection attempt fails.
///
/// Once connected the client reconnects on its own with exponential backoff
/// capped at 30s. Subscriptions survive reconnects.
#[instrument(name = "nats.connect", skip(config), fields(servers = ?config.servers, auth = %config.auth.description()))]
pub async fn connect(config: &NatsConfig, timeout: Duration) -> Result<Client, ConnectError> {
    let options = match &config.auth {
        NatsAuth::Credentials(path) => {
            info!(path = %path.display(), "Using credentials file");
            ConnectOptions::with_credentials_file(path.clone())
                .await
                .map_err(|source| ConnectError::InvalidCredentials {
                    path: path.clone(),
                    source,
                })?
        }
        NatsAuth::NKey(seed) => ConnectOptions::with_nkey(seed.clone()),
        NatsAuth::UserPassword { user, password } => {
            ConnectOptions::with_user_and_password(user.clone(), password.clone())
        }
        NatsAuth::Token(token) => ConnectOptions::with_token(token.clone()),
        NatsAuth::None => ConnectOptions::new(),
    };

    let client = options
        .connection_timeout(timeout)
        .reconnect_delay_callback(reconnect_delay)
        .event_callback(|event| async move { handle_event(event) })
        .connect(config.servers.as_slice())
        .await
        .map_err(|source| {
            warn!(error = %source, "Failed to connect to NATS");
            ConnectError::ConnectionFailed {
                servers: config.servers.clone(),
                source,
            }
        })?;

    info!("Connected to NATS");
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_doubles_from_one_second() {
        assert_eq!(reconnect_delay(0).as_secs(), 1);
        assert_eq!(reconnect_delay(1).as_secs(), 2);
        assert_eq!(reconnect_delay(2).as_secs(), 4);
        assert_eq!(reconnect_delay(4).as_secs(), 16);
    }

    #[test]
    fn reconnect_delay_caps_at_max() {
        assert_eq!(reconnect_delay(5), MAX_RECONNECT_DELAY);
        assert_eq!(reconnect_delay(64), MAX_RECONNECT_DELAY);
        assert_eq!(reconnect_delay(usize::MAX), MAX_RECONNECT_DELAY);
    }

    #[test]
    fn handle_event_all_variants() {
        use async_nats::{ClientError, ServerError};

        handle_event(Event::Connected);
        handle_event(Event::Disconnected);
        handle_event(Event::ServerError(ServerError::Other("test".to_string())));
        handle_event(Event::ClientError(ClientError::Other("test".to_string())));
        handle_event(Event::SlowConsumer(7));
        handle_event(Event::LameDuckMode);
        handle_event(Event::Closed);
    }

    #[test]
    fn invalid_credentials_display_names_path() {
        let err = ConnectError::InvalidCredentials {
            path: PathBuf::from("/missing.creds"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        assert_eq!(err.to_string(), "failed to load credentials file /missing.creds");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn missing_credentials_file_fails_before_connecting() {
        let config = NatsConfig::new(
            vec!["localhost:4222".to_string()],
            NatsAuth::Credentials(PathBuf::from("/definitely/not/here.creds")),
        );

        let result = connect(&config, Duration::from_secs(1)).await;

        assert!(matches!(result, Err(ConnectError::InvalidCredentials { .. })));
    }

    #[tokio::test]
    async fn unreachable_server_fails_instead_of_retrying_forever() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = NatsConfig::from_url(format!("nats://127.0.0.1:{}", port));
        let result = connect(&config, Duration::from_secs(1)).await;

        assert!(matches!(result, Err(ConnectError::ConnectionFailed { .. })));
    }
}

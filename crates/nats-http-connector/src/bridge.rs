//! The subscribe → forward → route loop.
//!
//! [`Bridge`] holds everything needed to start; [`Bridge::subscribe`] turns it
//! into a [`Subscription`] that is already receiving messages, and
//! [`Subscription::run`] consumes it until shutdown or until the NATS
//! subscription ends.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::config::{BridgeSettings, ConnectorConfig};
use crate::error::BridgeError;
use crate::forwarder::RequestForwarder;
use crate::message::InboundMessage;
use crate::nats::{FlushClient, PublishClient, SubscribeClient};
use crate::router::ResultRouter;

/// Counters reported when [`Subscription::run`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages taken off the subscription.
    pub received: u64,
    /// In-flight messages cancelled because the drain deadline passed.
    pub aborted: usize,
}

/// Payload bytes echoed in the per-message debug log.
const PAYLOAD_PREVIEW_LIMIT: usize = 256;

struct MessageHandler<P: PublishClient> {
    forwarder: RequestForwarder,
    router: ResultRouter<P>,
}

impl<P: PublishClient> MessageHandler<P> {
    async fn handle(&self, message: InboundMessage) {
        debug!(
            topic = %message.topic,
            bytes = message.payload.len(),
            payload = %message.payload_preview(PAYLOAD_PREVIEW_LIMIT),
            "Received message"
        );
        let outcome = self.forwarder.forward(&message).await;
        self.router.route(outcome).await;
    }
}

pub struct Bridge<N>
where
    N: SubscribeClient + PublishClient + FlushClient,
{
    client: N,
    topic: String,
    handler: Arc<MessageHandler<N>>,
    settings: BridgeSettings,
}

impl<N> Bridge<N>
where
    N: SubscribeClient + PublishClient + FlushClient,
{
    pub fn new(
        client: N,
        connector: &ConnectorConfig,
        forwarder: RequestForwarder,
        settings: BridgeSettings,
    ) -> Self {
        let router = ResultRouter::new(client.clone(), connector);
        Self {
            client,
            topic: connector.topic().to_string(),
            handler: Arc::new(MessageHandler { forwarder, router }),
            settings,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Subscribes to the configured topic. A failure here is fatal to the
    /// connector and is not retried.
    #[instrument(name = "connector.subscribe", skip(self), fields(topic = %self.topic))]
    pub async fn subscribe(self) -> Result<Subscription<N>, BridgeError> {
        let messages = self
            .client
            .subscribe(self.topic.clone())
            .await
            .map_err(|e| BridgeError::Subscribe {
                topic: self.topic.clone(),
                source: Box::new(e),
            })?;

        info!(
            endpoint = %self.handler.forwarder.endpoint(),
            concurrency = self.settings.concurrency,
            "Subscribed"
        );

        Ok(Subscription {
            client: self.client,
            topic: self.topic,
            messages,
            handler: self.handler,
            settings: self.settings,
        })
    }
}

/// A live subscription. Messages queue up in the client until [`run`](Self::run)
/// is called.
pub struct Subscription<N>
where
    N: SubscribeClient + PublishClient + FlushClient,
{
    client: N,
    topic: String,
    messages: N::Messages,
    handler: Arc<MessageHandler<N>>,
    settings: BridgeSettings,
}

impl<N> Subscription<N>
where
    N: SubscribeClient + PublishClient + FlushClient,
{
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Processes messages until `shutdown` resolves or the subscription ends.
    ///
    /// At most `concurrency` messages are in flight. With a concurrency of 1,
    /// outcomes are published in delivery order. On stop, in-flight messages
    /// get `drain_timeout` to finish, the rest are aborted, and pending
    /// publishes are flushed.
    pub async fn run<F>(self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            client,
            topic,
            mut messages,
            handler,
            settings,
        } = self;

        let concurrency = settings.concurrency.max(1);
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut received: u64 = 0;
        tokio::pin!(shutdown);

        loop {
            if tasks.len() >= concurrency {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        info!(topic = %topic, "Shutdown requested");
                        break;
                    }
                    Some(joined) = tasks.join_next() => log_join(joined),
                }
                continue;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(topic = %topic, "Shutdown requested");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
                next = messages.next() => match next {
                    Some(message) => {
                        received += 1;
                        let handler = Arc::clone(&handler);
                        let span = info_span!("connector.message", seq = received);
                        tasks.spawn(async move { handler.handle(message).await }.instrument(span));
                    }
                    None => {
                        warn!(topic = %topic, "Subscription ended");
                        break;
                    }
                },
            }
        }

        // Unsubscribe before draining so nothing new queues up.
        drop(messages);

        let mut aborted = 0;
        let in_flight = tasks.len();
        if in_flight > 0 {
            info!(
                count = in_flight,
                timeout = ?settings.drain_timeout,
                "Waiting for in-flight messages to finish"
            );
            let drained = tokio::time::timeout(settings.drain_timeout, async {
                while let Some(joined) = tasks.join_next().await {
                    log_join(joined);
                }
            })
            .await;

            if drained.is_err() {
                aborted = count_unfinished(&mut tasks);
                warn!(count = aborted, "Drain deadline reached, aborting in-flight messages");
                tasks.shutdown().await;
            }
        }

        if let Err(e) = client.flush().await {
            warn!(error = %e, "Failed to flush NATS connection");
        }

        info!(received, aborted, "Bridge stopped");
        RunSummary { received, aborted }
    }
}

/// Joins tasks that completed on their own and counts the ones still running.
fn count_unfinished(tasks: &mut JoinSet<()>) -> usize {
    while let Some(joined) = tasks.try_join_next() {
        log_join(joined);
    }
    tasks.len()
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Message handler panicked");
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod bridge_tests;

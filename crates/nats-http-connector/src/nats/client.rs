use std::error::Error;
use std::future::Future;

use async_nats::subject::ToSubject;
use async_nats::{Client as NatsAsyncClient, Message, Subscriber};
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::message::InboundMessage;

/// Subscription capability.
///
/// Delivery contract: the returned stream yields messages one at a time, in
/// the order the server delivered them. How many are processed concurrently
/// is decided by the consumer of the stream, not by the client. Dropping the
/// stream unsubscribes.
pub trait SubscribeClient: Send + Sync + Clone + 'static {
    type SubscribeError: Error + Send + Sync + 'static;
    type Messages: Stream<Item = InboundMessage> + Send + Unpin + 'static;

    fn subscribe<S: ToSubject + Send>(
        &self,
        subject: S,
    ) -> impl Future<Output = Result<Self::Messages, Self::SubscribeError>> + Send;
}

/// Publish capability. Must be safe to call from many tasks at once.
pub trait PublishClient: Send + Sync + Clone + 'static {
    type PublishError: Error + Send + Sync + 'static;

    fn publish<S: ToSubject + Send>(
        &self,
        subject: S,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), Self::PublishError>> + Send;
}

pub trait FlushClient: Send + Sync + Clone + 'static {
    type FlushError: Error + Send + Sync + 'static;

    fn flush(&self) -> impl Future<Output = Result<(), Self::FlushError>> + Send;
}

/// Core NATS subscription adapted to [`InboundMessage`].
pub type NatsMessages = futures::stream::Map<Subscriber, fn(Message) -> InboundMessage>;

impl SubscribeClient for NatsAsyncClient {
    type SubscribeError = async_nats::client::SubscribeError;
    type Messages = NatsMessages;

    async fn subscribe<S: ToSubject + Send>(
        &self,
        subject: S,
    ) -> Result<NatsMessages, Self::SubscribeError> {
        let subscriber = NatsAsyncClient::subscribe(self, subject).await?;
        Ok(subscriber.map(InboundMessage::from as fn(Message) -> InboundMessage))
    }
}

impl PublishClient for NatsAsyncClient {
    type PublishError = async_nats::client::PublishError;

    async fn publish<S: ToSubject + Send>(
        &self,
        subject: S,
        payload: Bytes,
    ) -> Result<(), Self::PublishError> {
        NatsAsyncClient::publish(self, subject, payload).await
    }
}

impl FlushClient for NatsAsyncClient {
    type FlushError = async_nats::client::FlushError;

    async fn flush(&self) -> Result<(), Self::FlushError> {
        NatsAsyncClient::flush(self).await
    }
}

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_nats::subject::ToSubject;
use bytes::Bytes;
use futures::channel::mpsc;

use crate::message::InboundMessage;
use crate::nats::client::{FlushClient, PublishClient, SubscribeClient};

#[derive(Debug, Clone)]
pub struct MockError(pub String);

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MockError {}

/// In-memory stand-in for a NATS connection.
///
/// Supports a single subscription: messages pushed with [`deliver`](Self::deliver)
/// are yielded by the stream returned from `subscribe`, in order, until
/// [`end_subscription`](Self::end_subscription) is called. Clones share state.
#[derive(Clone, Debug)]
pub struct MockNatsClient {
    published: Arc<Mutex<Vec<(String, Bytes)>>>,
    publish_attempts: Arc<Mutex<Vec<String>>>,
    subscribed_subjects: Arc<Mutex<Vec<String>>>,
    failing_subjects: Arc<Mutex<HashSet<String>>>,
    fail_subscribe: Arc<Mutex<bool>>,
    flushes: Arc<Mutex<usize>>,
    inbox_tx: mpsc::UnboundedSender<InboundMessage>,
    inbox_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<InboundMessage>>>>,
}

impl MockNatsClient {
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded();
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            publish_attempts: Arc::new(Mutex::new(Vec::new())),
            subscribed_subjects: Arc::new(Mutex::new(Vec::new())),
            failing_subjects: Arc::new(Mutex::new(HashSet::new())),
            fail_subscribe: Arc::new(Mutex::new(false)),
            flushes: Arc::new(Mutex::new(0)),
            inbox_tx,
            inbox_rx: Arc::new(Mutex::new(Some(inbox_rx))),
        }
    }

    /// Queue a message for the subscription stream.
    pub fn deliver(&self, subject: &str, payload: impl Into<Bytes>) {
        let _ = self
            .inbox_tx
            .unbounded_send(InboundMessage::new(subject, payload));
    }

    /// End the subscription stream once the queued messages are consumed.
    pub fn end_subscription(&self) {
        self.inbox_tx.close_channel();
    }

    /// Every publish to `subject` fails from now on.
    pub fn fail_publish_to(&self, subject: &str) {
        self.failing_subjects
            .lock()
            .unwrap()
            .insert(subject.to_string());
    }

    pub fn fail_subscribe(&self) {
        *self.fail_subscribe.lock().unwrap() = true;
    }

    /// Successful publishes as (subject, payload), in publish order.
    pub fn published_messages(&self) -> Vec<(String, Bytes)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_subjects(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(subject, _)| subject.clone())
            .collect()
    }

    /// Subjects of every publish call, including failed ones.
    pub fn publish_attempts(&self) -> Vec<String> {
        self.publish_attempts.lock().unwrap().clone()
    }

    pub fn subscribed_to(&self) -> Vec<String> {
        self.subscribed_subjects.lock().unwrap().clone()
    }

    pub fn flush_count(&self) -> usize {
        *self.flushes.lock().unwrap()
    }
}

impl Default for MockNatsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscribeClient for MockNatsClient {
    type SubscribeError = MockError;
    type Messages = mpsc::UnboundedReceiver<InboundMessage>;

    async fn subscribe<S: ToSubject + Send>(
        &self,
        subject: S,
    ) -> Result<Self::Messages, MockError> {
        let subject = subject.to_subject().to_string();
        self.subscribed_subjects.lock().unwrap().push(subject.clone());

        if *self.fail_subscribe.lock().unwrap() {
            return Err(MockError(format!("simulated subscribe failure: {}", subject)));
        }

        self.inbox_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| MockError("mock: already subscribed".to_string()))
    }
}

impl PublishClient for MockNatsClient {
    type PublishError = MockError;

    async fn publish<S: ToSubject + Send>(
        &self,
        subject: S,
        payload: Bytes,
    ) -> Result<(), MockError> {
        let subject = subject.to_subject().to_string();
        self.publish_attempts.lock().unwrap().push(subject.clone());

        if self.failing_subjects.lock().unwrap().contains(&subject) {
            return Err(MockError(format!("simulated publish failure: {}", subject)));
        }

        self.published.lock().unwrap().push((subject, payload));
        Ok(())
    }
}

impl FlushClient for MockNatsClient {
    type FlushError = MockError;

    async fn flush(&self) -> Result<(), MockError> {
        *self.flushes.lock().unwrap() += 1;
        Ok(())
    }
}

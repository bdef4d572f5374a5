use bytes::Bytes;

/// A message received from the subscribed topic.
///
/// The payload is opaque: it is forwarded as the HTTP body byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// At most `limit` payload bytes as lossy UTF-8, with `...` appended when cut.
    pub fn payload_preview(&self, limit: usize) -> String {
        let shown = &self.payload[..self.payload.len().min(limit)];
        let mut preview = String::from_utf8_lossy(shown).into_owned();
        if self.payload.len() > limit {
            preview.push_str("...");
        }
        preview
    }
}

impl From<async_nats::Message> for InboundMessage {
    fn from(message: async_nats::Message) -> Self {
        Self {
            topic: message.subject.to_string(),
            payload: message.payload,
        }
    }
}

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::BusError;
use crate::tabs::TabId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    ContentChanged,
    TabCreated,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::ContentChanged, Channel::TabCreated];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::ContentChanged => "tab-content-changed",
            Channel::TabCreated => "tab-created",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Channel::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

/// New content for one tab. Last write wins per tab id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub tab_id: TabId,
    pub content: String,
}

/// Announces a tab the editor has just created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabCreatedEvent {
    pub id: TabId,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    ContentChanged(ChangeEvent),
    TabCreated(TabCreatedEvent),
}

impl BusMessage {
    pub fn channel(&self) -> Channel {
        match self {
            BusMessage::ContentChanged(_) => Channel::ContentChanged,
            BusMessage::TabCreated(_) => Channel::TabCreated,
        }
    }

    pub fn encode(&self) -> Result<Envelope, BusError> {
        let payload = match self {
            BusMessage::ContentChanged(ev) => serde_json::to_string(ev)?,
            BusMessage::TabCreated(ev) => serde_json::to_string(ev)?,
        };
        Ok(Envelope {
            channel: self.channel().as_str().to_string(),
            payload,
        })
    }

    /// Validates a raw payload received on `channel`.
    pub fn decode(channel: &str, payload: &str) -> Result<Self, BusError> {
        let malformed = |e: serde_json::Error| BusError::Malformed {
            channel: channel.to_string(),
            reason: e.to_string(),
        };

        match Channel::from_name(channel) {
            Some(Channel::ContentChanged) => serde_json::from_str(payload)
                .map(BusMessage::ContentChanged)
                .map_err(malformed),
            Some(Channel::TabCreated) => serde_json::from_str(payload)
                .map(BusMessage::TabCreated)
                .map_err(malformed),
            None => Err(BusError::UnknownChannel(channel.to_string())),
        }
    }
}

/// A message as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub channel: String,
    pub payload: String,
}

/// Publishing side of the host event bus. Publishing never waits for delivery.
pub trait MessageBus {
    fn publish(&self, message: &BusMessage) -> Result<(), BusError>;
}

struct Inbox {
    channels: Vec<Channel>,
    queue: VecDeque<Envelope>,
}

/// In-process bus. Clones share the same subscriber list.
#[derive(Clone, Default)]
pub struct LocalBus {
    inboxes: Arc<Mutex<Vec<Weak<Mutex<Inbox>>>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts receiving messages published on `channels` from now on.
    pub fn subscribe(&self, channels: &[Channel]) -> Subscription {
        let inbox = Arc::new(Mutex::new(Inbox {
            channels: channels.to_vec(),
            queue: VecDeque::new(),
        }));
        self.inboxes.lock().push(Arc::downgrade(&inbox));
        Subscription { inbox }
    }

    /// Pushes an already encoded envelope to every live subscriber of its channel.
    pub fn publish_raw(&self, envelope: Envelope) {
        let channel = Channel::from_name(&envelope.channel);
        let mut inboxes = self.inboxes.lock();
        inboxes.retain(|weak| weak.strong_count() > 0);

        for inbox in inboxes.iter().filter_map(Weak::upgrade) {
            let mut inbox = inbox.lock();
            // Unknown channels still reach everyone; the receiver rejects them.
            if channel.is_none_or(|c| inbox.channels.contains(&c)) {
                inbox.queue.push_back(envelope.clone());
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inboxes
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl MessageBus for LocalBus {
    fn publish(&self, message: &BusMessage) -> Result<(), BusError> {
        let envelope = message.encode()?;
        tracing::debug!(channel = %envelope.channel, "publish");
        self.publish_raw(envelope);
        Ok(())
    }
}

/// Receiving end of a [`LocalBus`]. Dropping it unsubscribes.
pub struct Subscription {
    inbox: Arc<Mutex<Inbox>>,
}

impl Subscription {
    pub fn pending(&self) -> usize {
        self.inbox.lock().queue.len()
    }

    /// Takes every queued envelope, decoding each. Malformed ones are logged and skipped.
    pub fn drain(&self) -> Vec<BusMessage> {
        let envelopes: Vec<Envelope> = self.inbox.lock().queue.drain(..).collect();
        envelopes
            .into_iter()
            .filter_map(|envelope| {
                match BusMessage::decode(&envelope.channel, &envelope.payload) {
                    Ok(message) => Some(message),
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping bus message");
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(id: u64, content: &str) -> BusMessage {
        BusMessage::ContentChanged(ChangeEvent {
            tab_id: TabId(id),
            content: content.to_string(),
        })
    }

    #[test]
    fn wire_format_uses_camel_case_tab_id() {
        let envelope = change(2, "graph TD").encode().expect("encode");
        assert_eq!(envelope.channel, "tab-content-changed");
        assert_eq!(envelope.payload, r#"{"tabId":2,"content":"graph TD"}"#);
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let err = BusMessage::decode("tab-content-changed", r#"{"content":"x"}"#)
            .expect_err("tabId is required");
        assert!(matches!(err, BusError::Malformed { .. }));

        let err = BusMessage::decode("tab-created", r#"{"id":"two","name":"n","content":""}"#)
            .expect_err("id must be an integer");
        assert!(matches!(err, BusError::Malformed { .. }));
    }

    #[test]
    fn decode_rejects_unknown_channel() {
        let err = BusMessage::decode("update-diagram", "{}").expect_err("unknown channel");
        assert!(matches!(err, BusError::UnknownChannel(name) if name == "update-diagram"));
    }

    #[test]
    fn messages_before_subscription_are_lost() {
        let bus = LocalBus::new();
        bus.publish(&change(1, "early")).expect("publish");

        let sub = bus.subscribe(&Channel::ALL);
        bus.publish(&change(1, "late")).expect("publish");

        assert_eq!(sub.drain(), vec![change(1, "late")]);
    }

    #[test]
    fn delivery_preserves_publish_order() {
        let bus = LocalBus::new();
        let sub = bus.subscribe(&Channel::ALL);
        for content in ["a", "ab", "abc"] {
            bus.publish(&change(1, content)).expect("publish");
        }

        assert_eq!(sub.pending(), 3);
        assert_eq!(
            sub.drain(),
            vec![change(1, "a"), change(1, "ab"), change(1, "abc")]
        );
        assert_eq!(sub.pending(), 0);
    }

    #[test]
    fn channel_filter_applies() {
        let bus = LocalBus::new();
        let only_created = bus.subscribe(&[Channel::TabCreated]);
        bus.publish(&change(1, "x")).expect("publish");
        let created = BusMessage::TabCreated(TabCreatedEvent {
            id: TabId(2),
            name: "Diagram 2".to_string(),
            content: String::new(),
        });
        bus.publish(&created).expect("publish");

        assert_eq!(only_created.drain(), vec![created]);
    }

    #[test]
    fn malformed_envelopes_are_skipped() {
        let bus = LocalBus::new();
        let sub = bus.subscribe(&Channel::ALL);
        bus.publish_raw(Envelope {
            channel: "tab-content-changed".to_string(),
            payload: "not json".to_string(),
        });
        bus.publish(&change(5, "ok")).expect("publish");

        assert_eq!(sub.drain(), vec![change(5, "ok")]);
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let bus = LocalBus::new();
        let sub = bus.subscribe(&Channel::ALL);
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        bus.publish(&change(1, "x")).expect("publish");
        assert_eq!(bus.subscriber_count(), 0);
    }
}

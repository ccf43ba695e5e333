//! Push notifications about payment state changes.
//!
//! The dashboard only needs a subscribe capability: a subscription is a stream
//! of events filtered client-side by event name, and dropping the stream is the
//! unsubscribe. Transport concerns (connect, reconnect) belong to whoever
//! implements [`PushChannel`].
//!
//! [`LocalPushChannel`] is an in-process hub backed by a tokio broadcast
//! channel. The checkout flow publishes `payment:verified` on it after a
//! successful verification, and tests use it to fire simulated events.

use crate::errors::PushError;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// Emitted once a payment has been verified upstream.
pub const PAYMENT_VERIFIED: &str = "payment:verified";

/// Delivered to every subscription, whatever its filter, when it fell behind
/// and events were dropped. Subscribers cannot tell what was lost.
pub const PUSH_LAGGED: &str = "push:lagged";

const DEFAULT_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    pub name: String,
    /// Opaque payload; the sync path only looks at `name`
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl PushEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    pub fn payment_verified() -> Self {
        Self::new(PAYMENT_VERIFIED, serde_json::Value::Null)
    }

    pub fn lagged(skipped: u64) -> Self {
        Self::new(PUSH_LAGGED, serde_json::json!({ "skipped": skipped }))
    }

    pub fn is_lagged(&self) -> bool {
        self.name == PUSH_LAGGED
    }
}

/// Which event names a subscription should receive.
#[derive(Debug, Clone)]
pub struct PushEventFilter {
    names: HashSet<String>,
    include_all: bool,
}

impl PushEventFilter {
    pub fn all() -> Self {
        Self {
            names: HashSet::new(),
            include_all: true,
        }
    }

    pub fn only(name: impl Into<String>) -> Self {
        Self::for_names([name.into()])
    }

    pub fn for_names(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names.into_iter().collect(),
            include_all: false,
        }
    }

    pub fn matches(&self, event: &PushEvent) -> bool {
        self.include_all || self.names.contains(&event.name)
    }
}

impl Default for PushEventFilter {
    fn default() -> Self {
        Self::all()
    }
}

pub type PushStream = Pin<Box<dyn Stream<Item = PushEvent> + Send>>;

#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Open a subscription. The returned stream ends when the channel shuts
    /// down; dropping it unsubscribes. A subscription that falls behind
    /// yields a [`PUSH_LAGGED`] event in place of the dropped ones.
    async fn subscribe(&self, filter: PushEventFilter) -> Result<PushStream, PushError>;
}

pub struct LocalPushChannel {
    /// `None` once closed; dropping the sender ends every live subscription
    sender: Mutex<Option<broadcast::Sender<PushEvent>>>,
}

impl LocalPushChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    fn sender(&self) -> Option<broadcast::Sender<PushEvent>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Deliver an event to every live subscription. Returns how many
    /// subscriptions received it.
    pub fn publish(&self, event: PushEvent) -> usize {
        let Some(sender) = self.sender() else {
            tracing::debug!("Dropping push event {} on closed channel", event.name);
            return 0;
        };
        match sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!("No subscribers for push event {}", event.name);
                0
            }
        }
    }

    /// Number of subscriptions currently open.
    pub fn subscriber_count(&self) -> usize {
        self.sender()
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Refuse new subscriptions and end the live ones.
    pub fn close(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if sender.is_some() {
            tracing::info!("Local push channel closed");
        }
    }
}

impl Default for LocalPushChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushChannel for LocalPushChannel {
    async fn subscribe(&self, filter: PushEventFilter) -> Result<PushStream, PushError> {
        let sender = self.sender().ok_or(PushError::Closed)?;

        let stream =
            BroadcastStream::new(sender.subscribe()).filter_map(move |item| match item {
                Ok(event) if filter.matches(&event) => Some(event),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!("Push subscription lagged, {} events skipped", skipped);
                    Some(PushEvent::lagged(skipped))
                }
            });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_by_name() {
        let filter = PushEventFilter::only(PAYMENT_VERIFIED);
        assert!(filter.matches(&PushEvent::payment_verified()));
        assert!(!filter.matches(&PushEvent::new("payment:created", serde_json::Value::Null)));
        assert!(PushEventFilter::all().matches(&PushEvent::new("anything", serde_json::json!({}))));
    }

    #[tokio::test]
    async fn test_subscription_receives_only_matching_events() {
        let channel = LocalPushChannel::new();
        let mut stream = channel
            .subscribe(PushEventFilter::only(PAYMENT_VERIFIED))
            .await
            .unwrap();
        assert_eq!(channel.subscriber_count(), 1);

        channel.publish(PushEvent::new("connect", serde_json::Value::Null));
        channel.publish(PushEvent::new(
            PAYMENT_VERIFIED,
            serde_json::json!({ "payment_id": "pay_1" }),
        ));

        let event = stream.next().await.unwrap();
        assert_eq!(event.name, PAYMENT_VERIFIED);
        assert_eq!(event.payload["payment_id"], "pay_1");
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let channel = LocalPushChannel::new();
        let stream = channel.subscribe(PushEventFilter::all()).await.unwrap();
        assert_eq!(channel.subscriber_count(), 1);
        drop(stream);
        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(channel.publish(PushEvent::payment_verified()), 0);
    }

    #[tokio::test]
    async fn test_closed_channel_refuses_subscriptions() {
        let channel = LocalPushChannel::new();
        channel.close();
        assert!(matches!(
            channel.subscribe(PushEventFilter::all()).await,
            Err(PushError::Closed)
        ));
        assert_eq!(channel.publish(PushEvent::payment_verified()), 0);
    }

    #[tokio::test]
    async fn test_close_ends_live_subscriptions() {
        let channel = LocalPushChannel::new();
        let mut stream = channel.subscribe(PushEventFilter::all()).await.unwrap();

        channel.close();
        assert!(stream.next().await.is_none());
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscription_is_told_events_were_dropped() {
        let channel = LocalPushChannel::with_capacity(1);
        let mut stream = channel
            .subscribe(PushEventFilter::only(PAYMENT_VERIFIED))
            .await
            .unwrap();

        // The verified event is pushed out of the buffer by an event the
        // filter would discard anyway
        channel.publish(PushEvent::payment_verified());
        channel.publish(PushEvent::new("connect", serde_json::Value::Null));
        channel.close();

        let event = stream.next().await.unwrap();
        assert!(event.is_lagged());
        assert_eq!(event.payload["skipped"], 1);
        assert!(stream.next().await.is_none());
    }
}

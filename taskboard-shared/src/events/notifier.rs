/// In-process change notifier
///
/// The store publishes an event after each committed mutation. Observers
/// subscribe per entity type and receive the post-mutation row.
///
/// # Delivery
///
/// - Publishing never blocks and never fails the mutation. Every subscriber
///   has a bounded queue ([`DEFAULT_SUBSCRIBER_CAPACITY`] events); when it is
///   full the event is skipped for that subscriber, and a closed channel just
///   drops the subscriber.
/// - Events are published after commit, so a rolled back mutation never
///   produces one.
/// - Observers should treat an event as a hint and re-read current state;
///   ordering across concurrent mutations is not guaranteed, and a slow
///   observer may miss events.
///
/// # Example
///
/// ```
/// use taskboard_shared::events::notifier::{ChangeEvent, ChangeKind, ChangeNotifier};
/// use taskboard_shared::models::EntityKind;
/// use serde_json::json;
///
/// # async fn example() {
/// let notifier = ChangeNotifier::new();
/// let mut subscription = notifier.subscribe(EntityKind::Task);
///
/// notifier.publish(ChangeEvent::new(EntityKind::Task, ChangeKind::Update, json!({"title": "x"})));
///
/// let event = subscription.recv().await.unwrap();
/// assert_eq!(event.change, ChangeKind::Update);
///
/// notifier.unsubscribe(subscription.id());
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::models::EntityKind;

/// Events queued per subscriber before new ones are skipped
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// What happened to the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A committed row change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Entity type of the row
    pub entity: EntityKind,

    /// Kind of change
    pub change: ChangeKind,

    /// Row after the change (the last known row for deletes)
    pub record: JsonValue,

    /// When the event was published
    pub published_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Creates an event stamped with the current time
    pub fn new(entity: EntityKind, change: ChangeKind, record: JsonValue) -> Self {
        Self {
            entity,
            change,
            record,
            published_at: Utc::now(),
        }
    }

    /// Decodes the row carried by the event
    pub fn record_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.record.clone()).ok()
    }
}

/// Handle identifying a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving side of a subscription
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::Receiver<ChangeEvent>,
}

impl Subscription {
    /// ID to pass to [`ChangeNotifier::unsubscribe`]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next event
    ///
    /// Returns `None` once the subscription has been removed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Returns an event if one is already queued
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }

    /// Gives up the handle for the raw channel
    pub fn into_receiver(self) -> mpsc::Receiver<ChangeEvent> {
        self.receiver
    }
}

struct Subscriber {
    entity: EntityKind,
    sender: mpsc::Sender<ChangeEvent>,
}

/// Fan-out of committed changes to subscribers
pub struct ChangeNotifier {
    next_id: AtomicU64,
    capacity: usize,
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl ChangeNotifier {
    /// Creates a notifier with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a notifier whose subscribers queue at most `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            capacity: capacity.max(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes to changes of one entity type
    pub fn subscribe(&self, entity: EntityKind) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.capacity);

        self.lock().insert(id, Subscriber { entity, sender });
        tracing::debug!(subscription = id.0, entity = %entity, "Change subscriber added");

        Subscription { id, receiver }
    }

    /// Removes a subscription; its receiver then drains and ends
    ///
    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(subscription = id.0, "Change subscriber removed");
        }
        removed
    }

    /// Delivers an event to every subscriber of its entity type
    ///
    /// Returns how many subscribers received it. A subscriber whose queue is
    /// full misses this event; one whose receiver was dropped is removed.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let mut subscribers = self.lock();
        let mut delivered = 0;

        subscribers.retain(|id, sub| {
            if sub.entity != event.entity {
                return !sub.sender.is_closed();
            }
            match sub.sender.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscription = id.0, entity = %event.entity, "Subscriber lagging, event skipped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });

        tracing::debug!(
            entity = %event.entity,
            change = ?event.change,
            delivered,
            "Published change event"
        );

        delivered
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    // A panic while holding the lock leaves the map intact, so keep using it.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_matching_subscribers_only() {
        let notifier = ChangeNotifier::new();
        let mut tasks = notifier.subscribe(EntityKind::Task);
        let mut profiles = notifier.subscribe(EntityKind::Profile);

        let delivered = notifier.publish(ChangeEvent::new(
            EntityKind::Task,
            ChangeKind::Insert,
            json!({"title": "Draft roadmap"}),
        ));
        assert_eq!(delivered, 1);

        let event = tasks.recv().await.unwrap();
        assert_eq!(event.record["title"], "Draft roadmap");
        assert!(profiles.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_stream() {
        let notifier = ChangeNotifier::new();
        let mut sub = notifier.subscribe(EntityKind::Task);

        assert!(notifier.unsubscribe(sub.id()));
        assert!(!notifier.unsubscribe(sub.id()));
        assert_eq!(notifier.subscriber_count(), 0);

        assert_eq!(
            notifier.publish(ChangeEvent::new(EntityKind::Task, ChangeKind::Delete, json!({}))),
            0
        );
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_full_queue_skips_events_but_keeps_subscriber() {
        let notifier = ChangeNotifier::with_capacity(2);
        let mut slow = notifier.subscribe(EntityKind::Task);

        for n in 0..5 {
            notifier.publish(ChangeEvent::new(EntityKind::Task, ChangeKind::Update, json!({ "n": n })));
        }
        assert_eq!(notifier.subscriber_count(), 1);

        assert_eq!(slow.recv().await.unwrap().record["n"], 0);
        assert_eq!(slow.recv().await.unwrap().record["n"], 1);
        assert!(slow.try_recv().is_none());

        // drained, so delivery resumes
        let delivered =
            notifier.publish(ChangeEvent::new(EntityKind::Task, ChangeKind::Update, json!({ "n": 5 })));
        assert_eq!(delivered, 1);
        assert_eq!(slow.recv().await.unwrap().record["n"], 5);
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let notifier = ChangeNotifier::new();
        let sub = notifier.subscribe(EntityKind::Task);
        let _other = notifier.subscribe(EntityKind::Task);
        drop(sub);

        let delivered =
            notifier.publish(ChangeEvent::new(EntityKind::Task, ChangeKind::Update, json!({})));
        assert_eq!(delivered, 1);
        assert_eq!(notifier.subscriber_count(), 1);
    }
}

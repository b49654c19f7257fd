/// Change events
///
/// Committed mutations are fanned out to in-process subscribers through
/// [`notifier::ChangeNotifier`]. The HTTP layer turns a task subscription
/// into a Server-Sent Events stream.

pub mod notifier;

pub use notifier::{
    ChangeEvent, ChangeKind, ChangeNotifier, Subscription, SubscriptionId, DEFAULT_SUBSCRIBER_CAPACITY,
};

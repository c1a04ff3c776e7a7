//! # Event Bus
//!
//! Type-keyed publish/subscribe, dispatched synchronously on the simulation
//! thread.
//!
//! ```text
//! emit_event(Hit { .. })
//!     │
//!     ├── TypeKey(Hit) ──▶ [ScoreSystem, HudBridge, ...]   registration order
//!     │                        │            │
//!     │                    on_event     on_event
//!     ▼
//! returns after the last subscriber
//! ```
//!
//! The bus never owns a subscriber. It keeps a `Weak` to the callback's
//! shared cell; a subscriber dropped without unsubscribing is pruned (with a
//! warning) on the next emit of its event type.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::ecs::{Polymorph, TypeKey};

/// Receives events of type `E`.
///
/// Systems implement this to react to events raised by other systems in the
/// same step.
pub trait EventCallback<E>: Send {
    /// Called once per emitted event.
    fn on_event(&mut self, event: &E);
}

type Subscriber<E> = Weak<Mutex<dyn EventCallback<E>>>;

/// Subscribers of one event type, in registration order.
struct SubscriberList<E: 'static> {
    entries: Vec<(usize, Subscriber<E>)>,
}

impl<E: 'static> SubscriberList<E> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Drops entries whose subscriber no longer exists.
    fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, weak)| weak.strong_count() > 0);
        before - self.entries.len()
    }
}

/// Identity of a subscribed callback: the address of its shared cell.
pub(crate) fn address<T: ?Sized>(callback: &Arc<Mutex<T>>) -> usize {
    Arc::as_ptr(callback).cast::<()>() as usize
}

/// Per-event-type subscriber lists.
#[derive(Default)]
pub struct EventBus {
    channels: HashMap<TypeKey, Polymorph>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `callback` to events of type `E`.
    ///
    /// Returns `false` when the callback is already subscribed to `E`; it is
    /// never delivered the same event twice.
    pub fn subscribe<E, C>(&mut self, callback: &Arc<Mutex<C>>) -> bool
    where
        E: 'static,
        C: EventCallback<E> + 'static,
    {
        let list = self.list_mut::<E>();
        list.prune();

        let key = address(callback);
        if list.entries.iter().any(|(existing, _)| *existing == key) {
            tracing::debug!(event = TypeKey::of::<E>().name(), "duplicate subscription ignored");
            return false;
        }

        let erased: Arc<Mutex<dyn EventCallback<E>>> = callback.clone();
        list.entries.push((key, Arc::downgrade(&erased)));
        true
    }

    /// Removes `callback` from the subscribers of `E`.
    ///
    /// Returns `false` if it was not subscribed.
    pub fn unsubscribe<E, C>(&mut self, callback: &Arc<Mutex<C>>) -> bool
    where
        E: 'static,
        C: EventCallback<E> + 'static,
    {
        let Some(list) = self.list_existing_mut::<E>() else {
            tracing::debug!(event = TypeKey::of::<E>().name(), "unsubscribe without subscription");
            return false;
        };

        let key = address(callback);
        let before = list.entries.len();
        list.entries.retain(|(existing, _)| *existing != key);
        let removed = list.entries.len() != before;
        if !removed {
            tracing::debug!(event = TypeKey::of::<E>().name(), "unsubscribe without subscription");
        }
        removed
    }

    /// Delivers `event` to every live subscriber of `E`, in registration
    /// order, before returning.
    ///
    /// Blocks on each subscriber's lock, so a subscriber held by another
    /// thread still receives the event once that thread lets go. Never call
    /// this while the current thread holds a subscriber's lock.
    ///
    /// # Returns
    ///
    /// Number of subscribers that received the event.
    pub fn emit<E: 'static>(&mut self, event: &E) -> usize {
        self.emit_skipping(event, None)
    }

    /// [`EventBus::emit`], except the subscriber whose cell lives at
    /// `running` is passed over. The world passes the system it is ticking,
    /// whose lock the current thread already holds.
    pub(crate) fn emit_skipping<E: 'static>(&mut self, event: &E, running: Option<usize>) -> usize {
        let Some(list) = self.list_existing_mut::<E>() else {
            return 0;
        };

        let pruned = list.prune();
        if pruned > 0 {
            tracing::warn!(
                event = TypeKey::of::<E>().name(),
                pruned,
                "subscribers dropped without unsubscribing"
            );
        }

        let live: Vec<_> = list
            .entries
            .iter()
            .filter(|(key, _)| {
                let reentrant = Some(*key) == running;
                if reentrant {
                    tracing::warn!(
                        event = TypeKey::of::<E>().name(),
                        "running system emitted its own event, delivery skipped"
                    );
                }
                !reentrant
            })
            .filter_map(|(_, weak)| weak.upgrade())
            .collect();

        let mut delivered = 0;
        for subscriber in live {
            subscriber.lock().on_event(event);
            delivered += 1;
        }
        delivered
    }

    /// Live subscribers of `E`.
    #[must_use]
    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.channels
            .get(&TypeKey::of::<E>())
            .and_then(|cell| cell.get::<SubscriberList<E>>().ok())
            .map_or(0, |list| {
                list.entries
                    .iter()
                    .filter(|(_, weak)| weak.strong_count() > 0)
                    .count()
            })
    }

    /// Drops every subscription.
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    fn list_mut<E: 'static>(&mut self) -> &mut SubscriberList<E> {
        self.channels
            .entry(TypeKey::of::<E>())
            .or_insert_with(|| Polymorph::new(SubscriberList::<E>::new()))
            .get_or_insert_with(SubscriberList::<E>::new)
    }

    fn list_existing_mut<E: 'static>(&mut self) -> Option<&mut SubscriberList<E>> {
        self.channels
            .get_mut(&TypeKey::of::<E>())
            .and_then(|cell| cell.get_mut::<SubscriberList<E>>().ok())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.channels.len())
            .finish()
    }
}

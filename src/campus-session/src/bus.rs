//! Synchronous publish/subscribe.
//!
//! Listeners run on the publishing task, in registration order. `publish`
//! iterates over a snapshot of the registry, so a listener removed while a
//! publish is running still receives that event and a listener added while
//! it runs does not. There is no replay.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::types::SessionStatus;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;
type Registry<E> = Mutex<Vec<(Uuid, Listener<E>)>>;

/// Ordered multi-subscriber broadcast channel.
pub struct EventBus<E> {
    listeners: Arc<Registry<E>>,
}

impl<E: 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register `listener`. Keep the returned handle to unsubscribe later.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.listeners.lock().push((id, Arc::new(listener)));

        let registry: Weak<Registry<E>> = Arc::downgrade(&self.listeners);
        Subscription {
            id,
            remove: Box::new(move |id| {
                if let Some(registry) = registry.upgrade() {
                    registry.lock().retain(|(entry, _)| *entry != id);
                }
            }),
        }
    }

    /// Deliver `event` to every listener registered at the time of the call.
    pub fn publish(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<E: 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.listeners.lock().len())
            .finish()
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle does not unsubscribe.
pub struct Subscription {
    id: Uuid,
    remove: Box<dyn Fn(Uuid) + Send + Sync>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remove the listener. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        (self.remove)(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Why the session stopped being valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    /// The user signed out.
    LoggedOut,
    /// The backend rejected the current token.
    SessionExpired,
}

/// Broadcasts "the session is no longer valid".
pub type AuthInvalidationBus = EventBus<InvalidationReason>;

/// Broadcasts every session status transition.
pub type StatusListeners = EventBus<SessionStatus>;

//! Pub/Sub event bus for playback notifications.
//!
//! - Listeners subscribe to an event type with a callback
//! - emit() invokes callbacks synchronously on the calling (tick) thread
//! - Nothing is retained after delivery; an event with no listeners is dropped
//!
//! Callback order: FIFO (first-subscribed, first-called) within same event type.

use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Type-erased callback
type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Identity of the controller that emitted an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ControllerId(pub Uuid);

impl ControllerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ControllerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload shared by all playback notifications
#[derive(Debug, Clone, Serialize)]
pub struct EventInfo {
    pub controller: ControllerId,
    pub sequence_path: PathBuf,
    /// Resolution of the last presented frame, if any frame was presented
    pub frame_size: Option<(usize, usize)>,
    /// Seconds per frame (1 / frame rate)
    pub frame_duration: f32,
}

/// Playhead wrapped around (or bounced, with reverse-at-loop)
#[derive(Debug, Clone)]
pub struct SequenceLooped(pub EventInfo);

/// Non-looping playback reached its last frame
#[derive(Debug, Clone)]
pub struct SequenceEnded(pub EventInfo);

/// Pub/Sub event bus with synchronous delivery.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<TypeId, Vec<Callback>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_types", &self.subscribers.read().map(|s| s.len()).unwrap_or(0))
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to events of type E.
    ///
    /// # Example
    /// ```ignore
    /// controller.event_bus().subscribe::<SequenceLooped, _>(|e| {
    ///     log::info!("looped: {}", e.0.sequence_path.display());
    /// });
    /// ```
    pub fn subscribe<E, F>(&self, callback: F)
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(type_id)
            .or_default()
            .push(wrapped);
    }

    /// Emit event: invoke every callback registered for E, in subscription order.
    pub fn emit<E: Event>(&self, event: E) {
        let type_id = TypeId::of::<E>();

        // Clone the list so callbacks may subscribe without deadlocking
        let callbacks = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&type_id)
            .cloned()
            .unwrap_or_default();
        for cb in &callbacks {
            cb(&event);
        }
    }

    /// Clear subscribers for type E
    pub fn unsubscribe_all<E: Event>(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&TypeId::of::<E>());
    }

    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn info() -> EventInfo {
        EventInfo {
            controller: ControllerId::new(),
            sequence_path: PathBuf::from("/seq"),
            frame_size: Some((4, 4)),
            frame_duration: 0.1,
        }
    }

    #[test]
    fn test_subscribe_and_emit() {
        let bus = EventBus::new();
        let looped = Arc::new(AtomicUsize::new(0));
        let ended = Arc::new(AtomicUsize::new(0));

        let l = Arc::clone(&looped);
        bus.subscribe::<SequenceLooped, _>(move |_| {
            l.fetch_add(1, Ordering::SeqCst);
        });
        let e = Arc::clone(&ended);
        bus.subscribe::<SequenceEnded, _>(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(SequenceLooped(info()));
        bus.emit(SequenceLooped(info()));
        bus.emit(SequenceEnded(info()));

        assert_eq!(looped.load(Ordering::SeqCst), 2);
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_multiple_listeners_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            let order = Arc::clone(&order);
            bus.subscribe::<SequenceEnded, _>(move |_| order.lock().unwrap().push(id));
        }
        bus.emit(SequenceEnded(info()));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[derive(Clone)]
    struct Tracked(Arc<()>);

    #[test]
    fn test_delivered_events_are_not_retained() {
        let bus = EventBus::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&delivered);
        bus.subscribe::<Tracked, _>(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        });

        let token = Arc::new(());
        for _ in 0..1000 {
            bus.emit(Tracked(Arc::clone(&token)));
        }
        // No listener for SequenceEnded: dropped on the floor
        bus.emit(SequenceEnded(info()));

        assert_eq!(delivered.load(Ordering::SeqCst), 1000);
        assert_eq!(Arc::strong_count(&token), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        bus.subscribe::<SequenceLooped, _>(|_| {});
        assert!(bus.has_subscribers::<SequenceLooped>());
        bus.unsubscribe_all::<SequenceLooped>();
        assert!(!bus.has_subscribers::<SequenceLooped>());
    }
}

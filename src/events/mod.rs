//! Cluster Event Bus
//!
//! Typed events for failover transitions and split-brain detections.
//! Emission is fire-and-forget and must never fail the emitter's caller:
//! subscribers run synchronously in registration order, and a panicking
//! subscriber is logged and skipped rather than propagated.
//!
//! Subscribers must not call back into the component that emitted the
//! event; transition events are emitted while the coordinator's lock is
//! held so observers see a consistent ordering.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use tracing::error;

use crate::cluster::SplitBrainDetection;
use crate::failover::FailoverEvent;

/// Any event the coordination core emits.
#[derive(Debug, Clone)]
pub enum ClusterEvent {
    /// A failover transition or blocked promotion.
    Failover(FailoverEvent),
    /// A split-brain observation.
    SplitBrain(SplitBrainDetection),
}

impl ClusterEvent {
    /// Stable event name for logs and metrics.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Failover(event) => event.event_name(),
            Self::SplitBrain(_) => "cluster.split_brain_detected",
        }
    }
}

/// Emitter port. Emission never fails the caller.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: &ClusterEvent);
}

type Subscriber = Box<dyn Fn(&ClusterEvent) + Send + Sync>;

/// In-process event bus with synchronous subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Subscribers are invoked in registration
    /// order.
    pub fn subscribe(&self, subscriber: impl Fn(&ClusterEvent) + Send + Sync + 'static) {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::new(subscriber));
    }
}

impl EventEmitter for EventBus {
    fn emit(&self, event: &ClusterEvent) {
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for subscriber in subscribers.iter() {
            if catch_unwind(AssertUnwindSafe(|| subscriber(event))).is_err() {
                error!(event = event.event_name(), "event subscriber panicked");
            }
        }
    }
}

/// Emitter that drops everything.
pub struct NullEmitter;

impl EventEmitter for NullEmitter {
    fn emit(&self, _event: &ClusterEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failover::{FailoverEvent, FailoverEventKind, NodeRole, TransitionReason};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn promoted() -> ClusterEvent {
        ClusterEvent::Failover(FailoverEvent::new(
            FailoverEventKind::Promoted,
            NodeRole::Replica,
            NodeRole::Primary,
            TransitionReason::Election,
        ))
    }

    #[test]
    fn test_subscribers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe(move |_| order.lock().unwrap().push(tag));
        }

        bus.emit(&promoted());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_panicking_subscriber_does_not_fail_emit() {
        let bus = EventBus::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        bus.subscribe(|_| panic!("subscriber bug"));
        let counter = Arc::clone(&delivered);
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&promoted());
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(promoted().event_name(), "failover.promoted");
    }
}

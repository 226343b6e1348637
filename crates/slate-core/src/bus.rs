#![forbid(unsafe_code)]

//! Typed publish/subscribe event bus.
//!
//! The bus fan-outs [`EventEnvelope`]s to priority-ordered listeners.
//! Synchronous publication delivers inline from the caller's frame;
//! asynchronous publication enqueues a copy into a bounded FIFO drained
//! by [`EventBus::process_events`] on the main thread.
//!
//! # Invariants
//!
//! 1. Listeners for a tag iterate in descending priority, ties in
//!    insertion order
//! 2. A one-shot listener is notified at most once over its lifetime
//! 3. `publish_async` never blocks: a full queue drops the new event and
//!    reports failure
//! 4. Listener failures are counted, never propagated; delivery continues
//!    with the next listener
//!
//! # Threading
//!
//! The bus itself is main-thread-only. Background producers (UART drain,
//! network workers) clone a [`BusSender`] and enqueue through it; the
//! channel is the only cross-thread structure. Synchronous listener
//! callbacks must not call back into the bus; re-publication from inside
//! a callback goes through a captured [`BusSender`].

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use tracing::{debug, warn};

use crate::error::SysResult;
use crate::event::{EventEnvelope, EventType};

/// Default listener priority.
pub const DEFAULT_LISTENER_PRIORITY: u8 = 100;

/// Default number of queued events delivered per [`EventBus::process_events`]
/// call. Bounds the bus's share of a frame.
pub const DEFAULT_PROCESS_CAP: usize = 10;

/// Stable handle to a subscription.
pub type ListenerId = u64;

/// Listener callback. Receives the envelope by reference; the payload is
/// only valid for the duration of the call.
pub type ListenerFn = Box<dyn FnMut(&EventEnvelope) -> SysResult<()>>;

struct Listener {
    id: ListenerId,
    priority: u8,
    one_shot: bool,
    call_count: u32,
    callback: ListenerFn,
}

/// Delivery and queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Events published synchronously.
    pub published_sync: u64,
    /// Events accepted into the async queue.
    pub published_async: u64,
    /// Events dropped because the queue was full.
    pub dropped: u64,
    /// Individual listener notifications that succeeded.
    pub delivered: u64,
    /// Individual listener notifications that returned an error.
    pub failed_deliveries: u64,
}

/// Cloneable async-publication handle for background producers.
///
/// Enqueueing is lock-light and never blocks; a full queue reports
/// failure to the producer, which must tolerate the drop.
#[derive(Clone)]
pub struct BusSender {
    tx: SyncSender<EventEnvelope>,
}

impl BusSender {
    /// Enqueue a copy of the event. Returns `false` if the queue is full
    /// or the bus is gone.
    pub fn publish(&self, event: EventEnvelope) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// In-process pub/sub with typed events and priority-ordered listeners.
pub struct EventBus {
    listeners: HashMap<u32, Vec<Listener>>,
    next_id: ListenerId,
    tx: SyncSender<EventEnvelope>,
    rx: Receiver<EventEnvelope>,
    process_cap: usize,
    stats: BusStats,
}

impl EventBus {
    /// Create a bus whose async queue holds at most `queue_capacity` events.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        let (tx, rx) = sync_channel(queue_capacity.max(1));
        Self {
            listeners: HashMap::new(),
            next_id: 1,
            tx,
            rx,
            process_cap: DEFAULT_PROCESS_CAP,
            stats: BusStats::default(),
        }
    }

    /// Override the per-call delivery cap of [`process_events`](Self::process_events).
    pub fn set_process_cap(&mut self, cap: usize) {
        self.process_cap = cap.max(1);
    }

    /// A handle for producers on other threads (or re-entrant listeners).
    #[must_use]
    pub fn sender(&self) -> BusSender {
        BusSender {
            tx: self.tx.clone(),
        }
    }

    // --- Subscription ------------------------------------------------------

    /// Subscribe at [`DEFAULT_LISTENER_PRIORITY`], repeating.
    pub fn subscribe(&mut self, event_type: EventType, callback: ListenerFn) -> ListenerId {
        self.subscribe_with(event_type, DEFAULT_LISTENER_PRIORITY, false, callback)
    }

    /// Subscribe with explicit priority and one-shot flag.
    ///
    /// Higher priority is notified first; equal priorities keep insertion
    /// order. The returned id stays valid until unsubscribed or, for
    /// one-shot listeners, until the sweep after their first notification.
    pub fn subscribe_with(
        &mut self,
        event_type: EventType,
        priority: u8,
        one_shot: bool,
        callback: ListenerFn,
    ) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        let list = self.listeners.entry(event_type.0).or_default();
        // Insertion point after all entries with priority >= new keeps
        // descending order with stable ties.
        let at = list.partition_point(|l| l.priority >= priority);
        list.insert(
            at,
            Listener {
                id,
                priority,
                one_shot,
                call_count: 0,
                callback,
            },
        );
        debug!(listener = id, tag = event_type.0, priority, one_shot, "subscribe");
        id
    }

    /// Remove a subscription. Returns `true` exactly once per id.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        for list in self.listeners.values_mut() {
            if let Some(pos) = list.iter().position(|l| l.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Remove every subscription for a tag. Returns how many were removed.
    pub fn unsubscribe_all(&mut self, event_type: EventType) -> usize {
        self.listeners
            .remove(&event_type.0)
            .map_or(0, |list| list.len())
    }

    /// Number of live listeners for a tag.
    #[must_use]
    pub fn listener_count(&self, event_type: EventType) -> usize {
        self.listeners.get(&event_type.0).map_or(0, Vec::len)
    }

    // --- Publication -------------------------------------------------------

    /// Deliver inline to every listener for the event's tag, in priority
    /// order. Returns the number successfully notified.
    pub fn publish_sync(&mut self, event: &EventEnvelope) -> usize {
        self.stats.published_sync += 1;
        let Some(list) = self.listeners.get_mut(&event.event_type.0) else {
            return 0;
        };
        let mut notified = 0;
        for listener in list.iter_mut() {
            if listener.one_shot && listener.call_count > 0 {
                continue;
            }
            listener.call_count += 1;
            match (listener.callback)(event) {
                Ok(()) => {
                    notified += 1;
                    self.stats.delivered += 1;
                }
                Err(err) => {
                    self.stats.failed_deliveries += 1;
                    warn!(
                        listener = listener.id,
                        tag = event.event_type.0,
                        %err,
                        "listener failed; continuing"
                    );
                }
            }
        }
        notified
    }

    /// Enqueue a copy of the event for later delivery. Returns `false`
    /// (and drops the event) when the queue is full.
    pub fn publish_async(&mut self, event: EventEnvelope) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.stats.published_async += 1;
                true
            }
            Err(TrySendError::Full(ev)) => {
                self.stats.dropped += 1;
                debug!(tag = ev.event_type.0, "async queue full; event dropped");
                false
            }
            // The bus owns both ends; disconnection cannot happen here.
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Drain queued events in FIFO order, delivering each with sync
    /// semantics, bounded by the per-call cap. Afterwards, sweep one-shot
    /// listeners that have fired. Returns the number of events delivered.
    pub fn process_events(&mut self) -> usize {
        let mut processed = 0;
        while processed < self.process_cap {
            let Ok(event) = self.rx.try_recv() else { break };
            self.publish_sync(&event);
            processed += 1;
        }
        self.sweep_one_shots();
        processed
    }

    /// Cumulative counters.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        self.stats
    }

    fn sweep_one_shots(&mut self) {
        for list in self.listeners.values_mut() {
            list.retain(|l| !(l.one_shot && l.call_count > 0));
        }
        self.listeners.retain(|_, list| !list.is_empty());
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("tags", &self.listeners.len())
            .field("next_id", &self.next_id)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Ticks;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn env(tag: EventType) -> EventEnvelope {
        EventEnvelope::new(tag, Ticks::ZERO, "test")
    }

    #[test]
    fn publish_with_no_listeners_is_a_no_op() {
        let mut bus = EventBus::new(8);
        assert_eq!(bus.publish_sync(&env(EventType::USER_BASE)), 0);
        assert_eq!(bus.stats().delivered, 0);
    }

    #[test]
    fn priority_orders_delivery() {
        let mut bus = EventBus::new(8);
        let order = Rc::new(RefCell::new(Vec::new()));
        for (tag, prio) in [("low", 10u8), ("high", 200), ("mid", 100)] {
            let order = Rc::clone(&order);
            bus.subscribe_with(
                EventType::USER_BASE,
                prio,
                false,
                Box::new(move |_| {
                    order.borrow_mut().push(tag);
                    Ok(())
                }),
            );
        }
        assert_eq!(bus.publish_sync(&env(EventType::USER_BASE)), 3);
        assert_eq!(*order.borrow(), vec!["high", "mid", "low"]);
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let mut bus = EventBus::new(8);
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            bus.subscribe(
                EventType::USER_BASE,
                Box::new(move |_| {
                    order.borrow_mut().push(tag);
                    Ok(())
                }),
            );
        }
        bus.publish_sync(&env(EventType::USER_BASE));
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_returns_true_exactly_once() {
        let mut bus = EventBus::new(8);
        let id = bus.subscribe(EventType::USER_BASE, Box::new(|_| Ok(())));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn unsubscribe_all_reports_count() {
        let mut bus = EventBus::new(8);
        bus.subscribe(EventType::USER_BASE, Box::new(|_| Ok(())));
        bus.subscribe(EventType::USER_BASE, Box::new(|_| Ok(())));
        bus.subscribe(EventType::SYS_WAKE, Box::new(|_| Ok(())));
        assert_eq!(bus.unsubscribe_all(EventType::USER_BASE), 2);
        assert_eq!(bus.listener_count(EventType::USER_BASE), 0);
        assert_eq!(bus.listener_count(EventType::SYS_WAKE), 1);
    }

    #[test]
    fn listener_failure_does_not_stop_delivery() {
        let mut bus = EventBus::new(8);
        let hits = Rc::new(RefCell::new(0));
        bus.subscribe_with(
            EventType::USER_BASE,
            200,
            false,
            Box::new(|_| Err(crate::error::SysError::Generic)),
        );
        {
            let hits = Rc::clone(&hits);
            bus.subscribe(
                EventType::USER_BASE,
                Box::new(move |_| {
                    *hits.borrow_mut() += 1;
                    Ok(())
                }),
            );
        }
        assert_eq!(bus.publish_sync(&env(EventType::USER_BASE)), 1);
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.stats().failed_deliveries, 1);
    }

    #[test]
    fn one_shot_fires_once_and_is_swept() {
        let mut bus = EventBus::new(8);
        let hits = Rc::new(RefCell::new(0));
        {
            let hits = Rc::clone(&hits);
            bus.subscribe_with(
                EventType::USER_BASE,
                100,
                true,
                Box::new(move |_| {
                    *hits.borrow_mut() += 1;
                    Ok(())
                }),
            );
        }
        bus.publish_sync(&env(EventType::USER_BASE));
        bus.publish_sync(&env(EventType::USER_BASE));
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.listener_count(EventType::USER_BASE), 1);
        bus.process_events();
        assert_eq!(bus.listener_count(EventType::USER_BASE), 0);
    }

    #[test]
    fn async_queue_bounds_and_recovers() {
        let mut bus = EventBus::new(2);
        assert!(bus.publish_async(env(EventType::USER_BASE)));
        assert!(bus.publish_async(env(EventType::USER_BASE)));
        assert!(!bus.publish_async(env(EventType::USER_BASE)));
        assert_eq!(bus.stats().dropped, 1);

        // Draining frees slots; the next publish succeeds.
        assert_eq!(bus.process_events(), 2);
        assert!(bus.publish_async(env(EventType::USER_BASE)));
    }

    #[test]
    fn process_events_respects_the_cap() {
        let mut bus = EventBus::new(32);
        bus.set_process_cap(3);
        for _ in 0..5 {
            assert!(bus.publish_async(env(EventType::USER_BASE)));
        }
        assert_eq!(bus.process_events(), 3);
        assert_eq!(bus.process_events(), 2);
        assert_eq!(bus.process_events(), 0);
    }

    #[test]
    fn async_delivery_is_fifo() {
        let mut bus = EventBus::new(8);
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            bus.subscribe(
                EventType::USER_BASE,
                Box::new(move |e| {
                    seen.borrow_mut().push(e.payload[0]);
                    Ok(())
                }),
            );
        }
        for b in [1u8, 2, 3] {
            bus.publish_async(env(EventType::USER_BASE).with_payload(vec![b]));
        }
        bus.process_events();
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn sender_publishes_from_another_thread() {
        let mut bus = EventBus::new(8);
        let seen = Rc::new(RefCell::new(0));
        {
            let seen = Rc::clone(&seen);
            bus.subscribe(
                EventType::HAL_UART_RX,
                Box::new(move |_| {
                    *seen.borrow_mut() += 1;
                    Ok(())
                }),
            );
        }
        let sender = bus.sender();
        std::thread::spawn(move || {
            sender.publish(EventEnvelope::new(
                EventType::HAL_UART_RX,
                Ticks::ZERO,
                "uart",
            ));
        })
        .join()
        .unwrap();
        assert_eq!(bus.process_events(), 1);
        assert_eq!(*seen.borrow(), 1);
    }
}

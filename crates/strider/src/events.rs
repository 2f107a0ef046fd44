//! # STRIDER Event Bus
//!
//! Relays movement events from the simulation loop to whoever consumes
//! them (audio, animation, network replication).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ drain  ┌─────────────┐ send   ┌─────────────┐
//! │ MoverActor  │───────>│ Simulation  │───────>│  Event      │──> consumers
//! │  (per id)   │        │   Loop      │        │  Channel    │
//! └─────────────┘        └─────────────┘        └─────────────┘
//! ```
//!
//! The channel is bounded. When it is full the loop drops the event and
//! logs a warning rather than stall the tick.

use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use strider_shared::MoverEvent;
use tracing::warn;

/// Identifies an actor registered with a [`crate::SimulationLoop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// A movement event tagged with the actor that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActorEvent {
    /// Producing actor.
    pub actor: ActorId,
    /// The event itself.
    pub event: MoverEvent,
}

/// Bounded multi-producer multi-consumer channel for [`ActorEvent`]s.
pub struct EventBus {
    sender: Sender<ActorEvent>,
    receiver: Receiver<ActorEvent>,
}

impl EventBus {
    /// Creates a bus holding at most `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Creates a sender handle.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Creates a receiver handle. Receivers compete for events.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Creates a new pair of sender and receiver.
    #[must_use]
    pub fn create_pair(capacity: usize) -> (EventSender, EventReceiver) {
        let bus = Self::new(capacity);
        (bus.sender(), bus.receiver())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.receiver.len())
            .field("capacity", &self.sender.capacity())
            .finish()
    }
}

/// Handle for sending events.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: Sender<ActorEvent>,
}

impl EventSender {
    /// Sends an event without blocking.
    ///
    /// Returns `false` when the event was dropped.
    #[inline]
    pub fn send(&self, event: ActorEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!(actor = %dropped.actor, time_ms = dropped.event.sim_time_ms(), "event bus full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Sends an event, waiting for room.
    ///
    /// Only for events that must be delivered; a stalled consumer stalls the caller.
    #[inline]
    pub fn send_blocking(&self, event: ActorEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Handle for receiving events.
#[derive(Clone, Debug)]
pub struct EventReceiver {
    receiver: Receiver<ActorEvent>,
}

impl EventReceiver {
    /// Takes every pending event without blocking.
    #[inline]
    pub fn drain(&self) -> Vec<ActorEvent> {
        let mut events = Vec::with_capacity(64);
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Takes one event, if any is pending.
    #[inline]
    pub fn try_recv(&self) -> Option<ActorEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// True when at least one event is pending.
    #[inline]
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.receiver.is_empty()
    }
}

//! Movement events emitted by the core.
//!
//! The core only enqueues these records. Hosts drain them after each tick
//! and relay them to animation, audio, telemetry or the network.

use crate::math::Vec3;
use crate::mode::ModeId;
use serde::{Deserialize, Serialize};

/// Event type discriminator
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Landed on a walkable floor
    Landed = 0,
    /// Started sprinting
    SprintStarted = 1,
    /// Stopped sprinting
    SprintStopped = 2,
    /// Jumped
    Jumped = 3,
    /// Attached to a wall
    WallRunStarted = 4,
    /// Detached from a wall
    WallRunEnded = 5,
    /// Jumped off a wall
    WallJumped = 6,
    /// Hit a non-walkable surface while airborne
    Impact = 7,
    /// Active mode changed
    ModeChanged = 8,
    /// Stance started or ended
    StanceChanged = 9,
}

/// Stance carried by [`MoverEvent::StanceChanged`].
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stance {
    /// No stance active
    #[default]
    Invalid = 0,
    /// Crouched
    Crouch = 1,
    /// Wide shape (reserved)
    Fat = 2,
}

/// Events produced by a movement tick
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MoverEvent {
    /// Landed on a walkable floor
    Landed {
        /// Simulation time (ms)
        sim_time_ms: f64,
        /// Shape location after landing
        position: Vec3,
        /// Floor normal
        normal: Vec3,
        /// Speed at impact (cm/s)
        impact_speed: f32,
    },

    /// Walking switched to the sprint parameter set
    SprintStarted {
        /// Simulation time (ms)
        sim_time_ms: f64,
    },

    /// Walking left the sprint parameter set (or left the ground)
    SprintStopped {
        /// Simulation time (ms)
        sim_time_ms: f64,
    },

    /// A jump transition fired
    Jumped {
        /// Simulation time (ms)
        sim_time_ms: f64,
        /// Upwards speed of the jump (cm/s)
        upwards_speed: f32,
    },

    /// Wall running started
    WallRunStarted {
        /// Simulation time (ms)
        sim_time_ms: f64,
        /// Wall normal
        wall_normal: Vec3,
    },

    /// Wall running ended
    WallRunEnded {
        /// Simulation time (ms)
        sim_time_ms: f64,
    },

    /// Jumped off a wall
    WallJumped {
        /// Simulation time (ms)
        sim_time_ms: f64,
        /// Length of the jump momentum (cm/s)
        magnitude: f32,
    },

    /// Airborne impact against a non-walkable surface
    Impact {
        /// Simulation time (ms)
        sim_time_ms: f64,
        /// Surface normal
        normal: Vec3,
        /// Speed into the surface (cm/s)
        speed: f32,
    },

    /// Active mode changed between ticks
    ModeChanged {
        /// Simulation time (ms)
        sim_time_ms: f64,
        /// Previous mode
        from: ModeId,
        /// New mode
        to: ModeId,
    },

    /// Stance started or ended
    StanceChanged {
        /// Simulation time (ms)
        sim_time_ms: f64,
        /// Stance affected
        stance: Stance,
        /// True when the stance became active
        active: bool,
    },
}

impl MoverEvent {
    /// Get the event type
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::Landed { .. } => EventType::Landed,
            Self::SprintStarted { .. } => EventType::SprintStarted,
            Self::SprintStopped { .. } => EventType::SprintStopped,
            Self::Jumped { .. } => EventType::Jumped,
            Self::WallRunStarted { .. } => EventType::WallRunStarted,
            Self::WallRunEnded { .. } => EventType::WallRunEnded,
            Self::WallJumped { .. } => EventType::WallJumped,
            Self::Impact { .. } => EventType::Impact,
            Self::ModeChanged { .. } => EventType::ModeChanged,
            Self::StanceChanged { .. } => EventType::StanceChanged,
        }
    }

    /// Simulation time the event was raised at
    #[must_use]
    pub const fn sim_time_ms(&self) -> f64 {
        match self {
            Self::Landed { sim_time_ms, .. }
            | Self::SprintStarted { sim_time_ms }
            | Self::SprintStopped { sim_time_ms }
            | Self::Jumped { sim_time_ms, .. }
            | Self::WallRunStarted { sim_time_ms, .. }
            | Self::WallRunEnded { sim_time_ms }
            | Self::WallJumped { sim_time_ms, .. }
            | Self::Impact { sim_time_ms, .. }
            | Self::ModeChanged { sim_time_ms, .. }
            | Self::StanceChanged { sim_time_ms, .. } => *sim_time_ms,
        }
    }
}

/// Ordered per-actor queue the driver fills during a tick.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    events: Vec<MoverEvent>,
}

impl EventQueue {
    /// Creates an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Appends an event.
    pub fn push(&mut self, event: MoverEvent) {
        self.events.push(event);
    }

    /// Removes and returns every queued event in emission order.
    pub fn drain(&mut self) -> Vec<MoverEvent> {
        std::mem::take(&mut self.events)
    }

    /// Queued events, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[MoverEvent] {
        &self.events
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

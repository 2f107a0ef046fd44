//! Committed kinematic state and the per-tick value types flowing between
//! the driver, the active mode and the layered-move stack.

use serde::{Deserialize, Serialize};
use strider_shared::{ModeId, MoverInputs, Quaternion, TagSet, Vec3, MS_TO_S};

/// The actor's committed kinematic state.
///
/// Owned by the driver. Mutated only inside a tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Capsule center (cm).
    pub position: Vec3,
    /// Facing rotation.
    pub orientation: Quaternion,
    /// Linear velocity (cm/s).
    pub velocity: Vec3,
    /// Angular velocity as axis * deg/s.
    pub angular_velocity: Vec3,
    /// Active mode.
    pub mode: ModeId,
    /// Movement intent consumed by the last tick.
    pub move_intent: Vec3,
    /// Gameplay tags carried with the state.
    pub tags: TagSet,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quaternion::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mode: ModeId::Walking,
            move_intent: Vec3::ZERO,
            tags: TagSet::EMPTY,
        }
    }
}

impl SimulationState {
    /// State at `position` in `mode`, at rest.
    #[must_use]
    pub fn at(position: Vec3, mode: ModeId) -> Self {
        Self { position, mode, ..Self::default() }
    }

    /// Sets the velocity.
    #[must_use]
    pub const fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Sets the tags.
    #[must_use]
    pub const fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    /// True when every kinematic field is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.angular_velocity.is_finite()
            && self.orientation.is_finite()
            && self.move_intent.is_finite()
    }

    /// Replaces non-finite fields with safe values.
    ///
    /// Position falls back to `fallback_position` (the last committed one).
    /// Returns true when anything had to be replaced.
    pub fn sanitize(&mut self, fallback_position: Vec3) -> bool {
        if self.is_finite() {
            return false;
        }
        if !self.position.is_finite() {
            self.position = fallback_position;
        }
        if !self.orientation.is_finite() {
            self.orientation = Quaternion::IDENTITY;
        }
        self.velocity = self.velocity.finite_or_zero();
        self.angular_velocity = self.angular_velocity.finite_or_zero();
        self.move_intent = self.move_intent.finite_or_zero();
        true
    }
}

/// Timing for one tick (or one refund substep).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickContext {
    /// Step length (ms).
    pub step_ms: f32,
    /// Simulation time at the start of the step (ms).
    pub sim_time_ms: f64,
    /// Tick counter. Substeps of one tick share it.
    pub tick: u64,
}

impl TickContext {
    /// Creates a tick context.
    #[must_use]
    pub const fn new(step_ms: f32, sim_time_ms: f64, tick: u64) -> Self {
        Self { step_ms, sim_time_ms, tick }
    }

    /// Step length in seconds.
    #[must_use]
    pub fn delta_seconds(&self) -> f32 {
        self.step_ms * MS_TO_S
    }

    /// Simulation time at the end of the step (ms).
    #[must_use]
    pub fn end_time_ms(&self) -> f64 {
        self.sim_time_ms + f64::from(self.step_ms)
    }
}

/// Everything a mode reads at the start of a step.
#[derive(Clone, Copy, Debug)]
pub struct StepInput<'a> {
    /// Committed state at the start of the step.
    pub start: &'a SimulationState,
    /// Inputs for the step.
    pub inputs: &'a MoverInputs,
    /// Timing.
    pub tick: TickContext,
}

/// How a layered velocity combines with the base velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MixMode {
    /// `base + layered`.
    #[default]
    Additive,
    /// Replaces the component along up.
    Override,
    /// Replaces the whole velocity.
    OverrideAll,
}

/// Velocity proposed for one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProposedMove {
    /// Linear velocity (cm/s).
    pub linear_velocity: Vec3,
    /// Angular velocity as axis * deg/s.
    pub angular_velocity: Vec3,
    /// Mode the proposer would like to run next.
    pub preferred_mode: Option<ModeId>,
    /// How this move was mixed.
    pub mix: MixMode,
    /// Planar direction the actor intends to move in.
    pub direction_intent: Vec3,
}

impl ProposedMove {
    /// Zero velocity, no hint.
    pub const ZERO: Self = Self {
        linear_velocity: Vec3::ZERO,
        angular_velocity: Vec3::ZERO,
        preferred_mode: None,
        mix: MixMode::Additive,
        direction_intent: Vec3::ZERO,
    };

    /// A move with only a linear velocity.
    #[must_use]
    pub const fn linear(linear_velocity: Vec3) -> Self {
        Self { linear_velocity, ..Self::ZERO }
    }

    /// Adds a preferred next mode.
    #[must_use]
    pub const fn preferring(mut self, mode: ModeId) -> Self {
        self.preferred_mode = Some(mode);
        self
    }
}

/// Result of `ApplyMovement`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveOutcome {
    /// State after the swept move.
    pub state: SimulationState,
    /// Mode the movement asks to switch to.
    pub next_mode: Option<ModeId>,
    /// Unused part of the step (ms).
    pub remaining_ms: f32,
}

impl MoveOutcome {
    /// An outcome that stays in the current mode and uses the whole step.
    #[must_use]
    pub const fn stay(state: SimulationState) -> Self {
        Self { state, next_mode: None, remaining_ms: 0.0 }
    }
}

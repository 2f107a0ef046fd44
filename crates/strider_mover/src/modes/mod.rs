//! # Movement Modes
//!
//! A mode proposes a velocity for the step (`generate_move`, read-only) and
//! then applies it against collision (`apply_movement`). Exactly one mode is
//! active per actor; switches happen between steps.
//!
//! ## Blackboard ownership
//!
//! | Mode        | Invalidates on deactivate                      |
//! |-------------|------------------------------------------------|
//! | Falling     | `LastFallTime`                                 |
//! | WallRunning | `LastWallResult`, `LastWallRunStartTime`*      |
//!
//! \* unless `reset_timer_only_on_land` is set, in which case Walking
//! invalidates it on activation.

pub mod falling;
pub mod walking;
pub mod wall_running;

use strider_shared::{EventQueue, ModeId, MoverInputs, Quaternion, Vec3};

use crate::blackboard::Blackboard;
use crate::collision::{CollisionQuery, CollisionShape};
use crate::error::MoverResult;
use crate::movement_utils::{compute_angular_velocity, integrate_orientation};
use crate::settings::SettingsBundle;
use crate::state::{MoveOutcome, ProposedMove, SimulationState, TickContext};

pub use falling::Falling;
pub use walking::Walking;
pub use wall_running::WallRunning;

// =============================================================================
// CONTEXTS
// =============================================================================

/// Read-only view handed to `generate_move`.
#[derive(Clone, Copy, Debug)]
pub struct MoveContext<'a> {
    /// State at the start of the step.
    pub start: &'a SimulationState,
    /// Inputs for the step.
    pub inputs: &'a MoverInputs,
    /// Timing.
    pub tick: TickContext,
    /// Effective settings (stance modifiers applied).
    pub settings: &'a SettingsBundle,
    /// Blackboard.
    pub blackboard: &'a Blackboard,
}

/// Mutable view handed to `apply_movement`.
pub struct ApplyContext<'a> {
    /// State at the start of the step.
    pub start: &'a SimulationState,
    /// Inputs for the step.
    pub inputs: &'a MoverInputs,
    /// Timing.
    pub tick: TickContext,
    /// Effective settings.
    pub settings: &'a SettingsBundle,
    /// Mixed move to apply.
    pub proposed: &'a ProposedMove,
    /// Geometry.
    pub world: &'a dyn CollisionQuery,
    /// Current collision shape.
    pub shape: CollisionShape,
    /// Blackboard.
    pub blackboard: &'a mut Blackboard,
    /// Output events.
    pub events: &'a mut EventQueue,
    /// A walker may step off ledges.
    pub can_walk_off_ledges: bool,
}

impl std::fmt::Debug for ApplyContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyContext")
            .field("start", self.start)
            .field("tick", &self.tick)
            .field("proposed", self.proposed)
            .finish_non_exhaustive()
    }
}

impl ApplyContext<'_> {
    /// Output state with orientation and intent advanced; position and
    /// velocity still at their start values.
    #[must_use]
    pub fn begin_output(&self) -> SimulationState {
        let mut out = *self.start;
        out.orientation = integrate_orientation(
            self.start.orientation,
            self.proposed.angular_velocity,
            self.tick.delta_seconds(),
        );
        out.angular_velocity = self.proposed.angular_velocity;
        out.move_intent = self.inputs.move_intent;
        out
    }

    /// Up direction.
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.settings.mover.up_direction
    }
}

// =============================================================================
// MODE TRAIT
// =============================================================================

/// A movement mode.
pub trait MovementMode: Send + Sync {
    /// Identifier this mode is registered under.
    fn id(&self) -> ModeId;

    /// Proposes the velocity for the step.
    ///
    /// # Errors
    ///
    /// Fails when a settings group the mode depends on is missing; the
    /// driver replaces the move with a zero move.
    fn generate_move(&self, ctx: &MoveContext<'_>) -> MoverResult<ProposedMove>;

    /// Sweeps the proposed move through the world.
    fn apply_movement(&self, ctx: &mut ApplyContext<'_>) -> MoveOutcome;

    /// Called when the mode becomes active.
    fn on_activate(&self, _blackboard: &mut Blackboard, _settings: &SettingsBundle) {}

    /// Called when the mode stops being active.
    fn on_deactivate(&self, _blackboard: &mut Blackboard, _settings: &SettingsBundle) {}
}

/// Registered modes of an actor.
#[derive(Default)]
pub struct ModeRegistry {
    modes: Vec<Box<dyn MovementMode>>,
}

impl std::fmt::Debug for ModeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.modes.iter().map(|m| m.id())).finish()
    }
}

impl ModeRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Walking, Falling and WallRunning.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(Walking));
        registry.register(Box::new(Falling));
        registry.register(Box::new(WallRunning));
        registry
    }

    /// Registers `mode`, replacing any mode with the same id.
    pub fn register(&mut self, mode: Box<dyn MovementMode>) {
        let id = mode.id();
        self.modes.retain(|m| m.id() != id);
        self.modes.push(mode);
    }

    /// Removes the mode registered under `id`.
    pub fn unregister(&mut self, id: ModeId) {
        self.modes.retain(|m| m.id() != id);
    }

    /// Mode registered under `id`.
    #[must_use]
    pub fn get(&self, id: ModeId) -> Option<&dyn MovementMode> {
        self.modes.iter().find(|m| m.id() == id).map(AsRef::as_ref)
    }

    /// True when `id` is registered.
    #[must_use]
    pub fn contains(&self, id: ModeId) -> bool {
        self.get(id).is_some()
    }
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Orientation intent: the input direction, else the current facing,
/// flattened when the actor must stay upright.
#[must_use]
pub fn orientation_intent(ctx: &MoveContext<'_>) -> Vec3 {
    let up = ctx.settings.mover.up_direction;
    let intent = if ctx.inputs.orientation_intent.is_nearly_zero(strider_shared::math::KINDA_SMALL_NUMBER) {
        ctx.start.orientation.forward()
    } else {
        ctx.inputs.orientation_intent
    };
    if ctx.settings.common.should_remain_upright {
        intent.project_onto_plane(up)
    } else {
        intent
    }
}

/// Angular velocity towards the orientation intent.
#[must_use]
pub fn turn_towards_intent(ctx: &MoveContext<'_>, turning_rate: f32, turning_boost: f32) -> Vec3 {
    compute_angular_velocity(
        ctx.start.orientation,
        orientation_intent(ctx),
        ctx.settings.mover.up_direction,
        ctx.tick.delta_seconds(),
        turning_rate,
        turning_boost,
    )
}

/// Heading-only rotation facing the orientation intent.
#[must_use]
pub fn intent_heading(ctx: &MoveContext<'_>) -> Quaternion {
    Quaternion::from_heading(orientation_intent(ctx), ctx.settings.mover.up_direction)
}

//! # Layered Moves
//!
//! Temporary velocity contributions mixed over the active mode's proposal.
//!
//! ## Mixing
//!
//! | Mix          | Result                                  |
//! |--------------|-----------------------------------------|
//! | Additive     | `base + layered`                        |
//! | Override     | `nonUp(base) + up(layered)`             |
//! | OverrideAll  | `layered`                               |
//!
//! OverrideAll moves fold the prior velocity they keep into `layered`
//! themselves (a jump adds the plane velocity it started with), which is
//! the same as `(base - contribution) + layered`.
//!
//! Moves are mixed oldest first. A move's declared mix never changes; on a
//! given tick it may still contribute an Additive zero (nothing to do).
//!
//! ## Lifetime
//!
//! Queued moves start on the next step (their start time is that step's
//! time) and expire once `now - start >= duration`. A negative duration
//! never expires by time.

pub mod jump_impulse;
pub mod multi_jump;

use strider_shared::{ModeId, MoverInputs, TagSet, Vec3};
use tracing::{debug, warn};

use crate::blackboard::Blackboard;
use crate::error::MoverResult;
use crate::settings::SettingsBundle;
use crate::state::{MixMode, ProposedMove, SimulationState, TickContext};

pub use jump_impulse::JumpImpulse;
pub use multi_jump::MultiJump;

/// Everything a layered move reads (and the blackboard it may stamp).
#[derive(Debug)]
pub struct LayeredContext<'a> {
    /// State at the start of the step.
    pub start: &'a SimulationState,
    /// Inputs for the step.
    pub inputs: &'a MoverInputs,
    /// Timing.
    pub tick: TickContext,
    /// Effective settings.
    pub settings: &'a SettingsBundle,
    /// Blackboard.
    pub blackboard: &'a mut Blackboard,
}

/// One move's contribution for one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayeredContribution {
    /// Linear velocity (cm/s).
    pub linear: Vec3,
    /// Angular velocity (axis * deg/s).
    pub angular: Vec3,
    /// Mode the move would like to run next.
    pub preferred_mode: Option<ModeId>,
    /// Mix used this step.
    pub mix: MixMode,
}

impl LayeredContribution {
    /// Contributes nothing.
    pub const NONE: Self = Self {
        linear: Vec3::ZERO,
        angular: Vec3::ZERO,
        preferred_mode: None,
        mix: MixMode::Additive,
    };
}

/// Combines a base velocity with a layered one.
#[must_use]
pub fn mix_velocity(base: Vec3, layered: Vec3, mix: MixMode, up: Vec3) -> Vec3 {
    match mix {
        MixMode::Additive => base + layered,
        MixMode::Override => base.project_onto_plane(up) + layered.project_onto_normal(up),
        MixMode::OverrideAll => layered,
    }
}

/// The concrete layered moves.
#[derive(Clone, Debug, PartialEq)]
pub enum LayeredMoveKind {
    /// Ground jump plus charges for jumps in the air.
    MultiJump(MultiJump),
    /// Hold-to-rise jump.
    JumpImpulse(JumpImpulse),
}

impl LayeredMoveKind {
    /// Name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MultiJump(_) => "MultiJump",
            Self::JumpImpulse(_) => "JumpImpulse",
        }
    }
}

/// A live (or queued) layered move.
#[derive(Clone, Debug, PartialEq)]
pub struct LayeredMove {
    start_ms: Option<f64>,
    duration_ms: f32,
    mix: MixMode,
    kind: LayeredMoveKind,
}

impl LayeredMove {
    /// Creates a move. A negative `duration_ms` never expires by time.
    #[must_use]
    pub const fn new(kind: LayeredMoveKind, mix: MixMode, duration_ms: f32) -> Self {
        Self { start_ms: None, duration_ms, mix, kind }
    }

    /// Declared mix mode.
    #[must_use]
    pub const fn mix(&self) -> MixMode {
        self.mix
    }

    /// Remaining configured duration (ms).
    #[must_use]
    pub const fn duration_ms(&self) -> f32 {
        self.duration_ms
    }

    /// Start time, once activated.
    #[must_use]
    pub const fn start_ms(&self) -> Option<f64> {
        self.start_ms
    }

    /// Concrete move.
    #[must_use]
    pub const fn kind(&self) -> &LayeredMoveKind {
        &self.kind
    }

    /// Ends the move at the next flush.
    pub fn cancel(&mut self) {
        self.duration_ms = 0.0;
    }

    /// True once the move has run for its duration.
    #[must_use]
    pub fn is_finished(&self, now_ms: f64) -> bool {
        match self.start_ms {
            Some(start) => self.duration_ms >= 0.0 && now_ms - start >= f64::from(self.duration_ms),
            None => false,
        }
    }

    fn generate(&mut self, ctx: &mut LayeredContext<'_>) -> MoverResult<LayeredContribution> {
        let start_ms = self.start_ms.unwrap_or(ctx.tick.sim_time_ms);
        match &mut self.kind {
            LayeredMoveKind::MultiJump(jump) => Ok(jump.generate(start_ms, &mut self.duration_ms, self.mix, ctx)),
            LayeredMoveKind::JumpImpulse(jump) => jump.generate(start_ms, &mut self.duration_ms, self.mix, ctx),
        }
    }
}

/// Queued and active layered moves of one actor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayeredMoveStack {
    queued: Vec<LayeredMove>,
    active: Vec<LayeredMove>,
}

impl LayeredMoveStack {
    /// Empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self { queued: Vec::new(), active: Vec::new() }
    }

    /// Queues a move; it starts on the next step.
    pub fn queue(&mut self, layered_move: LayeredMove) {
        debug!(kind = layered_move.kind.name(), mix = ?layered_move.mix, duration_ms = layered_move.duration_ms, "layered move queued");
        self.queued.push(layered_move);
    }

    /// Starts every queued move at `now_ms`.
    pub fn activate_queued(&mut self, now_ms: f64) {
        for mut layered_move in self.queued.drain(..) {
            layered_move.start_ms = Some(now_ms);
            self.active.push(layered_move);
        }
    }

    /// Drops finished moves. Returns how many were removed.
    pub fn flush_finished(&mut self, now_ms: f64) -> usize {
        let before = self.active.len();
        self.active.retain(|m| {
            let finished = m.is_finished(now_ms);
            if finished {
                debug!(kind = m.kind.name(), "layered move finished");
            }
            !finished
        });
        before - self.active.len()
    }

    /// Active moves, oldest first.
    #[must_use]
    pub fn active(&self) -> &[LayeredMove] {
        &self.active
    }

    /// Moves waiting for the next step.
    #[must_use]
    pub fn queued(&self) -> &[LayeredMove] {
        &self.queued
    }

    /// True when nothing is queued or active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty() && self.active.is_empty()
    }

    /// Removes every move.
    pub fn clear(&mut self) {
        self.queued.clear();
        self.active.clear();
    }

    /// Generates every active move and mixes it over `base`.
    ///
    /// A move that fails to generate is logged and contributes nothing.
    pub fn generate_and_mix(&mut self, ctx: &mut LayeredContext<'_>, base: ProposedMove) -> ProposedMove {
        let mut proposed = base;
        if ctx.start.tags.contains(TagSet::MOVEMENT_DISABLED) {
            return proposed;
        }
        let up = ctx.settings.mover.up_direction;
        for layered_move in &mut self.active {
            let contribution = match layered_move.generate(ctx) {
                Ok(contribution) => contribution,
                Err(error) => {
                    warn!(kind = layered_move.kind.name(), %error, "layered move skipped");
                    continue;
                }
            };
            proposed.linear_velocity = mix_velocity(proposed.linear_velocity, contribution.linear, contribution.mix, up);
            proposed.angular_velocity = match contribution.mix {
                MixMode::OverrideAll => contribution.angular,
                MixMode::Additive | MixMode::Override => proposed.angular_velocity + contribution.angular,
            };
            if contribution.preferred_mode.is_some() {
                proposed.preferred_mode = contribution.preferred_mode;
            }
            if contribution.mix != MixMode::Additive {
                proposed.mix = contribution.mix;
            }
        }
        proposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TickContext;

    #[test]
    fn test_additive_is_exact_sum() {
        let base = Vec3::new(120.5, -3.25, 7.0);
        let layered = Vec3::new(-0.5, 10.0, 800.0);
        assert_eq!(mix_velocity(base, layered, MixMode::Additive, Vec3::Z), base + layered);
    }

    #[test]
    fn test_override_replaces_up_component_only() {
        let mixed = mix_velocity(Vec3::new(300.0, 100.0, -200.0), Vec3::new(50.0, 0.0, 800.0), MixMode::Override, Vec3::Z);
        assert_eq!(mixed, Vec3::new(300.0, 100.0, 800.0));
    }

    #[test]
    fn test_override_all_is_idempotent() {
        let layered = Vec3::new(10.0, 20.0, 30.0);
        let once = mix_velocity(Vec3::new(1.0, 2.0, 3.0), layered, MixMode::OverrideAll, Vec3::Z);
        let twice = mix_velocity(once, layered, MixMode::OverrideAll, Vec3::Z);
        assert_eq!(once, layered);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_lifetime() {
        let jump = LayeredMoveKind::MultiJump(MultiJump::default());
        let mut stack = LayeredMoveStack::new();
        stack.queue(LayeredMove::new(jump.clone(), MixMode::Additive, 100.0));
        stack.queue(LayeredMove::new(jump, MixMode::Additive, -1.0));
        assert_eq!(stack.flush_finished(1_000.0), 0);

        stack.activate_queued(50.0);
        assert_eq!(stack.active().len(), 2);
        assert_eq!(stack.flush_finished(149.0), 0);
        assert_eq!(stack.flush_finished(150.0), 1);
        assert_eq!(stack.flush_finished(1.0e9), 0);
        assert!(!stack.is_empty());
    }

    #[test]
    fn test_unsupported_mix_contributes_nothing() {
        let settings = SettingsBundle::default();
        let state = SimulationState::at(Vec3::ZERO, ModeId::Falling);
        let inputs = MoverInputs::default();
        let mut blackboard = Blackboard::new();
        let mut stack = LayeredMoveStack::new();
        stack.queue(LayeredMove::new(
            LayeredMoveKind::JumpImpulse(JumpImpulse::from_settings(&settings.common, Vec3::ZERO)),
            MixMode::Additive,
            300.0,
        ));
        stack.activate_queued(0.0);

        let mut ctx = LayeredContext {
            start: &state,
            inputs: &inputs,
            tick: TickContext::new(16.0, 0.0, 0),
            settings: &settings,
            blackboard: &mut blackboard,
        };
        let base = ProposedMove::linear(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(stack.generate_and_mix(&mut ctx, base), base);
    }
}

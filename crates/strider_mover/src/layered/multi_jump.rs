//! Ground jump with charges for further jumps in the air.

use strider_shared::Vec3;
use tracing::trace;

use super::{LayeredContext, LayeredContribution};
use crate::settings::CommonSettings;
use crate::state::MixMode;

/// Jump impulse queued by the jump and wall-jump transitions.
///
/// The start tick performs the jump that queued the move. Later ticks
/// perform an in-air jump on every fresh press while charges remain;
/// otherwise the move contributes an Additive zero so air control keeps
/// working.
///
/// While charges remain the move outlives its hold time and the jump
/// button: it holds the charges until the actor leaves the air mode.
/// Releasing jump ends it only once no charge is left.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiJump {
    /// Charges granted when the move starts.
    pub maximum_in_air_jumps: u8,
    /// Speed added along up on each jump (cm/s).
    pub upwards_speed: f32,
    /// Velocity inherited when the move was queued.
    pub momentum: Vec3,
    /// Releasing jump ends the move once its charges are spent.
    pub truncate_on_release: bool,
    /// Plane velocity comes from `momentum` instead of the current velocity.
    pub override_horizontal: bool,
    /// Vertical velocity comes from `momentum` instead of the current velocity.
    pub override_vertical: bool,
    charges: u8,
    last_jump_ms: Option<f64>,
}

impl MultiJump {
    /// Builds a jump from the shared settings.
    #[must_use]
    pub fn from_settings(common: &CommonSettings, upwards_speed: f32, momentum: Vec3) -> Self {
        Self {
            maximum_in_air_jumps: common.maximum_in_air_jumps,
            upwards_speed,
            momentum,
            truncate_on_release: common.truncate_on_jump_release,
            override_horizontal: common.jump_overrides_movement_plane_velocity,
            override_vertical: common.jump_overrides_vertical_velocity,
            ..Self::default()
        }
    }

    /// Overrides the in-air charge count.
    #[must_use]
    pub const fn with_in_air_jumps(mut self, jumps: u8) -> Self {
        self.maximum_in_air_jumps = jumps;
        self
    }

    /// Overrides which velocity components come from `momentum`.
    #[must_use]
    pub const fn with_overrides(mut self, horizontal: bool, vertical: bool) -> Self {
        self.override_horizontal = horizontal;
        self.override_vertical = vertical;
        self
    }

    /// In-air jumps left.
    #[must_use]
    pub const fn charges(&self) -> u8 {
        self.charges
    }

    /// Time of the last jump this move performed.
    #[must_use]
    pub const fn last_jump_ms(&self) -> Option<f64> {
        self.last_jump_ms
    }

    pub(super) fn generate(
        &mut self,
        start_ms: f64,
        duration_ms: &mut f32,
        mix: MixMode,
        ctx: &mut LayeredContext<'_>,
    ) -> LayeredContribution {
        let now = ctx.tick.sim_time_ms;
        #[allow(clippy::float_cmp)]
        let start_tick = now == start_ms;
        let left_air = !start_tick && ctx.start.mode != ctx.settings.mover.air_mode;

        if left_air {
            *duration_ms = 0.0;
        }
        if start_tick {
            self.charges = self.maximum_in_air_jumps;
        }

        let contribution = if !start_tick && !ctx.inputs.abilities.jump_just_pressed {
            if self.truncate_on_release && !ctx.inputs.abilities.jump_held && self.charges == 0 {
                *duration_ms = 0.0;
            }
            LayeredContribution::NONE
        } else if start_tick && ctx.blackboard.floor().is_some_and(|floor| floor.is_walkable()) {
            self.perform(mix, ctx)
        } else if self.last_jump_ms.map_or(true, |last| now > last) && self.charges > 0 {
            self.charges -= 1;
            trace!(charges = self.charges, "in-air jump");
            self.perform(mix, ctx)
        } else {
            LayeredContribution::NONE
        };

        // Unspent charges keep the move alive until it leaves the air mode.
        if self.charges > 0 && !left_air {
            *duration_ms = -1.0;
        }
        contribution
    }

    fn perform(&mut self, mix: MixMode, ctx: &LayeredContext<'_>) -> LayeredContribution {
        self.last_jump_ms = Some(ctx.tick.sim_time_ms);
        let up = ctx.settings.mover.up_direction;
        let prior = ctx.start.velocity;

        let up_speed = if self.override_vertical {
            self.momentum.dot(up).max(0.0)
        } else {
            prior.dot(up)
        } + self.upwards_speed;
        let plane = if self.override_horizontal {
            self.momentum.project_onto_plane(up)
        } else {
            prior.project_onto_plane(up)
        };

        let linear = match mix {
            MixMode::Additive => up * self.upwards_speed,
            MixMode::Override | MixMode::OverrideAll => up * up_speed + plane,
        };
        LayeredContribution {
            linear,
            angular: Vec3::ZERO,
            preferred_mode: Some(ctx.settings.mover.air_mode),
            mix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::{Blackboard, BlackboardKey};
    use crate::collision::{FloorResult, HitResult};
    use crate::layered::{LayeredMove, LayeredMoveKind, LayeredMoveStack};
    use crate::settings::SettingsBundle;
    use crate::state::{ProposedMove, SimulationState, TickContext};
    use strider_shared::{AbilityInputs, ModeId, MoverInputs};

    fn jump_inputs(just_pressed: bool, held: bool) -> MoverInputs {
        MoverInputs::default().with_abilities(AbilityInputs {
            jump_just_pressed: just_pressed,
            jump_held: held,
            ..AbilityInputs::default()
        })
    }

    fn walkable_floor() -> FloorResult {
        let hit = HitResult {
            blocking: true,
            normal: Vec3::Z,
            distance: 2.0,
            ..HitResult::default()
        };
        FloorResult::from_hit(&hit, Vec3::Z, 0.71)
    }

    fn run(
        stack: &mut LayeredMoveStack,
        state: &SimulationState,
        inputs: &MoverInputs,
        now: f64,
        blackboard: &mut Blackboard,
        settings: &SettingsBundle,
    ) -> ProposedMove {
        let mut ctx = LayeredContext {
            start: state,
            inputs,
            tick: TickContext::new(16.0, now, 0),
            settings,
            blackboard,
        };
        stack.generate_and_mix(&mut ctx, ProposedMove::linear(state.velocity))
    }

    #[test]
    fn test_multi_jump_exhaustion() {
        let settings = SettingsBundle::default();
        let mut blackboard = Blackboard::new();
        blackboard.set(BlackboardKey::LAST_FLOOR_RESULT, walkable_floor());

        let jump = MultiJump::from_settings(&settings.common, 800.0, Vec3::ZERO)
            .with_in_air_jumps(1)
            .with_overrides(false, false);
        let mut stack = LayeredMoveStack::new();
        stack.queue(LayeredMove::new(LayeredMoveKind::MultiJump(jump), MixMode::Override, 10_000.0));
        stack.activate_queued(0.0);

        // Ground jump on the start tick leaves the charge alone.
        let grounded = SimulationState::at(Vec3::ZERO, ModeId::Falling);
        let first = run(&mut stack, &grounded, &jump_inputs(false, true), 0.0, &mut blackboard, &settings);
        assert!((first.linear_velocity.z - 800.0).abs() < 1.0e-3);
        assert_eq!(first.preferred_mode, Some(ModeId::Falling));
        let LayeredMoveKind::MultiJump(state) = stack.active()[0].kind() else { unreachable!() };
        assert_eq!(state.charges(), 1);

        // Airborne press spends the charge.
        blackboard.invalidate(BlackboardKey::LAST_FLOOR_RESULT);
        let airborne = SimulationState::at(Vec3::new(0.0, 0.0, 100.0), ModeId::Falling).with_velocity(Vec3::new(0.0, 0.0, 200.0));
        let second = run(&mut stack, &airborne, &jump_inputs(true, true), 100.0, &mut blackboard, &settings);
        assert!((second.linear_velocity.z - 1000.0).abs() < 1.0e-3);
        let LayeredMoveKind::MultiJump(state) = stack.active()[0].kind() else { unreachable!() };
        assert_eq!(state.charges(), 0);

        // Out of charges: the base passes through untouched.
        let third = run(&mut stack, &airborne, &jump_inputs(true, true), 200.0, &mut blackboard, &settings);
        assert_eq!(third.linear_velocity, airborne.velocity);
        assert_eq!(third.mix, MixMode::Additive);
        assert_eq!(third.preferred_mode, None);
    }

    #[test]
    fn test_override_vertical_ignores_falling_momentum() {
        let settings = SettingsBundle::default();
        let mut blackboard = Blackboard::new();
        blackboard.set(BlackboardKey::LAST_FLOOR_RESULT, walkable_floor());

        let momentum = Vec3::new(120.0, 0.0, -200.0);
        let jump = MultiJump::from_settings(&settings.common, 800.0, momentum).with_overrides(false, true);
        let mut stack = LayeredMoveStack::new();
        stack.queue(LayeredMove::new(LayeredMoveKind::MultiJump(jump), MixMode::Override, 300.0));
        stack.activate_queued(0.0);

        let state = SimulationState::at(Vec3::ZERO, ModeId::Falling).with_velocity(momentum);
        let proposed = run(&mut stack, &state, &jump_inputs(false, true), 0.0, &mut blackboard, &settings);
        assert!((proposed.linear_velocity.z - 800.0).abs() < 1.0e-3);
        assert!((proposed.linear_velocity.x - 120.0).abs() < 1.0e-3);
    }

    #[test]
    fn test_release_truncates_without_charges() {
        let settings = SettingsBundle::default();
        let mut blackboard = Blackboard::new();
        blackboard.set(BlackboardKey::LAST_FLOOR_RESULT, walkable_floor());
        let jump = MultiJump::from_settings(&settings.common, 800.0, Vec3::ZERO).with_in_air_jumps(0);
        assert!(jump.truncate_on_release);
        let mut stack = LayeredMoveStack::new();
        stack.queue(LayeredMove::new(LayeredMoveKind::MultiJump(jump), MixMode::Override, 300.0));
        stack.activate_queued(0.0);

        let state = SimulationState::at(Vec3::ZERO, ModeId::Falling);
        let _ = run(&mut stack, &state, &jump_inputs(false, true), 0.0, &mut blackboard, &settings);
        let _ = run(&mut stack, &state, &jump_inputs(false, false), 16.0, &mut blackboard, &settings);
        assert_eq!(stack.flush_finished(16.0), 1);
    }

    #[test]
    fn test_release_keeps_unspent_charges() {
        let settings = SettingsBundle::default();
        let mut blackboard = Blackboard::new();
        blackboard.set(BlackboardKey::LAST_FLOOR_RESULT, walkable_floor());
        let jump = MultiJump::from_settings(&settings.common, 800.0, Vec3::ZERO).with_overrides(false, false);
        let mut stack = LayeredMoveStack::new();
        stack.queue(LayeredMove::new(LayeredMoveKind::MultiJump(jump), MixMode::Override, 300.0));
        stack.activate_queued(0.0);

        let grounded = SimulationState::at(Vec3::ZERO, ModeId::Falling);
        let _ = run(&mut stack, &grounded, &jump_inputs(true, true), 0.0, &mut blackboard, &settings);

        // Released in the air: the charge outlives both the button and the hold time.
        blackboard.invalidate(BlackboardKey::LAST_FLOOR_RESULT);
        let airborne = SimulationState::at(Vec3::new(0.0, 0.0, 150.0), ModeId::Falling).with_velocity(Vec3::new(0.0, 0.0, 100.0));
        let released = run(&mut stack, &airborne, &jump_inputs(false, false), 16.0, &mut blackboard, &settings);
        assert_eq!(released.linear_velocity, airborne.velocity);
        assert_eq!(stack.flush_finished(16.0), 0);
        assert_eq!(stack.flush_finished(500.0), 0);

        let air_jump = run(&mut stack, &airborne, &jump_inputs(true, true), 500.0, &mut blackboard, &settings);
        assert!((air_jump.linear_velocity.z - 900.0).abs() < 1.0e-3);
        let LayeredMoveKind::MultiJump(state) = stack.active()[0].kind() else { unreachable!() };
        assert_eq!(state.charges(), 0);

        // Spent: the next release ends the move.
        let _ = run(&mut stack, &airborne, &jump_inputs(false, false), 516.0, &mut blackboard, &settings);
        assert_eq!(stack.flush_finished(516.0), 1);
    }

    #[test]
    fn test_landing_ends_the_move() {
        let settings = SettingsBundle::default();
        let mut blackboard = Blackboard::new();
        let jump = MultiJump::from_settings(&settings.common, 800.0, Vec3::ZERO);
        let mut stack = LayeredMoveStack::new();
        stack.queue(LayeredMove::new(LayeredMoveKind::MultiJump(jump), MixMode::Override, 300.0));
        stack.activate_queued(0.0);

        let walking = SimulationState::at(Vec3::ZERO, ModeId::Walking);
        let _ = run(&mut stack, &walking, &jump_inputs(false, true), 16.0, &mut blackboard, &settings);
        assert_eq!(stack.flush_finished(16.0), 1);
    }
}

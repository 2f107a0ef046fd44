//! Hold-to-rise jump.

use strider_shared::Vec3;

use super::{LayeredContext, LayeredContribution};
use crate::blackboard::BlackboardKey;
use crate::error::{MoverError, MoverResult};
use crate::modes::{turn_towards_intent, MoveContext};
use crate::movement_utils::{compute_velocity, ComputeVelocityParams};
use crate::settings::CommonSettings;
use crate::state::MixMode;

/// Jump that owns the whole velocity while it lasts.
///
/// The impulse is applied on the start tick. With `override_vertical` the
/// vertical speed is pinned to `momentum + upwards_speed` for as long as
/// the move lives, which is what makes holding the button rise further.
/// Only `OverrideAll` is supported.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JumpImpulse {
    /// Speed added along up (cm/s).
    pub upwards_speed: f32,
    /// Velocity inherited when the move was queued.
    pub momentum: Vec3,
    /// Fraction of move input applied while rising.
    pub air_control: f32,
    /// Releasing jump ends the move.
    pub truncate_on_release: bool,
    /// Plane velocity comes from `momentum`.
    pub override_horizontal: bool,
    /// Vertical velocity comes from `momentum`.
    pub override_vertical: bool,
}

impl JumpImpulse {
    /// Builds a jump from the shared settings.
    #[must_use]
    pub fn from_settings(common: &CommonSettings, momentum: Vec3) -> Self {
        Self {
            upwards_speed: common.jump_vertical_impulse,
            momentum,
            air_control: common.jump_air_control_pct,
            truncate_on_release: common.truncate_on_jump_release,
            override_horizontal: common.jump_overrides_movement_plane_velocity,
            override_vertical: common.jump_overrides_vertical_velocity,
        }
    }

    pub(super) fn generate(
        &mut self,
        start_ms: f64,
        duration_ms: &mut f32,
        mix: MixMode,
        ctx: &mut LayeredContext<'_>,
    ) -> MoverResult<LayeredContribution> {
        if mix != MixMode::OverrideAll {
            return Err(MoverError::UnsupportedMixMode { kind: "JumpImpulse", mix });
        }

        let now = ctx.tick.sim_time_ms;
        #[allow(clippy::float_cmp)]
        let start_tick = now == start_ms;
        if !start_tick && ctx.start.mode != ctx.settings.mover.air_mode {
            *duration_ms = 0.0;
        }
        if self.truncate_on_release && !ctx.inputs.abilities.jump_held {
            *duration_ms = 0.0;
        }

        let settings = ctx.settings;
        let common = &settings.common;
        let up = settings.mover.up_direction;
        let dt = ctx.tick.delta_seconds();
        let prior = ctx.start.velocity;

        let up_speed = match (self.override_vertical, start_tick) {
            (true, _) => self.momentum.dot(up) + self.upwards_speed,
            (false, true) => prior.dot(up) + self.upwards_speed,
            (false, false) => prior.dot(up),
        };
        let plane = if self.override_horizontal {
            self.momentum.project_onto_plane(up)
        } else {
            prior.project_onto_plane(up)
        };

        let intent = (ctx.inputs.move_intent.clamp_length(1.0) * self.air_control).project_onto_plane(up);
        let planar = compute_velocity(&ComputeVelocityParams {
            delta_seconds: dt,
            initial_velocity: plane,
            move_direction_intent: intent,
            max_speed: common.max_speed,
            acceleration: common.acceleration,
            deceleration: 0.0,
            friction: 0.0,
        });
        let linear = planar + up * up_speed + settings.mover.gravity * dt;

        let angular = {
            let view = MoveContext {
                start: ctx.start,
                inputs: ctx.inputs,
                tick: ctx.tick,
                settings,
                blackboard: ctx.blackboard,
            };
            turn_towards_intent(&view, common.turning_rate, common.turning_boost)
        };

        if start_tick {
            ctx.blackboard.set_time(BlackboardKey::LAST_FALL_TIME, start_ms);
        }

        Ok(LayeredContribution {
            linear,
            angular,
            preferred_mode: Some(settings.mover.air_mode),
            mix,
        })
    }
}

//! Jump away from the wall being run on.

use strider_shared::constants::S_TO_MS;
use strider_shared::math::KINDA_SMALL_NUMBER;
use strider_shared::{MoverEvent, Quaternion, Vec3};
use tracing::debug;

use super::{EvalContext, Transition, TransitionEval, TriggerContext};
use crate::blackboard::BlackboardKey;
use crate::layered::{LayeredMove, LayeredMoveKind, MultiJump};
use crate::state::MixMode;

/// WallRunning -> air mode on a jump press against a runnable wall.
///
/// The queued [`MultiJump`] always owns the whole velocity: its momentum is
/// the kept velocity plus the push along the wall normal.
#[derive(Clone, Copy, Debug, Default)]
pub struct WallJump;

impl Transition for WallJump {
    fn name(&self) -> &'static str {
        "WallJump"
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> TransitionEval {
        let Some(wall_run) = ctx.settings.wall_run.as_ref() else {
            return TransitionEval::NoTransition;
        };
        if !wall_run.allow_wall_jump || !ctx.inputs.abilities.jump_just_pressed {
            return TransitionEval::NoTransition;
        }
        if !ctx.output.tags.passes(wall_run.wall_jump_required_tags, wall_run.wall_jump_blocked_tags) {
            return TransitionEval::NoTransition;
        }
        if !ctx.blackboard.read().wall().is_some_and(|wall| wall.is_runnable()) {
            return TransitionEval::NoTransition;
        }
        TransitionEval::To(ctx.settings.mover.air_mode)
    }

    fn trigger(&self, ctx: &mut TriggerContext<'_>) {
        let settings = ctx.settings;
        let Some(wall_run) = settings.wall_run.as_ref() else {
            return;
        };
        let up = settings.mover.up_direction;
        let now = ctx.tick.sim_time_ms;

        let wall = ctx.blackboard.wall().filter(|wall| wall.is_runnable());
        let mut inherited = Vec3::ZERO;
        let mut push = Vec3::ZERO;
        if let Some(wall) = wall {
            ctx.blackboard.set_time(BlackboardKey::LAST_FALL_TIME, now);
            if wall_run.wall_jump_adds_surface_velocity {
                inherited = wall.surface_velocity;
            }
            push = wall.normal * wall_run.wall_jump_force;
        }
        ctx.blackboard.set_time(BlackboardKey::LAST_WALL_JUMP_TIME, now);

        let mut kept = if wall_run.wall_jump_keeps_previous_velocity {
            ctx.output.velocity
        } else {
            Vec3::ZERO
        };
        if !wall_run.wall_jump_keeps_previous_vertical_velocity {
            kept = kept.project_onto_plane(up);
        }

        let facing = if ctx.inputs.orientation_intent.is_nearly_zero(KINDA_SMALL_NUMBER) {
            ctx.output.orientation.forward()
        } else {
            ctx.inputs.orientation_intent
        };
        let arcade = Quaternion::from_heading(facing, up).rotate(wall_run.wall_jump_arcade_force);

        let momentum = inherited + kept + push + arcade;
        let jump = MultiJump::from_settings(&settings.common, wall_run.wall_jump_upwards_speed, momentum)
            .with_overrides(true, !wall_run.wall_jump_keeps_previous_vertical_velocity);
        ctx.layered.queue(LayeredMove::new(
            LayeredMoveKind::MultiJump(jump),
            MixMode::OverrideAll,
            settings.common.jump_hold_time * S_TO_MS,
        ));

        let magnitude = momentum.length();
        ctx.events.push(MoverEvent::WallJumped { sim_time_ms: now, magnitude });
        debug!(magnitude, ?momentum, "wall jump");
    }
}

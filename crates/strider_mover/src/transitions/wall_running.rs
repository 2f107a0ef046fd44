//! Attaching to and detaching from walls.
//!
//! Both rules re-trace the wall and cache the result for the wall-running
//! mode. Entry uses the static minimum height; continuation the dynamic
//! one, which is generally larger.

use strider_shared::constants::S_TO_MS;
use strider_shared::math::KINDA_SMALL_NUMBER;
use strider_shared::MoverEvent;
use tracing::{debug, trace};

use super::{EvalContext, Transition, TransitionEval, TriggerContext};
use crate::blackboard::BlackboardKey;
use crate::collision::WallResult;
use crate::settings::WallRunSettings;
use crate::wall::{is_high_enough, should_fall_off_wall, trace_wall, wall_angle_degrees};

/// Traces for a wall along the actor's planar velocity (or facing, when
/// standing still) and caches the result.
fn probe_and_cache(ctx: &mut EvalContext<'_>, wall_run: &WallRunSettings) -> WallResult {
    let up = ctx.settings.mover.up_direction;
    let planar = ctx.output.velocity.project_onto_plane(up);
    let forward = if planar.is_nearly_zero(KINDA_SMALL_NUMBER) {
        ctx.output.orientation.forward()
    } else {
        planar
    };
    let wall = trace_wall(ctx.world, ctx.output.position, forward, up, wall_run);
    if wall.blocking {
        ctx.blackboard.cache_wall(wall);
    }
    wall
}

fn horizontal_speed_too_low(ctx: &EvalContext<'_>, wall_run: &WallRunSettings) -> bool {
    let up = ctx.settings.mover.up_direction;
    let horizontal_sq = ctx.output.velocity.project_onto_plane(up).length_squared();
    !wall_run.always_stay_on_wall && horizontal_sq < wall_run.min_required_speed * wall_run.min_required_speed
}

// =============================================================================
// INTO WALL RUNNING
// =============================================================================

/// Falling -> WallRunning.
///
/// Checked in order: cooldown since the last wall run, tags, horizontal
/// speed, vertical speed, wall trace, wall angle, pull-away, static height.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntoWallRunning;

impl Transition for IntoWallRunning {
    fn name(&self) -> &'static str {
        "IntoWallRunning"
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> TransitionEval {
        let settings = ctx.settings;
        let Some(wall_run) = settings.wall_run.as_ref() else {
            return TransitionEval::NoTransition;
        };
        let target = settings.mover.wall_run_mode;
        if ctx.start.mode == target {
            return TransitionEval::NoTransition;
        }

        let now = ctx.tick.sim_time_ms;
        if let Some(last) = ctx.blackboard.read().time(BlackboardKey::LAST_WALL_RUN_TIME) {
            if now - last < f64::from(wall_run.min_time_between_runs * S_TO_MS) {
                trace!(since_ms = now - last, "wall run on cooldown");
                return TransitionEval::NoTransition;
            }
        }
        if !ctx.output.tags.passes(wall_run.required_tags, wall_run.blocked_tags) {
            return TransitionEval::NoTransition;
        }
        if horizontal_speed_too_low(ctx, wall_run) {
            return TransitionEval::NoTransition;
        }
        let vertical = ctx.output.velocity.dot(settings.mover.up_direction);
        if vertical * vertical > wall_run.max_vertical_speed * wall_run.max_vertical_speed {
            trace!(vertical, "too fast vertically for a wall run");
            return TransitionEval::NoTransition;
        }

        let wall = probe_and_cache(ctx, wall_run);
        if !wall.blocking {
            return TransitionEval::NoTransition;
        }
        if !wall.runnable {
            trace!(angle = wall_angle_degrees(wall.normal, settings.mover.up_direction), "wall too steep");
            return TransitionEval::NoTransition;
        }
        if should_fall_off_wall(&wall, wall_run.pull_away_angle, ctx.output.move_intent) {
            return TransitionEval::NoTransition;
        }
        if !is_high_enough(
            ctx.world,
            ctx.output.position,
            &ctx.shape,
            wall_run.min_required_static_height,
            settings.mover.up_direction,
        ) {
            return TransitionEval::NoTransition;
        }

        TransitionEval::To(target)
    }

    fn trigger(&self, ctx: &mut TriggerContext<'_>) {
        let now = ctx.tick.sim_time_ms;
        let reset_only_on_land = ctx.settings.wall_run.as_ref().is_some_and(|w| w.reset_timer_only_on_land);

        ctx.blackboard.set_time(BlackboardKey::LAST_WALL_RUN_TIME, now);
        if !reset_only_on_land || !ctx.blackboard.is_valid(BlackboardKey::LAST_WALL_RUN_START_TIME) {
            ctx.blackboard.set_time(BlackboardKey::LAST_WALL_RUN_START_TIME, now);
        }

        let wall_normal = ctx.blackboard.wall().map(|wall| wall.normal).unwrap_or_default();
        ctx.events.push(MoverEvent::WallRunStarted { sim_time_ms: now, wall_normal });
        debug!(?wall_normal, "wall run started");
    }
}

// =============================================================================
// OUT OF WALL RUNNING
// =============================================================================

/// WallRunning -> air mode.
///
/// Fires on the first failing condition: missing settings, max time,
/// tags, horizontal speed, wall trace, wall angle, pull-away (ignored when
/// `always_stay_on_wall`), dynamic height.
#[derive(Clone, Copy, Debug, Default)]
pub struct OutOfWallRunning;

impl OutOfWallRunning {
    fn should_leave(ctx: &mut EvalContext<'_>) -> bool {
        let settings = ctx.settings;
        let Some(wall_run) = settings.wall_run.as_ref() else {
            return true;
        };
        let now = ctx.tick.sim_time_ms;

        if wall_run.max_time > 0.0 {
            if let Some(start) = ctx.blackboard.read().time(BlackboardKey::LAST_WALL_RUN_START_TIME) {
                if now - start >= f64::from(wall_run.max_time * S_TO_MS) {
                    trace!(duration_ms = now - start, "wall run max time reached");
                    return true;
                }
            }
        }
        if !ctx.output.tags.passes(wall_run.required_tags, wall_run.blocked_tags) {
            return true;
        }
        if horizontal_speed_too_low(ctx, wall_run) {
            return true;
        }

        let wall = probe_and_cache(ctx, wall_run);
        if !wall.runnable {
            return true;
        }
        if !wall_run.always_stay_on_wall
            && should_fall_off_wall(&wall, wall_run.pull_away_angle, ctx.output.move_intent)
        {
            return true;
        }
        !is_high_enough(
            ctx.world,
            ctx.output.position,
            &ctx.shape,
            wall_run.min_required_dynamic_height,
            settings.mover.up_direction,
        )
    }
}

impl Transition for OutOfWallRunning {
    fn name(&self) -> &'static str {
        "OutOfWallRunning"
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> TransitionEval {
        if ctx.start.mode != ctx.settings.mover.wall_run_mode {
            return TransitionEval::NoTransition;
        }
        if Self::should_leave(ctx) {
            TransitionEval::To(ctx.settings.mover.air_mode)
        } else {
            TransitionEval::NoTransition
        }
    }

    fn trigger(&self, ctx: &mut TriggerContext<'_>) {
        let now = ctx.tick.sim_time_ms;
        ctx.blackboard.set_time(BlackboardKey::LAST_WALL_RUN_TIME, now);
        ctx.events.push(MoverEvent::WallRunEnded { sim_time_ms: now });
        debug!("wall run ended");
    }
}

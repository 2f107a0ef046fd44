//! Airborne movement.
//!
//! Planar velocity follows air-control-scaled input; vertical velocity
//! follows gravity up to terminal speed. A blocking hit is either a landing
//! (walkable, moving down, floor confirmed) or an impact the actor slides
//! along before testing for a landing again.

use strider_shared::constants::{MIN_REFUND_SECONDS, S_TO_MS, VERTICAL_SLOPE_NORMAL_Z};
use strider_shared::{ModeId, MoverEvent, TagSet, Vec3};
use tracing::trace;

use super::{turn_towards_intent, ApplyContext, MoveContext, MovementMode};
use crate::blackboard::{Blackboard, BlackboardKey};
use crate::collision::{FloorResult, HitResult};
use crate::error::MoverResult;
use crate::ground::{GroundMover, WalkStep};
use crate::movement_utils::{compute_velocity, limit_vertical_speed, ComputeVelocityParams};
use crate::settings::SettingsBundle;
use crate::state::{MoveOutcome, ProposedMove, SimulationState};

/// Falling mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct Falling;

impl MovementMode for Falling {
    fn id(&self) -> ModeId {
        ModeId::Falling
    }

    fn generate_move(&self, ctx: &MoveContext<'_>) -> MoverResult<ProposedMove> {
        if ctx.start.tags.contains(TagSet::MOVEMENT_DISABLED) {
            return Ok(ProposedMove::ZERO);
        }

        let common = &ctx.settings.common;
        let up = ctx.settings.mover.up_direction;
        let dt = ctx.tick.delta_seconds();

        let prior = ctx.start.velocity;
        let prior_plane = prior.project_onto_plane(up);

        let mut input = ctx.inputs.move_intent.clamp_length(1.0).project_onto_plane(up) * common.air_control_pct;
        let mut deceleration = common.falling_deceleration;

        if input.dot(prior_plane) > 0.0 && prior_plane.length() >= common.terminal_movement_plane_speed {
            input = input.project_onto_plane(prior_plane.normalize_or_zero());
            deceleration = common.over_terminal_speed_falling_deceleration;
        }

        if let Some(floor) = ctx.blackboard.floor() {
            let near_vertical = floor.normal.dot(up).abs() < VERTICAL_SLOPE_NORMAL_Z;
            if floor.blocking && !floor.walkable && near_vertical && input.dot(floor.normal) < 0.0 {
                let wall_normal = floor.normal.project_onto_plane(up).normalize_or_zero();
                input = input.project_onto_plane(wall_normal);
            }
        }

        let plane_velocity = compute_velocity(&ComputeVelocityParams {
            delta_seconds: dt,
            initial_velocity: prior_plane,
            move_direction_intent: input,
            max_speed: common.max_speed,
            acceleration: common.acceleration,
            deceleration,
            friction: 0.0,
        });

        let vertical = limit_vertical_speed(
            prior.dot(up) + ctx.settings.mover.gravity_along_up() * dt,
            common.terminal_vertical_speed,
            common.should_clamp_terminal_vertical_speed,
            common.vertical_falling_deceleration,
            dt,
        );

        Ok(ProposedMove {
            linear_velocity: plane_velocity + up * vertical,
            angular_velocity: turn_towards_intent(ctx, common.turning_rate, common.turning_boost),
            direction_intent: input,
            ..ProposedMove::ZERO
        })
    }

    fn apply_movement(&self, ctx: &mut ApplyContext<'_>) -> MoveOutcome {
        let settings = ctx.settings;
        let common = &settings.common;
        let up = ctx.up();
        let dt = ctx.tick.delta_seconds();
        let mut out = ctx.begin_output();
        let ground = GroundMover {
            world: ctx.world,
            shape: ctx.shape,
            up,
            max_walk_slope_cosine: common.max_walk_slope_cosine,
            max_step_height: common.max_step_height,
            floor_sweep_distance: common.floor_sweep_distance,
        };

        ctx.blackboard.invalidate(BlackboardKey::LAST_FLOOR_RESULT);

        let mut velocity = ctx.proposed.linear_velocity;
        let mut step = WalkStep::new(ctx.start.position, velocity * dt, dt);
        if !ground.first_move(&mut step) {
            ground.depenetrate(&mut step);
        }

        if let Some(hit) = step.hit.filter(HitResult::is_valid_blocking) {
            if let Some(outcome) = land(ctx, &ground, &mut step, &hit, velocity, out) {
                return outcome;
            }

            ctx.blackboard.set(
                BlackboardKey::LAST_FLOOR_RESULT,
                FloorResult::from_hit(&hit, up, common.max_walk_slope_cosine),
            );
            let speed = -velocity.dot(hit.normal);
            if speed > 0.0 {
                ctx.events.push(MoverEvent::Impact {
                    sim_time_ms: ctx.tick.sim_time_ms,
                    normal: hit.normal,
                    speed,
                });
            }
            velocity = clip_velocity(velocity, hit.normal);

            if ground.slide_along_wall(&mut step) {
                if let Some(second) = step.hit.filter(HitResult::is_valid_blocking) {
                    if let Some(outcome) = land(ctx, &ground, &mut step, &second, velocity, out) {
                        return outcome;
                    }
                    velocity = clip_velocity(velocity, second.normal);
                }
            }
        }

        out.position = step.position;
        out.velocity = velocity;
        trace!(position = ?out.position, velocity = ?out.velocity, "fall step");
        MoveOutcome::stay(out)
    }

    fn on_deactivate(&self, blackboard: &mut Blackboard, _settings: &SettingsBundle) {
        blackboard.invalidate(BlackboardKey::LAST_FALL_TIME);
    }
}

/// Removes the part of `velocity` pointing into a surface.
fn clip_velocity(velocity: Vec3, normal: Vec3) -> Vec3 {
    if velocity.dot(normal) < 0.0 {
        velocity.project_onto_plane(normal)
    } else {
        velocity
    }
}

/// Lands on `hit` when it is a walkable surface reached while moving down
/// and a floor query confirms it.
fn land(
    ctx: &mut ApplyContext<'_>,
    ground: &GroundMover<'_>,
    step: &mut WalkStep,
    hit: &HitResult,
    velocity: Vec3,
    mut out: SimulationState,
) -> Option<MoveOutcome> {
    let settings = ctx.settings;
    let up = ground.up;
    if !ground.is_walkable(hit.normal) || velocity.dot(up) > 0.0 {
        return None;
    }
    let mut floor = ground.find_floor(step.position);
    if !floor.is_walkable() {
        return None;
    }

    ground.adjust_floor_height(step, &mut floor);

    let landed_velocity = if settings.common.cancel_vertical_speed_on_landing {
        velocity.project_onto_plane(up)
    } else {
        velocity.project_onto_plane(floor.normal)
    };

    out.position = step.position;
    out.velocity = landed_velocity;
    ctx.events.push(MoverEvent::Landed {
        sim_time_ms: ctx.tick.sim_time_ms,
        position: out.position,
        normal: floor.normal,
        impact_speed: velocity.length(),
    });
    ctx.blackboard.set(BlackboardKey::LAST_FLOOR_RESULT, floor);

    let pct = step.percent_applied.clamp(0.0, 1.0);
    let remaining_seconds = (1.0 - pct) * ctx.tick.delta_seconds();
    let remaining_ms = if remaining_seconds >= MIN_REFUND_SECONDS {
        remaining_seconds * S_TO_MS
    } else {
        0.0
    };
    trace!(position = ?out.position, remaining_ms, "landed");

    Some(MoveOutcome {
        state: out,
        next_mode: Some(settings.mover.ground_mode),
        remaining_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{Collider, CollisionShape, StaticWorld};
    use crate::settings::CommonSettings;
    use crate::state::TickContext;
    use strider_shared::{EventQueue, MoverInputs};

    fn generate(settings: &SettingsBundle, state: &SimulationState, inputs: &MoverInputs) -> ProposedMove {
        let blackboard = Blackboard::new();
        let ctx = MoveContext {
            start: state,
            inputs,
            tick: TickContext::new(100.0, 0.0, 0),
            settings,
            blackboard: &blackboard,
        };
        Falling.generate_move(&ctx).unwrap()
    }

    #[test]
    fn test_gravity_integration() {
        let settings = SettingsBundle::default();
        let state = SimulationState::at(Vec3::new(0.0, 0.0, 500.0), ModeId::Falling);
        let proposed = generate(&settings, &state, &MoverInputs::default());
        assert!((proposed.linear_velocity.z + 98.0).abs() < 1e-3);
    }

    #[test]
    fn test_terminal_vertical_speed_clamp() {
        let settings = SettingsBundle::default();
        let state = SimulationState::at(Vec3::ZERO, ModeId::Falling).with_velocity(Vec3::new(0.0, 0.0, -2500.0));
        let proposed = generate(&settings, &state, &MoverInputs::default());
        assert_eq!(proposed.linear_velocity.z, -2000.0);
    }

    #[test]
    fn test_terminal_vertical_speed_deceleration() {
        let common = CommonSettings::default().with_terminal_vertical_speed(2000.0, false);
        let settings = SettingsBundle::default().with_common(common);
        let state = SimulationState::at(Vec3::ZERO, ModeId::Falling).with_velocity(Vec3::new(0.0, 0.0, -2500.0));
        let proposed = generate(&settings, &state, &MoverInputs::default());

        let with_gravity = -2500.0 - 98.0;
        let change = proposed.linear_velocity.z - with_gravity;
        assert!(change > 0.0);
        assert!(change <= 4000.0 * 0.1 + 1e-2);
        assert!(proposed.linear_velocity.z < -2000.0);
    }

    #[test]
    fn test_air_control_scales_input() {
        let settings = SettingsBundle::default();
        let state = SimulationState::at(Vec3::ZERO, ModeId::Falling);
        let proposed = generate(&settings, &state, &MoverInputs::moving(Vec3::X));
        // 0.4 input * 4000 accel * 0.1 s
        assert!((proposed.linear_velocity.x - 160.0).abs() < 1e-2);
    }

    #[test]
    fn test_lands_on_ground_and_refunds() {
        let world = StaticWorld::with_ground(0.0);
        let settings = SettingsBundle::default();
        let state = SimulationState::at(Vec3::new(0.0, 0.0, 110.0), ModeId::Falling);
        let inputs = MoverInputs::default();
        let proposed = ProposedMove::linear(Vec3::new(0.0, 0.0, -400.0));
        let mut blackboard = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ApplyContext {
            start: &state,
            inputs: &inputs,
            tick: TickContext::new(100.0, 0.0, 0),
            settings: &settings,
            proposed: &proposed,
            world: &world,
            shape: CollisionShape::default(),
            blackboard: &mut blackboard,
            events: &mut events,
            can_walk_off_ledges: true,
        };

        let outcome = Falling.apply_movement(&mut ctx);
        assert_eq!(outcome.next_mode, Some(ModeId::Walking));
        assert!(outcome.remaining_ms > 0.0);
        assert!(outcome.state.velocity.z.abs() < 1e-3);
        assert!(matches!(events.as_slice(), [MoverEvent::Landed { impact_speed, .. }] if (*impact_speed - 400.0).abs() < 1e-3));
        assert!(blackboard.floor().is_some_and(|f| f.is_walkable()));
    }

    #[test]
    fn test_wall_impact_slides_down() {
        let world = StaticWorld::new().with(Collider::plane(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0)));
        let settings = SettingsBundle::default();
        let state = SimulationState::at(Vec3::new(0.0, 0.0, 500.0), ModeId::Falling);
        let inputs = MoverInputs::default();
        let proposed = ProposedMove::linear(Vec3::new(500.0, 0.0, -100.0));
        let mut blackboard = Blackboard::new();
        let mut events = EventQueue::new();
        let mut ctx = ApplyContext {
            start: &state,
            inputs: &inputs,
            tick: TickContext::new(100.0, 0.0, 0),
            settings: &settings,
            proposed: &proposed,
            world: &world,
            shape: CollisionShape::default(),
            blackboard: &mut blackboard,
            events: &mut events,
            can_walk_off_ledges: true,
        };

        let outcome = Falling.apply_movement(&mut ctx);
        assert_eq!(outcome.next_mode, None);
        assert!(outcome.state.position.x < 16.0 + 1e-3);
        assert!(outcome.state.position.z < 500.0 - 9.0);
        assert_eq!(outcome.state.velocity.x, 0.0);
        assert!(matches!(events.as_slice(), [MoverEvent::Impact { speed, .. }] if (*speed - 500.0).abs() < 1e-3));
        assert!(blackboard.floor().is_some_and(|f| f.blocking && !f.walkable));
    }

    #[test]
    fn test_deactivate_clears_fall_time() {
        let mut blackboard = Blackboard::new();
        blackboard.set_time(BlackboardKey::LAST_FALL_TIME, 5.0);
        Falling.on_deactivate(&mut blackboard, &SettingsBundle::default());
        assert_eq!(blackboard.time(BlackboardKey::LAST_FALL_TIME), None);
    }
}

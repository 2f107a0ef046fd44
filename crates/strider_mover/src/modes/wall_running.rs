//! Running along a wall.
//!
//! Input is constrained to the line along the wall, planar velocity uses the
//! ground integrator with wall friction, and gravity is shaped by two curves
//! (intent/velocity alignment and time on the wall). Each step ends with a
//! small move into the wall to keep contact.

use strider_shared::constants::S_TO_MS;
use strider_shared::math::KINDA_SMALL_NUMBER;
use strider_shared::{ModeId, MoverEvent, TagSet, Vec3};
use tracing::trace;

use super::{orientation_intent, turn_towards_intent, ApplyContext, MoveContext, MovementMode};
use crate::blackboard::{Blackboard, BlackboardKey};
use crate::collision::{HitResult, WallResult};
use crate::error::{MoverError, MoverResult};
use crate::ground::{GroundMover, WalkStep};
use crate::movement_utils::{compute_velocity, is_exceeding_max_speed, ComputeVelocityParams};
use crate::settings::{SettingsBundle, WallRunSettings};
use crate::state::{MoveOutcome, ProposedMove};

/// Wall-running mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct WallRunning;

impl WallRunning {
    fn wall_settings(settings: &SettingsBundle) -> MoverResult<&WallRunSettings> {
        settings.wall_run.as_ref().ok_or(MoverError::MissingSettings {
            mode: ModeId::WallRunning,
            group: "wall_run",
        })
    }

    /// Friction and deceleration on the wall for the current speed.
    fn friction_and_deceleration(
        settings: &SettingsBundle,
        wall_run: &WallRunSettings,
        wall: &WallResult,
        too_fast: bool,
    ) -> (f32, f32) {
        let common = &settings.common;
        let material = wall.material.unwrap_or_default();
        if too_fast {
            (
                material.friction_coefficient(common.braking_friction) + common.braking_friction_factor,
                material.deceleration(wall_run.braking_deceleration),
            )
        } else {
            (
                material.friction_coefficient(common.ground_friction) + wall_run.surface_friction_factor,
                material.deceleration(wall_run.deceleration),
            )
        }
    }

    /// Vertical speed after wall gravity.
    ///
    /// Without curve data, a curve contributes no gravity at all.
    fn vertical_speed(ctx: &MoveContext<'_>, wall_run: &WallRunSettings) -> f32 {
        let up = ctx.settings.mover.up_direction;
        let dt = ctx.tick.delta_seconds();
        let gravity = ctx.settings.mover.gravity_along_up();
        let start_vertical = ctx.start.velocity.dot(up);
        let upwards = start_vertical > 0.0;

        let overall = if upwards {
            wall_run.upwards_gravity_scale
        } else {
            wall_run.gravity_scale
        };

        let tangent = orientation_intent(ctx)
            .normalize_or_zero()
            .dot(ctx.start.velocity.project_onto_plane(up).normalize_or_zero());
        let velocity_scale = wall_run
            .gravity_vel_scale_curve
            .eval(if upwards { 0.0 } else { tangent })
            .unwrap_or(0.0);

        let time_on_wall = ctx
            .blackboard
            .time(BlackboardKey::LAST_WALL_RUN_START_TIME)
            .map_or(0.0, |start| ((ctx.tick.sim_time_ms - start).max(0.0) as f32) / S_TO_MS);
        let time_scale = wall_run.gravity_time_scale_curve.eval(time_on_wall).unwrap_or(0.0);

        start_vertical + gravity * dt * velocity_scale * overall + gravity * dt * time_scale * overall
    }
}

impl MovementMode for WallRunning {
    fn id(&self) -> ModeId {
        ModeId::WallRunning
    }

    fn generate_move(&self, ctx: &MoveContext<'_>) -> MoverResult<ProposedMove> {
        let wall_run = Self::wall_settings(ctx.settings)?;
        if ctx.start.tags.contains(TagSet::MOVEMENT_DISABLED) {
            return Ok(ProposedMove::ZERO);
        }

        let up = ctx.settings.mover.up_direction;
        let dt = ctx.tick.delta_seconds();
        let Some(wall) = ctx.blackboard.wall().filter(WallResult::is_runnable) else {
            let velocity = ctx.start.velocity + ctx.settings.mover.gravity * dt;
            return Ok(ProposedMove::linear(velocity).preferring(ctx.settings.mover.air_mode));
        };

        let input = ctx
            .inputs
            .move_intent
            .clamp_length(1.0)
            .project_onto_plane(wall.normal)
            .project_onto_plane(up);
        let prior = ctx.start.velocity.project_onto_plane(up);

        let material = wall.material.unwrap_or_default();
        let max_speed = wall_run.max_speed;
        let acceleration = material.acceleration(wall_run.acceleration);
        let too_fast = input.is_nearly_zero(KINDA_SMALL_NUMBER) && is_exceeding_max_speed(prior, max_speed);
        let (friction, deceleration) = Self::friction_and_deceleration(ctx.settings, wall_run, &wall, too_fast);

        let planar = compute_velocity(&ComputeVelocityParams {
            delta_seconds: dt,
            initial_velocity: prior,
            move_direction_intent: input,
            max_speed,
            acceleration,
            deceleration,
            friction,
        });
        let vertical = Self::vertical_speed(ctx, wall_run);
        let common = &ctx.settings.common;

        Ok(ProposedMove {
            linear_velocity: planar.project_onto_plane(up) + up * vertical,
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

        let mut velocity = ctx.proposed.linear_velocity;
        let mut step = WalkStep::new(ctx.start.position, velocity * dt, dt);
        if !ground.first_move(&mut step) {
            ground.depenetrate(&mut step);
        }

        if let Some(hit) = step.hit.filter(HitResult::is_valid_blocking) {
            if ground.is_walkable(hit.normal) && velocity.dot(up) <= 0.0 {
                let mut floor = ground.find_floor(step.position);
                if floor.is_walkable() {
                    ground.adjust_floor_height(&mut step, &mut floor);
                    ctx.blackboard.set(BlackboardKey::LAST_FLOOR_RESULT, floor);
                    out.position = step.position;
                    out.velocity = velocity.project_onto_plane(floor.normal);
                    ctx.events.push(MoverEvent::Landed {
                        sim_time_ms: ctx.tick.sim_time_ms,
                        position: out.position,
                        normal: floor.normal,
                        impact_speed: velocity.length(),
                    });
                    return MoveOutcome {
                        state: out,
                        next_mode: Some(settings.mover.ground_mode),
                        remaining_ms: 0.0,
                    };
                }
            }
            if velocity.dot(hit.normal) < 0.0 {
                velocity = velocity.project_onto_plane(hit.normal);
            }
            ground.slide_along_wall(&mut step);
        }

        let attraction = settings.wall_run.as_ref().map_or(0.0, |w| w.attraction_force);
        if let Some(wall) = ctx.blackboard.wall().filter(WallResult::is_runnable) {
            if wall.normal.dot(up) >= 0.0 && attraction > 0.0 {
                let (end, _) = ground.sweep(step.position, wall.normal * -(attraction * dt));
                step.record.append(end - step.position, false);
                step.position = end;
            }
        }

        ctx.blackboard
            .set_time(BlackboardKey::LAST_WALL_RUN_TIME, ctx.tick.sim_time_ms);

        out.position = step.position;
        out.velocity = velocity;
        trace!(position = ?out.position, velocity = ?out.velocity, "wall run step");
        MoveOutcome::stay(out)
    }

    fn on_deactivate(&self, blackboard: &mut Blackboard, settings: &SettingsBundle) {
        blackboard.invalidate(BlackboardKey::LAST_WALL_RESULT);
        let reset_only_on_land = settings.wall_run.as_ref().is_some_and(|w| w.reset_timer_only_on_land);
        if !reset_only_on_land {
            blackboard.invalidate(BlackboardKey::LAST_WALL_RUN_START_TIME);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{Collider, CollisionShape, StaticWorld};
    use crate::settings::FloatCurve;
    use crate::state::{SimulationState, TickContext};
    use strider_shared::{EventQueue, MoverInputs};

    fn wall_on_left() -> WallResult {
        WallResult {
            blocking: true,
            runnable: true,
            distance: 40.0,
            hit_point: Vec3::new(0.0, 60.0, 300.0),
            normal: Vec3::new(0.0, -1.0, 0.0),
            ..WallResult::default()
        }
    }

    fn generate(settings: &SettingsBundle, state: &SimulationState, blackboard: &Blackboard) -> MoverResult<ProposedMove> {
        let inputs = MoverInputs::moving(Vec3::new(1.0, 1.0, 0.0).normalize_or_zero());
        let ctx = MoveContext {
            start: state,
            inputs: &inputs,
            tick: TickContext::new(100.0, 2000.0, 20),
            settings,
            blackboard,
        };
        WallRunning.generate_move(&ctx)
    }

    #[test]
    fn test_missing_settings_is_an_error() {
        let state = SimulationState::at(Vec3::ZERO, ModeId::WallRunning);
        let result = generate(&SettingsBundle::default(), &state, &Blackboard::new());
        assert_eq!(
            result,
            Err(MoverError::MissingSettings { mode: ModeId::WallRunning, group: "wall_run" })
        );
    }

    #[test]
    fn test_without_wall_prefers_air() {
        let state = SimulationState::at(Vec3::ZERO, ModeId::WallRunning).with_velocity(Vec3::new(600.0, 0.0, 0.0));
        let proposed = generate(&SettingsBundle::full(), &state, &Blackboard::new()).unwrap();
        assert_eq!(proposed.preferred_mode, Some(ModeId::Falling));
        assert!((proposed.linear_velocity.z + 98.0).abs() < 1e-3);
    }

    #[test]
    fn test_input_runs_along_wall_without_curve_gravity() {
        let mut blackboard = Blackboard::new();
        blackboard.set(BlackboardKey::LAST_WALL_RESULT, wall_on_left());
        let state = SimulationState::at(Vec3::ZERO, ModeId::WallRunning).with_velocity(Vec3::new(600.0, 0.0, -50.0));

        let proposed = generate(&SettingsBundle::full(), &state, &blackboard).unwrap();
        assert!(proposed.linear_velocity.y.abs() < 1e-3);
        assert!(proposed.linear_velocity.x > 600.0);
        assert_eq!(proposed.linear_velocity.z, -50.0);
    }

    #[test]
    fn test_time_curve_adds_gravity() {
        let mut blackboard = Blackboard::new();
        blackboard.set(BlackboardKey::LAST_WALL_RESULT, wall_on_left());
        blackboard.set_time(BlackboardKey::LAST_WALL_RUN_START_TIME, 1000.0);
        let wall_run = WallRunSettings {
            gravity_time_scale_curve: FloatCurve::from_points(&[(0.0, 0.0), (2.0, 1.0)]),
            ..WallRunSettings::default()
        };
        let settings = SettingsBundle::full().with_wall_run(wall_run);
        let state = SimulationState::at(Vec3::ZERO, ModeId::WallRunning).with_velocity(Vec3::new(600.0, 0.0, 0.0));

        // One second on the wall: half gravity for 0.1 s.
        let proposed = generate(&settings, &state, &blackboard).unwrap();
        assert!((proposed.linear_velocity.z + 49.0).abs() < 1e-3);
    }

    #[test]
    fn test_apply_keeps_contact_and_logs_time() {
        let world = StaticWorld::new().with(Collider::plane(Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 60.0, 0.0)));
        let settings = SettingsBundle::full();
        let state = SimulationState::at(Vec3::new(0.0, 20.0, 300.0), ModeId::WallRunning);
        let inputs = MoverInputs::default();
        let proposed = ProposedMove::linear(Vec3::new(600.0, 0.0, 0.0));
        let mut blackboard = Blackboard::new();
        blackboard.set(BlackboardKey::LAST_WALL_RESULT, wall_on_left());
        let mut events = EventQueue::new();
        let mut ctx = ApplyContext {
            start: &state,
            inputs: &inputs,
            tick: TickContext::new(100.0, 2000.0, 20),
            settings: &settings,
            proposed: &proposed,
            world: &world,
            shape: CollisionShape::default(),
            blackboard: &mut blackboard,
            events: &mut events,
            can_walk_off_ledges: true,
        };

        let outcome = WallRunning.apply_movement(&mut ctx);
        assert_eq!(outcome.next_mode, None);
        assert!((outcome.state.position.x - 60.0).abs() < 1e-3);
        assert!(outcome.state.position.y > 20.0 && outcome.state.position.y <= 26.0);
        assert_eq!(outcome.state.velocity, Vec3::new(600.0, 0.0, 0.0));
        assert_eq!(blackboard.time(BlackboardKey::LAST_WALL_RUN_TIME), Some(2000.0));
    }

    #[test]
    fn test_deactivate_respects_reset_on_land() {
        let mut blackboard = Blackboard::new();
        blackboard.set(BlackboardKey::LAST_WALL_RESULT, wall_on_left());
        blackboard.set_time(BlackboardKey::LAST_WALL_RUN_START_TIME, 10.0);

        WallRunning.on_deactivate(&mut blackboard, &SettingsBundle::full());
        assert!(blackboard.wall().is_none());
        assert!(blackboard.is_valid(BlackboardKey::LAST_WALL_RUN_START_TIME));

        let settings = SettingsBundle::full().with_wall_run(WallRunSettings {
            reset_timer_only_on_land: false,
            ..WallRunSettings::default()
        });
        WallRunning.on_deactivate(&mut blackboard, &settings);
        assert!(!blackboard.is_valid(BlackboardKey::LAST_WALL_RUN_START_TIME));
    }
}

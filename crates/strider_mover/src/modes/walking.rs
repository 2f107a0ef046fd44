//! Grounded movement.
//!
//! Velocity is integrated in the floor plane with ground friction. The
//! swept move tries, in order: the plain move, depenetration, a ramp
//! redirect, a step-up, and finally a slide along the blocking wall. Losing
//! the floor hands the unused part of the step to the air mode.

use strider_shared::math::KINDA_SMALL_NUMBER;
use strider_shared::{ModeId, MoverEvent, TagSet, Vec3};
use tracing::trace;

use super::{turn_towards_intent, ApplyContext, MoveContext, MovementMode};
use crate::blackboard::{Blackboard, BlackboardKey};
use crate::collision::FloorResult;
use crate::error::MoverResult;
use crate::ground::{GroundMover, WalkStep};
use crate::movement_utils::{compute_velocity, constrain_to_plane, is_exceeding_max_speed, ComputeVelocityParams};
use crate::settings::SettingsBundle;
use crate::state::{MoveOutcome, ProposedMove};

/// Walking mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct Walking;

/// Speed, acceleration and turning for the current gait.
#[derive(Clone, Copy, Debug)]
struct Gait {
    max_speed: f32,
    acceleration: f32,
    deceleration: f32,
    turning_rate: f32,
    turning_boost: f32,
}

impl Gait {
    fn select(settings: &SettingsBundle, sprinting: bool) -> Self {
        let c = &settings.common;
        if sprinting {
            Self {
                max_speed: c.max_sprint_speed,
                acceleration: c.sprint_acceleration,
                deceleration: c.sprint_deceleration,
                turning_rate: c.sprint_turning_rate,
                turning_boost: c.sprint_turning_boost,
            }
        } else {
            Self {
                max_speed: c.max_speed,
                acceleration: c.acceleration,
                deceleration: c.deceleration,
                turning_rate: c.turning_rate,
                turning_boost: c.turning_boost,
            }
        }
    }
}

impl MovementMode for Walking {
    fn id(&self) -> ModeId {
        ModeId::Walking
    }

    fn generate_move(&self, ctx: &MoveContext<'_>) -> MoverResult<ProposedMove> {
        if ctx.start.tags.contains(TagSet::MOVEMENT_DISABLED) {
            return Ok(ProposedMove::ZERO);
        }

        let common = &ctx.settings.common;
        let up = ctx.settings.mover.up_direction;
        let floor = ctx.blackboard.floor().filter(FloorResult::is_walkable);
        let plane_normal = floor.map_or(up, |f| f.normal);

        let mut gait = Gait::select(ctx.settings, ctx.inputs.abilities.sprint_held);
        if ctx.start.tags.contains(TagSet::STOP_MOVEMENT) {
            gait.max_speed = 0.0;
        }

        let prior = ctx.start.velocity.project_onto_plane(plane_normal);
        let input = ctx.inputs.move_intent.clamp_length(1.0);
        let intent = constrain_to_plane(constrain_to_plane(input, up, true), plane_normal, true);

        let braking = intent.is_nearly_zero(KINDA_SMALL_NUMBER) || is_exceeding_max_speed(prior, gait.max_speed);
        let mut friction = if braking {
            let base = if common.use_separate_braking_friction {
                common.braking_friction
            } else {
                common.ground_friction
            };
            base * common.braking_friction_factor
        } else {
            common.ground_friction
        };

        let mut acceleration = gait.acceleration;
        let mut deceleration = gait.deceleration;
        if let Some(material) = floor.and_then(|f| f.material) {
            friction = material.friction_coefficient(friction);
            acceleration = material.acceleration(acceleration);
            deceleration = material.deceleration(deceleration);
        }

        let velocity = compute_velocity(&ComputeVelocityParams {
            delta_seconds: ctx.tick.delta_seconds(),
            initial_velocity: prior,
            move_direction_intent: intent,
            max_speed: gait.max_speed,
            acceleration,
            deceleration,
            friction,
        });

        Ok(ProposedMove {
            linear_velocity: velocity.project_onto_plane(plane_normal),
            angular_velocity: turn_towards_intent(ctx, gait.turning_rate, gait.turning_boost),
            direction_intent: intent,
            ..ProposedMove::ZERO
        })
    }

    fn apply_movement(&self, ctx: &mut ApplyContext<'_>) -> MoveOutcome {
        let mut out = ctx.begin_output();
        let common = &ctx.settings.common;
        let up = ctx.up();
        let dt = ctx.tick.delta_seconds();
        let ground = GroundMover {
            world: ctx.world,
            shape: ctx.shape,
            up,
            max_walk_slope_cosine: common.max_walk_slope_cosine,
            max_step_height: common.max_step_height,
            floor_sweep_distance: common.floor_sweep_distance,
        };

        let start_floor = ctx
            .blackboard
            .floor()
            .unwrap_or_else(|| ground.find_floor(ctx.start.position));
        let delta = ctx.proposed.linear_velocity * dt;
        let mut step = WalkStep::new(ctx.start.position, delta, dt);

        if !delta.is_nearly_zero(KINDA_SMALL_NUMBER) && !ground.first_move(&mut step) {
            ground.depenetrate(&mut step);
            if step.hit.is_some_and(|h| h.is_valid_blocking()) {
                ground.ramp_move(&mut step);
            }
            if step.hit.is_some_and(|h| h.is_valid_blocking()) && !ground.step_up(&mut step) {
                ground.slide_along_wall(&mut step);
            }
        }

        let mut floor = ground.find_floor(step.position);

        if !ctx.can_walk_off_ledges && start_floor.is_walkable() && !floor.is_walkable() {
            trace!(position = ?step.position, "walk off ledge refused");
            out.position = ctx.start.position;
            out.velocity = Vec3::ZERO;
            ctx.blackboard.set(BlackboardKey::LAST_FLOOR_RESULT, start_floor);
            return MoveOutcome::stay(out);
        }

        ground.adjust_floor_height(&mut step, &mut floor);
        out.position = step.position;

        if !floor.is_walkable() {
            let now = ctx.tick.sim_time_ms;
            let step_ms = ctx.tick.step_ms;
            let pct = step.percent_applied.clamp(0.0, 1.0);
            ctx.blackboard
                .set_time(BlackboardKey::LAST_FALL_TIME, now + f64::from(pct * step_ms));
            ctx.blackboard.set(BlackboardKey::LAST_FLOOR_RESULT, floor);
            if out.tags.contains(TagSet::SPRINTING) {
                out.tags.remove(TagSet::SPRINTING);
                ctx.events.push(MoverEvent::SprintStopped { sim_time_ms: now });
            }
            out.velocity = step.record.relevant_velocity();
            trace!(position = ?out.position, "lost floor");
            return MoveOutcome {
                state: out,
                next_mode: Some(ctx.settings.mover.air_mode),
                remaining_ms: (1.0 - pct) * step_ms,
            };
        }

        out.velocity = step.record.relevant_velocity();
        let sprinting = ctx.inputs.abilities.sprint_held;
        if sprinting != out.tags.contains(TagSet::SPRINTING) {
            out.tags.set(TagSet::SPRINTING, sprinting);
            let sim_time_ms = ctx.tick.sim_time_ms;
            ctx.events.push(if sprinting {
                MoverEvent::SprintStarted { sim_time_ms }
            } else {
                MoverEvent::SprintStopped { sim_time_ms }
            });
        }
        ctx.blackboard.set(BlackboardKey::LAST_FLOOR_RESULT, floor);
        MoveOutcome::stay(out)
    }

    fn on_activate(&self, blackboard: &mut Blackboard, settings: &SettingsBundle) {
        if settings.wall_run.as_ref().is_some_and(|w| w.reset_timer_only_on_land) {
            blackboard.invalidate(BlackboardKey::LAST_WALL_RUN_START_TIME);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{Collider, CollisionShape, StaticWorld};
    use crate::state::{SimulationState, TickContext};
    use strider_shared::{AbilityInputs, EventQueue, MoverInputs};

    const STANDING_Z: f32 = 90.15;

    fn generate(state: &SimulationState, inputs: &MoverInputs, blackboard: &Blackboard) -> ProposedMove {
        let settings = SettingsBundle::full();
        let ctx = MoveContext {
            start: state,
            inputs,
            tick: TickContext::new(100.0, 0.0, 0),
            settings: &settings,
            blackboard,
        };
        Walking.generate_move(&ctx).unwrap()
    }

    fn apply(
        world: &StaticWorld,
        state: &SimulationState,
        inputs: &MoverInputs,
        velocity: Vec3,
        blackboard: &mut Blackboard,
        events: &mut EventQueue,
        can_walk_off_ledges: bool,
    ) -> MoveOutcome {
        let settings = SettingsBundle::full();
        let proposed = ProposedMove::linear(velocity);
        let mut ctx = ApplyContext {
            start: state,
            inputs,
            tick: TickContext::new(100.0, 1000.0, 10),
            settings: &settings,
            proposed: &proposed,
            world,
            shape: CollisionShape::default(),
            blackboard,
            events,
            can_walk_off_ledges,
        };
        Walking.apply_movement(&mut ctx)
    }

    #[test]
    fn test_ground_acceleration_from_rest() {
        let state = SimulationState::at(Vec3::new(0.0, 0.0, STANDING_Z), ModeId::Walking);
        let proposed = generate(&state, &MoverInputs::moving(Vec3::X), &Blackboard::new());
        assert!((proposed.linear_velocity.x - 400.0).abs() < 1e-3);
        assert!(proposed.linear_velocity.y.abs() < 1e-4);
        assert!(proposed.linear_velocity.z.abs() < 1e-4);
    }

    #[test]
    fn test_disabled_and_stopped_movement() {
        let inputs = MoverInputs::moving(Vec3::X);
        let disabled = SimulationState::at(Vec3::ZERO, ModeId::Walking)
            .with_velocity(Vec3::new(300.0, 0.0, 0.0))
            .with_tags(TagSet::MOVEMENT_DISABLED);
        assert_eq!(generate(&disabled, &inputs, &Blackboard::new()), ProposedMove::ZERO);

        let stopped = SimulationState::at(Vec3::ZERO, ModeId::Walking).with_tags(TagSet::STOP_MOVEMENT);
        assert_eq!(generate(&stopped, &inputs, &Blackboard::new()).linear_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_sprint_uses_sprint_gait() {
        let state = SimulationState::at(Vec3::ZERO, ModeId::Walking);
        let inputs = MoverInputs::moving(Vec3::X).with_abilities(AbilityInputs { sprint_held: true, ..AbilityInputs::default() });
        let proposed = generate(&state, &inputs, &Blackboard::new());
        assert!((proposed.linear_velocity.x - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_walks_on_flat_ground_and_starts_sprint() {
        let world = StaticWorld::with_ground(0.0);
        let state = SimulationState::at(Vec3::new(0.0, 0.0, STANDING_Z), ModeId::Walking);
        let inputs = MoverInputs::moving(Vec3::X).with_abilities(AbilityInputs { sprint_held: true, ..AbilityInputs::default() });
        let mut blackboard = Blackboard::new();
        let mut events = EventQueue::new();

        let outcome = apply(&world, &state, &inputs, Vec3::new(400.0, 0.0, 0.0), &mut blackboard, &mut events, true);
        assert_eq!(outcome.next_mode, None);
        assert!((outcome.state.position.x - 40.0).abs() < 1e-3);
        assert!((outcome.state.velocity.x - 400.0).abs() < 1e-2);
        assert!(outcome.state.tags.contains(TagSet::SPRINTING));
        assert!(matches!(events.as_slice(), [MoverEvent::SprintStarted { .. }]));
        assert!(blackboard.floor().is_some_and(|f| f.is_walkable()));
    }

    #[test]
    fn test_walking_off_ledge_hands_over_to_air() {
        let world = StaticWorld::new().with(Collider::aabb(Vec3::new(-1000.0, -1000.0, -100.0), Vec3::new(100.0, 1000.0, 0.0)));
        let state = SimulationState::at(Vec3::new(90.0, 0.0, STANDING_Z), ModeId::Walking).with_tags(TagSet::SPRINTING);
        let inputs = MoverInputs::moving(Vec3::X);
        let mut blackboard = Blackboard::new();
        let mut events = EventQueue::new();

        let outcome = apply(&world, &state, &inputs, Vec3::new(800.0, 0.0, 0.0), &mut blackboard, &mut events, true);
        assert_eq!(outcome.next_mode, Some(ModeId::Falling));
        assert!(!outcome.state.tags.contains(TagSet::SPRINTING));
        assert!(matches!(events.as_slice(), [MoverEvent::SprintStopped { .. }]));
        assert!(blackboard.time(BlackboardKey::LAST_FALL_TIME).is_some());
        assert!(!blackboard.floor().is_some_and(|f| f.is_walkable()));
    }

    #[test]
    fn test_ledge_guard_reverts_move() {
        let world = StaticWorld::new().with(Collider::aabb(Vec3::new(-1000.0, -1000.0, -100.0), Vec3::new(100.0, 1000.0, 0.0)));
        let state = SimulationState::at(Vec3::new(90.0, 0.0, STANDING_Z), ModeId::Walking);
        let mut blackboard = Blackboard::new();
        let mut events = EventQueue::new();

        let outcome = apply(&world, &state, &MoverInputs::moving(Vec3::X), Vec3::new(800.0, 0.0, 0.0), &mut blackboard, &mut events, false);
        assert_eq!(outcome.next_mode, None);
        assert_eq!(outcome.state.position, state.position);
        assert!(events.is_empty());
    }

    #[test]
    fn test_landing_activation_clears_wall_run_start() {
        let mut blackboard = Blackboard::new();
        blackboard.set_time(BlackboardKey::LAST_WALL_RUN_START_TIME, 10.0);
        Walking.on_activate(&mut blackboard, &SettingsBundle::full());
        assert!(!blackboard.is_valid(BlackboardKey::LAST_WALL_RUN_START_TIME));
    }
}

//! Crouching.

use strider_shared::constants::EXPAND_CLEARANCE;
use strider_shared::{MoverEvent, Stance};
use tracing::{trace, warn};

use super::{ModifierContext, MovementModifier};
use crate::collision::ActorShape;
use crate::settings::SettingsBundle;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Saved {
    shape: ActorShape,
    max_speed: f32,
    acceleration: f32,
}

/// Shrinks the capsule and slows the walker while active.
///
/// Only [`Stance::Crouch`] is implemented; other stances refuse to start.
#[derive(Clone, Debug, PartialEq)]
pub struct StanceModifier {
    stance: Stance,
    saved: Option<Saved>,
}

impl StanceModifier {
    /// Modifier for `stance`.
    #[must_use]
    pub const fn new(stance: Stance) -> Self {
        Self { stance, saved: None }
    }

    /// Crouch modifier.
    #[must_use]
    pub const fn crouch() -> Self {
        Self::new(Stance::Crouch)
    }

    /// Stance this modifier applies.
    #[must_use]
    pub const fn stance(&self) -> Stance {
        self.stance
    }

    /// Resizes the capsule to `half_height`, queueing the offset that keeps
    /// its base in place.
    ///
    /// Growing is refused when the larger shape would overlap geometry.
    fn resize(ctx: &mut ModifierContext<'_>, half_height: f32) -> bool {
        let up = ctx.settings.mover.up_direction;
        let current = ctx.shape.collision;
        let delta = half_height - current.half_height;
        let target = current.with_half_height(half_height);
        let shrinking = delta < 0.0;
        // Grounded actors keep their feet; airborne ones grow around the center.
        let grounded = ctx.blackboard.floor().is_some_and(|floor| floor.is_walkable());
        let anchored = shrinking || grounded;

        if !shrinking {
            let probe = if anchored {
                ctx.state.position + *ctx.teleport + up * (delta + EXPAND_CLEARANCE)
            } else {
                ctx.state.position + *ctx.teleport
            };
            if ctx.world.overlap_test(&target, probe, ctx.state.orientation) {
                return false;
            }
        }

        if anchored {
            *ctx.teleport += up * delta;
        }
        ctx.shape.collision = target;
        true
    }
}

impl MovementModifier for StanceModifier {
    fn name(&self) -> &'static str {
        match self.stance {
            Stance::Crouch => "Crouch",
            Stance::Fat => "Fat",
            Stance::Invalid => "InvalidStance",
        }
    }

    fn on_start(&mut self, ctx: &mut ModifierContext<'_>) -> bool {
        if self.stance != Stance::Crouch {
            warn!(stance = ?self.stance, "stance not implemented");
            return false;
        }
        let Some(stance) = ctx.settings.stance.clone() else {
            warn!("crouch requested without stance settings");
            return false;
        };

        let saved = Saved {
            shape: *ctx.shape,
            max_speed: ctx.settings.common.max_speed,
            acceleration: ctx.settings.common.acceleration,
        };
        if !Self::resize(ctx, stance.crouch_half_height) {
            return false;
        }
        self.saved = Some(saved);

        ctx.shape.eye_height = stance.crouch_eye_height;
        ctx.settings.common.max_speed = stance.crouch_max_speed;
        ctx.settings.common.acceleration = stance.crouch_acceleration;
        ctx.events.push(MoverEvent::StanceChanged {
            sim_time_ms: ctx.tick.sim_time_ms,
            stance: self.stance,
            active: true,
        });
        true
    }

    fn on_end(&mut self, ctx: &mut ModifierContext<'_>) -> bool {
        let Some(saved) = self.saved else {
            return true;
        };
        if !Self::resize(ctx, saved.shape.collision.half_height) {
            trace!("no room to stand up");
            return false;
        }
        self.saved = None;

        ctx.shape.eye_height = saved.shape.eye_height;
        ctx.settings.common.max_speed = saved.max_speed;
        ctx.settings.common.acceleration = saved.acceleration;
        ctx.events.push(MoverEvent::StanceChanged {
            sim_time_ms: ctx.tick.sim_time_ms,
            stance: self.stance,
            active: false,
        });
        true
    }

    fn allows_walking_off_ledges(&self, settings: &SettingsBundle) -> bool {
        self.saved.is_none()
            || settings.stance.as_ref().map_or(true, |stance| stance.can_walk_off_ledges_when_crouching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::{Blackboard, BlackboardKey};
    use crate::collision::{Collider, FloorResult, StaticWorld};
    use crate::settings::StanceSettings;
    use crate::state::{SimulationState, TickContext};
    use strider_shared::{EventQueue, ModeId, Vec3};

    struct Fixture {
        state: SimulationState,
        settings: SettingsBundle,
        shape: ActorShape,
        world: StaticWorld,
        blackboard: Blackboard,
        events: EventQueue,
        teleport: Vec3,
    }

    impl Fixture {
        fn standing(world: StaticWorld) -> Self {
            let mut blackboard = Blackboard::new();
            blackboard.set(
                BlackboardKey::LAST_FLOOR_RESULT,
                FloorResult { blocking: true, walkable: true, normal: Vec3::Z, ..FloorResult::default() },
            );
            Self {
                state: SimulationState::at(Vec3::new(0.0, 0.0, 88.0), ModeId::Walking),
                settings: SettingsBundle::full(),
                shape: ActorShape::default(),
                world,
                blackboard,
                events: EventQueue::new(),
                teleport: Vec3::ZERO,
            }
        }

        fn ctx(&mut self) -> ModifierContext<'_> {
            ModifierContext {
                state: &self.state,
                tick: TickContext::new(16.0, 500.0, 0),
                settings: &mut self.settings,
                shape: &mut self.shape,
                world: &self.world,
                blackboard: &self.blackboard,
                events: &mut self.events,
                teleport: &mut self.teleport,
            }
        }

        /// Applies and clears the pending teleport.
        fn settle(&mut self) {
            self.state.position = self.state.position + self.teleport;
            self.teleport = Vec3::ZERO;
        }
    }

    fn low_ceiling() -> StaticWorld {
        StaticWorld::with_ground(0.0).with(Collider::aabb(Vec3::new(-500.0, -500.0, 150.0), Vec3::new(500.0, 500.0, 200.0)))
    }

    #[test]
    fn test_crouch_shrinks_and_keeps_feet() {
        let mut fixture = Fixture::standing(StaticWorld::with_ground(0.0));
        let mut crouch = StanceModifier::crouch();
        assert!(crouch.on_start(&mut fixture.ctx()));

        assert!((fixture.shape.collision.half_height - 40.0).abs() < 1.0e-4);
        assert!((fixture.shape.eye_height - 40.0).abs() < 1.0e-4);
        assert!((fixture.teleport.z + 48.0).abs() < 1.0e-4);
        assert!((fixture.settings.common.max_speed - 300.0).abs() < 1.0e-4);
        assert!((fixture.settings.common.acceleration - 2000.0).abs() < 1.0e-4);
        assert_eq!(
            fixture.events.as_slice(),
            &[MoverEvent::StanceChanged { sim_time_ms: 500.0, stance: Stance::Crouch, active: true }]
        );

        fixture.settle();
        assert!(crouch.on_end(&mut fixture.ctx()));
        fixture.settle();
        assert_eq!(fixture.shape, ActorShape::default());
        assert!((fixture.state.position.z - 88.0).abs() < 1.0e-3);
        assert!((fixture.settings.common.max_speed - 800.0).abs() < 1.0e-4);
        assert_eq!(fixture.events.len(), 2);
    }

    #[test]
    fn test_cannot_stand_under_low_ceiling() {
        let mut fixture = Fixture::standing(StaticWorld::with_ground(0.0));
        let mut crouch = StanceModifier::crouch();
        assert!(crouch.on_start(&mut fixture.ctx()));
        fixture.settle();

        fixture.world = low_ceiling();
        assert!(!crouch.on_end(&mut fixture.ctx()));
        assert!((fixture.shape.collision.half_height - 40.0).abs() < 1.0e-4);
        assert_eq!(fixture.teleport, Vec3::ZERO);
        assert_eq!(fixture.events.len(), 1);
    }

    #[test]
    fn test_airborne_stand_up_grows_around_center() {
        let mut fixture = Fixture::standing(StaticWorld::with_ground(0.0));
        let mut crouch = StanceModifier::crouch();
        assert!(crouch.on_start(&mut fixture.ctx()));
        fixture.settle();

        // Falling well clear of the ground with no walkable floor cached.
        fixture.state.position = Vec3::new(0.0, 0.0, 500.0);
        fixture.state.mode = ModeId::Falling;
        fixture.state.velocity = Vec3::new(0.0, 0.0, -300.0);
        fixture.blackboard.invalidate(BlackboardKey::LAST_FLOOR_RESULT);

        assert!(crouch.on_end(&mut fixture.ctx()));
        assert_eq!(fixture.teleport, Vec3::ZERO);
        assert_eq!(fixture.shape, ActorShape::default());
    }

    #[test]
    fn test_unsupported_stances_refuse() {
        let mut fixture = Fixture::standing(StaticWorld::with_ground(0.0));
        assert!(!StanceModifier::new(Stance::Fat).on_start(&mut fixture.ctx()));

        fixture.settings.stance = None;
        assert!(!StanceModifier::crouch().on_start(&mut fixture.ctx()));
        assert_eq!(fixture.shape, ActorShape::default());
        assert!(fixture.events.is_empty());
    }

    #[test]
    fn test_ledge_policy() {
        let mut fixture = Fixture::standing(StaticWorld::with_ground(0.0));
        fixture.settings.stance =
            Some(StanceSettings { can_walk_off_ledges_when_crouching: false, ..StanceSettings::default() });
        let mut crouch = StanceModifier::crouch();
        assert!(crouch.allows_walking_off_ledges(&fixture.settings));
        assert!(crouch.on_start(&mut fixture.ctx()));
        assert!(!crouch.allows_walking_off_ledges(&fixture.settings));
    }
}

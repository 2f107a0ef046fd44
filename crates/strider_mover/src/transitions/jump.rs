//! Jump off the ground, or shortly after leaving it.

use strider_shared::constants::S_TO_MS;
use strider_shared::{ModeId, MoverEvent, TagSet, Vec3};
use tracing::debug;

use super::{EvalContext, Transition, TransitionEval, TriggerContext};
use crate::blackboard::BlackboardKey;
use crate::layered::{LayeredMove, LayeredMoveKind, MultiJump};
use crate::state::MixMode;

/// Fires on a jump press when the actor stands on a walkable floor, or
/// left one less than `coyote_time` ago without jumping since.
///
/// Taking the transition queues a [`MultiJump`] for the hold time.
#[derive(Clone, Debug, Default)]
pub struct Jump {
    /// Mode to switch to. Defaults to the configured air mode.
    pub target: Option<ModeId>,
    /// Tags the actor must carry.
    pub required_tags: TagSet,
    /// Tags that forbid the jump.
    pub blocked_tags: TagSet,
    /// Extra key stamped with the jump time.
    pub time_logging_key: Option<BlackboardKey>,
}

impl Jump {
    /// Jump into `mode` instead of the configured air mode.
    #[must_use]
    pub const fn with_target(mut self, mode: ModeId) -> Self {
        self.target = Some(mode);
        self
    }

    /// Required and blocked tags.
    #[must_use]
    pub const fn with_tags(mut self, required: TagSet, blocked: TagSet) -> Self {
        self.required_tags = required;
        self.blocked_tags = blocked;
        self
    }
}

/// Mix for a jump: vertical-only overrides replace the up component,
/// horizontal overrides replace the whole velocity.
#[must_use]
pub const fn jump_mix(override_horizontal: bool, override_vertical: bool) -> MixMode {
    match (override_horizontal, override_vertical) {
        (true, _) => MixMode::OverrideAll,
        (false, true) => MixMode::Override,
        (false, false) => MixMode::Additive,
    }
}

impl Transition for Jump {
    fn name(&self) -> &'static str {
        "Jump"
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> TransitionEval {
        if !ctx.inputs.abilities.jump_just_pressed {
            return TransitionEval::NoTransition;
        }
        if !ctx.output.tags.passes(self.required_tags, self.blocked_tags) {
            return TransitionEval::NoTransition;
        }

        let common = &ctx.settings.common;
        let blackboard = ctx.blackboard.read();
        let now = ctx.tick.sim_time_ms;
        let last_jump = blackboard.time(BlackboardKey::LAST_JUMP_TIME);

        if let Some(last_jump) = last_jump {
            if now - last_jump < f64::from(common.min_time_between_jumps * S_TO_MS) {
                return TransitionEval::NoTransition;
            }
        }

        let on_floor = blackboard.floor().is_some_and(|floor| floor.is_walkable());
        if common.jump_requires_ground && !on_floor {
            if common.coyote_time <= 0.0 {
                return TransitionEval::NoTransition;
            }
            let Some(last_fall) = blackboard.time(BlackboardKey::LAST_FALL_TIME) else {
                return TransitionEval::NoTransition;
            };
            if now - last_fall > f64::from(common.coyote_time * S_TO_MS) {
                return TransitionEval::NoTransition;
            }
            // Coyote time covers walking off a ledge. Presses after a jump
            // belong to the live jump move and its in-air charges.
            if last_jump.is_some_and(|last_jump| last_jump >= last_fall) {
                return TransitionEval::NoTransition;
            }
        }

        TransitionEval::To(self.target.unwrap_or(ctx.settings.mover.air_mode))
    }

    fn trigger(&self, ctx: &mut TriggerContext<'_>) {
        let settings = ctx.settings;
        let common = &settings.common;
        let up = settings.mover.up_direction;
        let now = ctx.tick.sim_time_ms;

        let mut inherited = Vec3::ZERO;
        if let Some(floor) = ctx.blackboard.floor().filter(|floor| floor.is_walkable()) {
            ctx.blackboard.set_time(BlackboardKey::LAST_FALL_TIME, now);
            if common.jump_adds_floor_velocity {
                inherited = floor.surface_velocity;
            }
        }
        ctx.blackboard.set_time(BlackboardKey::LAST_JUMP_TIME, now);

        let mut kept = if common.jump_keeps_previous_velocity {
            ctx.output.velocity
        } else {
            Vec3::ZERO
        };
        if !common.jump_keeps_previous_vertical_velocity {
            kept = kept.project_onto_plane(up);
        }
        if common.max_jump_previous_velocity >= 0.0 {
            kept = kept.clamp_length(common.max_jump_previous_velocity);
        }
        let momentum = inherited + kept;

        let extra = if ctx.output.tags.contains(TagSet::EXTRA_JUMP_IMPULSE) {
            common.extra_jump_vertical_impulse
        } else {
            0.0
        };
        let upwards_speed = common.jump_vertical_impulse + extra;

        let jump = MultiJump::from_settings(common, upwards_speed, momentum);
        let mix = jump_mix(jump.override_horizontal, jump.override_vertical);
        ctx.layered.queue(LayeredMove::new(
            LayeredMoveKind::MultiJump(jump),
            mix,
            common.jump_hold_time * S_TO_MS,
        ));

        if let Some(key) = self.time_logging_key {
            ctx.blackboard.set_time(key, now);
        }
        ctx.events.push(MoverEvent::Jumped { sim_time_ms: now, upwards_speed });
        debug!(upwards_speed, ?momentum, ?mix, "jump");
    }
}

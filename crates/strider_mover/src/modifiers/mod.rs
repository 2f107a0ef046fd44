//! # Movement Modifiers
//!
//! Temporary changes to the actor's shape and settings, such as crouching.
//!
//! ## Lifecycle
//!
//! ```text
//! start -> on_start ──refused──> dropped
//!             │
//!             v
//!   every step: on_pre_movement ... move ... on_post_movement
//!             │
//!   end / expiry -> on_end ──refused──> stays active, retried next step
//! ```
//!
//! A modifier owns whatever it changed: `on_end` restores the values it
//! saved in `on_start`.

pub mod stance;

use strider_shared::{EventQueue, Vec3};
use tracing::debug;

use crate::blackboard::Blackboard;
use crate::collision::{ActorShape, CollisionQuery};
use crate::settings::SettingsBundle;
use crate::state::{SimulationState, TickContext};

pub use stance::StanceModifier;

/// View handed to modifier hooks.
pub struct ModifierContext<'a> {
    /// Committed state at the start of the step.
    pub state: &'a SimulationState,
    /// Timing.
    pub tick: TickContext,
    /// Effective settings; modifiers edit these in place.
    pub settings: &'a mut SettingsBundle,
    /// Current shape and eye height.
    pub shape: &'a mut ActorShape,
    /// Geometry.
    pub world: &'a dyn CollisionQuery,
    /// Blackboard.
    pub blackboard: &'a Blackboard,
    /// Output events.
    pub events: &'a mut EventQueue,
    /// Offset applied to the position before the step moves.
    pub teleport: &'a mut Vec3,
}

impl std::fmt::Debug for ModifierContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModifierContext")
            .field("tick", &self.tick)
            .field("shape", self.shape)
            .field("teleport", self.teleport)
            .finish_non_exhaustive()
    }
}

/// A temporary shape/settings change.
pub trait MovementModifier: Send + Sync + std::fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Applies the modifier. Returning false drops it without `on_end`.
    fn on_start(&mut self, ctx: &mut ModifierContext<'_>) -> bool;

    /// Reverts the modifier. Returning false keeps it active.
    fn on_end(&mut self, ctx: &mut ModifierContext<'_>) -> bool;

    /// Before the active mode generates its move.
    fn on_pre_movement(&mut self, _ctx: &mut ModifierContext<'_>) {}

    /// After the move was applied and committed.
    fn on_post_movement(&mut self, _ctx: &mut ModifierContext<'_>) {}

    /// Whether a walker may step off ledges while this modifier is active.
    fn allows_walking_off_ledges(&self, _settings: &SettingsBundle) -> bool {
        true
    }
}

/// Identifies an active modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModifierHandle(u32);

#[derive(Debug)]
struct ActiveModifier {
    handle: ModifierHandle,
    started_ms: f64,
    /// Negative: until ended explicitly.
    duration_ms: f32,
    end_requested: bool,
    modifier: Box<dyn MovementModifier>,
}

impl ActiveModifier {
    fn should_end(&self, now: f64) -> bool {
        self.end_requested || (self.duration_ms >= 0.0 && now - self.started_ms >= f64::from(self.duration_ms))
    }
}

/// Active modifiers of one actor, oldest first.
#[derive(Debug, Default)]
pub struct ModifierStack {
    active: Vec<ActiveModifier>,
    next_handle: u32,
}

impl ModifierStack {
    /// Empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `modifier` for `duration_ms` (negative: until ended).
    ///
    /// Returns `None` when the modifier refused to start.
    pub fn start(
        &mut self,
        mut modifier: Box<dyn MovementModifier>,
        duration_ms: f32,
        ctx: &mut ModifierContext<'_>,
    ) -> Option<ModifierHandle> {
        if !modifier.on_start(ctx) {
            debug!(modifier = modifier.name(), "modifier refused to start");
            return None;
        }
        let handle = ModifierHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        debug!(modifier = modifier.name(), ?handle, duration_ms, "modifier started");
        self.active.push(ActiveModifier {
            handle,
            started_ms: ctx.tick.sim_time_ms,
            duration_ms,
            end_requested: false,
            modifier,
        });
        Some(handle)
    }

    /// Tries to end `handle` now. On refusal the end stays requested and is
    /// retried before every step until it succeeds.
    ///
    /// Returns true when the modifier is gone.
    pub fn end(&mut self, handle: ModifierHandle, ctx: &mut ModifierContext<'_>) -> bool {
        let Some(index) = self.active.iter().position(|m| m.handle == handle) else {
            return true;
        };
        if self.active[index].modifier.on_end(ctx) {
            let ended = self.active.remove(index);
            debug!(modifier = ended.modifier.name(), ?handle, "modifier ended");
            true
        } else {
            self.active[index].end_requested = true;
            false
        }
    }

    /// Cancels a pending end request.
    pub fn keep(&mut self, handle: ModifierHandle) {
        if let Some(active) = self.active.iter_mut().find(|m| m.handle == handle) {
            active.end_requested = false;
        }
    }

    /// Ends expired or requested modifiers, then runs `on_pre_movement` on
    /// the rest.
    pub fn pre_movement(&mut self, ctx: &mut ModifierContext<'_>) {
        let now = ctx.tick.sim_time_ms;
        let mut index = 0;
        while index < self.active.len() {
            let entry = &mut self.active[index];
            if entry.should_end(now) && entry.modifier.on_end(ctx) {
                debug!(modifier = entry.modifier.name(), handle = ?entry.handle, "modifier ended");
                self.active.remove(index);
                continue;
            }
            entry.modifier.on_pre_movement(ctx);
            index += 1;
        }
    }

    /// Runs `on_post_movement` on every active modifier.
    pub fn post_movement(&mut self, ctx: &mut ModifierContext<'_>) {
        for entry in &mut self.active {
            entry.modifier.on_post_movement(ctx);
        }
    }

    /// False when any active modifier keeps walkers on ledges.
    #[must_use]
    pub fn allows_walking_off_ledges(&self, settings: &SettingsBundle) -> bool {
        self.active.iter().all(|m| m.modifier.allows_walking_off_ledges(settings))
    }

    /// True when `handle` is still active.
    #[must_use]
    pub fn is_active(&self, handle: ModifierHandle) -> bool {
        self.active.iter().any(|m| m.handle == handle)
    }

    /// True when an end was requested for `handle` but not yet accepted.
    #[must_use]
    pub fn is_ending(&self, handle: ModifierHandle) -> bool {
        self.active.iter().any(|m| m.handle == handle && m.end_requested)
    }

    /// Number of active modifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// True when no modifier is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::StaticWorld;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use strider_shared::ModeId;

    #[derive(Debug)]
    struct Counting {
        ends_allowed: bool,
        pre: Arc<AtomicUsize>,
    }

    impl MovementModifier for Counting {
        fn name(&self) -> &'static str {
            "Counting"
        }

        fn on_start(&mut self, ctx: &mut ModifierContext<'_>) -> bool {
            ctx.settings.common.max_speed = 100.0;
            true
        }

        fn on_end(&mut self, ctx: &mut ModifierContext<'_>) -> bool {
            if self.ends_allowed {
                ctx.settings.common.max_speed = 800.0;
            }
            self.ends_allowed
        }

        fn on_pre_movement(&mut self, _ctx: &mut ModifierContext<'_>) {
            self.pre.fetch_add(1, Ordering::SeqCst);
        }
    }

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
        fn new() -> Self {
            Self {
                state: SimulationState::at(Vec3::new(0.0, 0.0, 88.0), ModeId::Walking),
                settings: SettingsBundle::default(),
                shape: ActorShape::default(),
                world: StaticWorld::with_ground(0.0),
                blackboard: Blackboard::new(),
                events: EventQueue::new(),
                teleport: Vec3::ZERO,
            }
        }

        fn ctx(&mut self, now: f64) -> ModifierContext<'_> {
            ModifierContext {
                state: &self.state,
                tick: TickContext::new(16.0, now, 0),
                settings: &mut self.settings,
                shape: &mut self.shape,
                world: &self.world,
                blackboard: &self.blackboard,
                events: &mut self.events,
                teleport: &mut self.teleport,
            }
        }
    }

    #[test]
    fn test_duration_expiry() {
        let mut fixture = Fixture::new();
        let mut stack = ModifierStack::new();
        let pre = Arc::new(AtomicUsize::new(0));
        let modifier = Box::new(Counting { ends_allowed: true, pre: Arc::clone(&pre) });

        let handle = stack.start(modifier, 100.0, &mut fixture.ctx(0.0)).unwrap();
        assert!((fixture.settings.common.max_speed - 100.0).abs() < f32::EPSILON);

        stack.pre_movement(&mut fixture.ctx(50.0));
        assert!(stack.is_active(handle));
        assert_eq!(pre.load(Ordering::SeqCst), 1);

        stack.pre_movement(&mut fixture.ctx(100.0));
        assert!(!stack.is_active(handle));
        assert!(stack.is_empty());
        assert!((fixture.settings.common.max_speed - 800.0).abs() < f32::EPSILON);
        assert_eq!(pre.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refused_end_is_retried() {
        let mut fixture = Fixture::new();
        let mut stack = ModifierStack::new();
        let modifier = Box::new(Counting { ends_allowed: false, pre: Arc::new(AtomicUsize::new(0)) });

        let handle = stack.start(modifier, -1.0, &mut fixture.ctx(0.0)).unwrap();
        assert!(!stack.end(handle, &mut fixture.ctx(10.0)));
        assert!(stack.is_ending(handle));

        stack.pre_movement(&mut fixture.ctx(1.0e9));
        assert!(stack.is_active(handle));

        stack.keep(handle);
        assert!(!stack.is_ending(handle));
        assert_eq!(stack.len(), 1);
    }
}

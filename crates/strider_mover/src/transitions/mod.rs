//! # Transitions
//!
//! Rules deciding, after a step's movement is applied, which mode runs
//! next.
//!
//! ## Evaluation
//!
//! Global rules run first, then the rules attached to the mode that just
//! simulated. The first rule naming a registered mode wins and evaluation
//! stops there. Its `trigger` runs exactly once.
//!
//! `evaluate` may only write query results to the blackboard (a wall trace
//! it just made, for example). Everything else waits for `trigger`.
//!
//! ## Default rules
//!
//! | Scope       | Rules                          |
//! |-------------|--------------------------------|
//! | global      | `Jump`                         |
//! | Falling     | `IntoWallRunning`              |
//! | WallRunning | `WallJump`, `OutOfWallRunning` |

pub mod jump;
pub mod wall_jump;
pub mod wall_running;

use strider_shared::{EventQueue, ModeId, MoverInputs};
use tracing::{debug, warn};

use crate::blackboard::{Blackboard, BlackboardCache};
use crate::collision::{CollisionQuery, CollisionShape};
use crate::error::MoverError;
use crate::layered::LayeredMoveStack;
use crate::settings::SettingsBundle;
use crate::state::{SimulationState, TickContext};

pub use jump::Jump;
pub use wall_jump::WallJump;
pub use wall_running::{IntoWallRunning, OutOfWallRunning};

// =============================================================================
// CONTEXTS
// =============================================================================

/// View handed to `evaluate`.
pub struct EvalContext<'a> {
    /// State at the start of the step.
    pub start: &'a SimulationState,
    /// State after the mode applied its movement.
    pub output: &'a SimulationState,
    /// Inputs for the step.
    pub inputs: &'a MoverInputs,
    /// Timing.
    pub tick: TickContext,
    /// Effective settings.
    pub settings: &'a SettingsBundle,
    /// Geometry.
    pub world: &'a dyn CollisionQuery,
    /// Current collision shape.
    pub shape: CollisionShape,
    /// Blackboard, writable for query results only.
    pub blackboard: BlackboardCache<'a>,
}

impl std::fmt::Debug for EvalContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("output", self.output)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

/// View handed to `trigger`.
#[derive(Debug)]
pub struct TriggerContext<'a> {
    /// State at the start of the step.
    pub start: &'a SimulationState,
    /// State after the mode applied its movement.
    pub output: &'a SimulationState,
    /// Inputs for the step.
    pub inputs: &'a MoverInputs,
    /// Timing.
    pub tick: TickContext,
    /// Effective settings.
    pub settings: &'a SettingsBundle,
    /// Blackboard.
    pub blackboard: &'a mut Blackboard,
    /// Layered moves of the actor.
    pub layered: &'a mut LayeredMoveStack,
    /// Output events.
    pub events: &'a mut EventQueue,
}

// =============================================================================
// RULES
// =============================================================================

/// Result of evaluating one rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionEval {
    /// Stay in the current mode.
    NoTransition,
    /// Switch to the given mode for the next step.
    To(ModeId),
}

/// A transition rule.
pub trait Transition: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Decides whether to switch modes.
    fn evaluate(&self, ctx: &mut EvalContext<'_>) -> TransitionEval;

    /// Side effects of taking the transition.
    fn trigger(&self, _ctx: &mut TriggerContext<'_>) {}
}

/// The rule that fired and where it leads.
#[derive(Clone, Copy)]
pub struct FiredTransition<'a> {
    /// Winning rule.
    pub rule: &'a dyn Transition,
    /// Mode to run next.
    pub target: ModeId,
}

impl std::fmt::Debug for FiredTransition<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiredTransition")
            .field("rule", &self.rule.name())
            .field("target", &self.target)
            .finish()
    }
}

/// Ordered rule lists.
#[derive(Default)]
pub struct TransitionPipeline {
    global: Vec<Box<dyn Transition>>,
    per_mode: Vec<(ModeId, Vec<Box<dyn Transition>>)>,
}

impl std::fmt::Debug for TransitionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |rules: &[Box<dyn Transition>]| rules.iter().map(|r| r.name()).collect::<Vec<_>>();
        let mut map = f.debug_map();
        map.entry(&"global", &names(&self.global));
        for (mode, rules) in &self.per_mode {
            map.entry(mode, &names(rules));
        }
        map.finish()
    }
}

impl TransitionPipeline {
    /// No rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump globally, wall-run entry from Falling, wall jump and wall-run
    /// exit from WallRunning.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut pipeline = Self::new();
        pipeline.add_global(Box::<Jump>::default());
        pipeline.add_for_mode(ModeId::Falling, Box::<IntoWallRunning>::default());
        pipeline.add_for_mode(ModeId::WallRunning, Box::<WallJump>::default());
        pipeline.add_for_mode(ModeId::WallRunning, Box::<OutOfWallRunning>::default());
        pipeline
    }

    /// Appends a rule evaluated in every mode.
    pub fn add_global(&mut self, rule: Box<dyn Transition>) {
        self.global.push(rule);
    }

    /// Appends a rule evaluated only while `mode` is active.
    pub fn add_for_mode(&mut self, mode: ModeId, rule: Box<dyn Transition>) {
        match self.per_mode.iter_mut().find(|(m, _)| *m == mode) {
            Some((_, rules)) => rules.push(rule),
            None => self.per_mode.push((mode, vec![rule])),
        }
    }

    /// Removes every rule attached to `mode`.
    pub fn clear_mode(&mut self, mode: ModeId) {
        self.per_mode.retain(|(m, _)| *m != mode);
    }

    /// Rules evaluated while `mode` is active, in order.
    pub fn rules_for(&self, mode: ModeId) -> impl Iterator<Item = &dyn Transition> {
        let per_mode = self
            .per_mode
            .iter()
            .filter(move |(m, _)| *m == mode)
            .flat_map(|(_, rules)| rules.iter());
        self.global.iter().chain(per_mode).map(|rule| rule.as_ref())
    }

    /// Runs the rules for `mode` and returns the first that fires.
    ///
    /// A rule naming a mode for which `is_registered` is false is logged
    /// and treated as not firing.
    pub fn evaluate(
        &self,
        mode: ModeId,
        is_registered: impl Fn(ModeId) -> bool,
        ctx: &mut EvalContext<'_>,
    ) -> Option<FiredTransition<'_>> {
        for rule in self.rules_for(mode) {
            let TransitionEval::To(target) = rule.evaluate(ctx) else {
                continue;
            };
            if !is_registered(target) {
                let error = MoverError::UnknownMode { transition: rule.name(), target };
                warn!(%error, "transition ignored");
                continue;
            }
            debug!(rule = rule.name(), from = %mode, to = %target, "transition fired");
            return Some(FiredTransition { rule, target });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::StaticWorld;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        name: &'static str,
        result: TransitionEval,
        triggered: Arc<AtomicUsize>,
    }

    impl Transition for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn evaluate(&self, _ctx: &mut EvalContext<'_>) -> TransitionEval {
            self.result
        }

        fn trigger(&self, _ctx: &mut TriggerContext<'_>) {
            self.triggered.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fixed(name: &'static str, result: TransitionEval) -> (Box<dyn Transition>, Arc<AtomicUsize>) {
        let triggered = Arc::new(AtomicUsize::new(0));
        (Box::new(Fixed { name, result, triggered: Arc::clone(&triggered) }), triggered)
    }

    fn run(pipeline: &TransitionPipeline, registered: &[ModeId]) -> Option<(&'static str, ModeId)> {
        let settings = SettingsBundle::full();
        let state = SimulationState::at(strider_shared::Vec3::ZERO, ModeId::Falling);
        let inputs = MoverInputs::default();
        let world = StaticWorld::new();
        let mut blackboard = Blackboard::new();
        let mut layered = LayeredMoveStack::new();
        let mut events = EventQueue::new();
        let tick = TickContext::new(16.0, 0.0, 0);

        let mut ctx = EvalContext {
            start: &state,
            output: &state,
            inputs: &inputs,
            tick,
            settings: &settings,
            world: &world,
            shape: CollisionShape::default(),
            blackboard: blackboard.cache(),
        };
        let fired = pipeline.evaluate(ModeId::Falling, |m| registered.contains(&m), &mut ctx)?;
        let mut trigger = TriggerContext {
            start: &state,
            output: &state,
            inputs: &inputs,
            tick,
            settings: &settings,
            blackboard: &mut blackboard,
            layered: &mut layered,
            events: &mut events,
        };
        fired.rule.trigger(&mut trigger);
        Some((fired.rule.name(), fired.target))
    }

    #[test]
    fn test_first_match_wins() {
        let mut pipeline = TransitionPipeline::new();
        let (none, none_hits) = fixed("none", TransitionEval::NoTransition);
        let (first, first_hits) = fixed("first", TransitionEval::To(ModeId::Walking));
        let (second, second_hits) = fixed("second", TransitionEval::To(ModeId::WallRunning));
        pipeline.add_global(none);
        pipeline.add_for_mode(ModeId::Falling, first);
        pipeline.add_for_mode(ModeId::Falling, second);

        assert_eq!(run(&pipeline, &ModeId::ALL), Some(("first", ModeId::Walking)));
        assert_eq!(none_hits.load(Ordering::SeqCst), 0);
        assert_eq!(first_hits.load(Ordering::SeqCst), 1);
        assert_eq!(second_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregistered_target_is_skipped() {
        let mut pipeline = TransitionPipeline::new();
        let (bad, bad_hits) = fixed("bad", TransitionEval::To(ModeId::WallRunning));
        let (good, _) = fixed("good", TransitionEval::To(ModeId::Walking));
        pipeline.add_for_mode(ModeId::Falling, bad);
        pipeline.add_for_mode(ModeId::Falling, good);

        assert_eq!(run(&pipeline, &[ModeId::Walking, ModeId::Falling]), Some(("good", ModeId::Walking)));
        assert_eq!(bad_hits.load(Ordering::SeqCst), 0);
        assert_eq!(run(&pipeline, &[ModeId::Falling]), None);
    }

    #[test]
    fn test_rules_are_scoped_to_their_mode() {
        let mut pipeline = TransitionPipeline::new();
        let (walking_only, _) = fixed("walking_only", TransitionEval::To(ModeId::Falling));
        pipeline.add_for_mode(ModeId::Walking, walking_only);
        assert_eq!(run(&pipeline, &ModeId::ALL), None);
        assert_eq!(pipeline.rules_for(ModeId::Walking).count(), 1);

        let defaults = TransitionPipeline::with_defaults();
        let names: Vec<_> = defaults.rules_for(ModeId::WallRunning).map(|rule| rule.name()).collect();
        assert_eq!(names, ["Jump", "WallJump", "OutOfWallRunning"]);
    }
}

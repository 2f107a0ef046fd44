//! # Simulation Driver
//!
//! Owns one actor's committed state and runs its ticks.
//!
//! ## Tick
//!
//! ```text
//! tick(world, step_ms, inputs)
//! ├─ crouch toggle (crouch_just_pressed)
//! └─ substep (repeated while a mode switch refunds unused time)
//!    ├─ 1. activate queued layered moves, flush finished ones
//!    ├─ 2. modifiers: pre-movement, pending teleport
//!    ├─ 3. mode.generate_move            (error -> zero move)
//!    ├─ 4. layered moves mix over it     (oldest first)
//!    ├─ 5. mode.apply_movement
//!    ├─ 6. modifiers: post-movement
//!    ├─ 7. transitions (first match), trigger of the winner
//!    └─ 8. commit, switch mode for the next substep
//! ```
//!
//! Every substep commits a finite state. Refund substeps reuse the tick's
//! inputs with edge flags cleared, so a press fires once per tick.

use strider_shared::constants::{MIN_REFUND_SECONDS, MS_TO_S};
use strider_shared::{EventQueue, ModeId, MoverEvent, MoverInputs, TagSet, Vec3};
use tracing::{debug, trace, warn};

use crate::blackboard::Blackboard;
use crate::collision::{ActorShape, CollisionQuery};
use crate::error::{MoverError, MoverResult};
use crate::layered::{LayeredContext, LayeredMove, LayeredMoveStack};
use crate::modes::{ApplyContext, ModeRegistry, MoveContext, MovementMode};
use crate::modifiers::{ModifierContext, ModifierHandle, ModifierStack, MovementModifier, StanceModifier};
use crate::settings::SettingsBundle;
use crate::state::{MoveOutcome, ProposedMove, SimulationState, TickContext};
use crate::transitions::{EvalContext, TransitionPipeline, TriggerContext};

// =============================================================================
// BUILDER
// =============================================================================

/// Configures and validates a [`MoverActor`].
#[derive(Debug)]
pub struct MoverActorBuilder {
    state: SimulationState,
    settings: SettingsBundle,
    shape: ActorShape,
    modes: ModeRegistry,
    transitions: TransitionPipeline,
    start_time_ms: f64,
}

impl Default for MoverActorBuilder {
    fn default() -> Self {
        Self {
            state: SimulationState::default(),
            settings: SettingsBundle::full(),
            shape: ActorShape::default(),
            modes: ModeRegistry::with_defaults(),
            transitions: TransitionPipeline::with_defaults(),
            start_time_ms: 0.0,
        }
    }
}

impl MoverActorBuilder {
    /// Default modes, default transitions, every settings group present.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts at rest at `position` in `mode`.
    #[must_use]
    pub fn at(mut self, position: Vec3, mode: ModeId) -> Self {
        self.state = SimulationState::at(position, mode);
        self
    }

    /// Starting state.
    #[must_use]
    pub fn with_state(mut self, state: SimulationState) -> Self {
        self.state = state;
        self
    }

    /// Settings bundle.
    #[must_use]
    pub fn with_settings(mut self, settings: SettingsBundle) -> Self {
        self.settings = settings;
        self
    }

    /// Standing shape and eye height.
    #[must_use]
    pub fn with_shape(mut self, shape: ActorShape) -> Self {
        self.shape = shape;
        self
    }

    /// Registered modes.
    #[must_use]
    pub fn with_modes(mut self, modes: ModeRegistry) -> Self {
        self.modes = modes;
        self
    }

    /// Transition rules.
    #[must_use]
    pub fn with_transitions(mut self, transitions: TransitionPipeline) -> Self {
        self.transitions = transitions;
        self
    }

    /// Simulation time of the first tick (ms).
    #[must_use]
    pub fn with_start_time(mut self, start_time_ms: f64) -> Self {
        self.start_time_ms = start_time_ms;
        self
    }

    /// Validates the configuration and activates the starting mode.
    ///
    /// # Errors
    ///
    /// - [`MoverError::InvalidSettings`] when the settings fail validation
    /// - [`MoverError::NoStartingMode`] when the starting mode is not registered
    /// - [`MoverError::DegenerateGeometry`] for a non-finite starting state
    pub fn build(self) -> MoverResult<MoverActor> {
        self.settings.validate()?;
        if !self.state.is_finite() || !self.start_time_ms.is_finite() {
            return Err(MoverError::DegenerateGeometry("starting state is not finite"));
        }
        let Some(mode) = self.modes.get(self.state.mode) else {
            return Err(MoverError::NoStartingMode(self.state.mode));
        };

        let mut blackboard = Blackboard::new();
        mode.on_activate(&mut blackboard, &self.settings);
        debug!(mode = %self.state.mode, position = ?self.state.position, "actor built");

        Ok(MoverActor {
            state: self.state,
            settings: self.settings,
            shape: self.shape,
            blackboard,
            layered: LayeredMoveStack::new(),
            modifiers: ModifierStack::new(),
            crouch: None,
            modes: self.modes,
            transitions: self.transitions,
            events: EventQueue::new(),
            teleport: Vec3::ZERO,
            sim_time_ms: self.start_time_ms,
            tick: 0,
        })
    }
}

// =============================================================================
// ACTOR
// =============================================================================

/// One simulated actor.
///
/// Everything here is owned exclusively by the actor; ticks of different
/// actors share nothing but the (read-only) world.
#[derive(Debug)]
pub struct MoverActor {
    state: SimulationState,
    /// Effective settings: modifiers edit them in place and restore them on end.
    settings: SettingsBundle,
    shape: ActorShape,
    blackboard: Blackboard,
    layered: LayeredMoveStack,
    modifiers: ModifierStack,
    crouch: Option<ModifierHandle>,
    modes: ModeRegistry,
    transitions: TransitionPipeline,
    events: EventQueue,
    teleport: Vec3,
    sim_time_ms: f64,
    tick: u64,
}

impl MoverActor {
    /// Shorthand for [`MoverActorBuilder::new`].
    #[must_use]
    pub fn builder() -> MoverActorBuilder {
        MoverActorBuilder::new()
    }

    /// Committed state.
    #[must_use]
    pub const fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Active mode.
    #[must_use]
    pub const fn mode(&self) -> ModeId {
        self.state.mode
    }

    /// Effective settings.
    #[must_use]
    pub const fn settings(&self) -> &SettingsBundle {
        &self.settings
    }

    /// Current shape.
    #[must_use]
    pub const fn shape(&self) -> &ActorShape {
        &self.shape
    }

    /// Blackboard.
    #[must_use]
    pub const fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    /// Layered moves.
    #[must_use]
    pub const fn layered_moves(&self) -> &LayeredMoveStack {
        &self.layered
    }

    /// Events raised since the last drain.
    #[must_use]
    pub const fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Takes every event raised since the last drain.
    pub fn drain_events(&mut self) -> Vec<MoverEvent> {
        self.events.drain()
    }

    /// Simulation time (ms).
    #[must_use]
    pub const fn sim_time_ms(&self) -> f64 {
        self.sim_time_ms
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// True while crouched.
    #[must_use]
    pub fn is_crouching(&self) -> bool {
        self.crouch.is_some_and(|handle| self.modifiers.is_active(handle))
    }

    /// Sets or clears a gameplay tag on the committed state.
    pub fn set_tag(&mut self, tag: TagSet, enabled: bool) {
        self.state.tags.set(tag, enabled);
    }

    /// Queues a layered move; it starts on the next substep.
    pub fn queue_layered_move(&mut self, layered_move: LayeredMove) {
        self.layered.queue(layered_move);
    }

    /// Starts a host-provided modifier for `duration_ms` (negative: until ended).
    pub fn start_modifier(
        &mut self,
        world: &dyn CollisionQuery,
        modifier: Box<dyn MovementModifier>,
        duration_ms: f32,
    ) -> Option<ModifierHandle> {
        let mut ctx = ModifierContext {
            state: &self.state,
            tick: TickContext::new(0.0, self.sim_time_ms, self.tick),
            settings: &mut self.settings,
            shape: &mut self.shape,
            world,
            blackboard: &self.blackboard,
            events: &mut self.events,
            teleport: &mut self.teleport,
        };
        self.modifiers.start(modifier, duration_ms, &mut ctx)
    }

    /// Ends a modifier. Returns false when it refused and stays active for now.
    pub fn end_modifier(&mut self, world: &dyn CollisionQuery, handle: ModifierHandle) -> bool {
        let mut ctx = ModifierContext {
            state: &self.state,
            tick: TickContext::new(0.0, self.sim_time_ms, self.tick),
            settings: &mut self.settings,
            shape: &mut self.shape,
            world,
            blackboard: &self.blackboard,
            events: &mut self.events,
            teleport: &mut self.teleport,
        };
        self.modifiers.end(handle, &mut ctx)
    }

    /// Moves the actor instantly. Non-finite positions are ignored.
    pub fn teleport_to(&mut self, position: Vec3) {
        if position.is_finite() {
            self.state.position = position;
            self.blackboard.invalidate_all();
        } else {
            warn!(error = %MoverError::DegenerateGeometry("teleport target"), "teleport ignored");
        }
    }

    /// Runs one tick of `step_ms` and returns the committed state.
    pub fn tick(&mut self, world: &dyn CollisionQuery, step_ms: f32, inputs: &MoverInputs) -> &SimulationState {
        let step_ms = if step_ms.is_finite() && step_ms >= 0.0 {
            step_ms
        } else {
            warn!(error = %MoverError::DegenerateGeometry("step length"), step_ms, "running a zero-length tick");
            0.0
        };
        let inputs = inputs.sanitized();
        let end_ms = self.sim_time_ms + f64::from(step_ms);

        if inputs.abilities.crouch_just_pressed {
            self.toggle_crouch(world);
        }

        let mut remaining_ms = step_ms;
        let mut substep_inputs = inputs;
        let mut refunds = 0;
        loop {
            let tick = TickContext::new(remaining_ms, end_ms - f64::from(remaining_ms), self.tick);
            let refund_ms = self.substep(world, tick, &substep_inputs);
            if refund_ms * MS_TO_S < MIN_REFUND_SECONDS || refunds >= self.settings.mover.max_refund_substeps {
                break;
            }
            trace!(refund_ms, mode = %self.state.mode, "refund substep");
            refunds += 1;
            remaining_ms = refund_ms;
            substep_inputs = inputs.without_edges();
        }

        self.sim_time_ms = end_ms;
        self.tick += 1;
        &self.state
    }

    fn toggle_crouch(&mut self, world: &dyn CollisionQuery) {
        let mut ctx = ModifierContext {
            state: &self.state,
            tick: TickContext::new(0.0, self.sim_time_ms, self.tick),
            settings: &mut self.settings,
            shape: &mut self.shape,
            world,
            blackboard: &self.blackboard,
            events: &mut self.events,
            teleport: &mut self.teleport,
        };
        match self.crouch.filter(|&handle| self.modifiers.is_active(handle)) {
            // Pressed again while waiting for room to stand: stay down.
            Some(handle) if self.modifiers.is_ending(handle) => self.modifiers.keep(handle),
            Some(handle) => {
                self.modifiers.end(handle, &mut ctx);
            }
            None => {
                self.crouch = self.modifiers.start(Box::new(StanceModifier::crouch()), -1.0, &mut ctx);
            }
        }
    }

    /// Runs one substep and returns the time it refunds (ms).
    fn substep(&mut self, world: &dyn CollisionQuery, tick: TickContext, inputs: &MoverInputs) -> f32 {
        let now = tick.sim_time_ms;
        self.layered.activate_queued(now);
        self.layered.flush_finished(now);

        {
            let mut ctx = ModifierContext {
                state: &self.state,
                tick,
                settings: &mut self.settings,
                shape: &mut self.shape,
                world,
                blackboard: &self.blackboard,
                events: &mut self.events,
                teleport: &mut self.teleport,
            };
            self.modifiers.pre_movement(&mut ctx);
        }
        if self.teleport != Vec3::ZERO {
            self.state.position += self.teleport;
            self.teleport = Vec3::ZERO;
        }
        let crouching = self.is_crouching();
        self.state.tags.set(TagSet::CROUCHING, crouching);

        let fallback_position = self.state.position;
        if self.state.sanitize(fallback_position) {
            warn!(error = %MoverError::DegenerateGeometry("committed state"), "state sanitized");
        }
        let start = self.state;

        let Some(mode) = self.modes.get(start.mode) else {
            let error = MoverError::UnknownMode { transition: "active mode", target: start.mode };
            warn!(%error, "holding state");
            return 0.0;
        };

        let base = {
            let ctx = MoveContext {
                start: &start,
                inputs,
                tick,
                settings: &self.settings,
                blackboard: &self.blackboard,
            };
            mode.generate_move(&ctx).unwrap_or_else(|error| {
                warn!(%error, mode = %start.mode, "zero move");
                ProposedMove::ZERO
            })
        };

        let mut proposed = {
            let mut ctx = LayeredContext {
                start: &start,
                inputs,
                tick,
                settings: &self.settings,
                blackboard: &mut self.blackboard,
            };
            self.layered.generate_and_mix(&mut ctx, base)
        };
        if !proposed.linear_velocity.is_finite() || !proposed.angular_velocity.is_finite() {
            warn!(error = %MoverError::DegenerateGeometry("proposed velocity"), "proposed move zeroed");
            proposed.linear_velocity = proposed.linear_velocity.finite_or_zero();
            proposed.angular_velocity = proposed.angular_velocity.finite_or_zero();
        }
        trace!(velocity = ?proposed.linear_velocity, mix = ?proposed.mix, "proposed move");

        let mut outcome = {
            let mut ctx = ApplyContext {
                start: &start,
                inputs,
                tick,
                settings: &self.settings,
                proposed: &proposed,
                world,
                shape: self.shape.collision,
                blackboard: &mut self.blackboard,
                events: &mut self.events,
                can_walk_off_ledges: self.modifiers.allows_walking_off_ledges(&self.settings),
            };
            mode.apply_movement(&mut ctx)
        };
        if outcome.state.sanitize(start.position) {
            warn!(error = %MoverError::DegenerateGeometry("move output"), "output sanitized");
        }

        {
            let mut ctx = ModifierContext {
                state: &outcome.state,
                tick,
                settings: &mut self.settings,
                shape: &mut self.shape,
                world,
                blackboard: &self.blackboard,
                events: &mut self.events,
                teleport: &mut self.teleport,
            };
            self.modifiers.post_movement(&mut ctx);
        }

        let next_mode = self.evaluate_transitions(world, &start, &outcome, &proposed, tick, inputs);
        self.commit(&mut outcome, next_mode, tick)
    }

    /// Picks the next mode: a fired transition, else the movement's own
    /// request, else the layered-move hint.
    fn evaluate_transitions(
        &mut self,
        world: &dyn CollisionQuery,
        start: &SimulationState,
        outcome: &MoveOutcome,
        proposed: &ProposedMove,
        tick: TickContext,
        inputs: &MoverInputs,
    ) -> Option<ModeId> {
        let fired = {
            let mut ctx = EvalContext {
                start,
                output: &outcome.state,
                inputs,
                tick,
                settings: &self.settings,
                world,
                shape: self.shape.collision,
                blackboard: self.blackboard.cache(),
            };
            let modes = &self.modes;
            self.transitions.evaluate(start.mode, |mode| modes.contains(mode), &mut ctx)
        };

        let Some(fired) = fired else {
            return outcome.next_mode.or(proposed.preferred_mode);
        };
        let mut ctx = TriggerContext {
            start,
            output: &outcome.state,
            inputs,
            tick,
            settings: &self.settings,
            blackboard: &mut self.blackboard,
            layered: &mut self.layered,
            events: &mut self.events,
        };
        fired.rule.trigger(&mut ctx);
        Some(fired.target)
    }

    /// Commits `outcome` and switches to `next_mode`. Returns the refund.
    fn commit(&mut self, outcome: &mut MoveOutcome, next_mode: Option<ModeId>, tick: TickContext) -> f32 {
        outcome.state.mode = self.state.mode;
        self.state = outcome.state;

        let Some(next) = next_mode.filter(|&next| next != self.state.mode) else {
            return 0.0;
        };
        if !self.switch_mode(next, tick.sim_time_ms) {
            return 0.0;
        }
        if outcome.remaining_ms.is_finite() {
            outcome.remaining_ms.clamp(0.0, tick.step_ms)
        } else {
            0.0
        }
    }

    fn switch_mode(&mut self, next: ModeId, sim_time_ms: f64) -> bool {
        let from = self.state.mode;
        let Some(target) = self.modes.get(next) else {
            let error = MoverError::UnknownMode { transition: "mode request", target: next };
            warn!(%error, "staying in {from}");
            return false;
        };
        if let Some(current) = self.modes.get(from) {
            current.on_deactivate(&mut self.blackboard, &self.settings);
        }
        target.on_activate(&mut self.blackboard, &self.settings);
        self.state.mode = next;
        self.events.push(MoverEvent::ModeChanged { sim_time_ms, from, to: next });
        debug!(%from, to = %next, sim_time_ms, "mode switched");
        true
    }
}

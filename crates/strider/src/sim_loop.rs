//! # STRIDER Simulation Loop
//!
//! Fixed-step orchestration of every registered actor:
//! ```text
//! advance(frame_ms):
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. ACCUMULATE                                                       │
//! │    └─ Clamp frame time, add to the accumulator                      │
//! │                                                                     │
//! │ 2. STEP (while accumulator >= step, at most max_steps_per_frame)    │
//! │    ├─ Take one read guard on the shared world                       │
//! │    ├─ Tick each actor with its pending inputs                       │
//! │    ├─ Consume press edges                                           │
//! │    └─ Relay drained events onto the bus                             │
//! │                                                                     │
//! │ 3. SHED BACKLOG                                                     │
//! │    └─ Whole steps still owed after the cap are dropped, with a warn │
//! │                                                                     │
//! │ 4. RECORD                                                           │
//! │    └─ FrameStats + interpolation alpha                              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every actor sees the same fixed step, so a run is reproducible from the
//! sequence of inputs alone, whatever the frame timings were.

use std::time::Instant;

use strider_mover::MoverActor;
use strider_shared::{AbilityInputs, MoverInputs};
use tracing::{debug, info, warn};

use crate::events::{ActorEvent, ActorId, EventBus, EventReceiver, EventSender};
use crate::world::SharedWorld;

/// Default simulation rate.
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

/// Longest frame fed to the accumulator, so a stall does not turn into a burst.
pub const MAX_FRAME_MS: f64 = 250.0;

/// Configuration for the simulation loop.
#[derive(Clone, Debug)]
pub struct SimulationLoopConfig {
    /// Fixed steps per simulated second.
    pub tick_rate_hz: u32,
    /// Cap on steps taken by a single `advance`.
    pub max_steps_per_frame: u32,
    /// Event channel capacity.
    pub event_capacity: usize,
    /// Longest frame fed to the accumulator, in milliseconds.
    pub max_frame_ms: f64,
    /// Warn about frames whose stepping exceeded the real-time budget.
    pub enable_timing_logs: bool,
}

impl Default for SimulationLoopConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            max_steps_per_frame: 5,
            event_capacity: 2048,
            max_frame_ms: MAX_FRAME_MS,
            enable_timing_logs: false,
        }
    }
}

impl SimulationLoopConfig {
    /// Length of one fixed step in milliseconds.
    #[must_use]
    pub fn step_ms(&self) -> f32 {
        1000.0 / self.tick_rate_hz.max(1) as f32
    }
}

/// Statistics for one `advance` call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Fixed steps taken.
    pub steps: u32,
    /// Steps owed but shed because of the per-frame cap.
    pub dropped_steps: u32,
    /// Actor ticks performed (steps x actors).
    pub actor_ticks: u32,
    /// Events placed on the bus.
    pub events_relayed: u32,
    /// Events lost to a full or closed bus.
    pub events_dropped: u32,
    /// Wall-clock time spent stepping, in microseconds.
    pub logic_us: u64,
    /// Leftover accumulator as a fraction of a step, for render interpolation.
    pub alpha: f32,
}

struct ActorSlot {
    id: ActorId,
    actor: MoverActor,
    inputs: MoverInputs,
}

/// The fixed-step host.
///
/// Owns the actors and the event bus; shares the world with editors.
pub struct SimulationLoop {
    world: SharedWorld,
    actors: Vec<ActorSlot>,
    next_id: u32,
    bus: EventBus,
    sender: EventSender,
    config: SimulationLoopConfig,
    step_ms: f32,
    accumulator_ms: f64,
    sim_time_ms: f64,
    frame_count: u64,
    stats_accumulator: FrameStatsAccumulator,
}

impl SimulationLoop {
    /// Creates a loop over `world`.
    #[must_use]
    pub fn new(world: SharedWorld, mut config: SimulationLoopConfig) -> Self {
        config.tick_rate_hz = config.tick_rate_hz.max(1);
        config.max_steps_per_frame = config.max_steps_per_frame.max(1);
        config.event_capacity = config.event_capacity.max(1);
        if !config.max_frame_ms.is_finite() || config.max_frame_ms < 0.0 {
            config.max_frame_ms = MAX_FRAME_MS;
        }

        let step_ms = config.step_ms();
        let bus = EventBus::new(config.event_capacity);
        let sender = bus.sender();
        debug!(tick_rate_hz = config.tick_rate_hz, step_ms, "simulation loop created");

        Self {
            world,
            actors: Vec::new(),
            next_id: 0,
            bus,
            sender,
            stats_accumulator: FrameStatsAccumulator::new(f64::from(step_ms) * 1000.0),
            config,
            step_ms,
            accumulator_ms: 0.0,
            sim_time_ms: 0.0,
            frame_count: 0,
        }
    }

    // =========================================================================
    // ACTORS
    // =========================================================================

    /// Registers an actor and returns its id.
    pub fn add_actor(&mut self, actor: MoverActor) -> ActorId {
        let id = ActorId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        debug!(actor = %id, mode = %actor.mode(), "actor registered");
        self.actors.push(ActorSlot {
            id,
            actor,
            inputs: MoverInputs::default(),
        });
        id
    }

    /// Unregisters an actor, handing it back.
    pub fn remove_actor(&mut self, id: ActorId) -> Option<MoverActor> {
        let index = self.actors.iter().position(|slot| slot.id == id)?;
        debug!(actor = %id, "actor removed");
        Some(self.actors.remove(index).actor)
    }

    /// The actor registered under `id`.
    #[must_use]
    pub fn actor(&self, id: ActorId) -> Option<&MoverActor> {
        self.slot(id).map(|slot| &slot.actor)
    }

    /// Mutable access, for tags, layered moves and teleports between frames.
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut MoverActor> {
        self.actors.iter_mut().find(|slot| slot.id == id).map(|slot| &mut slot.actor)
    }

    /// Number of registered actors.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Ids of every registered actor, in stepping order.
    pub fn actor_ids(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.actors.iter().map(|slot| slot.id)
    }

    /// Sets the inputs used by the actor's next steps.
    ///
    /// Intents and held buttons take the latest value. Press edges that
    /// no step has consumed yet are kept. Returns `false` for an unknown id.
    pub fn set_inputs(&mut self, id: ActorId, inputs: MoverInputs) -> bool {
        let Some(slot) = self.actors.iter_mut().find(|slot| slot.id == id) else {
            return false;
        };
        let carried = edges_of(slot.inputs.abilities);
        slot.inputs = inputs;
        slot.inputs.abilities.merge(carried);
        true
    }

    fn slot(&self, id: ActorId) -> Option<&ActorSlot> {
        self.actors.iter().find(|slot| slot.id == id)
    }

    // =========================================================================
    // STEPPING
    // =========================================================================

    /// Feeds `elapsed_ms` of real time and takes the fixed steps it pays for.
    pub fn advance(&mut self, elapsed_ms: f64) -> FrameStats {
        let started = Instant::now();
        let elapsed_ms = if elapsed_ms.is_finite() {
            elapsed_ms.clamp(0.0, self.config.max_frame_ms)
        } else {
            warn!(frame = self.frame_count, "non-finite frame time ignored");
            0.0
        };
        self.accumulator_ms += elapsed_ms;

        let step = f64::from(self.step_ms);
        let mut stats = FrameStats {
            frame: self.frame_count,
            ..FrameStats::default()
        };

        while self.accumulator_ms >= step && stats.steps < self.config.max_steps_per_frame {
            self.step_all(&mut stats);
            self.accumulator_ms -= step;
        }

        while self.accumulator_ms >= step {
            self.accumulator_ms -= step;
            stats.dropped_steps += 1;
        }
        if stats.dropped_steps > 0 {
            warn!(
                frame = self.frame_count,
                dropped_steps = stats.dropped_steps,
                "simulation falling behind, shedding backlog"
            );
        }

        stats.alpha = (self.accumulator_ms / step) as f32;
        stats.logic_us = started.elapsed().as_micros() as u64;
        self.end_frame(stats);
        stats
    }

    fn step_all(&mut self, stats: &mut FrameStats) {
        let world = self.world.read();
        for slot in &mut self.actors {
            slot.actor.tick(&*world, self.step_ms, &slot.inputs);
            slot.inputs.abilities = slot.inputs.abilities.without_edges();
            stats.actor_ticks += 1;

            for event in slot.actor.drain_events() {
                if self.sender.send(ActorEvent { actor: slot.id, event }) {
                    stats.events_relayed += 1;
                } else {
                    stats.events_dropped += 1;
                }
            }
        }
        stats.steps += 1;
        self.sim_time_ms += f64::from(self.step_ms);
    }

    fn end_frame(&mut self, stats: FrameStats) {
        self.frame_count += 1;
        self.stats_accumulator.record(stats);

        if self.config.enable_timing_logs && stats.logic_us as f64 > self.stats_accumulator.budget_us {
            warn!(
                frame = stats.frame,
                logic_ms = stats.logic_us as f64 / 1000.0,
                budget_ms = self.step_ms,
                "frame exceeded budget"
            );
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Handle to the shared world; edits land before the next step.
    #[must_use]
    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    /// A receiver for relayed events.
    #[must_use]
    pub fn event_receiver(&self) -> EventReceiver {
        self.bus.receiver()
    }

    /// A sender onto the same bus, for host-side events.
    #[must_use]
    pub fn event_sender(&self) -> EventSender {
        self.bus.sender()
    }

    /// Length of one fixed step in milliseconds.
    #[must_use]
    pub const fn step_ms(&self) -> f32 {
        self.step_ms
    }

    /// Simulated time covered by the steps taken so far.
    #[must_use]
    pub const fn sim_time_ms(&self) -> f64 {
        self.sim_time_ms
    }

    /// Number of `advance` calls so far.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &SimulationLoopConfig {
        &self.config
    }

    /// The accumulated statistics.
    #[must_use]
    pub const fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats_accumulator
    }
}

impl std::fmt::Debug for SimulationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationLoop")
            .field("actors", &self.actors.len())
            .field("step_ms", &self.step_ms)
            .field("accumulator_ms", &self.accumulator_ms)
            .field("sim_time_ms", &self.sim_time_ms)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

/// The press-edge flags of `abilities`, with held flags cleared.
fn edges_of(abilities: AbilityInputs) -> AbilityInputs {
    AbilityInputs::unpack(abilities.pack() & !abilities.without_edges().pack())
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Real-time budget per frame, in microseconds (one step).
    pub budget_us: f64,
    /// Frames recorded.
    pub frames_recorded: u64,
    /// Sum of steps taken.
    pub steps_sum: u64,
    /// Sum of steps shed.
    pub dropped_steps_sum: u64,
    /// Sum of events lost to the bus.
    pub events_dropped_sum: u64,
    /// Sum of stepping times.
    pub logic_us_sum: u64,
    /// Fastest frame.
    pub min_logic_us: u64,
    /// Slowest frame.
    pub max_logic_us: u64,
    /// Frames whose stepping took longer than the budget.
    pub frames_over_budget: u64,
}

impl FrameStatsAccumulator {
    /// Creates an empty accumulator with the given per-frame budget.
    #[must_use]
    pub fn new(budget_us: f64) -> Self {
        Self {
            budget_us,
            frames_recorded: 0,
            steps_sum: 0,
            dropped_steps_sum: 0,
            events_dropped_sum: 0,
            logic_us_sum: 0,
            min_logic_us: u64::MAX,
            max_logic_us: 0,
            frames_over_budget: 0,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.steps_sum += u64::from(stats.steps);
        self.dropped_steps_sum += u64::from(stats.dropped_steps);
        self.events_dropped_sum += u64::from(stats.events_dropped);
        self.logic_us_sum += stats.logic_us;
        self.min_logic_us = self.min_logic_us.min(stats.logic_us);
        self.max_logic_us = self.max_logic_us.max(stats.logic_us);

        if stats.logic_us as f64 > self.budget_us {
            self.frames_over_budget += 1;
        }
    }

    /// Average stepping time per frame in milliseconds.
    #[must_use]
    pub fn avg_logic_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.logic_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Average fixed steps per frame.
    #[must_use]
    pub fn avg_steps_per_frame(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.steps_sum as f64 / self.frames_recorded as f64
    }

    /// Fraction of frames over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Logs a summary at info level.
    pub fn log_summary(&self) {
        info!(
            frames = self.frames_recorded,
            avg_logic_ms = self.avg_logic_ms(),
            max_logic_ms = self.max_logic_us as f64 / 1000.0,
            avg_steps = self.avg_steps_per_frame(),
            dropped_steps = self.dropped_steps_sum,
            dropped_events = self.events_dropped_sum,
            over_budget_pct = self.over_budget_ratio() * 100.0,
            "simulation loop summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strider_mover::StaticWorld;
    use strider_shared::{ModeId, MoverEvent, Vec3};

    const STANDING_Z: f32 = 90.15;

    fn flat_loop(config: SimulationLoopConfig) -> SimulationLoop {
        SimulationLoop::new(SharedWorld::new(StaticWorld::with_ground(0.0)), config)
    }

    fn standing(x: f32) -> MoverActor {
        MoverActor::builder().at(Vec3::new(x, 0.0, STANDING_Z), ModeId::Walking).build().unwrap()
    }

    fn press_jump() -> MoverInputs {
        MoverInputs::default().with_abilities(AbilityInputs {
            jump_just_pressed: true,
            ..AbilityInputs::default()
        })
    }

    #[test]
    fn test_loop_creation() {
        let sim = flat_loop(SimulationLoopConfig::default());
        assert_eq!(sim.frame_count(), 0);
        assert_eq!(sim.actor_count(), 0);
        assert!((sim.step_ms() - 16.666_666).abs() < 1.0e-3);
    }

    #[test]
    fn test_accumulator_pays_for_whole_steps() {
        let mut sim = flat_loop(SimulationLoopConfig::default());
        sim.add_actor(standing(0.0));

        let first = sim.advance(10.0);
        assert_eq!(first.steps, 0);
        assert!(first.alpha > 0.5 && first.alpha < 0.7);

        let second = sim.advance(10.0);
        assert_eq!(second.steps, 1);
        assert_eq!(second.actor_ticks, 1);
        assert!((sim.sim_time_ms() - f64::from(sim.step_ms())).abs() < 1.0e-9);
        assert_eq!(sim.frame_count(), 2);
    }

    #[test]
    fn test_step_cap_sheds_backlog() {
        let mut sim = flat_loop(SimulationLoopConfig {
            max_steps_per_frame: 3,
            ..SimulationLoopConfig::default()
        });
        let stats = sim.advance(100.0);
        assert_eq!(stats.steps, 3);
        assert_eq!(stats.dropped_steps, 3);
        assert!(stats.alpha < 1.0);
        assert_eq!(sim.stats().dropped_steps_sum, 3);
    }

    #[test]
    fn test_degenerate_frame_times_are_ignored() {
        let mut sim = flat_loop(SimulationLoopConfig::default());
        assert_eq!(sim.advance(f64::NAN).steps, 0);
        assert_eq!(sim.advance(-50.0).steps, 0);
        assert_eq!(sim.advance(f64::INFINITY).steps, 0);
        assert!(sim.sim_time_ms().abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_config_values_are_clamped() {
        let sim = flat_loop(SimulationLoopConfig {
            tick_rate_hz: 0,
            max_steps_per_frame: 0,
            event_capacity: 0,
            ..SimulationLoopConfig::default()
        });
        assert!((sim.step_ms() - 1000.0).abs() < f32::EPSILON);
        assert_eq!(sim.config().max_steps_per_frame, 1);
    }

    #[test]
    fn test_press_survives_frames_without_steps() {
        let mut sim = flat_loop(SimulationLoopConfig::default());
        let id = sim.add_actor(standing(0.0));
        let receiver = sim.event_receiver();

        assert!(sim.set_inputs(id, press_jump()));
        assert_eq!(sim.advance(5.0).steps, 0);
        // Released before any step ran; the press still counts once.
        assert!(sim.set_inputs(id, MoverInputs::default()));
        assert_eq!(sim.advance(15.0).steps, 1);
        assert_eq!(sim.actor(id).unwrap().mode(), ModeId::Falling);

        let jumps = receiver
            .drain()
            .into_iter()
            .filter(|e| e.actor == id && matches!(e.event, MoverEvent::Jumped { .. }))
            .count();
        assert_eq!(jumps, 1);
    }

    #[test]
    fn test_events_carry_actor_ids() {
        let mut sim = flat_loop(SimulationLoopConfig::default());
        let idle = sim.add_actor(standing(-500.0));
        let jumper = sim.add_actor(standing(500.0));
        let receiver = sim.event_receiver();

        sim.set_inputs(jumper, press_jump());
        let stats = sim.advance(17.0);
        assert_eq!(stats.actor_ticks, 2);

        let events = receiver.drain();
        assert_eq!(events.len() as u32, stats.events_relayed);
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.actor == jumper));
        assert_eq!(sim.actor(idle).unwrap().mode(), ModeId::Walking);
    }

    #[test]
    fn test_full_bus_counts_dropped_events() {
        let mut sim = flat_loop(SimulationLoopConfig {
            event_capacity: 1,
            ..SimulationLoopConfig::default()
        });
        let id = sim.add_actor(standing(0.0));
        sim.set_inputs(id, press_jump());
        // Jumped and ModeChanged in the same step; only one fits.
        let stats = sim.advance(17.0);
        assert_eq!(stats.events_relayed, 1);
        assert!(stats.events_dropped >= 1);
        assert_eq!(sim.stats().events_dropped_sum, u64::from(stats.events_dropped));
    }

    #[test]
    fn test_remove_and_unknown_ids() {
        let mut sim = flat_loop(SimulationLoopConfig::default());
        let a = sim.add_actor(standing(0.0));
        let b = sim.add_actor(standing(200.0));
        assert_ne!(a, b);
        assert_eq!(sim.actor_ids().collect::<Vec<_>>(), vec![a, b]);

        assert!(sim.remove_actor(a).is_some());
        assert!(sim.remove_actor(a).is_none());
        assert!(!sim.set_inputs(a, MoverInputs::default()));
        assert!(sim.actor(a).is_none());
        assert!(sim.actor_mut(b).is_some());
        assert_eq!(sim.actor_count(), 1);
    }

    #[test]
    fn test_edges_of_keeps_only_presses() {
        let abilities = AbilityInputs {
            jump_just_pressed: true,
            jump_held: true,
            sprint_held: true,
            ..AbilityInputs::default()
        };
        let edges = edges_of(abilities);
        assert!(edges.jump_just_pressed);
        assert!(!edges.jump_held);
        assert!(!edges.sprint_held);
    }

    #[test]
    fn test_stats_accumulator() {
        let mut acc = FrameStatsAccumulator::new(1000.0);
        assert!(acc.avg_logic_ms().abs() < f64::EPSILON);

        acc.record(FrameStats { steps: 1, logic_us: 500, ..FrameStats::default() });
        acc.record(FrameStats { steps: 3, logic_us: 1500, ..FrameStats::default() });

        assert_eq!(acc.frames_recorded, 2);
        assert!((acc.avg_logic_ms() - 1.0).abs() < 1.0e-9);
        assert!((acc.avg_steps_per_frame() - 2.0).abs() < 1.0e-9);
        assert!((acc.over_budget_ratio() - 0.5).abs() < 1.0e-9);
        assert_eq!(acc.min_logic_us, 500);
        assert_eq!(acc.max_logic_us, 1500);
        acc.log_summary();
    }
}

//! # STRIDER
//!
//! Fixed-step host for the STRIDER movement core.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          STRIDER                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   read guard   ┌──────────────┐               │
//! │  │ SharedWorld  │───────────────>│ Simulation   │               │
//! │  │ (RwLock)     │<── edits ──┐   │ Loop         │               │
//! │  └──────────────┘            │   └──────┬───────┘               │
//! │                         level tools     │ tick(step_ms)         │
//! │                                  ┌──────▼───────┐               │
//! │                                  │ MoverActor   │ x N           │
//! │                                  └──────┬───────┘               │
//! │                                         │ drain_events          │
//! │                                  ┌──────▼───────┐               │
//! │                                  │  EventBus    │──> consumers  │
//! │                                  └──────────────┘               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use strider::{SharedWorld, SimulationLoop, SimulationLoopConfig};
//! use strider_mover::{MoverActor, StaticWorld};
//! use strider_shared::{ModeId, MoverInputs, Vec3};
//!
//! let world = SharedWorld::new(StaticWorld::with_ground(0.0));
//! let mut sim = SimulationLoop::new(world, SimulationLoopConfig::default());
//! let id = sim.add_actor(MoverActor::builder().at(Vec3::new(0.0, 0.0, 90.0), ModeId::Walking).build()?);
//! sim.set_inputs(id, MoverInputs::moving(Vec3::X));
//! let stats = sim.advance(16.7);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod events;
pub mod sim_loop;
pub mod world;

pub use events::{ActorEvent, ActorId, EventBus, EventReceiver, EventSender};
pub use sim_loop::{FrameStats, FrameStatsAccumulator, SimulationLoop, SimulationLoopConfig};
pub use world::SharedWorld;

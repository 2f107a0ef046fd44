//! # STRIDER Mover
//!
//! Deterministic per-tick kinematic movement for a single actor that walks,
//! falls and runs along walls, with jumps layered on top.
//!
//! ## Architecture Rules
//!
//! 1. **One committed state per tick** - failures inside a tick are logged
//!    and replaced by a safe fallback, never returned to the host
//! 2. **Bit-stable** - same settings, world and inputs produce the same bytes
//! 3. **Geometry is a port** - every query goes through [`CollisionQuery`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use strider_mover::{MoverActor, StaticWorld};
//! use strider_shared::{ModeId, MoverInputs, Vec3};
//!
//! let world = StaticWorld::with_ground(0.0);
//! let mut actor = MoverActor::builder().at(Vec3::new(0.0, 0.0, 90.0), ModeId::Walking).build()?;
//! let state = actor.tick(&world, 16.0, &MoverInputs::moving(Vec3::X));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod blackboard;
pub mod collision;
pub mod driver;
pub mod error;
pub mod ground;
pub mod layered;
pub mod modes;
pub mod modifiers;
pub mod movement_utils;
pub mod replay;
pub mod settings;
pub mod state;
pub mod transitions;
pub mod wall;

pub use blackboard::{Blackboard, BlackboardKey};
pub use collision::{
    ActorShape, Collider, CollisionQuery, CollisionShape, FloorResult, HitResult, StaticWorld, SurfaceMaterial,
    WallResult,
};
pub use driver::{MoverActor, MoverActorBuilder};
pub use error::{MoverError, MoverResult};
pub use layered::{JumpImpulse, LayeredMove, LayeredMoveKind, LayeredMoveStack, MultiJump};
pub use modes::{Falling, ModeRegistry, MovementMode, Walking, WallRunning};
pub use modifiers::{ModifierHandle, MovementModifier, StanceModifier};
pub use replay::{replay, InputLog};
pub use settings::{CommonSettings, MoverSettings, SettingsBundle, StanceSettings, WallRunSettings};
pub use state::{MixMode, MoveOutcome, ProposedMove, SimulationState, TickContext};
pub use transitions::{IntoWallRunning, Jump, OutOfWallRunning, Transition, TransitionEval, TransitionPipeline, WallJump};

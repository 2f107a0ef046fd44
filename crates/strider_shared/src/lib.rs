//! # STRIDER Shared
//!
//! Plain data used by the movement core and by the hosts embedding it.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - the collision world
//! - the simulation driver
//! - anything that is not a value type
//!
//! If you need simulation behavior, put it in `strider_mover`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod events;
pub mod inputs;
pub mod math;
pub mod mode;
pub mod tags;

pub use constants::{DEFAULT_GRAVITY, DEFAULT_UP, MS_TO_S, S_TO_MS};
pub use events::{EventQueue, EventType, MoverEvent, Stance};
pub use inputs::{AbilityInputs, MoverInputs};
pub use math::{Quaternion, Vec3};
pub use mode::ModeId;
pub use tags::TagSet;

//! # Simulation Constants
//!
//! Values baked into every actor. Tunables live in the mover settings,
//! these are the ones that are not meant to be tuned.

use crate::math::Vec3;

// =============================================================================
// AXES & UNITS
// =============================================================================

/// Default up direction (Z-up, centimetre world).
pub const DEFAULT_UP: Vec3 = Vec3::Z;

/// Default gravity acceleration (cm/s^2).
pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, 0.0, -980.0);

/// Milliseconds to seconds.
pub const MS_TO_S: f32 = 0.001;

/// Seconds to milliseconds.
pub const S_TO_MS: f32 = 1000.0;

// =============================================================================
// TICK TIMING
// =============================================================================

/// Smallest remaining time (seconds) worth refunding to a following substep.
pub const MIN_REFUND_SECONDS: f32 = 0.000_1;

/// Smallest integration step (seconds); shorter steps are skipped.
pub const MIN_TICK_TIME: f32 = 1.0e-6;

/// Largest braking substep (seconds).
pub const MAX_BRAKING_SUBSTEP: f32 = 1.0 / 33.0;

// =============================================================================
// FLOOR & SURFACE TOLERANCES
// =============================================================================

/// Lower bound of the resting gap kept between the shape and its floor (cm).
pub const MIN_FLOOR_DIST: f32 = 1.9;

/// Upper bound of the resting gap kept between the shape and its floor (cm).
pub const MAX_FLOOR_DIST: f32 = 2.4;

/// Distance a sweep is pulled back from its impact point (cm).
pub const SWEEP_SKIN: f32 = 0.1;

/// `|normal . up|` below this counts as a vertical surface.
pub const VERTICAL_SLOPE_NORMAL_Z: f32 = 0.001;

/// Extra clearance used when probing whether a shape can grow back (cm).
pub const EXPAND_CLEARANCE: f32 = 0.01;

//! # Collision Query Port
//!
//! The contract the movement core needs from a geometry engine. The core
//! never owns geometry; every mode and transition queries it through
//! [`CollisionQuery`].
//!
//! ## Contract
//!
//! - Queries are read-only and deterministic for identical geometry and
//!   arguments.
//! - Implementations must be `Send + Sync`: many actors may query one world
//!   concurrently.
//! - `find_floor` and `trace_wall` have default implementations built on
//!   `sweep` and `line_trace`; engines with native versions may override.

pub mod world;

use serde::{Deserialize, Serialize};
use strider_shared::{Quaternion, Vec3};

pub use world::{Collider, ColliderShape, StaticWorld};

// =============================================================================
// SHAPES AND MATERIALS
// =============================================================================

/// Upright capsule centered on the actor's position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollisionShape {
    /// Capsule radius (cm).
    pub radius: f32,
    /// Half height including the hemispheres (cm).
    pub half_height: f32,
}

impl CollisionShape {
    /// Creates a capsule.
    #[must_use]
    pub const fn new(radius: f32, half_height: f32) -> Self {
        Self { radius, half_height }
    }

    /// Same radius, different half height.
    #[must_use]
    pub const fn with_half_height(self, half_height: f32) -> Self {
        Self { radius: self.radius, half_height }
    }

    /// Radius of the bounding sphere around the local bounds.
    #[must_use]
    pub fn bounding_radius(&self) -> f32 {
        self.half_height.max(self.radius)
    }
}

impl Default for CollisionShape {
    fn default() -> Self {
        Self::new(34.0, 88.0)
    }
}

/// Collision shape plus the eye height stance modifiers adjust.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActorShape {
    /// Capsule.
    pub collision: CollisionShape,
    /// Eye height above the capsule center (cm).
    pub eye_height: f32,
}

impl Default for ActorShape {
    fn default() -> Self {
        Self { collision: CollisionShape::default(), eye_height: 64.0 }
    }
}

/// How a surface maps the mover's base friction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FrictionModel {
    /// Multiplies the base friction.
    Scale(f32),
    /// Replaces the base friction.
    Fixed(f32),
}

/// Physical properties of a surface that movement reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMaterial {
    /// Friction mapping.
    pub friction: FrictionModel,
    /// Replaces the mode's acceleration while on the surface.
    pub acceleration_override: Option<f32>,
    /// Replaces the mode's deceleration while on the surface.
    pub deceleration_override: Option<f32>,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self { friction: FrictionModel::Scale(1.0), acceleration_override: None, deceleration_override: None }
    }
}

impl SurfaceMaterial {
    /// A slippery surface scaling friction by `scale`.
    #[must_use]
    pub const fn slippery(scale: f32) -> Self {
        Self { friction: FrictionModel::Scale(scale), acceleration_override: None, deceleration_override: None }
    }

    /// Friction on this surface given the mover's `base` friction.
    #[must_use]
    pub fn friction_coefficient(&self, base: f32) -> f32 {
        match self.friction {
            FrictionModel::Scale(scale) => base * scale,
            FrictionModel::Fixed(value) => value,
        }
    }

    /// Acceleration on this surface.
    #[must_use]
    pub fn acceleration(&self, base: f32) -> f32 {
        self.acceleration_override.unwrap_or(base)
    }

    /// Deceleration on this surface.
    #[must_use]
    pub fn deceleration(&self, base: f32) -> f32 {
        self.deceleration_override.unwrap_or(base)
    }
}

/// Line trace channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceChannel {
    /// Ground clearance checks.
    #[default]
    Visibility,
    /// Wall probes.
    Camera,
}

// =============================================================================
// RESULTS
// =============================================================================

/// A single sweep or trace hit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HitResult {
    /// The hit blocks movement.
    pub blocking: bool,
    /// Fraction of the sweep travelled before the hit, in `[0, 1]`.
    pub time: f32,
    /// Distance travelled before the hit (cm).
    pub distance: f32,
    /// Shape center at the hit.
    pub location: Vec3,
    /// Contact point on the surface.
    pub impact_point: Vec3,
    /// Surface normal (unit length).
    pub normal: Vec3,
    /// The shape already overlapped at the sweep start.
    pub start_penetrating: bool,
    /// Overlap depth along `normal` when `start_penetrating`.
    pub penetration_depth: f32,
    /// Material of the surface, if any.
    pub material: Option<SurfaceMaterial>,
    /// Velocity of the surface (cm/s).
    pub surface_velocity: Vec3,
}

impl HitResult {
    /// Blocking hit not starting in penetration.
    #[must_use]
    pub fn is_valid_blocking(&self) -> bool {
        self.blocking && !self.start_penetrating
    }
}

/// Cached floor query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorResult {
    /// Something blocking was found.
    pub blocking: bool,
    /// The blocking surface is walkable.
    pub walkable: bool,
    /// Distance from the shape's bottom to the floor (cm). Negative while
    /// penetrating.
    pub distance: f32,
    /// Contact point.
    pub hit_point: Vec3,
    /// Surface normal.
    pub normal: Vec3,
    /// Floor material.
    pub material: Option<SurfaceMaterial>,
    /// Floor velocity (cm/s).
    pub surface_velocity: Vec3,
}

impl FloorResult {
    /// Builds a floor result from a downward sweep hit.
    #[must_use]
    pub fn from_hit(hit: &HitResult, up: Vec3, max_walk_slope_cosine: f32) -> Self {
        Self {
            blocking: hit.blocking,
            walkable: hit.blocking && hit.normal.dot(up) >= max_walk_slope_cosine,
            distance: if hit.start_penetrating { -hit.penetration_depth } else { hit.distance },
            hit_point: hit.impact_point,
            normal: hit.normal,
            material: hit.material,
            surface_velocity: hit.surface_velocity,
        }
    }

    /// True for a blocking, walkable floor.
    #[must_use]
    pub const fn is_walkable(&self) -> bool {
        self.blocking && self.walkable
    }
}

/// Cached wall query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WallResult {
    /// Something blocking was found.
    pub blocking: bool,
    /// The wall is steep enough to run on.
    pub runnable: bool,
    /// Distance from the trace origin (cm).
    pub distance: f32,
    /// Contact point.
    pub hit_point: Vec3,
    /// Wall normal.
    pub normal: Vec3,
    /// Wall material.
    pub material: Option<SurfaceMaterial>,
    /// Wall velocity (cm/s).
    pub surface_velocity: Vec3,
}

impl WallResult {
    /// Builds a wall result from a trace hit.
    #[must_use]
    pub fn from_hit(hit: &HitResult, up: Vec3, max_runnable_cosine: f32) -> Self {
        Self {
            blocking: hit.blocking,
            runnable: hit.blocking && hit.normal.dot(up) <= max_runnable_cosine,
            distance: hit.distance,
            hit_point: hit.impact_point,
            normal: hit.normal,
            material: hit.material,
            surface_velocity: hit.surface_velocity,
        }
    }

    /// True for a blocking, runnable wall.
    #[must_use]
    pub const fn is_runnable(&self) -> bool {
        self.blocking && self.runnable
    }
}

// =============================================================================
// PORT
// =============================================================================

/// Geometry queries the movement core depends on.
pub trait CollisionQuery: Send + Sync {
    /// Sweeps `shape` from `start` to `end`, returning the first blocking hit.
    fn sweep(&self, shape: &CollisionShape, start: Vec3, end: Vec3) -> Option<HitResult>;

    /// Traces a ray from `start` to `end` on `channel`.
    fn line_trace(&self, start: Vec3, end: Vec3, channel: TraceChannel) -> Option<HitResult>;

    /// True when `shape` at `location` overlaps blocking geometry.
    fn overlap_test(&self, shape: &CollisionShape, location: Vec3, rotation: Quaternion) -> bool;

    /// Sweeps down `sweep_distance` looking for a floor.
    fn find_floor(
        &self,
        shape: &CollisionShape,
        location: Vec3,
        sweep_distance: f32,
        max_walk_slope_cosine: f32,
        up: Vec3,
    ) -> FloorResult {
        let end = location - up * sweep_distance;
        match self.sweep(shape, location, end) {
            Some(hit) if hit.blocking => FloorResult::from_hit(&hit, up, max_walk_slope_cosine),
            _ => FloorResult::default(),
        }
    }

    /// Traces from `origin` to each probe end in order; the first hit wins.
    fn trace_wall(
        &self,
        origin: Vec3,
        probe_ends: &[Vec3],
        channel: TraceChannel,
        max_runnable_cosine: f32,
        up: Vec3,
    ) -> WallResult {
        probe_ends
            .iter()
            .find_map(|&end| self.line_trace(origin, end, channel).filter(|hit| hit.blocking))
            .map_or_else(WallResult::default, |hit| WallResult::from_hit(&hit, up, max_runnable_cosine))
    }
}

impl<T: CollisionQuery + ?Sized> CollisionQuery for &T {
    fn sweep(&self, shape: &CollisionShape, start: Vec3, end: Vec3) -> Option<HitResult> {
        (**self).sweep(shape, start, end)
    }

    fn line_trace(&self, start: Vec3, end: Vec3, channel: TraceChannel) -> Option<HitResult> {
        (**self).line_trace(start, end, channel)
    }

    fn overlap_test(&self, shape: &CollisionShape, location: Vec3, rotation: Quaternion) -> bool {
        (**self).overlap_test(shape, location, rotation)
    }

    fn find_floor(
        &self,
        shape: &CollisionShape,
        location: Vec3,
        sweep_distance: f32,
        max_walk_slope_cosine: f32,
        up: Vec3,
    ) -> FloorResult {
        (**self).find_floor(shape, location, sweep_distance, max_walk_slope_cosine, up)
    }

    fn trace_wall(
        &self,
        origin: Vec3,
        probe_ends: &[Vec3],
        channel: TraceChannel,
        max_runnable_cosine: f32,
        up: Vec3,
    ) -> WallResult {
        (**self).trace_wall(origin, probe_ends, channel, max_runnable_cosine, up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_friction() {
        let base = 8.0;
        assert_eq!(SurfaceMaterial::slippery(0.25).friction_coefficient(base), 2.0);
        let fixed = SurfaceMaterial { friction: FrictionModel::Fixed(1.5), ..SurfaceMaterial::default() };
        assert_eq!(fixed.friction_coefficient(base), 1.5);
        assert_eq!(fixed.acceleration(4000.0), 4000.0);
    }

    #[test]
    fn test_floor_walkability_threshold() {
        let hit = HitResult { blocking: true, normal: Vec3::new(0.0, 0.8, 0.6), ..HitResult::default() };
        assert!(!FloorResult::from_hit(&hit, Vec3::Z, 0.71).is_walkable());
        assert!(FloorResult::from_hit(&hit, Vec3::Z, 0.5).is_walkable());
    }

    #[test]
    fn test_wall_runnability_threshold() {
        // 50 degrees from up is too shallow for a 64 degree minimum.
        let normal = Vec3::new(50f32.to_radians().sin(), 0.0, 50f32.to_radians().cos());
        let hit = HitResult { blocking: true, normal, ..HitResult::default() };
        assert!(!WallResult::from_hit(&hit, Vec3::Z, 64f32.to_radians().cos()).is_runnable());
        assert!(WallResult::from_hit(&hit, Vec3::Z, 45f32.to_radians().cos()).is_runnable());
    }
}

//! Reference collision world: infinite planes and axis-aligned boxes.
//!
//! The capsule is approximated by its axis-aligned bounding box
//! (`radius, radius, half_height`). Boxes are swept with the slab method
//! against the Minkowski-expanded collider; planes use the box support
//! distance along the plane normal.

use serde::{Deserialize, Serialize};
use strider_shared::constants::SWEEP_SKIN;
use strider_shared::math::SMALL_NUMBER;
use strider_shared::{Quaternion, Vec3};

use super::{CollisionQuery, CollisionShape, HitResult, SurfaceMaterial, TraceChannel};

// =============================================================================
// COLLIDERS
// =============================================================================

/// Collider geometry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    /// Half-space `normal . p <= offset` is solid.
    Plane {
        /// Outward unit normal.
        normal: Vec3,
        /// Plane offset along the normal.
        offset: f32,
    },
    /// Axis-aligned box.
    Aabb {
        /// Minimum corner.
        min: Vec3,
        /// Maximum corner.
        max: Vec3,
    },
}

/// A static collider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    /// Geometry.
    pub shape: ColliderShape,
    /// Surface material.
    pub material: Option<SurfaceMaterial>,
    /// Surface velocity reported in hits (cm/s).
    pub surface_velocity: Vec3,
}

impl Collider {
    /// Plane through `point` with outward `normal`.
    #[must_use]
    pub fn plane(normal: Vec3, point: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self::from_shape(ColliderShape::Plane { normal, offset: normal.dot(point) })
    }

    /// Box between two corners (any order).
    #[must_use]
    pub fn aabb(a: Vec3, b: Vec3) -> Self {
        let min = Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z));
        let max = Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z));
        Self::from_shape(ColliderShape::Aabb { min, max })
    }

    const fn from_shape(shape: ColliderShape) -> Self {
        Self { shape, material: None, surface_velocity: Vec3::ZERO }
    }

    /// Sets the surface material.
    #[must_use]
    pub const fn with_material(mut self, material: SurfaceMaterial) -> Self {
        self.material = Some(material);
        self
    }

    /// Sets the surface velocity.
    #[must_use]
    pub const fn with_surface_velocity(mut self, velocity: Vec3) -> Self {
        self.surface_velocity = velocity;
        self
    }

    /// Hit against a box of half extents `half` moving from `start` by `delta`.
    ///
    /// A box that starts overlapping and moves out along the push-out
    /// normal is not blocked.
    fn sweep_box(&self, half: Vec3, start: Vec3, delta: Vec3) -> Option<RawHit> {
        match self.shape {
            ColliderShape::Plane { normal, offset } => sweep_plane(normal, offset, half, start, delta),
            ColliderShape::Aabb { min, max } => sweep_aabb(min - half, max + half, start, delta),
        }
    }

    fn overlaps(&self, half: Vec3, center: Vec3) -> bool {
        match self.shape {
            ColliderShape::Plane { normal, offset } => {
                normal.dot(center) - offset - support(normal, half) < 0.0
            }
            ColliderShape::Aabb { min, max } => {
                center.x - half.x < max.x
                    && center.x + half.x > min.x
                    && center.y - half.y < max.y
                    && center.y + half.y > min.y
                    && center.z - half.z < max.z
                    && center.z + half.z > min.z
            }
        }
    }
}

/// Hit before skin pull-back and material lookup.
#[derive(Clone, Copy, Debug)]
struct RawHit {
    time: f32,
    normal: Vec3,
    penetration: Option<f32>,
}

fn support(normal: Vec3, half: Vec3) -> f32 {
    half.x * normal.x.abs() + half.y * normal.y.abs() + half.z * normal.z.abs()
}

fn sweep_plane(normal: Vec3, offset: f32, half: Vec3, start: Vec3, delta: Vec3) -> Option<RawHit> {
    let reach = support(normal, half);
    let d_start = normal.dot(start) - offset - reach;
    if d_start < 0.0 {
        if normal.dot(delta) > 0.0 {
            return None;
        }
        return Some(RawHit { time: 0.0, normal, penetration: Some(-d_start) });
    }
    let d_end = normal.dot(start + delta) - offset - reach;
    if d_end >= 0.0 {
        return None;
    }
    Some(RawHit { time: d_start / (d_start - d_end), normal, penetration: None })
}

fn sweep_aabb(min: Vec3, max: Vec3, start: Vec3, delta: Vec3) -> Option<RawHit> {
    let s = start.to_array();
    let d = delta.to_array();
    let lo = min.to_array();
    let hi = max.to_array();

    let inside = (0..3).all(|i| s[i] > lo[i] && s[i] < hi[i]);
    if inside {
        // Push out along the axis of least overlap.
        let mut best = (f32::MAX, Vec3::ZERO);
        for i in 0..3 {
            let mut axis = [0.0; 3];
            let below = s[i] - lo[i];
            let above = hi[i] - s[i];
            if below < best.0 {
                axis[i] = -1.0;
                best = (below, Vec3::from_array(axis));
            }
            if above < best.0 {
                axis[i] = 1.0;
                best = (above, Vec3::from_array(axis));
            }
        }
        if best.1.dot(delta) > 0.0 {
            return None;
        }
        return Some(RawHit { time: 0.0, normal: best.1, penetration: Some(best.0) });
    }

    let mut t_enter = 0.0_f32;
    let mut t_exit = 1.0_f32;
    let mut enter_axis: Option<(usize, f32)> = None;
    for i in 0..3 {
        if d[i].abs() <= SMALL_NUMBER {
            if s[i] <= lo[i] || s[i] >= hi[i] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d[i];
        let (mut t0, mut t1) = ((lo[i] - s[i]) * inv, (hi[i] - s[i]) * inv);
        let mut sign = -1.0;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
            sign = 1.0;
        }
        if t0 >= t_enter {
            t_enter = t0;
            enter_axis = Some((i, sign));
        }
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    let (axis, sign) = enter_axis?;
    let mut normal = [0.0; 3];
    normal[axis] = sign;
    Some(RawHit { time: t_enter, normal: Vec3::from_array(normal), penetration: None })
}

// =============================================================================
// WORLD
// =============================================================================

/// Immutable-while-queried set of colliders.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticWorld {
    colliders: Vec<Collider>,
}

impl StaticWorld {
    /// Empty world.
    #[must_use]
    pub const fn new() -> Self {
        Self { colliders: Vec::new() }
    }

    /// World with a horizontal floor plane at height `z`.
    #[must_use]
    pub fn with_ground(z: f32) -> Self {
        let mut world = Self::new();
        world.add(Collider::plane(Vec3::Z, Vec3::new(0.0, 0.0, z)));
        world
    }

    /// Adds a collider, returning its index.
    pub fn add(&mut self, collider: Collider) -> usize {
        self.colliders.push(collider);
        self.colliders.len() - 1
    }

    /// Builder form of [`StaticWorld::add`].
    #[must_use]
    pub fn with(mut self, collider: Collider) -> Self {
        self.add(collider);
        self
    }

    /// Removes every collider.
    pub fn clear(&mut self) {
        self.colliders.clear();
    }

    /// Registered colliders.
    #[must_use]
    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    fn nearest_hit(&self, half: Vec3, start: Vec3, end: Vec3) -> Option<HitResult> {
        let delta = end - start;
        let length = delta.length();

        let mut best: Option<(RawHit, &Collider)> = None;
        for collider in &self.colliders {
            let Some(hit) = collider.sweep_box(half, start, delta) else {
                continue;
            };
            let closer = best.map_or(true, |(current, _)| {
                hit.penetration.is_some() && current.penetration.is_none() || hit.time < current.time
            });
            if closer {
                best = Some((hit, collider));
            }
        }

        let (raw, collider) = best?;
        let travelled = if raw.penetration.is_some() {
            0.0
        } else {
            (raw.time * length - SWEEP_SKIN).max(0.0)
        };
        let time = if length > SMALL_NUMBER { travelled / length } else { 0.0 };
        let location = if length > SMALL_NUMBER { start + delta * time } else { start };
        let impact_point = location - raw.normal * support(raw.normal, half);

        Some(HitResult {
            blocking: true,
            time,
            distance: travelled,
            location,
            impact_point,
            normal: raw.normal,
            start_penetrating: raw.penetration.is_some(),
            penetration_depth: raw.penetration.unwrap_or(0.0),
            material: collider.material,
            surface_velocity: collider.surface_velocity,
        })
    }
}

fn half_extents(shape: &CollisionShape) -> Vec3 {
    Vec3::new(shape.radius, shape.radius, shape.half_height)
}

impl CollisionQuery for StaticWorld {
    fn sweep(&self, shape: &CollisionShape, start: Vec3, end: Vec3) -> Option<HitResult> {
        self.nearest_hit(half_extents(shape), start, end)
    }

    fn line_trace(&self, start: Vec3, end: Vec3, _channel: TraceChannel) -> Option<HitResult> {
        self.nearest_hit(Vec3::ZERO, start, end)
    }

    fn overlap_test(&self, shape: &CollisionShape, location: Vec3, _rotation: Quaternion) -> bool {
        let half = half_extents(shape);
        self.colliders.iter().any(|c| c.overlaps(half, location))
    }
}

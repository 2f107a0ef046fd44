//! Wall probing and the geometric checks wall running relies on.

use strider_shared::math::KINDA_SMALL_NUMBER;
use strider_shared::Vec3;

use crate::collision::{CollisionQuery, CollisionShape, TraceChannel, WallResult};
use crate::settings::{WallRunSettings, WallSide};

/// Up to two probe ends per side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WallProbes {
    ends: [Vec3; 4],
    len: usize,
}

impl WallProbes {
    /// Builds the probe ends around `origin`.
    ///
    /// Each probed side gets a front and a back end: `head_delta` sideways
    /// and `tail_delta` along the flattened forward direction. The left side
    /// is probed first.
    #[must_use]
    pub fn new(origin: Vec3, forward: Vec3, up: Vec3, side: WallSide, head_delta: f32, tail_delta: f32) -> Self {
        let forward = forward.project_onto_plane(up).normalize_or_zero();
        let right = forward.cross(up).normalize_or_zero();
        let mut probes = Self { ends: [origin; 4], len: 0 };

        for (sign, enabled) in [(-1.0, side.includes_left()), (1.0, side.includes_right())] {
            if !enabled {
                continue;
            }
            let side_delta = right * (head_delta * sign);
            let forward_delta = forward * tail_delta;
            probes.push(origin + forward_delta + side_delta);
            probes.push(origin - forward_delta + side_delta);
        }
        probes
    }

    fn push(&mut self, end: Vec3) {
        if let Some(slot) = self.ends.get_mut(self.len) {
            *slot = end;
            self.len += 1;
        }
    }

    /// Probe ends in trace order.
    #[must_use]
    pub fn as_slice(&self) -> &[Vec3] {
        &self.ends[..self.len]
    }
}

/// Angle between the wall normal and up (degrees).
#[must_use]
pub fn wall_angle_degrees(normal: Vec3, up: Vec3) -> f32 {
    normal.dot(up).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Traces for a wall on the configured sides of an actor at `origin`
/// facing `forward`.
#[must_use]
pub fn trace_wall(
    world: &dyn CollisionQuery,
    origin: Vec3,
    forward: Vec3,
    up: Vec3,
    settings: &WallRunSettings,
) -> WallResult {
    let probes = WallProbes::new(
        origin,
        forward,
        up,
        settings.wall_side,
        settings.trace_head_delta,
        settings.trace_tail_delta,
    );
    world.trace_wall(origin, probes.as_slice(), TraceChannel::Camera, settings.max_runnable_cosine(), up)
}

/// True when the movement intent points away from the wall by more than
/// the pull-away angle.
#[must_use]
pub fn should_fall_off_wall(wall: &WallResult, pull_away_angle: f32, move_intent: Vec3) -> bool {
    if !wall.blocking || move_intent.is_nearly_zero(KINDA_SMALL_NUMBER) {
        return false;
    }
    let sin_pull_away = pull_away_angle.to_radians().sin();
    move_intent.normalize_or_zero().dot(wall.normal) > sin_pull_away
}

/// True when nothing lies within `min_height` below the shape's bounds.
#[must_use]
pub fn is_high_enough(
    world: &dyn CollisionQuery,
    position: Vec3,
    shape: &CollisionShape,
    min_height: f32,
    up: Vec3,
) -> bool {
    let end = position - up * (min_height + shape.bounding_radius());
    world.line_trace(position, end, TraceChannel::Visibility).is_none()
}

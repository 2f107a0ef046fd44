//! Swept ground movement: first move, depenetration, ramps, step-up,
//! wall slides and floor-height correction.
//!
//! Every routine works on a [`WalkStep`], which tracks where the shape is,
//! the last blocking hit and how much of the step's time has been used.

use strider_shared::constants::{MAX_FLOOR_DIST, MIN_FLOOR_DIST, SWEEP_SKIN};
use strider_shared::math::KINDA_SMALL_NUMBER;
use strider_shared::Vec3;

use crate::collision::{CollisionQuery, CollisionShape, FloorResult, HitResult};

/// Minimum horizontal progress for a step-up to count (cm).
const MIN_STEP_PROGRESS: f32 = 0.5;

// =============================================================================
// MOVEMENT RECORD
// =============================================================================

/// Accumulates displacement over a step, separating displacement that
/// reflects real movement from corrections (depenetration, floor snapping).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MovementRecord {
    relevant: Vec3,
    total: Vec3,
    delta_seconds: f32,
}

impl MovementRecord {
    /// Record for a step of `delta_seconds`.
    #[must_use]
    pub fn new(delta_seconds: f32) -> Self {
        Self { delta_seconds, ..Self::default() }
    }

    /// Adds a displacement.
    pub fn append(&mut self, displacement: Vec3, relevant: bool) {
        self.total += displacement;
        if relevant {
            self.relevant += displacement;
        }
    }

    /// Relevant displacement divided by the step length.
    #[must_use]
    pub fn relevant_velocity(&self) -> Vec3 {
        if self.delta_seconds <= f32::EPSILON {
            return Vec3::ZERO;
        }
        self.relevant / self.delta_seconds
    }

    /// All displacement, corrections included.
    #[must_use]
    pub fn total_displacement(&self) -> Vec3 {
        self.total
    }
}

// =============================================================================
// WALK STEP
// =============================================================================

/// Working state of one swept ground move.
#[derive(Clone, Copy, Debug)]
pub struct WalkStep {
    /// Shape center.
    pub position: Vec3,
    /// Displacement requested for the whole step.
    pub original_delta: Vec3,
    /// Last blocking hit, if the most recent sweep was blocked.
    pub hit: Option<HitResult>,
    /// Fraction of the step's time consumed so far.
    pub percent_applied: f32,
    /// Displacement bookkeeping.
    pub record: MovementRecord,
}

impl WalkStep {
    /// Starts a step at `position` moving by `delta` over `delta_seconds`.
    #[must_use]
    pub fn new(position: Vec3, delta: Vec3, delta_seconds: f32) -> Self {
        Self {
            position,
            original_delta: delta,
            hit: None,
            percent_applied: 0.0,
            record: MovementRecord::new(delta_seconds),
        }
    }

    /// Displacement left for the unused part of the step.
    #[must_use]
    pub fn remaining_delta(&self) -> Vec3 {
        self.original_delta * (1.0 - self.percent_applied)
    }

    fn consume(&mut self, time: f32) {
        self.percent_applied += (1.0 - self.percent_applied) * time.clamp(0.0, 1.0);
    }
}

// =============================================================================
// GROUND QUERIES
// =============================================================================

/// Collision context for ground movement.
#[derive(Clone, Copy)]
pub struct GroundMover<'a> {
    /// World to sweep against.
    pub world: &'a dyn CollisionQuery,
    /// Actor shape.
    pub shape: CollisionShape,
    /// Up direction.
    pub up: Vec3,
    /// Walkable threshold.
    pub max_walk_slope_cosine: f32,
    /// Step-up limit (cm).
    pub max_step_height: f32,
    /// Floor search distance (cm).
    pub floor_sweep_distance: f32,
}

impl std::fmt::Debug for GroundMover<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroundMover")
            .field("shape", &self.shape)
            .field("up", &self.up)
            .finish_non_exhaustive()
    }
}

impl GroundMover<'_> {
    /// True when `normal` is walkable.
    #[must_use]
    pub fn is_walkable(&self, normal: Vec3) -> bool {
        normal.dot(self.up) >= self.max_walk_slope_cosine
    }

    /// Sweeps from `position` by `delta`. Returns the end position and the hit.
    #[must_use]
    pub fn sweep(&self, position: Vec3, delta: Vec3) -> (Vec3, Option<HitResult>) {
        if delta.is_nearly_zero(KINDA_SMALL_NUMBER) {
            return (position, None);
        }
        match self.world.sweep(&self.shape, position, position + delta) {
            Some(hit) if hit.start_penetrating => (position, Some(hit)),
            Some(hit) => (hit.location, Some(hit)),
            None => (position + delta, None),
        }
    }

    /// Sweeps and records the move in `step`.
    fn sweep_step(&self, step: &mut WalkStep, delta: Vec3, relevant: bool) {
        let (end, hit) = self.sweep(step.position, delta);
        step.record.append(end - step.position, relevant);
        step.position = end;
        step.consume(hit.map_or(1.0, |h| h.time));
        step.hit = hit;
    }

    /// The first sweep of the step. Returns true when nothing was hit.
    pub fn first_move(&self, step: &mut WalkStep) -> bool {
        let delta = step.original_delta;
        self.sweep_step(step, delta, true);
        step.hit.is_none()
    }

    /// Pushes out of an initial overlap and retries the move.
    pub fn depenetrate(&self, step: &mut WalkStep) -> bool {
        let Some(hit) = step.hit.filter(|h| h.start_penetrating) else {
            return false;
        };
        let push = hit.normal * (hit.penetration_depth + SWEEP_SKIN);
        step.record.append(push, false);
        step.position += push;
        step.percent_applied = 0.0;
        let delta = step.original_delta;
        self.sweep_step(step, delta, true);
        true
    }

    /// Redirects the remaining move up a walkable ramp the first move hit.
    pub fn ramp_move(&self, step: &mut WalkStep) -> bool {
        let Some(hit) = step.hit.filter(HitResult::is_valid_blocking) else {
            return false;
        };
        let normal_up = hit.normal.dot(self.up);
        if !self.is_walkable(hit.normal) || normal_up >= 1.0 - KINDA_SMALL_NUMBER {
            return false;
        }
        let deflected = deflect_onto_ramp(step.remaining_delta(), hit.normal, self.up);
        if deflected.is_nearly_zero(KINDA_SMALL_NUMBER) {
            return false;
        }
        self.sweep_step(step, deflected, true);
        true
    }

    /// Climbs an obstacle no taller than `max_step_height`.
    ///
    /// Sweeps up, forward, then down; the down sweep must land on a walkable
    /// floor. On failure the step is left untouched.
    pub fn step_up(&self, step: &mut WalkStep) -> bool {
        let Some(hit) = step.hit.filter(HitResult::is_valid_blocking) else {
            return false;
        };
        if self.is_walkable(hit.normal) || self.max_step_height <= 0.0 {
            return false;
        }

        let forward = step.remaining_delta().project_onto_plane(self.up);
        if forward.is_nearly_zero(KINDA_SMALL_NUMBER) {
            return false;
        }

        let start = step.position;
        let (raised, _) = self.sweep(start, self.up * self.max_step_height);
        let climbed = (raised - start).dot(self.up);
        if climbed <= KINDA_SMALL_NUMBER {
            return false;
        }

        let (advanced, forward_hit) = self.sweep(raised, forward);
        if forward_hit.is_some_and(|h| h.start_penetrating) {
            return false;
        }
        if (advanced - raised).length() < MIN_STEP_PROGRESS {
            return false;
        }

        let (landed, down_hit) = self.sweep(advanced, self.up * -(climbed + MAX_FLOOR_DIST * 2.0));
        let Some(down_hit) = down_hit.filter(HitResult::is_valid_blocking) else {
            return false;
        };
        if !self.is_walkable(down_hit.normal) || (landed - start).dot(self.up) > self.max_step_height {
            return false;
        }

        let total = landed - start;
        let vertical = total.project_onto_normal(self.up);
        step.record.append(total - vertical, true);
        step.record.append(vertical, false);
        step.position = landed;
        step.consume(forward_hit.map_or(1.0, |h| h.time));
        step.hit = forward_hit;
        true
    }

    /// Slides the remaining move along the blocking surface, handling one
    /// more surface at a crease.
    pub fn slide_along_wall(&self, step: &mut WalkStep) -> bool {
        let Some(hit) = step.hit.filter(HitResult::is_valid_blocking) else {
            return false;
        };
        let first_normal = self.slide_normal(hit.normal);
        let remaining = step.remaining_delta();
        let slide = remaining.project_onto_plane(first_normal);
        if slide.is_nearly_zero(KINDA_SMALL_NUMBER) || slide.dot(remaining) <= 0.0 {
            return false;
        }
        self.sweep_step(step, slide, true);

        if let Some(second) = step.hit.filter(HitResult::is_valid_blocking) {
            let second_normal = self.slide_normal(second.normal);
            let leftover = slide * (1.0 - second.time);
            let mut redirect = leftover.project_onto_plane(second_normal);
            if redirect.dot(first_normal) < 0.0 {
                let crease = first_normal.cross(second_normal).normalize_or_zero();
                redirect = crease * leftover.dot(crease);
            }
            if !redirect.is_nearly_zero(KINDA_SMALL_NUMBER) {
                self.sweep_step(step, redirect, true);
            }
        }
        true
    }

    /// Unwalkable surfaces are treated as vertical so sliding never climbs them.
    fn slide_normal(&self, normal: Vec3) -> Vec3 {
        if self.is_walkable(normal) {
            return normal;
        }
        let flat = normal.project_onto_plane(self.up).normalize_or_zero();
        if flat == Vec3::ZERO {
            normal
        } else {
            flat
        }
    }

    /// Floor under `position`.
    #[must_use]
    pub fn find_floor(&self, position: Vec3) -> FloorResult {
        self.world.find_floor(
            &self.shape,
            position,
            self.floor_sweep_distance,
            self.max_walk_slope_cosine,
            self.up,
        )
    }

    /// Moves vertically so the gap to a walkable floor lies within
    /// `[MIN_FLOOR_DIST, MAX_FLOOR_DIST]`. Recorded as a correction.
    pub fn adjust_floor_height(&self, step: &mut WalkStep, floor: &mut FloorResult) -> bool {
        if !floor.is_walkable() {
            return false;
        }
        if (MIN_FLOOR_DIST..=MAX_FLOOR_DIST).contains(&floor.distance) {
            return false;
        }
        let target = (MIN_FLOOR_DIST + MAX_FLOOR_DIST) * 0.5;
        let delta = self.up * (target - floor.distance);
        let (end, hit) = self.sweep(step.position, delta);
        let moved = (end - step.position).dot(self.up);
        step.record.append(end - step.position, false);
        step.position = end;
        floor.distance += moved;
        if let Some(hit) = hit.filter(|h| h.blocking && delta.dot(self.up) < 0.0) {
            floor.normal = hit.normal;
        }
        true
    }
}

/// Redirects a horizontal move onto a ramp while keeping its horizontal part.
#[must_use]
pub fn deflect_onto_ramp(delta: Vec3, ramp_normal: Vec3, up: Vec3) -> Vec3 {
    let normal_up = ramp_normal.dot(up);
    if normal_up <= KINDA_SMALL_NUMBER {
        return delta;
    }
    let horizontal = delta.project_onto_plane(up);
    let rise = -ramp_normal.dot(horizontal) / normal_up;
    horizontal + up * rise
}

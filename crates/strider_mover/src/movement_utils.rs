//! Velocity integration shared by every mode.
//!
//! The integrator accelerates towards `intent * max_speed`, lets friction
//! redirect existing velocity towards the intent, and brakes with
//! substepped friction plus constant deceleration when there is no intent
//! or the actor is over its max speed.

use strider_shared::constants::{MAX_BRAKING_SUBSTEP, MIN_TICK_TIME};
use strider_shared::math::KINDA_SMALL_NUMBER;
use strider_shared::{Quaternion, Vec3};

/// Speed under which braking snaps velocity to zero (cm/s).
const BRAKE_TO_STOP_VELOCITY: f32 = 10.0;

/// Inputs to [`compute_velocity`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ComputeVelocityParams {
    /// Step length (s).
    pub delta_seconds: f32,
    /// Velocity at the start of the step.
    pub initial_velocity: Vec3,
    /// Desired direction scaled by input strength (length <= 1).
    pub move_direction_intent: Vec3,
    /// Maximum speed reachable through input.
    pub max_speed: f32,
    /// Acceleration towards the intent.
    pub acceleration: f32,
    /// Deceleration while braking.
    pub deceleration: f32,
    /// Friction (already multiplied by any braking factor).
    pub friction: f32,
}

/// True when `velocity` is faster than `max_speed` (with a 1% tolerance).
#[must_use]
pub fn is_exceeding_max_speed(velocity: Vec3, max_speed: f32) -> bool {
    let max_speed = max_speed.max(0.0);
    velocity.length_squared() > max_speed * max_speed * 1.01
}

/// Integrates one step of acceleration, redirection and braking.
#[must_use]
pub fn compute_velocity(params: &ComputeVelocityParams) -> Vec3 {
    let dt = params.delta_seconds;
    let mut velocity = params.initial_velocity;
    let intent = params.move_direction_intent.clamp_length(1.0);
    let zero_intent = intent.is_nearly_zero(KINDA_SMALL_NUMBER);
    let over_max = is_exceeding_max_speed(velocity, params.max_speed);

    if zero_intent || over_max {
        let old_velocity = velocity;
        velocity = apply_braking(velocity, dt, params.deceleration, params.friction);

        // Braking must not drop an over-max actor below max speed while it
        // is still pushing forward.
        if over_max
            && !zero_intent
            && velocity.length_squared() < params.max_speed * params.max_speed
            && intent.dot(old_velocity) > 0.0
        {
            velocity = old_velocity.normalize_or_zero() * params.max_speed;
        }
    } else {
        let direction = intent.normalize_or_zero();
        let speed = velocity.length();
        velocity -= (velocity - direction * speed) * (dt * params.friction).min(1.0);
    }

    if !zero_intent {
        let max_input_speed = if is_exceeding_max_speed(velocity, params.max_speed) {
            velocity.length()
        } else {
            params.max_speed
        };
        velocity += intent * (params.acceleration * dt);
        velocity = velocity.clamp_length(max_input_speed);
    }

    velocity
}

/// Applies friction and constant deceleration in substeps of at most
/// `MAX_BRAKING_SUBSTEP` seconds. Never reverses the velocity.
#[must_use]
pub fn apply_braking(velocity: Vec3, delta_seconds: f32, deceleration: f32, friction: f32) -> Vec3 {
    if velocity == Vec3::ZERO || delta_seconds < MIN_TICK_TIME {
        return velocity;
    }
    let friction = friction.max(0.0);
    let deceleration = deceleration.max(0.0);
    let zero_braking = deceleration == 0.0;
    if friction == 0.0 && zero_braking {
        return velocity;
    }

    let old_velocity = velocity;
    let reverse_accel = if zero_braking {
        Vec3::ZERO
    } else {
        velocity.normalize_or_zero() * -deceleration
    };

    let mut velocity = velocity;
    let mut remaining = delta_seconds;
    while remaining >= MIN_TICK_TIME {
        let dt = if remaining > MAX_BRAKING_SUBSTEP {
            MAX_BRAKING_SUBSTEP.min(remaining * 0.5)
        } else {
            remaining
        };
        remaining -= dt;

        velocity += (velocity * -friction + reverse_accel) * dt;
        if velocity.dot(old_velocity) <= 0.0 {
            return Vec3::ZERO;
        }
    }

    let speed_sq = velocity.length_squared();
    if speed_sq <= KINDA_SMALL_NUMBER
        || (!zero_braking && speed_sq <= BRAKE_TO_STOP_VELOCITY * BRAKE_TO_STOP_VELOCITY)
    {
        return Vec3::ZERO;
    }
    velocity
}

/// Projects `v` onto the plane with `normal`, optionally keeping its length.
#[must_use]
pub fn constrain_to_plane(v: Vec3, normal: Vec3, maintain_magnitude: bool) -> Vec3 {
    let projected = v.project_onto_plane(normal);
    if maintain_magnitude {
        projected.normalize_or_zero() * v.length()
    } else {
        projected
    }
}

/// Angular velocity (axis * deg/s about `up`) turning `orientation` towards
/// `orientation_intent`.
///
/// The rate is multiplied by `turning_boost` when the intent is more than 90
/// degrees away. A negative rate turns all the way in one step.
#[must_use]
pub fn compute_angular_velocity(
    orientation: Quaternion,
    orientation_intent: Vec3,
    up: Vec3,
    delta_seconds: f32,
    turning_rate: f32,
    turning_boost: f32,
) -> Vec3 {
    if delta_seconds < MIN_TICK_TIME {
        return Vec3::ZERO;
    }
    let intent = orientation_intent.project_onto_plane(up);
    let forward = orientation.forward().project_onto_plane(up);
    if intent.is_nearly_zero(KINDA_SMALL_NUMBER) || forward.is_nearly_zero(KINDA_SMALL_NUMBER) {
        return Vec3::ZERO;
    }

    let angle = forward.signed_angle_about(intent, up).to_degrees();
    if angle.abs() <= KINDA_SMALL_NUMBER {
        return Vec3::ZERO;
    }

    let step = if turning_rate < 0.0 {
        angle
    } else {
        let rate = if angle.abs() > 90.0 { turning_rate * turning_boost } else { turning_rate };
        let max_step = rate * delta_seconds;
        angle.clamp(-max_step, max_step)
    };
    up.normalize_or_zero() * (step / delta_seconds)
}

/// Rotates `orientation` by `angular_velocity` (axis * deg/s) for `delta_seconds`.
#[must_use]
pub fn integrate_orientation(orientation: Quaternion, angular_velocity: Vec3, delta_seconds: f32) -> Quaternion {
    let degrees_per_second = angular_velocity.length();
    if degrees_per_second <= KINDA_SMALL_NUMBER || delta_seconds < MIN_TICK_TIME {
        return orientation;
    }
    let axis = angular_velocity * (1.0 / degrees_per_second);
    let delta = Quaternion::from_axis_angle(axis, (degrees_per_second * delta_seconds).to_radians());
    (delta * orientation).normalize()
}

/// Clamps the component of `velocity` along `up` to terminal speed.
///
/// With `clamp` set the vertical speed snaps to `terminal` (sign kept);
/// otherwise it decelerates towards it by at most `max_deceleration * dt`.
#[must_use]
pub fn limit_vertical_speed(
    vertical_speed: f32,
    terminal: f32,
    clamp: bool,
    max_deceleration: f32,
    delta_seconds: f32,
) -> f32 {
    let speed = vertical_speed.abs();
    if speed <= terminal {
        return vertical_speed;
    }
    let sign = vertical_speed.signum();
    if clamp {
        return sign * terminal;
    }
    if delta_seconds < MIN_TICK_TIME {
        return vertical_speed;
    }
    let required = (speed - terminal) / delta_seconds;
    let decel = required.min(max_deceleration.max(0.0));
    vertical_speed - sign * decel * delta_seconds
}

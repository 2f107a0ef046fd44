//! # Movement Settings
//!
//! Named, immutable-during-tick configuration groups. Every group has a
//! `Default` carrying the reference tuning, `with_*` builders for the
//! values that are commonly overridden, and a TOML representation:
//!
//! ```toml
//! [mover]
//! air_mode = "Falling"
//!
//! [common]
//! max_speed = 650.0
//! coyote_time = 0.2
//!
//! [wall_run]
//! min_required_angle = 70.0
//! ```
//!
//! Settings are passed by reference into every mode, transition and
//! layered move; nothing looks them up ambiently.

use serde::{Deserialize, Serialize};
use strider_shared::{ModeId, TagSet, Vec3, DEFAULT_GRAVITY, DEFAULT_UP};

use crate::error::{MoverError, MoverResult};

// =============================================================================
// CURVES
// =============================================================================

/// One key of a [`FloatCurve`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Input value.
    pub time: f32,
    /// Output value.
    pub value: f32,
}

/// Piecewise-linear curve, clamped at both ends.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloatCurve {
    /// Keys sorted by `time`.
    pub keys: Vec<CurveKey>,
}

impl FloatCurve {
    /// Creates a curve from `(time, value)` pairs; keys are sorted by time.
    #[must_use]
    pub fn from_points(points: &[(f32, f32)]) -> Self {
        let mut keys: Vec<CurveKey> = points
            .iter()
            .map(|&(time, value)| CurveKey { time, value })
            .collect();
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// A curve that always evaluates to `value`.
    #[must_use]
    pub fn constant(value: f32) -> Self {
        Self::from_points(&[(0.0, value)])
    }

    /// True when the curve has at least one key.
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Evaluates the curve. An empty curve yields `None`.
    #[must_use]
    pub fn eval(&self, time: f32) -> Option<f32> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if time <= first.time {
            return Some(first.value);
        }
        if time >= last.time {
            return Some(last.value);
        }
        self.keys.windows(2).find_map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            if time < a.time || time > b.time {
                return None;
            }
            let span = b.time - a.time;
            if span <= f32::EPSILON {
                return Some(b.value);
            }
            Some(a.value + (b.value - a.value) * ((time - a.time) / span))
        })
    }
}

// =============================================================================
// MOVER
// =============================================================================

/// Global wiring: axes, gravity, which mode plays which role.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverSettings {
    /// Up direction (unit length).
    pub up_direction: Vec3,
    /// Gravity acceleration (cm/s^2).
    pub gravity: Vec3,
    /// Mode entered when landing.
    pub ground_mode: ModeId,
    /// Mode entered when leaving the ground.
    pub air_mode: ModeId,
    /// Mode used for wall running.
    pub wall_run_mode: ModeId,
    /// Extra substeps a tick may spend on refunded time after mode switches.
    pub max_refund_substeps: u32,
}

impl Default for MoverSettings {
    fn default() -> Self {
        Self {
            up_direction: DEFAULT_UP,
            gravity: DEFAULT_GRAVITY,
            ground_mode: ModeId::Walking,
            air_mode: ModeId::Falling,
            wall_run_mode: ModeId::WallRunning,
            max_refund_substeps: 4,
        }
    }
}

impl MoverSettings {
    /// Gravity acceleration along the up axis (negative when pulling down).
    #[must_use]
    pub fn gravity_along_up(&self) -> f32 {
        self.gravity.dot(self.up_direction)
    }
}

// =============================================================================
// COMMON (GROUND / AIR / JUMP)
// =============================================================================

/// Jump flag presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpPreset {
    /// Jumps replace planar velocity with the jump momentum.
    Normal,
    /// Jumps keep all previous velocity.
    BunnyHop,
}

/// Ground, air and jump tuning shared by every mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct CommonSettings {
    // --- walking ---
    /// Maximum walking speed (cm/s).
    pub max_speed: f32,
    /// Tallest obstacle that can be stepped onto (cm).
    pub max_step_height: f32,
    /// Acceleration towards the intended velocity (cm/s^2).
    pub acceleration: f32,
    /// Deceleration without input (cm/s^2).
    pub deceleration: f32,
    /// Turning rate (deg/s). Negative turns instantly.
    pub turning_rate: f32,
    /// Turning rate multiplier when reversing direction.
    pub turning_boost: f32,
    /// Friction while accelerating.
    pub ground_friction: f32,
    /// Use `braking_friction` instead of `ground_friction` while braking.
    pub use_separate_braking_friction: bool,
    /// Friction while braking when `use_separate_braking_friction` is set.
    pub braking_friction: f32,
    /// Multiplier applied to the braking friction.
    pub braking_friction_factor: f32,
    /// Minimum `normal . up` for a walkable floor.
    pub max_walk_slope_cosine: f32,
    /// Downward distance searched for a floor (cm).
    pub floor_sweep_distance: f32,

    // --- sprinting ---
    /// Maximum sprint speed (cm/s).
    pub max_sprint_speed: f32,
    /// Sprint acceleration (cm/s^2).
    pub sprint_acceleration: f32,
    /// Sprint deceleration (cm/s^2).
    pub sprint_deceleration: f32,
    /// Sprint turning rate (deg/s).
    pub sprint_turning_rate: f32,
    /// Sprint turning boost.
    pub sprint_turning_boost: f32,

    // --- falling ---
    /// Fraction of input applied while airborne.
    pub air_control_pct: f32,
    /// Planar deceleration without input while airborne (cm/s^2).
    pub falling_deceleration: f32,
    /// Planar deceleration when pushing past terminal planar speed (cm/s^2).
    pub over_terminal_speed_falling_deceleration: f32,
    /// Planar speed past which input can no longer add speed (cm/s).
    pub terminal_movement_plane_speed: f32,
    /// Hard-clamp vertical speed at `terminal_vertical_speed`.
    pub should_clamp_terminal_vertical_speed: bool,
    /// Maximum deceleration towards terminal vertical speed (cm/s^2).
    pub vertical_falling_deceleration: f32,
    /// Terminal vertical speed (cm/s).
    pub terminal_vertical_speed: f32,
    /// Drop all vertical speed on landing instead of projecting onto the floor.
    pub cancel_vertical_speed_on_landing: bool,

    // --- jumping ---
    /// Minimum time between two jump transitions (s).
    pub min_time_between_jumps: f32,
    /// Grace period after leaving a floor during which a ground jump still fires (s).
    pub coyote_time: f32,
    /// Jump transition needs a walkable floor (or coyote time).
    pub jump_requires_ground: bool,
    /// Upwards speed of a jump (cm/s).
    pub jump_vertical_impulse: f32,
    /// How long a held jump keeps its layered move alive (s).
    pub jump_hold_time: f32,
    /// Extra upwards speed while `EXTRA_JUMP_IMPULSE` is tagged (cm/s).
    pub extra_jump_vertical_impulse: f32,
    /// Air control of the jump layered move.
    pub jump_air_control_pct: f32,
    /// Additional jumps allowed before landing.
    pub maximum_in_air_jumps: u8,
    /// Releasing jump ends the jump layered move.
    pub truncate_on_jump_release: bool,
    /// Jump momentum replaces planar velocity.
    pub jump_overrides_movement_plane_velocity: bool,
    /// Jump momentum replaces vertical velocity.
    pub jump_overrides_vertical_velocity: bool,
    /// Floor surface velocity is inherited by the jump.
    pub jump_adds_floor_velocity: bool,
    /// Velocity before the jump is inherited.
    pub jump_keeps_previous_velocity: bool,
    /// Vertical velocity before the jump is inherited.
    pub jump_keeps_previous_vertical_velocity: bool,
    /// Clamp for inherited velocity (cm/s). Negative disables the clamp.
    pub max_jump_previous_velocity: f32,

    // --- orientation ---
    /// Orientation intent is flattened onto the movement plane.
    pub should_remain_upright: bool,
}

impl Default for CommonSettings {
    fn default() -> Self {
        Self {
            max_speed: 800.0,
            max_step_height: 44.0,
            acceleration: 4000.0,
            deceleration: 4000.0,
            turning_rate: 720.0,
            turning_boost: 8.0,
            ground_friction: 8.0,
            use_separate_braking_friction: false,
            braking_friction: 8.0,
            braking_friction_factor: 2.0,
            max_walk_slope_cosine: 0.71,
            floor_sweep_distance: 40.0,

            max_sprint_speed: 1000.0,
            sprint_acceleration: 2000.0,
            sprint_deceleration: 200.0,
            sprint_turning_rate: 360.0,
            sprint_turning_boost: 3.0,

            air_control_pct: 0.4,
            falling_deceleration: 200.0,
            over_terminal_speed_falling_deceleration: 800.0,
            terminal_movement_plane_speed: 1500.0,
            should_clamp_terminal_vertical_speed: true,
            vertical_falling_deceleration: 4000.0,
            terminal_vertical_speed: 2000.0,
            cancel_vertical_speed_on_landing: false,

            min_time_between_jumps: 0.1,
            coyote_time: 0.3,
            jump_requires_ground: true,
            jump_vertical_impulse: 800.0,
            jump_hold_time: 0.3,
            extra_jump_vertical_impulse: 150.0,
            jump_air_control_pct: 0.2,
            maximum_in_air_jumps: 1,
            truncate_on_jump_release: true,
            jump_overrides_movement_plane_velocity: false,
            jump_overrides_vertical_velocity: true,
            jump_adds_floor_velocity: true,
            jump_keeps_previous_velocity: true,
            jump_keeps_previous_vertical_velocity: true,
            max_jump_previous_velocity: -1.0,

            should_remain_upright: true,
        }
    }
}

impl CommonSettings {
    /// Sets the walking speed and acceleration.
    #[must_use]
    pub const fn with_walk(mut self, max_speed: f32, acceleration: f32) -> Self {
        self.max_speed = max_speed;
        self.acceleration = acceleration;
        self
    }

    /// Sets the coyote time (s).
    #[must_use]
    pub const fn with_coyote_time(mut self, seconds: f32) -> Self {
        self.coyote_time = seconds;
        self
    }

    /// Sets the number of in-air jumps.
    #[must_use]
    pub const fn with_in_air_jumps(mut self, jumps: u8) -> Self {
        self.maximum_in_air_jumps = jumps;
        self
    }

    /// Sets terminal vertical speed and whether it is a hard clamp.
    #[must_use]
    pub const fn with_terminal_vertical_speed(mut self, speed: f32, clamp: bool) -> Self {
        self.terminal_vertical_speed = speed;
        self.should_clamp_terminal_vertical_speed = clamp;
        self
    }

    /// Overwrites the jump flags with a preset.
    pub fn apply_jump_preset(&mut self, preset: JumpPreset) {
        self.truncate_on_jump_release = true;
        self.jump_adds_floor_velocity = true;
        self.jump_overrides_vertical_velocity = false;
        self.jump_keeps_previous_vertical_velocity = true;
        match preset {
            JumpPreset::Normal => {
                self.jump_overrides_movement_plane_velocity = true;
                self.jump_keeps_previous_velocity = false;
            }
            JumpPreset::BunnyHop => {
                self.jump_overrides_movement_plane_velocity = false;
                self.jump_keeps_previous_velocity = true;
            }
        }
    }
}

// =============================================================================
// WALL RUNNING
// =============================================================================

/// Which sides are probed for a wall.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WallSide {
    /// Left side only.
    Left,
    /// Right side only.
    Right,
    /// Left first, then right.
    #[default]
    Both,
}

impl WallSide {
    /// True when the left side is probed.
    #[must_use]
    pub const fn includes_left(self) -> bool {
        matches!(self, Self::Left | Self::Both)
    }

    /// True when the right side is probed.
    #[must_use]
    pub const fn includes_right(self) -> bool {
        matches!(self, Self::Right | Self::Both)
    }
}

/// Wall running and wall jumping tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct WallRunSettings {
    /// Maximum speed along the wall (cm/s).
    pub max_speed: f32,
    /// Acceleration along the wall (cm/s^2).
    pub acceleration: f32,
    /// Deceleration along the wall (cm/s^2).
    pub deceleration: f32,
    /// Intent this far from the wall plane (deg) detaches.
    pub pull_away_angle: f32,
    /// Speed pulling the shape into the wall (cm/s).
    pub attraction_force: f32,
    /// Deceleration when over max speed without input (cm/s^2).
    pub braking_deceleration: f32,
    /// Friction added on top of the ground friction while on the wall.
    pub surface_friction_factor: f32,
    /// Cooldown between two wall runs (s).
    pub min_time_between_runs: f32,
    /// Gravity scale while moving down.
    pub gravity_scale: f32,
    /// Gravity scale while moving up.
    pub upwards_gravity_scale: f32,
    /// Gravity scale over the intent/velocity alignment.
    pub gravity_vel_scale_curve: FloatCurve,
    /// Gravity scale over time spent on the wall (s).
    pub gravity_time_scale_curve: FloatCurve,
    /// Wall-run time is only reset by landing.
    pub reset_timer_only_on_land: bool,
    /// Sides probed for a wall.
    pub wall_side: WallSide,
    /// Sideways reach of the wall probes (cm).
    pub trace_head_delta: f32,
    /// Forward/back spread of the wall probes (cm).
    pub trace_tail_delta: f32,
    /// Tags required to start or keep wall running.
    pub required_tags: TagSet,
    /// Tags preventing wall running.
    pub blocked_tags: TagSet,
    /// Ignore the speed gate and the pull-away check.
    pub always_stay_on_wall: bool,
    /// Minimum planar speed to attach (cm/s).
    pub min_required_speed: f32,
    /// Minimum height above the floor to attach (cm).
    pub min_required_static_height: f32,
    /// Minimum height above the floor to keep running (cm).
    pub min_required_dynamic_height: f32,
    /// Minimum wall angle from up (deg).
    pub min_required_angle: f32,
    /// Maximum vertical speed to attach (cm/s).
    pub max_vertical_speed: f32,
    /// Longest wall run (s). Zero or negative is unlimited.
    pub max_time: f32,

    /// Wall jumps are allowed.
    pub allow_wall_jump: bool,
    /// Speed along the wall normal given by a wall jump (cm/s).
    pub wall_jump_force: f32,
    /// Extra wall-jump velocity in intent space (x forward, z up).
    pub wall_jump_arcade_force: Vec3,
    /// Upwards speed of a wall jump (cm/s).
    pub wall_jump_upwards_speed: f32,
    /// Wall surface velocity is inherited.
    pub wall_jump_adds_surface_velocity: bool,
    /// Velocity before the wall jump is inherited.
    pub wall_jump_keeps_previous_velocity: bool,
    /// Vertical velocity before the wall jump is inherited.
    pub wall_jump_keeps_previous_vertical_velocity: bool,
    /// Tags required to wall jump.
    pub wall_jump_required_tags: TagSet,
    /// Tags preventing wall jumps.
    pub wall_jump_blocked_tags: TagSet,
}

impl Default for WallRunSettings {
    fn default() -> Self {
        Self {
            max_speed: 800.0,
            acceleration: 2048.0,
            deceleration: 1024.0,
            pull_away_angle: 72.0,
            attraction_force: 120.0,
            braking_deceleration: 800.0,
            surface_friction_factor: 0.02,
            min_time_between_runs: 0.5,
            gravity_scale: 1.0,
            upwards_gravity_scale: 4.0,
            gravity_vel_scale_curve: FloatCurve::default(),
            gravity_time_scale_curve: FloatCurve::default(),
            reset_timer_only_on_land: true,
            wall_side: WallSide::Both,
            trace_head_delta: 90.0,
            trace_tail_delta: 30.0,
            required_tags: TagSet::EMPTY,
            blocked_tags: TagSet::EMPTY,
            always_stay_on_wall: true,
            min_required_speed: 500.0,
            min_required_static_height: 5.0,
            min_required_dynamic_height: 50.0,
            min_required_angle: 64.0,
            max_vertical_speed: 400.0,
            max_time: 0.0,

            allow_wall_jump: true,
            wall_jump_force: 420.0,
            wall_jump_arcade_force: Vec3::ZERO,
            wall_jump_upwards_speed: 100.0,
            wall_jump_adds_surface_velocity: true,
            wall_jump_keeps_previous_velocity: true,
            wall_jump_keeps_previous_vertical_velocity: false,
            wall_jump_required_tags: TagSet::EMPTY,
            wall_jump_blocked_tags: TagSet::EMPTY,
        }
    }
}

impl WallRunSettings {
    /// `cos(min_required_angle)`: walls with `normal . up` above this are too steep.
    #[must_use]
    pub fn max_runnable_cosine(&self) -> f32 {
        self.min_required_angle.to_radians().cos()
    }

    /// Sets the minimum wall angle (deg).
    #[must_use]
    pub const fn with_min_required_angle(mut self, degrees: f32) -> Self {
        self.min_required_angle = degrees;
        self
    }

    /// Sets the speed gate and whether it applies.
    #[must_use]
    pub const fn with_min_required_speed(mut self, speed: f32, always_stay_on_wall: bool) -> Self {
        self.min_required_speed = speed;
        self.always_stay_on_wall = always_stay_on_wall;
        self
    }

    /// Sets the maximum wall-run time (s).
    #[must_use]
    pub const fn with_max_time(mut self, seconds: f32) -> Self {
        self.max_time = seconds;
        self
    }
}

// =============================================================================
// STANCE
// =============================================================================

/// Crouch tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StanceSettings {
    /// Capsule half height while crouched (cm).
    pub crouch_half_height: f32,
    /// Eye height while crouched (cm).
    pub crouch_eye_height: f32,
    /// Walking speed while crouched (cm/s).
    pub crouch_max_speed: f32,
    /// Walking acceleration while crouched (cm/s^2).
    pub crouch_acceleration: f32,
    /// A crouched walker may leave ledges.
    pub can_walk_off_ledges_when_crouching: bool,
}

impl Default for StanceSettings {
    fn default() -> Self {
        Self {
            crouch_half_height: 40.0,
            crouch_eye_height: 40.0,
            crouch_max_speed: 300.0,
            crouch_acceleration: 2000.0,
            can_walk_off_ledges_when_crouching: true,
        }
    }
}

// =============================================================================
// BUNDLE
// =============================================================================

/// Every settings group an actor runs with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsBundle {
    /// Axes, gravity and mode roles.
    pub mover: MoverSettings,
    /// Ground, air and jump tuning.
    pub common: CommonSettings,
    /// Wall running tuning. Without it, wall running cannot run.
    pub wall_run: Option<WallRunSettings>,
    /// Stance tuning. Without it, crouch requests are ignored.
    pub stance: Option<StanceSettings>,
}

impl SettingsBundle {
    /// Reference bundle with every optional group present.
    #[must_use]
    pub fn full() -> Self {
        Self {
            wall_run: Some(WallRunSettings::default()),
            stance: Some(StanceSettings::default()),
            ..Self::default()
        }
    }

    /// Replaces the common group.
    #[must_use]
    pub fn with_common(mut self, common: CommonSettings) -> Self {
        self.common = common;
        self
    }

    /// Replaces the wall-run group.
    #[must_use]
    pub fn with_wall_run(mut self, wall_run: WallRunSettings) -> Self {
        self.wall_run = Some(wall_run);
        self
    }

    /// Replaces the stance group.
    #[must_use]
    pub fn with_stance(mut self, stance: StanceSettings) -> Self {
        self.stance = Some(stance);
        self
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`MoverError::SettingsParse`] for malformed TOML, [`MoverError::InvalidSettings`]
    /// when a value fails [`SettingsBundle::validate`].
    pub fn from_toml_str(source: &str) -> MoverResult<Self> {
        let mut bundle: Self =
            toml::from_str(source).map_err(|e| MoverError::SettingsParse(e.to_string()))?;
        bundle.mover.up_direction = bundle.mover.up_direction.normalize_or_zero();
        bundle.validate()?;
        Ok(bundle)
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// [`MoverError::SettingsParse`] if serialization fails.
    pub fn to_toml_string(&self) -> MoverResult<String> {
        toml::to_string(self).map_err(|e| MoverError::SettingsParse(e.to_string()))
    }

    /// Checks ranges the simulation relies on.
    ///
    /// # Errors
    ///
    /// [`MoverError::InvalidSettings`] naming the first offending value.
    pub fn validate(&self) -> MoverResult<()> {
        let up = self.mover.up_direction;
        if !up.is_finite() || (up.length() - 1.0).abs() > 1.0e-3 {
            return Err(MoverError::InvalidSettings("mover.up_direction must be a unit vector".into()));
        }
        if !self.mover.gravity.is_finite() {
            return Err(MoverError::InvalidSettings("mover.gravity must be finite".into()));
        }

        let c = &self.common;
        if !(-1.0..=1.0).contains(&c.max_walk_slope_cosine) {
            return Err(MoverError::InvalidSettings("common.max_walk_slope_cosine must be in [-1, 1]".into()));
        }
        let non_negative = [
            ("common.max_speed", c.max_speed),
            ("common.max_step_height", c.max_step_height),
            ("common.acceleration", c.acceleration),
            ("common.deceleration", c.deceleration),
            ("common.ground_friction", c.ground_friction),
            ("common.braking_friction", c.braking_friction),
            ("common.floor_sweep_distance", c.floor_sweep_distance),
            ("common.max_sprint_speed", c.max_sprint_speed),
            ("common.terminal_vertical_speed", c.terminal_vertical_speed),
            ("common.vertical_falling_deceleration", c.vertical_falling_deceleration),
            ("common.min_time_between_jumps", c.min_time_between_jumps),
            ("common.coyote_time", c.coyote_time),
            ("common.jump_hold_time", c.jump_hold_time),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(MoverError::InvalidSettings(format!("{name} must be finite and >= 0")));
            }
        }

        if let Some(w) = &self.wall_run {
            if !(0.0..=180.0).contains(&w.min_required_angle) {
                return Err(MoverError::InvalidSettings("wall_run.min_required_angle must be in [0, 180]".into()));
            }
            if !(0.0..=90.0).contains(&w.pull_away_angle) {
                return Err(MoverError::InvalidSettings("wall_run.pull_away_angle must be in [0, 90]".into()));
            }
            if w.min_time_between_runs < 0.0 || w.max_speed < 0.0 {
                return Err(MoverError::InvalidSettings("wall_run speeds and cooldowns must be >= 0".into()));
            }
        }

        if let Some(s) = &self.stance {
            if s.crouch_half_height <= 0.0 {
                return Err(MoverError::InvalidSettings("stance.crouch_half_height must be > 0".into()));
            }
        }
        Ok(())
    }
}

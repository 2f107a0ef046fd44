//! # Blackboard
//!
//! Ephemeral per-actor key/value store for facts that outlive a single
//! mode or tick: last fall time, last jump time, last floor, last wall.
//!
//! ## Rules
//!
//! - Entries never expire on their own. A mode invalidates the keys it owns
//!   when it deactivates.
//! - Reading an invalidated or never-written key yields `None`.
//! - Time keys only move forward: a write older than the valid stored
//!   value is rejected and logged.

use std::collections::BTreeMap;

use strider_shared::Vec3;
use tracing::warn;

use crate::collision::{FloorResult, WallResult};

/// Name of a blackboard entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlackboardKey(pub &'static str);

impl BlackboardKey {
    /// Time the actor last left a walkable floor (ms).
    pub const LAST_FALL_TIME: Self = Self("LastFallTime");
    /// Time the actor was last wall running (ms).
    pub const LAST_WALL_RUN_TIME: Self = Self("LastWallRunTime");
    /// Time the current wall run started (ms).
    pub const LAST_WALL_RUN_START_TIME: Self = Self("LastWallRunStartTime");
    /// Time of the last wall jump (ms).
    pub const LAST_WALL_JUMP_TIME: Self = Self("LastWallJumpTime");
    /// Time of the last jump (ms).
    pub const LAST_JUMP_TIME: Self = Self("LastJumpTime");
    /// Last wall trace.
    pub const LAST_WALL_RESULT: Self = Self("LastWallResult");
    /// Last floor query.
    pub const LAST_FLOOR_RESULT: Self = Self("LastFloorResult");

    /// Key name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

/// A stored value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BlackboardValue {
    /// Simulation time (ms).
    Time(f64),
    /// Plain number.
    Scalar(f32),
    /// Vector.
    Vector(Vec3),
    /// Floor query result.
    Floor(FloorResult),
    /// Wall query result.
    Wall(WallResult),
}

/// Types that can live on the blackboard.
pub trait BlackboardType: Sized {
    /// Wraps the value.
    fn into_value(self) -> BlackboardValue;
    /// Unwraps a value of this type.
    fn from_value(value: &BlackboardValue) -> Option<Self>;
}

macro_rules! blackboard_type {
    ($ty:ty, $variant:ident) => {
        impl BlackboardType for $ty {
            fn into_value(self) -> BlackboardValue {
                BlackboardValue::$variant(self)
            }

            fn from_value(value: &BlackboardValue) -> Option<Self> {
                match value {
                    BlackboardValue::$variant(inner) => Some(*inner),
                    _ => None,
                }
            }
        }
    };
}

blackboard_type!(f64, Time);
blackboard_type!(f32, Scalar);
blackboard_type!(Vec3, Vector);
blackboard_type!(FloorResult, Floor);
blackboard_type!(WallResult, Wall);

#[derive(Clone, Copy, Debug, PartialEq)]
struct Entry {
    value: BlackboardValue,
    valid: bool,
}

/// Per-actor blackboard.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Blackboard {
    entries: BTreeMap<BlackboardKey, Entry>,
}

impl Blackboard {
    /// Empty blackboard.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// Stores `value` under `key` and marks it valid.
    pub fn set<T: BlackboardType>(&mut self, key: BlackboardKey, value: T) {
        self.entries.insert(key, Entry { value: value.into_value(), valid: true });
    }

    /// Reads `key` if it is valid and holds a `T`.
    #[must_use]
    pub fn try_get<T: BlackboardType>(&self, key: BlackboardKey) -> Option<T> {
        self.entries
            .get(&key)
            .filter(|entry| entry.valid)
            .and_then(|entry| T::from_value(&entry.value))
    }

    /// Stores a timestamp, refusing to move a valid timestamp backwards.
    ///
    /// Returns false (and logs) when the write was rejected.
    pub fn set_time(&mut self, key: BlackboardKey, time_ms: f64) -> bool {
        if let Some(previous) = self.try_get::<f64>(key) {
            if time_ms < previous {
                warn!(key = key.name(), previous, time_ms, "rejected non-monotonic blackboard time");
                return false;
            }
        }
        self.set(key, time_ms);
        true
    }

    /// Reads a timestamp.
    #[must_use]
    pub fn time(&self, key: BlackboardKey) -> Option<f64> {
        self.try_get(key)
    }

    /// Cached floor, if valid.
    #[must_use]
    pub fn floor(&self) -> Option<FloorResult> {
        self.try_get(BlackboardKey::LAST_FLOOR_RESULT)
    }

    /// Cached wall, if valid.
    #[must_use]
    pub fn wall(&self) -> Option<WallResult> {
        self.try_get(BlackboardKey::LAST_WALL_RESULT)
    }

    /// Marks `key` invalid. The stored value is kept but unreadable.
    pub fn invalidate(&mut self, key: BlackboardKey) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.valid = false;
        }
    }

    /// Marks every entry invalid.
    pub fn invalidate_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.valid = false;
        }
    }

    /// True when `key` holds a valid entry.
    #[must_use]
    pub fn is_valid(&self, key: BlackboardKey) -> bool {
        self.entries.get(&key).is_some_and(|entry| entry.valid)
    }

    /// Read-only view plus write access to the query cache keys.
    pub fn cache(&mut self) -> BlackboardCache<'_> {
        BlackboardCache { inner: self }
    }
}

/// Blackboard access granted to transition evaluation.
///
/// Everything is readable; only query results can be written.
#[derive(Debug)]
pub struct BlackboardCache<'a> {
    inner: &'a mut Blackboard,
}

impl BlackboardCache<'_> {
    /// Full read access.
    #[must_use]
    pub fn read(&self) -> &Blackboard {
        self.inner
    }

    /// Caches a floor query.
    pub fn cache_floor(&mut self, floor: FloorResult) {
        self.inner.set(BlackboardKey::LAST_FLOOR_RESULT, floor);
    }

    /// Caches a wall trace.
    pub fn cache_wall(&mut self, wall: WallResult) {
        self.inner.set(BlackboardKey::LAST_WALL_RESULT, wall);
    }
}

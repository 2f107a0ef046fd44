//! # Shared World
//!
//! The reference world behind a `parking_lot` read/write lock, so one
//! thread can edit the level while others hold cheap clones of the handle.
//!
//! The simulation loop takes a single read guard per step and ticks every
//! actor against it, so a step never sees a half-applied edit. Edits go
//! through [`SharedWorld::edit`] and land between steps.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use strider_mover::collision::TraceChannel;
use strider_mover::{CollisionQuery, CollisionShape, FloorResult, HitResult, StaticWorld, WallResult};
use strider_shared::{Quaternion, Vec3};
use tracing::debug;

/// Cloneable handle to a lock-protected [`StaticWorld`].
#[derive(Clone, Debug, Default)]
pub struct SharedWorld {
    inner: Arc<RwLock<StaticWorld>>,
}

impl SharedWorld {
    /// Wraps `world`.
    #[must_use]
    pub fn new(world: StaticWorld) -> Self {
        Self {
            inner: Arc::new(RwLock::new(world)),
        }
    }

    /// Read access for a batch of queries.
    pub fn read(&self) -> RwLockReadGuard<'_, StaticWorld> {
        self.inner.read()
    }

    /// Write access. Blocks until in-flight steps release their guards.
    pub fn write(&self) -> RwLockWriteGuard<'_, StaticWorld> {
        self.inner.write()
    }

    /// Applies `f` under the write lock and returns its result.
    pub fn edit<R>(&self, f: impl FnOnce(&mut StaticWorld) -> R) -> R {
        let mut world = self.inner.write();
        let result = f(&mut world);
        debug!(colliders = world.colliders().len(), "world edited");
        result
    }

    /// Number of colliders currently in the world.
    #[must_use]
    pub fn collider_count(&self) -> usize {
        self.inner.read().colliders().len()
    }
}

impl From<StaticWorld> for SharedWorld {
    fn from(world: StaticWorld) -> Self {
        Self::new(world)
    }
}

// =============================================================================
// PORT - each query takes its own read lock
// =============================================================================

impl CollisionQuery for SharedWorld {
    fn sweep(&self, shape: &CollisionShape, start: Vec3, end: Vec3) -> Option<HitResult> {
        self.inner.read().sweep(shape, start, end)
    }

    fn line_trace(&self, start: Vec3, end: Vec3, channel: TraceChannel) -> Option<HitResult> {
        self.inner.read().line_trace(start, end, channel)
    }

    fn overlap_test(&self, shape: &CollisionShape, location: Vec3, rotation: Quaternion) -> bool {
        self.inner.read().overlap_test(shape, location, rotation)
    }

    fn find_floor(
        &self,
        shape: &CollisionShape,
        location: Vec3,
        sweep_distance: f32,
        max_walk_slope_cosine: f32,
        up: Vec3,
    ) -> FloorResult {
        self.inner
            .read()
            .find_floor(shape, location, sweep_distance, max_walk_slope_cosine, up)
    }

    fn trace_wall(
        &self,
        origin: Vec3,
        probe_ends: &[Vec3],
        channel: TraceChannel,
        max_runnable_cosine: f32,
        up: Vec3,
    ) -> WallResult {
        self.inner
            .read()
            .trace_wall(origin, probe_ends, channel, max_runnable_cosine, up)
    }
}

//! # Tick Benchmark
//!
//! REQUIREMENTS:
//! - Walking tick on flat ground: well under 10us
//! - Replay of a 1000-frame log: under 10ms
//!
//! Run with: `cargo bench --package strider_mover`

// Benchmarks don't need strict docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use strider_mover::replay::{replay, state_to_bytes, InputLog};
use strider_mover::{Collider, MoverActor, StaticWorld};
use strider_shared::{AbilityInputs, ModeId, MoverInputs, Vec3};

fn standing() -> MoverActor {
    MoverActor::builder().at(Vec3::new(0.0, 0.0, 90.15), ModeId::Walking).build().unwrap()
}

/// Ground plus `boxes` scattered obstacles.
fn cluttered(boxes: usize) -> StaticWorld {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let mut world = StaticWorld::with_ground(0.0);
    for _ in 0..boxes {
        let x = rng.gen_range(-5000.0..5000.0);
        let y = rng.gen_range(-5000.0..5000.0);
        let h = rng.gen_range(10.0..300.0);
        world.add(Collider::aabb(Vec3::new(x, y, 0.0), Vec3::new(x + 100.0, y + 100.0, h)));
    }
    world
}

/// Benchmark: one walking tick with input.
fn bench_walking_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("walking_tick");
    for boxes in [0, 16, 128] {
        let world = cluttered(boxes);
        group.bench_with_input(BenchmarkId::from_parameter(boxes), &world, |b, world| {
            let mut actor = standing();
            let inputs = MoverInputs::moving(Vec3::X);
            b.iter(|| {
                let state = actor.tick(world, 16.0, black_box(&inputs));
                if state.position.x > 4000.0 {
                    actor.teleport_to(Vec3::new(0.0, 0.0, 90.15));
                }
                black_box(state.position)
            });
        });
    }
    group.finish();
}

/// Benchmark: jump, fall and land cycle.
fn bench_jump_cycle(c: &mut Criterion) {
    let world = StaticWorld::with_ground(0.0);
    let press = MoverInputs::default().with_abilities(AbilityInputs {
        jump_just_pressed: true,
        jump_held: true,
        ..AbilityInputs::default()
    });

    c.bench_function("jump_cycle_120_ticks", |b| {
        b.iter(|| {
            let mut actor = standing();
            actor.tick(&world, 16.0, &press);
            for _ in 0..119 {
                actor.tick(&world, 16.0, &MoverInputs::default());
            }
            black_box(actor.drain_events().len())
        });
    });
}

/// Benchmark: full replay of a recorded log.
fn bench_replay(c: &mut Criterion) {
    let world = cluttered(16);
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut log = InputLog::new();
    for _ in 0..1000 {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        log.record(16.0, MoverInputs::moving(Vec3::new(angle.cos(), angle.sin(), 0.0)));
    }

    c.bench_function("replay_1000_frames", |b| {
        b.iter(|| {
            let states = replay(&mut standing(), &world, black_box(&log));
            black_box(states.last().map(state_to_bytes))
        });
    });
}

criterion_group!(benches, bench_walking_tick, bench_jump_cycle, bench_replay);
criterion_main!(benches);

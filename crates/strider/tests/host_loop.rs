//! Host loop integration: fixed stepping, world edits between frames and
//! event relay to a consumer thread.

use strider::{ActorEvent, SharedWorld, SimulationLoop, SimulationLoopConfig};
use strider_mover::replay::state_to_bytes;
use strider_mover::{Collider, MoverActor, StaticWorld};
use strider_shared::{AbilityInputs, ModeId, MoverEvent, MoverInputs, Vec3};

const STANDING_Z: f32 = 90.15;

fn standing() -> MoverActor {
    MoverActor::builder().at(Vec3::new(0.0, 0.0, STANDING_Z), ModeId::Walking).build().unwrap()
}

fn flat_loop() -> SimulationLoop {
    SimulationLoop::new(SharedWorld::new(StaticWorld::with_ground(0.0)), SimulationLoopConfig::default())
}

#[test]
fn test_irregular_frames_match_direct_fixed_ticks() {
    let mut sim = flat_loop();
    let id = sim.add_actor(standing());
    let inputs = MoverInputs::moving(Vec3::new(0.6, 0.8, 0.0));
    sim.set_inputs(id, inputs);

    // Jittery frame times that add up to whole steps now and then.
    let frames = [7.0, 21.0, 16.0, 3.0, 33.0, 16.7, 12.5, 9.0, 40.0, 16.6];
    let mut steps = 0;
    for _ in 0..6 {
        for frame in frames {
            steps += sim.advance(frame).steps;
        }
    }

    let world = StaticWorld::with_ground(0.0);
    let mut direct = standing();
    for _ in 0..steps {
        direct.tick(&world, sim.step_ms(), &inputs);
    }

    let hosted = sim.actor(id).unwrap();
    assert_eq!(hosted.tick_count(), u64::from(steps));
    assert_eq!(state_to_bytes(hosted.state()), state_to_bytes(direct.state()));
    assert!((sim.sim_time_ms() - f64::from(steps) * f64::from(sim.step_ms())).abs() < 1.0e-6);
}

#[test]
fn test_world_edit_lands_between_frames() {
    let mut sim = flat_loop();
    let id = sim.add_actor(standing());
    sim.set_inputs(id, MoverInputs::moving(Vec3::X));

    for _ in 0..15 {
        sim.advance(16.7);
    }
    assert!(sim.actor(id).unwrap().state().position.x < 600.0);

    let editor = sim.world().clone();
    std::thread::scope(|scope| {
        scope.spawn(|| {
            editor.edit(|world| world.add(Collider::aabb(Vec3::new(600.0, -500.0, 0.0), Vec3::new(700.0, 500.0, 400.0))));
        });
    });

    for _ in 0..180 {
        sim.advance(16.7);
    }
    let state = sim.actor(id).unwrap().state();
    assert_eq!(state.mode, ModeId::Walking);
    assert!(state.position.x < 600.0);
    assert!(state.position.x > 400.0);
}

#[test]
fn test_consumer_thread_sees_jump_sequence() {
    let mut sim = flat_loop();
    let id = sim.add_actor(standing());
    let receiver = sim.event_receiver();

    sim.advance(16.7);
    sim.set_inputs(
        id,
        MoverInputs::default().with_abilities(AbilityInputs {
            jump_just_pressed: true,
            ..AbilityInputs::default()
        }),
    );
    for _ in 0..120 {
        sim.advance(16.7);
        sim.set_inputs(id, MoverInputs::default());
    }
    assert_eq!(sim.actor(id).unwrap().mode(), ModeId::Walking);

    let events: Vec<ActorEvent> = std::thread::scope(|scope| scope.spawn(|| receiver.drain()).join().unwrap());
    assert!(events.iter().all(|e| e.actor == id));

    let kinds: Vec<&str> = events
        .iter()
        .filter_map(|e| match e.event {
            MoverEvent::Jumped { .. } => Some("jumped"),
            MoverEvent::Landed { .. } => Some("landed"),
            MoverEvent::ModeChanged { to: ModeId::Falling, .. } => Some("to_falling"),
            MoverEvent::ModeChanged { to: ModeId::Walking, .. } => Some("to_walking"),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec!["jumped", "to_falling", "landed", "to_walking"]);

    let times: Vec<f64> = events.iter().map(|e| e.event.sim_time_ms()).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(sim.stats().events_dropped_sum, 0);
}

use std::sync::Arc;

use parking_lot::Mutex;

use crate::entity::AttachedTo;
use crate::test_util::{Health, Position, Tag, Target};
use crate::World;

#[test]
fn test_health_scenario() {
    let mut world = World::new();
    let e = world.add_entity((Health { amount: 10 },));

    world.commands().remove_component::<Health>(e);
    assert_eq!(world.get::<Health>(e).as_deref(), Some(&Health { amount: 10 }));
    assert_eq!(world.command_buffer().len(), 1);

    assert_eq!(world.execute_commands(), 1);
    assert!(world.get::<Health>(e).is_none());
}

#[test]
fn test_fifo_and_idempotent_drain() {
    let mut world = World::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let commands = world.commands();
    let e = commands.add_entity((Health { amount: 1 },));
    for i in 0..5 {
        let log = Arc::clone(&log);
        commands.defer(move |world| {
            log.lock().push(i);
            world.get_mut::<Health>(e).expect("entity was added earlier").amount *= 10;
        });
    }
    commands.add_component(e, Health { amount: 7 });

    assert!(world.get::<Health>(e).is_none(), "pre-allocated entities have no components yet");
    assert_eq!(world.execute_commands(), 7);
    assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    assert_eq!(world.get::<Health>(e).as_deref(), Some(&Health { amount: 7 }));

    assert!(world.command_buffer().is_empty());
    assert_eq!(world.execute_commands(), 0);
    assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_add_entity_preallocates() {
    let mut world = World::new();
    let direct = world.add_entity((Tag,));
    let deferred = world.commands().add_entity((Tag, Position(1, 1)));
    let after = world.add_entity((Tag,));

    assert!(direct < deferred && deferred < after);
    world.execute_commands();
    assert_eq!(world.get::<Position>(deferred).as_deref(), Some(&Position(1, 1)));
    assert_eq!(world.iter().entities().collect::<Vec<_>>(), vec![direct, deferred, after]);
}

#[test]
fn test_remove_entity_cascade() {
    let mut world = World::new();
    let parent = world.add_entity((Tag,));
    let child = world.add_entity((AttachedTo(parent),));

    world.commands().remove_entity(parent, true);
    assert!(world.contains(child));
    world.execute_commands();
    assert!(!world.contains(parent));
    assert!(!world.contains(child));
}

#[test]
fn test_instantiate_callback() {
    let mut template = World::new();
    let leader = template.add_entity((Health { amount: 5 },));
    let follower = template.add_entity((Target(leader), Position(0, 0)));
    let template = Arc::new(template);

    let mut world = World::new();
    world.add_entity((Tag,));
    let copies = Arc::new(Mutex::new(None));

    {
        let copies = Arc::clone(&copies);
        world.commands().instantiate(Arc::clone(&template), move |world, remap| {
            world.remap_component::<Target>(remap);
            let follower = remap.get(follower).expect("follower is copied");
            world.get_mut::<Position>(follower).expect("position is copied").0 = 100;
            *copies.lock() = Some((remap.get(leader), Some(follower)));
        });
    }
    assert_eq!(world.iter().entities().count(), 1);
    world.execute_commands();

    let (new_leader, new_follower) = copies.lock().take().expect("callback was called");
    let new_leader = new_leader.expect("leader is copied");
    let new_follower = new_follower.expect("follower is copied");
    assert_eq!(world.get::<Target>(new_follower).as_deref(), Some(&Target(new_leader)));
    assert_eq!(world.get::<Position>(new_follower).as_deref(), Some(&Position(100, 0)));
    assert_eq!(template.get::<Position>(follower).as_deref(), Some(&Position(0, 0)));
}

#[test]
fn test_commands_recorded_while_executing() {
    let mut world = World::new();
    let e = world.add_entity((Health { amount: 1 },));

    let spawned = Arc::new(Mutex::new(None));
    let spawned_clone = Arc::clone(&spawned);
    world.commands().defer(move |world| {
        let commands = world.commands();
        commands.remove_component::<Health>(e);
        *spawned_clone.lock() = Some(commands.add_entity((Tag,)));
    });

    assert_eq!(world.execute_commands(), 3);
    assert!(world.command_buffer().is_empty());
    assert!(world.get::<Health>(e).is_none());
    let spawned = spawned.lock().take().expect("deferred closure was called");
    assert!(world.get::<Tag>(spawned).is_some());

    assert_eq!(world.execute_commands(), 0);
}

#[test]
fn test_execute_after_panicking_command() {
    let mut world = World::new();
    world.commands().defer(|_| panic!("command failed"));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        world.execute_commands();
    }));
    assert!(result.is_err());

    let e = world.commands().add_entity((Health { amount: 2 },));
    assert_eq!(world.execute_commands(), 1);
    assert_eq!(world.get::<Health>(e).map(|health| health.amount), Some(2));
}

#[test]
#[should_panic = "execute_commands cannot be called from a command"]
fn test_recursive_execute() {
    let mut world = World::new();
    world.commands().defer(|world| {
        world.execute_commands();
    });
    world.execute_commands();
}

#[test]
fn test_concurrent_recording() {
    let mut world = World::new();
    let recorded: Vec<_> = std::thread::scope(|scope| {
        let world = &world;
        let handles: Vec<_> = (0..4)
            .map(|thread| {
                scope.spawn(move || {
                    (0..25)
                        .map(|i| world.commands().add_entity((Health { amount: thread * 100 + i },)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|handle| handle.join().expect("thread panicked")).collect()
    });

    assert_eq!(world.execute_commands(), 100);
    assert_eq!(world.iter().entities().count(), 100);
    for e in recorded {
        assert!(world.contains(e));
    }
}

use super::*;
use crate::test_util::{Health, Position, Tag, Velocity};

#[test]
fn test_completeness_law() {
    let mut world = World::new();
    let both = world.add_entity((Position(1, 0), Velocity(2, 0)));
    let only_required = world.add_entity((Position(3, 0),));
    let only_optional = world.add_entity((Velocity(4, 0),));
    let neither = world.add_entity((Tag,));

    let query = world.query::<(Read<Position>, ReadOptional<Velocity>)>();
    assert!(query.is_stale(), "new queries are stale until the next update");
    world.update_queries();

    assert_eq!(query.entities(), vec![both, only_required]);
    assert!(!query.contains(only_optional));
    assert!(!query.contains(neither));

    let mut rows = Vec::new();
    query.view(&world).for_each(|entity, (position, velocity)| {
        rows.push((entity, *position, velocity.copied()));
    });
    assert_eq!(
        rows,
        vec![(both, Position(1, 0), Some(Velocity(2, 0))), (only_required, Position(3, 0), None)]
    );
}

#[test]
fn test_all_optional_requires_any() {
    let mut world = World::new();
    let a = world.add_entity((Position(0, 0),));
    let b = world.add_entity((Velocity(0, 0),));
    world.add_entity((Tag,));
    let c = world.add_entity((Position(0, 0), Velocity(0, 0)));

    let query = world.query::<(ReadOptional<Position>, ReadOptional<Velocity>)>();
    world.update_queries();
    assert_eq!(query.entities(), vec![a, b, c]);
}

#[test]
fn test_write_in_place() {
    let mut world = World::new();
    let a = world.add_entity((Position(0, 0), Velocity(1, 2)));
    let b = world.add_entity((Position(10, 10), Velocity(-1, 0)));

    let query = world.query::<(Write<Position>, Read<Velocity>)>();
    world.update_queries();

    for _ in 0..3 {
        query.view(&world).for_each(|_, (position, velocity)| {
            position.0 += velocity.0;
            position.1 += velocity.1;
        });
    }

    assert_eq!(world.get::<Position>(a).as_deref(), Some(&Position(3, 6)));
    assert_eq!(world.get::<Position>(b).as_deref(), Some(&Position(7, 10)));
    assert_eq!(query.rebuild_count(), 1, "value changes do not invalidate queries");
}

#[test]
fn test_get_binary_search() {
    let mut world = World::new();
    let entities: Vec<Entity> = (0..100)
        .map(|i| match i % 3 {
            0 => world.add_entity((Health { amount: i },)),
            _ => world.add_entity((Tag,)),
        })
        .collect();

    let query = world.query::<WriteOptional<Health>>();
    world.update_queries();
    assert_eq!(query.len(), 34);

    let mut view = query.view(&world);
    for (i, &entity) in entities.iter().enumerate() {
        match view.get(entity) {
            Some(health) => {
                assert_eq!(i % 3, 0);
                let health = health.expect("rows of an optional-only query have a value");
                health.amount *= 2;
            }
            None => assert_ne!(i % 3, 0),
        }
    }
    drop(view);

    assert_eq!(world.get::<Health>(entities[99]).as_deref(), Some(&Health { amount: 198 }));
}

#[test]
fn test_invalidation_minimality() {
    let mut world = World::new();
    let positions = world.query::<Read<Position>>();
    let velocities = world.query::<Read<Velocity>>();
    world.update_queries();
    assert_eq!((positions.rebuild_count(), velocities.rebuild_count()), (1, 1));

    for i in 0..50 {
        world.add_entity((Velocity(i, i),));
    }
    assert_eq!(world.update_queries(), 1);
    assert_eq!(positions.rebuild_count(), 1, "position query does not depend on velocity");
    assert_eq!(velocities.rebuild_count(), 2, "one rebuild regardless of the number of changes");
    assert_eq!(velocities.len(), 50);

    assert_eq!(world.update_queries(), 0, "nothing changed since the last update");

    let e = world.add_entity((Position(0, 0),));
    world.add_component(e, Position(1, 1));
    world.update_queries();
    assert_eq!(positions.rebuild_count(), 2);
    assert_eq!(velocities.rebuild_count(), 2);
}

#[test]
fn test_overwrite_does_not_invalidate() {
    let mut world = World::new();
    let e = world.add_entity((Health { amount: 1 },));
    let query = world.query::<Read<Health>>();
    world.update_queries();

    world.add_component(e, Health { amount: 2 });
    assert_eq!(world.update_queries(), 0);
    assert_eq!(query.view(&world).get(e), Some(&Health { amount: 2 }), "values are read live");
}

#[test]
fn test_sharing_and_garbage_collection() {
    let mut world = World::new();
    world.add_entity((Position(0, 0),));

    let first = world.query::<(Read<Position>,)>();
    let second = world.query::<(Read<Position>,)>();
    let single = world.query::<Read<Position>>();
    assert_eq!(world.query_count(), 2, "identical shapes share one query");

    assert_eq!(world.update_queries(), 2);
    assert_eq!(first.rebuild_count(), 1);
    assert_eq!(second.rebuild_count(), 1);

    drop(first);
    world.update_queries();
    assert_eq!(world.query_count(), 2, "one handle of the shared query is still alive");

    drop(second);
    drop(single);
    world.update_queries();
    assert_eq!(world.query_count(), 0);
}

#[test]
fn test_command_changes_invalidate() {
    let mut world = World::new();
    let e = world.add_entity((Health { amount: 1 },));
    let query = world.query::<Read<Health>>();
    world.update_queries();

    world.commands().remove_component::<Health>(e);
    world.execute_commands();
    assert!(query.is_stale());
    assert_eq!(query.len(), 1, "results are kept until the next update");

    world.update_queries();
    assert!(query.is_empty());
}

#[test]
#[should_panic = "more than once with mutable access"]
fn test_conflicting_shape() { World::new().query::<(Read<Position>, Write<Position>)>(); }

#[test]
fn test_shared_duplicate_shape() {
    let mut world = World::new();
    let e = world.add_entity((Position(4, 2),));
    let query = world.query::<(Read<Position>, ReadOptional<Position>)>();
    world.update_queries();

    let mut view = query.view(&world);
    assert_eq!(view.get(e), Some((&Position(4, 2), Some(&Position(4, 2)))));
}

#[test]
#[should_panic = "currently used by another system"]
fn test_conflicting_views() {
    let mut world = World::new();
    world.add_entity((Position(0, 0),));
    let writer = world.query::<Write<Position>>();
    let reader = world.query::<Read<Position>>();
    world.update_queries();

    let _reader_view = reader.view(&world);
    let _writer_view = writer.view(&world);
}

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::*;
use crate::query::{Read, Write};
use crate::test_util::{self, AntiSemaphore, EventTracer, Health, Position, Tag};
use crate::Entity;

#[derive(Default)]
struct Probe {
    log:     Mutex<Vec<(String, i32)>>,
    running: AtomicUsize,
    max:     AtomicUsize,
}

impl Probe {
    fn enter(&self) {
        let value = self.running.fetch_add(1, Ordering::SeqCst);
        self.max.fetch_max(value + 1, Ordering::SeqCst);
    }

    fn exit(&self) { self.running.fetch_sub(1, Ordering::SeqCst); }
}

fn populate(world: &mut World, count: i32) -> Vec<Entity> {
    (0..count).map(|i| world.add_entity((Health { amount: i }, Position(i, -i)))).collect()
}

#[test]
fn test_dependency_makes_writes_visible() {
    test_util::init();

    let mut world = World::new();
    populate(&mut world, 20);

    let mut systems = SystemSet::<Probe>::with_concurrency(2);
    let heal = systems.add_system(&mut world, "heal", |reg| {
        let query = reg.query::<Write<Health>>();
        move |run: &Run<'_, Probe>| {
            run.view(&query).for_each(|_, health| health.amount += 100);
        }
    });
    let audit = systems.add_system(&mut world, "audit", |reg| {
        let query = reg.query::<Read<Health>>();
        move |run: &Run<'_, Probe>| {
            let mut total = 0;
            run.view(&query).for_each(|_, health| total += health.amount);
            run.context().log.lock().push((run.name().to_owned(), total));
        }
    });
    systems.add_dependency(heal, audit);

    world.update_queries();
    let probe = Probe::default();
    for _ in 0..3 {
        systems.run(&world, &probe);
    }

    let base: i32 = (0..20).sum();
    let expect: Vec<_> = [2000, 4000, 6000].map(|bonus| ("audit".to_owned(), base + bonus)).into();
    assert_eq!(probe.log.into_inner(), expect);
}

#[test]
fn test_concurrent_readers_see_identical_rows() {
    test_util::init();

    struct Context {
        asem: AntiSemaphore,
        seen: Mutex<Vec<Vec<Entity>>>,
    }

    let mut world = World::new();
    let entities = populate(&mut world, 40);

    let mut systems = SystemSet::<Context>::with_concurrency(1);
    for name in ["left", "right"] {
        systems.add_system(&mut world, name, |reg| {
            let query = reg.query::<Read<Position>>();
            move |run: &Run<'_, Context>| {
                let mut rows = Vec::new();
                run.view(&query).for_each(|entity, _| rows.push(entity));
                run.context().asem.wait();
                run.context().seen.lock().push(rows);
            }
        });
    }

    world.update_queries();
    let context = Context { asem: AntiSemaphore::new(2), seen: Mutex::new(Vec::new()) };
    systems.run(&world, &context);

    let seen = context.seen.into_inner();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], entities);
    assert_eq!(seen[1], entities);
}

#[test]
fn test_writers_are_excluded() {
    test_util::init();

    let mut world = World::new();
    let entities = populate(&mut world, 10);

    let mut systems = SystemSet::<Probe>::with_concurrency(3);
    for name in ["double", "increment", "negate"] {
        systems.add_system(&mut world, name, |reg| {
            let query = reg.query::<Write<Health>>();
            move |run: &Run<'_, Probe>| {
                run.context().enter();
                run.view(&query).for_each(|_, health| match run.name() {
                    "double" => health.amount = health.amount * 2 % 1000,
                    "increment" => health.amount += 1,
                    _ => health.amount = -health.amount,
                });
                run.context().exit();
            }
        });
    }
    systems.add_system(&mut world, "reader", |reg| {
        let query = reg.query::<Read<Health>>();
        move |run: &Run<'_, Probe>| {
            run.context().enter();
            run.view(&query).for_each(|_, _| {});
            run.context().exit();
        }
    });

    world.update_queries();
    let probe = Probe::default();
    for _ in 0..50 {
        systems.run(&world, &probe);
    }

    assert_eq!(probe.max.into_inner(), 1, "systems accessing the same table must not overlap");
    for &entity in &entities {
        assert!(world.get::<Health>(entity).is_some());
    }
}

#[test]
fn test_different_tables_run_concurrently() {
    test_util::init();

    let mut world = World::new();
    populate(&mut world, 5);

    let mut systems = SystemSet::<AntiSemaphore>::with_concurrency(1);
    systems.add_system(&mut world, "health", |reg| {
        let query = reg.query::<Write<Health>>();
        move |run: &Run<'_, AntiSemaphore>| {
            let _view = run.view(&query);
            run.context().wait();
        }
    });
    systems.add_system(&mut world, "position", |reg| {
        let query = reg.query::<Write<Position>>();
        move |run: &Run<'_, AntiSemaphore>| {
            let _view = run.view(&query);
            run.context().wait();
        }
    });

    world.update_queries();
    systems.run(&world, &AntiSemaphore::new(2));
}

#[test]
fn test_chain() {
    test_util::init();

    let mut world = World::new();
    let mut systems = SystemSet::<EventTracer<SystemId>>::with_concurrency(4);
    let ids: Vec<SystemId> = (0..5)
        .map(|i| {
            systems.add_system(&mut world, format!("stage {i}"), |_| {
                |run: &Run<'_, EventTracer<SystemId>>| run.context().trace(run.id())
            })
        })
        .collect();
    systems.add_chain(&[ids[3], ids[1], ids[4], ids[0]]);

    for _ in 0..20 {
        let events = EventTracer::new([(ids[3], ids[1]), (ids[1], ids[4]), (ids[4], ids[0])]);
        systems.run(&world, &events);
        assert_eq!(events.get_events().len(), 5);
    }
}

#[test]
fn test_commands_from_systems() {
    test_util::init();

    let mut world = World::new();
    let entities = populate(&mut world, 6);

    let mut systems = SystemSet::<()>::with_concurrency(2);
    systems.add_system(&mut world, "reaper", |reg| {
        let query = reg.query::<Read<Health>>();
        move |run: &Run<'_, ()>| {
            let commands = run.commands();
            run.view(&query).for_each(|entity, health| {
                if health.amount % 2 == 1 {
                    commands.remove_entity(entity, false);
                }
            });
        }
    });
    systems.add_system(&mut world, "spawner", |reg| {
        let query = reg.query::<Read<Position>>();
        move |run: &Run<'_, ()>| {
            let count = run.view(&query).len();
            let commands = run.commands();
            for _ in 0..count {
                commands.add_entity((Tag,));
            }
        }
    });

    world.update_queries();
    systems.run(&world, &());
    assert!(world.contains(entities[1]), "structural changes are deferred until executed");

    assert_eq!(world.execute_commands(), 9);
    for (i, &entity) in entities.iter().enumerate() {
        assert_eq!(world.contains(entity), i % 2 == 0);
    }
    assert_eq!(world.table::<Tag>().expect("tags were added").cardinality(), 6);

    world.update_queries();
    systems.run(&world, &());
    assert_eq!(world.execute_commands(), 3, "the query reflects the removals");
}

#[test]
fn test_unthreaded() {
    test_util::init();

    let mut world = World::new();
    let mut systems = SystemSet::<Mutex<Vec<tracer::Thread>>>::unthreaded();
    assert_eq!(systems.concurrency(), 0);

    let first = systems.add_system(&mut world, "first", |_| {
        |run: &Run<'_, Mutex<Vec<tracer::Thread>>>| run.context().lock().push(run.thread())
    });
    let second = systems.add_system(&mut world, "second", |_| {
        |run: &Run<'_, Mutex<Vec<tracer::Thread>>>| run.context().lock().push(run.thread())
    });
    systems.add_dependency(second, first);
    assert_eq!(systems.len(), 2);
    assert_eq!(systems.name(first), "first");

    let threads = Mutex::new(Vec::new());
    systems.run(&world, &threads);
    assert_eq!(threads.into_inner(), vec![tracer::Thread::Main; 2]);
}

#[test]
fn test_registrar_world() {
    let mut world = World::new();
    let mut systems = SystemSet::<Mutex<Vec<Entity>>>::unthreaded();
    let mut spawned = None;

    let system = systems.add_system(&mut world, "spawn during registration", |reg| {
        spawned = Some(reg.world().add_entity((Tag,)));
        assert_eq!(reg.id().index(), 0);
        let query = reg.query::<Read<Tag>>();
        move |run: &Run<'_, Mutex<Vec<Entity>>>| {
            run.view(&query).for_each(|entity, _| run.context().lock().push(entity));
        }
    });
    assert_eq!(system.index(), 0);

    world.update_queries();
    let seen = Mutex::new(Vec::new());
    systems.run(&world, &seen);
    assert_eq!(seen.into_inner(), spawned.into_iter().collect::<Vec<_>>());
}

#[test]
#[should_panic = "Cannot schedule confused (SystemId(0)) due to conflicts in"]
fn test_conflicting_registration() {
    let mut world = World::new();
    let mut systems = SystemSet::<()>::unthreaded();
    systems.add_system(&mut world, "confused", |reg| {
        reg.query::<Read<Health>>();
        reg.query::<Write<Health>>();
        |_: &Run<'_, ()>| {}
    });
}

#[test]
#[should_panic = "Scheduled systems have a cyclic dependency: a (SystemId(0)) -> b (SystemId(1)) \
                  -> a (SystemId(0))"]
fn test_cyclic_dependency() {
    let mut world = World::new();
    let mut systems = SystemSet::<()>::unthreaded();
    let a = systems.add_system(&mut world, "a", |_| |_: &Run<'_, ()>| {});
    let b = systems.add_system(&mut world, "b", |_| |_: &Run<'_, ()>| {});
    systems.add_chain(&[a, b, a]);
    systems.run(&world, &());
}

#[derive(Default)]
struct Failing {
    fail: AtomicBool,
    runs: AtomicUsize,
}

fn failing_systems(world: &mut World) -> SystemSet<Failing> {
    let mut systems = SystemSet::<Failing>::with_concurrency(2);
    let check = systems.add_system(world, "check", |_| {
        |run: &Run<'_, Failing>| {
            run.context().runs.fetch_add(1, Ordering::SeqCst);
            if run.context().fail.load(Ordering::SeqCst) {
                panic!("check failed");
            }
        }
    });
    for name in ["after check", "also after check"] {
        let system = systems.add_system(world, name, |_| {
            |run: &Run<'_, Failing>| {
                run.context().runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        systems.add_dependency(check, system);
    }
    systems
}

#[test]
#[should_panic = "check failed"]
fn test_panicking_system() {
    test_util::init();

    let mut world = World::new();
    let mut systems = failing_systems(&mut world);
    let context = Failing { fail: AtomicBool::new(true), ..Failing::default() };
    systems.run(&world, &context);
}

#[test]
fn test_run_after_panicking_system() {
    test_util::init();

    let mut world = World::new();
    let mut systems = failing_systems(&mut world);
    let context = Failing { fail: AtomicBool::new(true), ..Failing::default() };

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        systems.run(&world, &context);
    }));
    assert!(result.is_err());
    assert_eq!(context.runs.load(Ordering::SeqCst), 1, "dependents of a panicked system never start");

    context.fail.store(false, Ordering::SeqCst);
    systems.run(&world, &context);
    assert_eq!(context.runs.load(Ordering::SeqCst), 4);
}

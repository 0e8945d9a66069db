//! A paged entity-component store with cached queries and a dependency-aware system scheduler.
//!
//! # Entities and components
//! An [`Entity`] is an integer identity with no data of its own.
//! It exists exactly as long as some component table holds a value for it.
//! Any `Clone + Send + Sync + 'static` type can be used as a [component](comp::Component)
//! without registration.
//!
//! Each component type is stored in its own [`Table`](storage::Table),
//! split into pages of 16 slots addressed by the high bits of the entity ID.
//! A page keeps a bitmask of occupied slots and a bitmask of slots changed since the last clean-up,
//! so that walking a table only visits occupied slots and skips absent pages entirely.
//!
//! # Queries
//! A [`Query`] caches the entities that have a particular combination of components.
//! Queries are keyed by their [shape](query::Shape),
//! so two systems declaring the same shape share one cached result.
//! Results are only rebuilt when a table of a declared component type gains or loses a value,
//! and all stale queries are rebuilt together in one merged walk over the tables.
//!
//! # Systems
//! Systems registered in a [`SystemSet`] run in parallel on a worker pool.
//! Dependency edges between systems order their execution,
//! while systems writing the same component type never overlap.
//! Systems change values in place through query views,
//! and record structural changes through [`Commands`](command::Commands),
//! which are applied after the dispatch.
//!
//! # Frame protocol
//! ```
//! use pagec::query::{Read, Write};
//! use pagec::system::Run;
//! use pagec::{SystemSet, World};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Health {
//!     amount: i32,
//! }
//!
//! #[derive(Clone)]
//! struct Poison(i32);
//!
//! let mut world = World::new();
//! let knight = world.add_entity((Health { amount: 10 },));
//! let goblin = world.add_entity((Health { amount: 3 }, Poison(4)));
//!
//! let mut systems = SystemSet::<()>::new();
//! let poison = systems.add_system(&mut world, "poison", |reg| {
//!     let query = reg.query::<(Write<Health>, Read<Poison>)>();
//!     move |run: &Run<'_, ()>| {
//!         run.view(&query).for_each(|_, (health, poison)| health.amount -= poison.0);
//!     }
//! });
//! let reaper = systems.add_system(&mut world, "reaper", |reg| {
//!     let query = reg.query::<Read<Health>>();
//!     move |run: &Run<'_, ()>| {
//!         let commands = run.commands();
//!         run.view(&query).for_each(|entity, health| {
//!             if health.amount <= 0 {
//!                 commands.remove_entity(entity, true);
//!             }
//!         });
//!     }
//! });
//! systems.add_dependency(poison, reaper);
//!
//! world.update_queries();
//! systems.run(&world, &());
//! world.execute_commands();
//! world.clean_up_pages();
//!
//! assert!(world.contains(knight));
//! assert!(!world.contains(goblin));
//! ```

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(doc, warn(missing_docs))]

pub mod command;

pub mod comp;
pub use comp::{Bundle, Component};

pub mod entity;
pub use entity::Entity;

pub mod query;
pub use query::Query;

pub(crate) mod scheduler;

pub mod storage;

pub mod system;
pub use system::SystemSet;

#[cfg(any(test, feature = "internal-bench"))]
pub mod test_util;

pub mod tracer;
pub use tracer::Tracer;

pub mod util;

pub mod world;
pub use world::World;

static_assertions::assert_impl_all!(World: Send, Sync);
static_assertions::assert_impl_all!(SystemSet<()>: Send);

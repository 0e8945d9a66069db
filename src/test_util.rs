#![allow(missing_docs)]

//! Utilities shared by unit tests and benches.

use parking_lot::Once;

use crate::entity::{MapEntities, Remap};
use crate::Entity;

mod anti_semaphore;
pub use anti_semaphore::AntiSemaphore;

mod event_tracer;
pub use event_tracer::EventTracer;

/// Installs `env_logger` as the global logger once per process.
pub fn init() {
    static SET_LOGGER_ONCE: Once = Once::new();
    SET_LOGGER_ONCE.call_once(env_logger::init);
}

/// Converts a raw ID into an entity.
///
/// # Panics
/// Panics if `raw` is 0.
pub fn entity(raw: u32) -> Entity { Entity::new(raw).expect("test entity ID must be nonzero") }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Health {
    pub amount: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position(pub i32, pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Velocity(pub i32, pub i32);

/// A marker component with no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag;

/// A component referencing another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target(pub Entity);

impl MapEntities for Target {
    fn map_entities(&mut self, remap: &Remap) { self.0.map_entities(remap) }
}

/// A generic component, used to create many distinct component types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompN<const N: usize>(pub i32);

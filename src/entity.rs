//! Entities are plain integer identities.
//!
//! An entity has no data of its own.
//! It exists exactly as long as some component table holds a row for its ID.
//! IDs are allocated by a monotonic counter and never reused,
//! so a removed entity permanently retires its ID.

use std::fmt;
use std::num::NonZeroU32;

use xias::Xias;

use crate::storage::{PageId, SLOT_MASK};

pub mod ealloc;
pub use ealloc::Ealloc;

mod remap;
pub use remap::{MapEntities, Remap};


/// Identifies an entity.
///
/// The raw value `0` is reserved to mean "no entity",
/// which is represented as `None` in an `Option<Entity>`.
/// Entities are totally ordered by their raw value,
/// which is the canonical iteration order everywhere in this crate.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(NonZeroU32);

impl Entity {
    /// The smallest entity ID.
    pub const MIN: Self = Self(NonZeroU32::MIN);

    /// Converts a raw ID into an entity, returning `None` for the reserved value `0`.
    pub fn new(raw: u32) -> Option<Self> { NonZeroU32::new(raw).map(Self) }

    /// Returns the raw ID of this entity.
    pub fn get(self) -> u32 { self.0.get() }

    /// Returns the page that stores components of this entity.
    pub fn page(self) -> PageId { PageId::of(self) }

    /// Returns the slot index of this entity within its page.
    pub fn slot(self) -> usize { (self.get() & SLOT_MASK).small_int() }

    /// Returns the smallest entity strictly greater than `self`, if any.
    pub(crate) fn successor(self) -> Option<Self> { self.get().checked_add(1).and_then(Self::new) }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "Entity#{}", self.get()) }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "#{}", self.get()) }
}

/// Attaches the owning entity to a parent entity.
///
/// When the parent is removed with cascading enabled,
/// every entity attached to it is removed as well, recursively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachedTo(pub Entity);

impl MapEntities for AttachedTo {
    fn map_entities(&mut self, remap: &Remap) { self.0.map_entities(remap) }
}

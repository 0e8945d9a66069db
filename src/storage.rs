//! A table is the data structure where components of the same type for all entities are stored.
//!
//! Tables are split into fixed-size pages.
//! An entity's page is its ID with the low [`PAGE_BITS`] bits cleared,
//! and its slot within the page is the value of those low bits.
//! Each page keeps two `u16` masks:
//! the occupancy mask indexes which slots hold a component,
//! and the dirty mask records which slots were added to or removed from
//! since the last [`Table::clean_up_pages`].

mod page;
pub(crate) use page::Page;
pub use page::PageId;

mod table;
pub(crate) use table::Position;
pub use table::Table;

#[cfg(test)]
mod tests;

/// The number of entity ID bits used to address a slot within a page.
pub const PAGE_BITS: u32 = 4;

/// The number of slots in a page.
pub const PAGE_SIZE: usize = 1 << PAGE_BITS;

/// The bits of an entity ID that select the slot within a page.
pub(crate) const SLOT_MASK: u32 = (1 << PAGE_BITS) - 1;

static_assertions::const_assert_eq!(PAGE_SIZE, u16::BITS as usize);

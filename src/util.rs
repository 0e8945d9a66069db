//! Miscellaneous helpers shared across modules.

use std::any::{self, TypeId};
use std::cmp::Ordering;
use std::{fmt, hash};

/// A [`TypeId`] that remembers the name of the type for diagnostics.
///
/// Equality, ordering and hashing only consider the [`TypeId`].
#[derive(Clone, Copy)]
pub struct DbgTypeId {
    /// The underlying type ID.
    pub id:   TypeId,
    /// The type name returned by [`any::type_name`].
    pub name: &'static str,
}

impl DbgTypeId {
    /// Returns the `DbgTypeId` of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: any::type_name::<T>() }
    }
}

impl fmt::Debug for DbgTypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str(self.name) }
}

impl fmt::Display for DbgTypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str(self.name) }
}

impl PartialEq for DbgTypeId {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for DbgTypeId {}

impl PartialOrd for DbgTypeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for DbgTypeId {
    fn cmp(&self, other: &Self) -> Ordering { self.id.cmp(&other.id) }
}

impl hash::Hash for DbgTypeId {
    fn hash<H: hash::Hasher>(&self, state: &mut H) { self.id.hash(state) }
}

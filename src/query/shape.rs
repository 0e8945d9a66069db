use std::any;
use std::marker::PhantomData;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::comp::Component;
use crate::storage::Table;
use crate::util::DbgTypeId;
use crate::world::tables::Tables;
use crate::Entity;

/// Requires the component `C` and reads it.
pub struct Read<C>(PhantomData<fn() -> C>);

/// Requires the component `C` and writes it in place.
pub struct Write<C>(PhantomData<fn() -> C>);

/// Reads the component `C` if the entity has it.
pub struct ReadOptional<C>(PhantomData<fn() -> C>);

/// Writes the component `C` in place if the entity has it.
pub struct WriteOptional<C>(PhantomData<fn() -> C>);

/// How a query accesses one component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// See [`Read`].
    Read,
    /// See [`Write`].
    Write,
    /// See [`ReadOptional`].
    ReadOptional,
    /// See [`WriteOptional`].
    WriteOptional,
}

impl Mode {
    /// Returns whether the mode requires exclusive access to the table.
    pub fn is_mutable(self) -> bool { matches!(self, Self::Write | Self::WriteOptional) }

    /// Returns whether entities without the component are excluded.
    pub fn is_required(self) -> bool { matches!(self, Self::Read | Self::Write) }
}

/// A component type together with its access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    /// The component type.
    pub ty:   DbgTypeId,
    /// The access mode.
    pub mode: Mode,
}

/// One column of a query shape.
pub trait Access: 'static {
    /// The accessed component type.
    type Component: Component;

    /// The access mode.
    const MODE: Mode;

    /// The lock held on the table while the query is viewed.
    type Guard<'w>;

    /// The value yielded for each row.
    type Value<'g>;

    /// Locks the table of the component.
    fn lock_table(tables: &Tables) -> Self::Guard<'_>;

    /// Fetches the value for `entity`, returning `None` if the row is incomplete.
    fn fetch_value<'g>(guard: &'g mut Self::Guard<'_>, entity: Entity) -> Option<Self::Value<'g>>;
}

fn unregistered<C: Component>() -> ! {
    panic!(
        "The component {} has no table in this world. Queries must be created by World::query \
         on the world they are viewed in",
        any::type_name::<C>()
    )
}

fn read_table<C: Component>(tables: &Tables) -> RwLockReadGuard<'_, Table<C>> {
    tables.read::<C>().unwrap_or_else(|| unregistered::<C>())
}

fn write_table<C: Component>(tables: &Tables) -> RwLockWriteGuard<'_, Table<C>> {
    tables.write::<C>().unwrap_or_else(|| unregistered::<C>())
}

impl<C: Component> Access for Read<C> {
    type Component = C;
    const MODE: Mode = Mode::Read;
    type Guard<'w> = RwLockReadGuard<'w, Table<C>>;
    type Value<'g> = &'g C;

    fn lock_table(tables: &Tables) -> Self::Guard<'_> { read_table(tables) }

    fn fetch_value<'g>(guard: &'g mut Self::Guard<'_>, entity: Entity) -> Option<&'g C> {
        guard.get(entity)
    }
}

impl<C: Component> Access for Write<C> {
    type Component = C;
    const MODE: Mode = Mode::Write;
    type Guard<'w> = RwLockWriteGuard<'w, Table<C>>;
    type Value<'g> = &'g mut C;

    fn lock_table(tables: &Tables) -> Self::Guard<'_> { write_table(tables) }

    fn fetch_value<'g>(guard: &'g mut Self::Guard<'_>, entity: Entity) -> Option<&'g mut C> {
        guard.get_mut(entity)
    }
}

impl<C: Component> Access for ReadOptional<C> {
    type Component = C;
    const MODE: Mode = Mode::ReadOptional;
    type Guard<'w> = RwLockReadGuard<'w, Table<C>>;
    type Value<'g> = Option<&'g C>;

    fn lock_table(tables: &Tables) -> Self::Guard<'_> { read_table(tables) }

    fn fetch_value<'g>(guard: &'g mut Self::Guard<'_>, entity: Entity) -> Option<Option<&'g C>> {
        Some(guard.get(entity))
    }
}

impl<C: Component> Access for WriteOptional<C> {
    type Component = C;
    const MODE: Mode = Mode::WriteOptional;
    type Guard<'w> = RwLockWriteGuard<'w, Table<C>>;
    type Value<'g> = Option<&'g mut C>;

    fn lock_table(tables: &Tables) -> Self::Guard<'_> { write_table(tables) }

    fn fetch_value<'g>(
        guard: &'g mut Self::Guard<'_>,
        entity: Entity,
    ) -> Option<Option<&'g mut C>> {
        Some(guard.get_mut(entity))
    }
}

fn column<A: Access>() -> Column { Column { ty: DbgTypeId::of::<A::Component>(), mode: A::MODE } }

/// The fixed list of columns of a query.
///
/// Implemented for each access type and for tuples of up to 8 access types.
/// The shape type itself identifies the query,
/// so identical shapes share one cached query in a world.
pub trait Shape: 'static {
    /// The locks held while the query is viewed.
    type Guards<'w>;

    /// The values yielded for each row.
    type Item<'g>;

    /// Returns the columns of this shape in declaration order.
    fn columns() -> Vec<Column>;

    /// Creates the tables for every column.
    fn register(tables: &mut Tables);

    /// Locks the table of every column.
    fn lock(tables: &Tables) -> Self::Guards<'_>;

    /// Fetches the row for `entity`, returning `None` if a required column is missing.
    fn fetch<'g>(guards: &'g mut Self::Guards<'_>, entity: Entity) -> Option<Self::Item<'g>>;
}

macro_rules! impl_single_shape {
    ($($access:ident),*) => {
        $(
            impl<C: Component> Shape for $access<C> {
                type Guards<'w> = <Self as Access>::Guard<'w>;
                type Item<'g> = <Self as Access>::Value<'g>;

                fn columns() -> Vec<Column> { vec![column::<Self>()] }

                fn register(tables: &mut Tables) { tables.ensure::<C>(); }

                fn lock(tables: &Tables) -> Self::Guards<'_> { Self::lock_table(tables) }

                fn fetch<'g>(
                    guards: &'g mut Self::Guards<'_>,
                    entity: Entity,
                ) -> Option<Self::Item<'g>> {
                    Self::fetch_value(guards, entity)
                }
            }
        )*
    };
}

impl_single_shape!(Read, Write, ReadOptional, WriteOptional);

macro_rules! impl_shape {
    ($($ty:ident $var:ident),+) => {
        impl<$($ty: Access),+> Shape for ($($ty,)+) {
            type Guards<'w> = ($($ty::Guard<'w>,)+);
            type Item<'g> = ($($ty::Value<'g>,)+);

            fn columns() -> Vec<Column> { vec![$(column::<$ty>()),+] }

            fn register(tables: &mut Tables) {
                $(
                    tables.ensure::<$ty::Component>();
                )+
            }

            fn lock(tables: &Tables) -> Self::Guards<'_> { ($($ty::lock_table(tables),)+) }

            fn fetch<'g>(
                guards: &'g mut Self::Guards<'_>,
                entity: Entity,
            ) -> Option<Self::Item<'g>> {
                let ($($var,)+) = guards;
                Some(($($ty::fetch_value($var, entity)?,)+))
            }
        }
    };
}

macro_rules! impl_shape_accumulate {
    () => {};
    ($first_ty:ident $first_var:ident $(, $rest_ty:ident $rest_var:ident)* $(,)?) => {
        impl_shape!($first_ty $first_var $(, $rest_ty $rest_var)*);
        impl_shape_accumulate!($($rest_ty $rest_var),*);
    };
}

impl_shape_accumulate!(T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6, T7 t7, T8 t8);

/// Asserts that no component type is requested twice in one shape
/// unless every request for it is shared.
pub(crate) fn validate(columns: &[Column], shape_name: &str) {
    for (index, column) in columns.iter().enumerate() {
        for other in &columns[index + 1..] {
            if column.ty == other.ty && (column.mode.is_mutable() || other.mode.is_mutable()) {
                panic!(
                    "Query {shape_name} requests {} more than once with mutable access",
                    column.ty
                );
            }
        }
    }
}

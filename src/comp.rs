//! Components are plain data attached to entities.
//!
//! Any `Clone + Send + Sync + 'static` type is a component;
//! no registration is required before it is used with a [`World`].
//! Each component type is stored in its own [`Table`](crate::storage::Table),
//! created the first time the type is used.

use crate::util::DbgTypeId;
use crate::{Entity, World};

/// A type that can be stored in a component table.
///
/// `Clone` is required so that entities can be copied between worlds.
pub trait Component: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Component for T {}

/// A set of components inserted together when an entity is created.
///
/// Implemented for tuples of up to 12 components, including the empty tuple.
pub trait Bundle: Send + 'static {
    /// Returns the component types in this bundle.
    fn types() -> Vec<DbgTypeId>;

    /// Inserts every component in the bundle into `world` for `entity`.
    fn insert_into(self, world: &mut World, entity: Entity);
}

macro_rules! impl_bundle {
    ($($ty:ident $var:ident),* $(,)?) => {
        impl<$($ty: Component),*> Bundle for ($($ty,)*) {
            fn types() -> Vec<DbgTypeId> { vec![$(DbgTypeId::of::<$ty>()),*] }

            #[allow(unused_variables)]
            fn insert_into(self, world: &mut World, entity: Entity) {
                let ($($var,)*) = self;
                $(
                    world.add_component::<$ty>(entity, $var);
                )*
            }
        }
    };
}

macro_rules! impl_bundle_accumulate {
    () => {
        impl_bundle!();
    };
    ($first_ty:ident $first_var:ident $(, $rest_ty:ident $rest_var:ident)* $(,)?) => {
        impl_bundle!($first_ty $first_var $(, $rest_ty $rest_var)*);
        impl_bundle_accumulate!($($rest_ty $rest_var),*);
    };
}

impl_bundle_accumulate!(
    T1 t1, T2 t2, T3 t3, T4 t4, T5 t5, T6 t6,
    T7 t7, T8 t8, T9 t9, T10 t10, T11 t11, T12 t12,
);

use std::any::{self, TypeId};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::{RwLock, RwLockWriteGuard};

use super::{shape, Query, Shape, State};
use crate::util::DbgTypeId;
use crate::world::tables::Tables;

/// The queries cached in a world, keyed by shape.
///
/// The set holds one strong reference to each query state.
/// Every other reference belongs to a [`Query`] handle,
/// so a state whose only owner is the set is no longer used and can be dropped.
#[derive(Default)]
pub(crate) struct Set {
    entries: IndexMap<TypeId, Arc<RwLock<State>>>,
}

impl Set {
    /// Returns a handle to the query of shape `Q`, creating it if it does not exist.
    pub(crate) fn get_or_create<Q: Shape>(&mut self) -> Query<Q> {
        let state = self.entries.entry(TypeId::of::<Q>()).or_insert_with(|| {
            let columns = Q::columns();
            shape::validate(&columns, any::type_name::<Q>());
            Arc::new(RwLock::new(State::new(columns)))
        });
        Query::new(Arc::clone(state))
    }

    /// Drops the queries without live handles.
    ///
    /// Returns the number of dropped queries.
    pub(crate) fn collect_garbage(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, state| Arc::strong_count(state) > 1);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            log::debug!("Dropped {dropped} unused queries");
        }
        dropped
    }

    /// Marks every query that depends on any of `changed` as stale.
    pub(crate) fn invalidate(&mut self, changed: &[DbgTypeId]) {
        for state in self.entries.values() {
            let mut state = write_state(state);
            if !state.stale && state.columns.iter().any(|column| changed.contains(&column.ty)) {
                state.stale = true;
            }
        }
    }

    /// Rebuilds every stale query with one merged walk over their combined component types.
    ///
    /// Returns the number of rebuilt queries.
    pub(crate) fn update(&mut self, tables: &Tables) -> usize {
        let mut stale: Vec<RwLockWriteGuard<'_, State>> =
            self.entries.values().map(write_state).filter(|state| state.stale).collect();
        if stale.is_empty() {
            return 0;
        }

        let types: IndexSet<DbgTypeId> =
            stale.iter().flat_map(|state| state.columns.iter().map(|column| column.ty)).collect();
        let types: Vec<DbgTypeId> = types.into_iter().collect();

        for state in &mut stale {
            state.rows.clear();
        }

        let mut iter = tables.walk(Some(types.as_slice()), false);
        while let Some(entity) = iter.current() {
            for state in &mut stale {
                state.consider(entity, &iter);
            }
            iter.advance();
        }

        for state in &mut stale {
            state.stale = false;
            state.rebuilds += 1;
        }

        log::debug!("Rebuilt {} queries over {} component types", stale.len(), types.len());
        stale.len()
    }

    pub(crate) fn len(&self) -> usize { self.entries.len() }
}

fn write_state(state: &Arc<RwLock<State>>) -> RwLockWriteGuard<'_, State> {
    state.try_write().expect("queries cannot be updated while they are viewed")
}

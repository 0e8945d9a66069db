use super::Entity;

/// Maps entities copied from a source world to the entities created for them in a destination world.
///
/// Pairs are recorded in increasing source order,
/// which is the order in which a merged world walk visits entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remap {
    pairs: Vec<(Entity, Entity)>,
}

impl Remap {
    /// Creates an empty remap table.
    pub fn new() -> Self { Self::default() }

    /// Records that `source` was copied to `dest`.
    ///
    /// # Panics
    /// Panics if `source` is not greater than every previously recorded source.
    pub fn push(&mut self, source: Entity, dest: Entity) {
        if let Some(&(last, _)) = self.pairs.last() {
            assert!(
                last < source,
                "Remap sources must be pushed in increasing order ({last:?} >= {source:?})"
            );
        }
        self.pairs.push((source, dest));
    }

    /// Returns the destination entity for `source`, if it was copied.
    pub fn get(&self, source: Entity) -> Option<Entity> {
        let index = self.pairs.binary_search_by_key(&source, |&(source, _)| source).ok()?;
        let &(_, dest) = self.pairs.get(index).expect("index returned by binary_search");
        Some(dest)
    }

    /// Returns the `(source, dest)` pairs in increasing source order.
    pub fn pairs(&self) -> &[(Entity, Entity)] { &self.pairs }

    /// Iterates over the destination entities.
    pub fn dests(&self) -> impl Iterator<Item = Entity> + '_ {
        self.pairs.iter().map(|&(_, dest)| dest)
    }

    /// Returns the number of copied entities.
    pub fn len(&self) -> usize { self.pairs.len() }

    /// Returns whether no entities were copied.
    pub fn is_empty(&self) -> bool { self.pairs.is_empty() }
}

/// A value that stores entity references which must be rewritten after copying between worlds.
pub trait MapEntities {
    /// Replaces every stored entity that appears as a source in `remap` with its destination.
    ///
    /// Entities not present in `remap` are left untouched.
    fn map_entities(&mut self, remap: &Remap);
}

impl MapEntities for Entity {
    fn map_entities(&mut self, remap: &Remap) {
        if let Some(dest) = remap.get(*self) {
            *self = dest;
        }
    }
}

impl<T: MapEntities> MapEntities for Option<T> {
    fn map_entities(&mut self, remap: &Remap) {
        if let Some(value) = self {
            value.map_entities(remap);
        }
    }
}

impl<T: MapEntities> MapEntities for Vec<T> {
    fn map_entities(&mut self, remap: &Remap) {
        for value in self {
            value.map_entities(remap);
        }
    }
}

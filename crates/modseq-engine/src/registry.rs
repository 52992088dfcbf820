//! Unit registry
//!
//! Maps canonical URLs to units. At most one unit exists per URL and units
//! are never removed, so a [`UnitId`] stays valid for the registry's lifetime.

use crate::unit::{Unit, UnitId};
use crate::url::url_base;
use rustc_hash::FxHashMap;
use std::ops::{Index, IndexMut};

/// Registry of all units known to a loader
#[derive(Debug, Default)]
pub struct Registry {
    /// Units in creation order
    units: Vec<Unit>,
    /// Units indexed by canonical URL
    by_url: FxHashMap<String, UnitId>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the unit for `url`, creating it in `Initialized` if absent
    ///
    /// The cross-origin policy only applies when the unit is created; an
    /// existing unit keeps the policy it was first requested with.
    ///
    /// # Panics
    ///
    /// If the new unit's index does not fit in a `u32`.
    pub fn get_or_create(&mut self, url: &str, cross_origin: &str) -> UnitId {
        if let Some(&id) = self.by_url.get(url) {
            return id;
        }

        let id = UnitId::new(self.units.len());
        self.units.push(Unit::new(
            url.to_string(),
            url_base(url).to_string(),
            cross_origin.to_string(),
        ));
        self.by_url.insert(url.to_string(), id);
        id
    }

    /// Look up a unit by canonical URL
    pub fn lookup(&self, url: &str) -> Option<UnitId> {
        self.by_url.get(url).copied()
    }

    /// Get a unit by ID
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id.index())
    }

    /// All units in creation order
    pub fn iter(&self) -> impl Iterator<Item = (UnitId, &Unit)> {
        self.units
            .iter()
            .enumerate()
            .map(|(index, unit)| (UnitId::new(index), unit))
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

// IDs are only minted by `get_or_create`, so indexing cannot go out of bounds.
impl Index<UnitId> for Registry {
    type Output = Unit;

    fn index(&self, id: UnitId) -> &Unit {
        &self.units[id.index()]
    }
}

impl IndexMut<UnitId> for Registry {
    fn index_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.units[id.index()]
    }
}

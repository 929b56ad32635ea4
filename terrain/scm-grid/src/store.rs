//! Sparse node store with base-surface fallback.

use hashbrown::HashMap;
use nalgebra::Vector3;
use scm_types::GridCoord;

use crate::base::BaseSurface;
use crate::node::NodeRecord;

/// Sparse mapping from grid coordinates to persistent node records.
///
/// Lookups for cells without a record fall through to the base surface.
/// A "modified this step" list is kept for incremental visualization and
/// bulldozing bookkeeping; the step pipeline drains it at the start of the
/// next step. Records are never removed.
#[derive(Debug)]
pub struct NodeStore {
    base: BaseSurface,
    map: HashMap<GridCoord, NodeRecord>,
    modified: Vec<GridCoord>,
}

impl NodeStore {
    /// Create an empty store over the given base surface.
    #[must_use]
    pub fn new(base: BaseSurface) -> Self {
        Self {
            base,
            map: HashMap::new(),
            modified: Vec::new(),
        }
    }

    /// The base surface.
    #[must_use]
    pub fn base(&self) -> &BaseSurface {
        &self.base
    }

    /// Record for a cell, if it was ever touched.
    #[must_use]
    pub fn get(&self, loc: GridCoord) -> Option<&NodeRecord> {
        self.map.get(&loc)
    }

    /// Mutable record for a cell, if it was ever touched.
    pub fn get_mut(&mut self, loc: GridCoord) -> Option<&mut NodeRecord> {
        self.map.get_mut(&loc)
    }

    /// Whether a record exists for the cell.
    #[must_use]
    pub fn contains(&self, loc: GridCoord) -> bool {
        self.map.contains_key(&loc)
    }

    /// Record for a cell, creating one from the base surface if absent.
    pub fn ensure(&mut self, loc: GridCoord) -> &mut NodeRecord {
        let base = &self.base;
        self.map.entry(loc).or_insert_with(|| {
            let z = base.init_height(loc);
            NodeRecord::new(z, z, base.init_normal(loc))
        })
    }

    /// Insert or overwrite a record.
    pub fn insert(&mut self, loc: GridCoord, record: NodeRecord) {
        self.map.insert(loc, record);
    }

    /// Current height at a grid vertex: the record's level when touched,
    /// otherwise the undeformed base height.
    #[must_use]
    pub fn height(&self, loc: GridCoord) -> f64 {
        match self.map.get(&loc) {
            Some(nr) => nr.level,
            None => self.base.init_height(loc),
        }
    }

    /// Current surface normal at a grid vertex, in the SCM frame.
    ///
    /// Four-neighbor finite difference over the current heights; matches
    /// [`BaseSurface::init_normal`] for untouched terrain.
    #[must_use]
    pub fn normal(&self, loc: GridCoord) -> Vector3<f64> {
        if self.base.is_flat() && self.map.is_empty() {
            return Vector3::z();
        }
        let h_e = self.height(loc + GridCoord::new(1, 0));
        let h_w = self.height(loc - GridCoord::new(1, 0));
        let h_n = self.height(loc + GridCoord::new(0, 1));
        let h_s = self.height(loc - GridCoord::new(0, 1));
        Vector3::new(h_w - h_e, h_s - h_n, 2.0 * self.base.delta()).normalize()
    }

    /// Mark a cell as modified this step. Duplicates are allowed; consumers
    /// of the list tolerate repeated entries.
    pub fn mark_modified(&mut self, loc: GridCoord) {
        self.modified.push(loc);
    }

    /// Cells modified this step, in marking order.
    #[must_use]
    pub fn modified(&self) -> &[GridCoord] {
        &self.modified
    }

    /// Take the modified list, leaving it empty for the next step.
    pub fn drain_modified(&mut self) -> Vec<GridCoord> {
        std::mem::take(&mut self.modified)
    }

    /// Number of touched cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no cell was ever touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterator over all records.
    pub fn iter(&self) -> impl Iterator<Item = (GridCoord, &NodeRecord)> {
        self.map.iter().map(|(&k, v)| (k, v))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat_store() -> NodeStore {
        NodeStore::new(BaseSurface::flat(4.0, 4.0, 0.1).unwrap())
    }

    #[test]
    fn test_fallback_to_base() {
        let store = flat_store();
        assert_eq!(store.height(GridCoord::new(5, 5)), 0.0);
        assert!(store.get(GridCoord::new(5, 5)).is_none());
    }

    #[test]
    fn test_ensure_materializes_from_base() {
        let mut store = flat_store();
        let c = GridCoord::new(1, 2);
        {
            let nr = store.ensure(c);
            assert_eq!(nr.level, 0.0);
            nr.level = -0.05;
        }
        assert_eq!(store.len(), 1);
        assert_relative_eq!(store.height(c), -0.05);
        // ensure again does not reset
        assert_relative_eq!(store.ensure(c).level, -0.05);
    }

    #[test]
    fn test_normal_tilts_toward_depression() {
        let mut store = flat_store();
        store.ensure(GridCoord::new(1, 0)).level = -0.1;
        let n = store.normal(GridCoord::origin());
        // east neighbor is lower: normal leans east (+x)
        assert!(n.x > 0.0);
        assert!(n.z > 0.0);
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_modified_list_drains() {
        let mut store = flat_store();
        store.mark_modified(GridCoord::origin());
        store.mark_modified(GridCoord::new(1, 0));
        assert_eq!(store.modified().len(), 2);
        let drained = store.drain_modified();
        assert_eq!(drained.len(), 2);
        assert!(store.modified().is_empty());
    }
}

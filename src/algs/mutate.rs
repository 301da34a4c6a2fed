//! Post-commit updates: point motion and side-table translation.
//!
//! After a commit the mesh carries new indices. Tables keyed by the old
//! indices are carried across with the [`TopoMap`]: entries of removed
//! entities are dropped, and entities created by a decomposition can inherit
//! the entry of the cell that drove it.

use crate::algs::ledger::PointRef;
use crate::algs::renumber::{Origin, Renumbering, TopoMap};
use crate::mesh_error::MeshError;
use crate::topology::ids::{CellId, MeshIndex, PointId};
use crate::topology::mesh::PolyMesh;
use std::collections::BTreeMap;

/// Move every motion point of `map` to its target. Returns how many moved.
pub fn apply_motion(mesh: &mut PolyMesh, map: &TopoMap) -> Result<usize, MeshError> {
    let mut moved = 0;
    for (point, from, to) in map.motion.iter() {
        if point.index() >= mesh.n_points() {
            return Err(MeshError::PointCountMismatch {
                expected: point.index() + 1,
                found: mesh.n_points(),
            });
        }
        if from != to {
            moved += 1;
        }
        mesh.set_point(point, to);
    }
    log::debug!("moved {moved} of {} motion points", map.motion.len());
    Ok(moved)
}

/// Carry a table keyed by old indices into the new numbering, dropping
/// removed entries.
pub fn remap_table<I, V>(table: &BTreeMap<I, V>, map: &Renumbering<I>) -> BTreeMap<I, V>
where
    I: MeshIndex,
    V: Clone,
{
    table
        .iter()
        .filter_map(|(&old, v)| map.new_index(old).map(|new| (new, v.clone())))
        .collect()
}

/// Like [`remap_table`] for cells, but cells added by a decomposition take the
/// entry of their driving cell.
pub fn inherit_cell_table<V: Clone>(
    table: &BTreeMap<CellId, V>,
    map: &Renumbering<CellId>,
) -> BTreeMap<CellId, V> {
    let mut out = BTreeMap::new();
    for (new, origin) in map.backward_map().iter().enumerate() {
        let source = match origin {
            Origin::Existing(old) => old,
            Origin::Added { driver } => driver,
        };
        if let Some(v) = table.get(source) {
            out.insert(CellId::from_index(new), v.clone());
        }
    }
    out
}

/// Map a dense per-cell field to the new cells. Added cells take the value of
/// their driving cell.
pub fn map_cell_values<T: Clone>(
    values: &[T],
    map: &Renumbering<CellId>,
) -> Result<Vec<T>, MeshError> {
    if values.len() != map.old_len() {
        return Err(MeshError::FieldSizeMismatch {
            expected: map.old_len(),
            found: values.len(),
        });
    }
    Ok(map
        .backward_map()
        .iter()
        .map(|origin| match origin {
            Origin::Existing(old) => values[old.index()].clone(),
            Origin::Added { driver } => values[driver.index()].clone(),
        })
        .collect())
}

/// Apex point of every pyramid cell, in the post-commit numbering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApexTable {
    apexes: BTreeMap<CellId, PointId>,
}

impl ApexTable {
    /// Translate the planner's `selected cell -> apex handle` table.
    ///
    /// The selected cells themselves are gone after the commit; each of their
    /// pyramids is keyed instead.
    pub fn translate(planned: &BTreeMap<CellId, PointRef>, map: &TopoMap) -> Self {
        let resolved: BTreeMap<CellId, PointId> = planned
            .iter()
            .filter_map(|(&cell, &apex)| map.resolve_point(apex).map(|p| (cell, p)))
            .collect();
        let mut apexes = BTreeMap::new();
        for (new, origin) in map.cells.backward_map().iter().enumerate() {
            if let Origin::Added { driver } = origin {
                if let Some(&apex) = resolved.get(driver) {
                    apexes.insert(CellId::from_index(new), apex);
                }
            }
        }
        Self { apexes }
    }

    /// Carry the table through a later commit.
    pub fn remap(&self, map: &TopoMap) -> Self {
        let apexes = self
            .apexes
            .iter()
            .filter_map(|(&cell, &apex)| {
                let cell = map.cells.new_index(cell)?;
                let apex = map.points.new_index(apex)?;
                Some((cell, apex))
            })
            .collect();
        Self { apexes }
    }

    pub fn get(&self, cell: CellId) -> Option<PointId> {
        self.apexes.get(&cell).copied()
    }

    pub fn len(&self) -> usize {
        self.apexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apexes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellId, PointId)> + '_ {
        self.apexes.iter().map(|(&c, &p)| (c, p))
    }

    /// Distinct apex points.
    pub fn points(&self) -> Vec<PointId> {
        let mut pts: Vec<PointId> = self.apexes.values().copied().collect();
        pts.sort_unstable();
        pts.dedup();
        pts
    }
}

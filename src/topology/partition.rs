//! Partition metadata for distributed meshes.
//!
//! Every rank owns a disjoint set of cells. [`GlobalIndex`] numbers the cells
//! (and points) of all ranks contiguously: rank `r` owns the global range
//! `offset(r)..offset(r + 1)`. A [`Partition`] additionally records, for every
//! face on a processor patch, the global number of the cell on the other side.

use crate::mesh_error::MeshError;
use crate::topology::ids::PatchId;
use crate::topology::mesh::PolyMesh;
use std::collections::BTreeMap;

/// Offset-based global numbering.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GlobalIndex {
    offsets: Vec<u64>,
}

impl GlobalIndex {
    /// Build from per-rank local sizes.
    pub fn from_counts(counts: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        let mut acc = 0u64;
        offsets.push(acc);
        for &c in counts {
            acc += c as u64;
            offsets.push(acc);
        }
        Self { offsets }
    }

    /// Single-rank numbering.
    pub fn serial(count: usize) -> Self {
        Self::from_counts(&[count])
    }

    pub fn n_ranks(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total size over all ranks.
    pub fn size(&self) -> u64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn offset(&self, rank: usize) -> u64 {
        self.offsets[rank]
    }

    pub fn local_size(&self, rank: usize) -> usize {
        (self.offsets[rank + 1] - self.offsets[rank]) as usize
    }

    pub fn to_global(&self, rank: usize, local: usize) -> u64 {
        self.offsets[rank] + local as u64
    }

    /// Local index on `rank`, if `global` belongs to it.
    pub fn to_local(&self, rank: usize, global: u64) -> Option<usize> {
        (self.offsets[rank] <= global && global < self.offsets[rank + 1])
            .then(|| (global - self.offsets[rank]) as usize)
    }

    /// Rank owning `global`.
    pub fn which_rank(&self, global: u64) -> Option<usize> {
        if global >= self.size() {
            return None;
        }
        // offsets is sorted; the owner is the last rank whose offset is <= global
        let idx = self.offsets.partition_point(|&off| off <= global);
        Some(idx - 1)
    }
}

/// Partition of a distributed mesh as seen from one rank.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Partition {
    rank: usize,
    cells: GlobalIndex,
    points: GlobalIndex,
    remote_cells: BTreeMap<PatchId, Vec<u64>>,
}

impl Partition {
    pub fn new(
        rank: usize,
        cells: GlobalIndex,
        points: GlobalIndex,
        remote_cells: BTreeMap<PatchId, Vec<u64>>,
    ) -> Self {
        Self {
            rank,
            cells,
            points,
            remote_cells,
        }
    }

    /// A one-rank partition covering the whole mesh.
    pub fn serial(mesh: &PolyMesh) -> Self {
        Self::new(
            0,
            GlobalIndex::serial(mesh.n_cells()),
            GlobalIndex::serial(mesh.n_points()),
            BTreeMap::new(),
        )
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn n_ranks(&self) -> usize {
        self.cells.n_ranks()
    }

    pub fn cells(&self) -> &GlobalIndex {
        &self.cells
    }

    pub fn points(&self) -> &GlobalIndex {
        &self.points
    }

    /// Global cell across every face of processor `patch`, in patch order.
    pub fn remote_cells(&self, patch: PatchId) -> Option<&[u64]> {
        self.remote_cells.get(&patch).map(Vec::as_slice)
    }

    /// Check the metadata against the local mesh.
    ///
    /// Local sizes must match, every processor patch needs one remote cell
    /// per face, and no two processor patches may share a neighbour rank.
    pub fn check(&self, mesh: &PolyMesh) -> Result<(), MeshError> {
        if self.cells.n_ranks() != self.points.n_ranks() || self.rank >= self.cells.n_ranks() {
            return Err(MeshError::Partition(format!(
                "rank {} outside numbering of {} ranks",
                self.rank,
                self.cells.n_ranks()
            )));
        }
        if self.cells.local_size(self.rank) != mesh.n_cells() {
            return Err(MeshError::Partition(format!(
                "global numbering gives {} local cells, mesh has {}",
                self.cells.local_size(self.rank),
                mesh.n_cells()
            )));
        }
        if self.points.local_size(self.rank) != mesh.n_points() {
            return Err(MeshError::Partition(format!(
                "global numbering gives {} local points, mesh has {}",
                self.points.local_size(self.rank),
                mesh.n_points()
            )));
        }

        let mut seen_ranks = BTreeMap::new();
        for (idx, patch) in mesh.patches().iter().enumerate() {
            let id = PatchId::from_index(idx);
            let Some(nbr) = patch.neighbour_rank() else {
                continue;
            };
            if nbr == self.rank || nbr >= self.n_ranks() {
                return Err(MeshError::Partition(format!(
                    "patch {} points at invalid rank {nbr}",
                    patch.name
                )));
            }
            if let Some(other) = seen_ranks.insert(nbr, id) {
                return Err(MeshError::Partition(format!(
                    "patches {other} and {id} both border rank {nbr}"
                )));
            }
            let expected = mesh.patch_range(id).len();
            let found = self.remote_cells.get(&id).map_or(0, Vec::len);
            if found != expected {
                return Err(MeshError::Partition(format!(
                    "patch {} has {expected} faces but {found} remote cells",
                    patch.name
                )));
            }
        }
        Ok(())
    }

    /// Processor patches as `(patch, neighbour rank)`, ascending by rank.
    pub fn processor_patches(mesh: &PolyMesh) -> Vec<(PatchId, usize)> {
        let mut out: Vec<_> = mesh
            .patches()
            .iter()
            .enumerate()
            .filter_map(|(idx, p)| p.neighbour_rank().map(|r| (PatchId::from_index(idx), r)))
            .collect();
        out.sort_unstable_by_key(|&(_, r)| r);
        out
    }
}

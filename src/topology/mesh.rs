//! Face-addressed polyhedral mesh.
//!
//! A [`PolyMesh`] stores points, faces and boundary patches; cells exist only
//! through the faces that name them. Every face has an owner cell, internal
//! faces also have a neighbour cell, and boundary faces belong to exactly one
//! patch. The face normal (right-hand rule over the vertex cycle) points out of
//! the owner.
//!
//! # Canonical face order
//! - Internal faces come first, sorted by `(owner, neighbour)` with
//!   `owner < neighbour` (upper-triangular order).
//! - Boundary faces follow, grouped by ascending patch id.
//!
//! [`PolyMesh::new`] rejects meshes that break the order;
//! [`PolyMesh::from_unordered`] sorts and re-orients faces into it.

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshError;
use crate::topology::ids::{CellId, FaceId, PatchId, PointId};
use crate::topology::validation::{ValidationOptions, validate_parts};
use itertools::Itertools;
use std::ops::Range;

/// A point coordinate.
pub type Point3 = [f64; 3];

/// Which of the two cells adjacent to a face is meant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FaceSide {
    Owner,
    Neighbour,
}

/// A polygonal face.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Face {
    /// Ordered vertex cycle; the normal points out of `owner`.
    pub vertices: Vec<PointId>,
    pub owner: CellId,
    /// `None` for boundary faces.
    pub neighbour: Option<CellId>,
    /// `Some` exactly for boundary faces.
    pub patch: Option<PatchId>,
}

impl Face {
    /// An internal face between `owner` and `neighbour`.
    pub fn internal(vertices: Vec<PointId>, owner: CellId, neighbour: CellId) -> Self {
        Self {
            vertices,
            owner,
            neighbour: Some(neighbour),
            patch: None,
        }
    }

    /// A boundary face of `owner` on `patch`.
    pub fn boundary(vertices: Vec<PointId>, owner: CellId, patch: PatchId) -> Self {
        Self {
            vertices,
            owner,
            neighbour: None,
            patch: Some(patch),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.neighbour.is_some()
    }

    /// The cell on `side`, if any.
    pub fn cell(&self, side: FaceSide) -> Option<CellId> {
        match side {
            FaceSide::Owner => Some(self.owner),
            FaceSide::Neighbour => self.neighbour,
        }
    }

    /// The side on which `cell` sits, if it is adjacent to this face.
    pub fn side_of(&self, cell: CellId) -> Option<FaceSide> {
        if self.owner == cell {
            Some(FaceSide::Owner)
        } else if self.neighbour == Some(cell) {
            Some(FaceSide::Neighbour)
        } else {
            None
        }
    }

    /// Directed edges of the vertex cycle, closing back to the first vertex.
    pub fn edges(&self) -> impl Iterator<Item = (PointId, PointId)> + '_ {
        self.vertices.iter().copied().circular_tuple_windows()
    }

    /// The vertex cycle as seen from outside `cell`: unchanged for the owner,
    /// reversed for the neighbour.
    pub fn outward_vertices(&self, side: FaceSide) -> Vec<PointId> {
        match side {
            FaceSide::Owner => self.vertices.clone(),
            FaceSide::Neighbour => self.vertices.iter().rev().copied().collect(),
        }
    }

    /// Reverse the vertex cycle and swap owner and neighbour.
    ///
    /// Has no effect on boundary faces.
    pub fn flip(&mut self) {
        if let Some(nbr) = self.neighbour {
            self.vertices.reverse();
            self.neighbour = Some(self.owner);
            self.owner = nbr;
        }
    }
}

/// Role of a boundary patch.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PatchKind {
    /// Generic boundary.
    Patch,
    /// Solid wall.
    Wall,
    /// Partition boundary shared with `neighbour_rank`.
    Processor { neighbour_rank: usize },
}

/// A named group of boundary faces.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Patch {
    pub name: String,
    pub kind: PatchKind,
}

impl Patch {
    pub fn new(name: impl Into<String>, kind: PatchKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Neighbouring rank for processor patches.
    pub fn neighbour_rank(&self) -> Option<usize> {
        match self.kind {
            PatchKind::Processor { neighbour_rank } => Some(neighbour_rank),
            _ => None,
        }
    }
}

/// Unstructured polyhedral mesh in canonical face order.
#[derive(Clone, Debug, PartialEq)]
pub struct PolyMesh {
    points: Vec<Point3>,
    faces: Vec<Face>,
    n_cells: usize,
    patches: Vec<Patch>,
    // derived addressing
    n_internal: usize,
    patch_starts: Vec<usize>,
    cell_faces: Vec<Vec<FaceId>>,
}

impl PolyMesh {
    /// Build a mesh from faces already in canonical order.
    ///
    /// Runs the full structural validation, including closedness of every cell.
    pub fn new(
        points: Vec<Point3>,
        faces: Vec<Face>,
        n_cells: usize,
        patches: Vec<Patch>,
    ) -> Result<Self, MeshError> {
        validate_parts(&points, &faces, n_cells, &patches, ValidationOptions::all())?;
        Ok(Self::assemble(points, faces, n_cells, patches))
    }

    /// Build a mesh from faces in any order, re-orienting internal faces so that
    /// `owner < neighbour` and sorting into canonical order.
    pub fn from_unordered(
        points: Vec<Point3>,
        faces: Vec<Face>,
        n_cells: usize,
        patches: Vec<Patch>,
    ) -> Result<Self, MeshError> {
        let (faces, _) = canonicalize(faces);
        Self::new(points, faces, n_cells, patches)
    }

    /// Assemble without validation. Callers guarantee canonical, valid input.
    pub(crate) fn assemble(
        points: Vec<Point3>,
        faces: Vec<Face>,
        n_cells: usize,
        patches: Vec<Patch>,
    ) -> Self {
        let n_internal = faces.iter().take_while(|f| f.is_internal()).count();

        let mut patch_starts = vec![faces.len(); patches.len() + 1];
        for (idx, face) in faces.iter().enumerate().rev() {
            if let Some(patch) = face.patch {
                patch_starts[patch.index()] = idx;
            }
        }
        // Empty patches start where the next one does.
        for p in (0..patches.len()).rev() {
            patch_starts[p] = patch_starts[p].min(patch_starts[p + 1]);
        }

        let mut cell_faces = vec![Vec::new(); n_cells];
        for (idx, face) in faces.iter().enumerate() {
            let id = FaceId::from_index(idx);
            cell_faces[face.owner.index()].push(id);
            if let Some(nbr) = face.neighbour {
                cell_faces[nbr.index()].push(id);
            }
        }

        Self {
            points,
            faces,
            n_cells,
            patches,
            n_internal,
            patch_starts,
            cell_faces,
        }
    }

    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    pub fn n_internal_faces(&self) -> usize {
        self.n_internal
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn point(&self, p: PointId) -> Point3 {
        self.points[p.index()]
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn face(&self, f: FaceId) -> &Face {
        &self.faces[f.index()]
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn patch(&self, p: PatchId) -> &Patch {
        &self.patches[p.index()]
    }

    /// Look up a patch by name.
    pub fn find_patch(&self, name: &str) -> Option<PatchId> {
        self.patches
            .iter()
            .position(|p| p.name == name)
            .map(PatchId::from_index)
    }

    /// Faces bounding `cell`, in ascending face order.
    pub fn cell_faces(&self, cell: CellId) -> &[FaceId] {
        &self.cell_faces[cell.index()]
    }

    /// Distinct points of `cell`, ascending.
    pub fn cell_points(&self, cell: CellId) -> Vec<PointId> {
        self.cell_faces(cell)
            .iter()
            .flat_map(|&f| self.face(f).vertices.iter().copied())
            .sorted_unstable()
            .dedup()
            .collect()
    }

    /// Distinct undirected edges of `cell` as `(low, high)` pairs, ascending.
    pub fn cell_edges(&self, cell: CellId) -> Vec<(PointId, PointId)> {
        self.cell_faces(cell)
            .iter()
            .flat_map(|&f| self.face(f).edges())
            .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
            .sorted_unstable()
            .dedup()
            .collect()
    }

    /// Face index range of `patch`.
    pub fn patch_range(&self, patch: PatchId) -> Range<usize> {
        self.patch_starts[patch.index()]..self.patch_starts[patch.index() + 1]
    }

    /// Faces of `patch` in patch order.
    pub fn patch_faces(&self, patch: PatchId) -> impl Iterator<Item = FaceId> + use<> {
        self.patch_range(patch).map(FaceId::from_index)
    }

    /// All boundary faces.
    pub fn boundary_faces(&self) -> impl Iterator<Item = FaceId> + use<> {
        (self.n_internal..self.faces.len()).map(FaceId::from_index)
    }

    /// Replace every point position. The point count must not change.
    pub fn move_points(&mut self, points: Vec<Point3>) -> Result<(), MeshError> {
        if points.len() != self.points.len() {
            return Err(MeshError::PointCountMismatch {
                expected: self.points.len(),
                found: points.len(),
            });
        }
        self.points = points;
        Ok(())
    }

    /// Move a single point.
    pub fn set_point(&mut self, p: PointId, position: Point3) {
        self.points[p.index()] = position;
    }

    /// Decompose into `(points, faces, n_cells, patches)`.
    pub fn into_parts(self) -> (Vec<Point3>, Vec<Face>, usize, Vec<Patch>) {
        (self.points, self.faces, self.n_cells, self.patches)
    }
}

impl DebugInvariants for PolyMesh {
    fn validate_invariants(&self) -> Result<(), MeshError> {
        validate_parts(
            &self.points,
            &self.faces,
            self.n_cells,
            &self.patches,
            ValidationOptions::all(),
        )
    }
}

/// Sort faces into canonical order.
///
/// Internal faces with `owner > neighbour` are flipped first. Returns the
/// sorted faces and, per output position, `(input index, flipped)`.
pub(crate) fn canonicalize(faces: Vec<Face>) -> (Vec<Face>, Vec<(usize, bool)>) {
    let mut keyed: Vec<(usize, bool, Face)> = faces
        .into_iter()
        .enumerate()
        .map(|(idx, mut face)| {
            let flip = face.neighbour.is_some_and(|nbr| nbr < face.owner);
            if flip {
                face.flip();
            }
            (idx, flip, face)
        })
        .collect();

    // Stable: boundary faces keep their relative input order within a patch.
    keyed.sort_by_key(|(_, _, face)| match face.neighbour {
        Some(nbr) => (0u8, face.owner.get(), nbr.get()),
        None => (1u8, face.patch.map_or(u32::MAX, PatchId::get), 0),
    });

    let origin = keyed.iter().map(|(idx, flip, _)| (*idx, *flip)).collect();
    let faces = keyed.into_iter().map(|(_, _, face)| face).collect();
    (faces, origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::meshgen::hex_block;

    fn pid(i: u32) -> PointId {
        PointId::new(i)
    }

    #[test]
    fn outward_vertices_reverse_for_neighbour() {
        let f = Face::internal(vec![pid(0), pid(1), pid(2)], CellId::new(0), CellId::new(1));
        assert_eq!(f.outward_vertices(FaceSide::Owner), vec![pid(0), pid(1), pid(2)]);
        assert_eq!(
            f.outward_vertices(FaceSide::Neighbour),
            vec![pid(2), pid(1), pid(0)]
        );
        assert_eq!(f.side_of(CellId::new(1)), Some(FaceSide::Neighbour));
        assert_eq!(f.side_of(CellId::new(5)), None);
    }

    #[test]
    fn edges_close_the_cycle() {
        let f = Face::boundary(
            vec![pid(3), pid(4), pid(5), pid(6)],
            CellId::new(0),
            PatchId::new(0),
        );
        let edges: Vec<_> = f.edges().collect();
        assert_eq!(
            edges,
            vec![(pid(3), pid(4)), (pid(4), pid(5)), (pid(5), pid(6)), (pid(6), pid(3))]
        );
    }

    #[test]
    fn flip_swaps_cells_and_reverses() {
        let mut f = Face::internal(vec![pid(0), pid(1), pid(2)], CellId::new(4), CellId::new(1));
        f.flip();
        assert_eq!(f.owner, CellId::new(1));
        assert_eq!(f.neighbour, Some(CellId::new(4)));
        assert_eq!(f.vertices, vec![pid(2), pid(1), pid(0)]);
    }

    #[test]
    fn canonicalize_orders_and_flips() {
        let faces = vec![
            Face::boundary(vec![pid(0), pid(1), pid(2)], CellId::new(0), PatchId::new(1)),
            Face::internal(vec![pid(0), pid(1), pid(3)], CellId::new(2), CellId::new(1)),
            Face::boundary(vec![pid(1), pid(2), pid(3)], CellId::new(1), PatchId::new(0)),
            Face::internal(vec![pid(0), pid(2), pid(3)], CellId::new(0), CellId::new(1)),
        ];
        let (sorted, origin) = canonicalize(faces);
        assert_eq!(origin, vec![(3, false), (1, true), (2, false), (0, false)]);
        assert_eq!(sorted[1].owner, CellId::new(1));
        assert_eq!(sorted[1].neighbour, Some(CellId::new(2)));
    }

    #[test]
    fn block_addressing() {
        let mesh = hex_block(2, 1, 1, [1.0, 1.0, 1.0]).unwrap();
        assert_eq!(mesh.n_cells(), 2);
        assert_eq!(mesh.n_points(), 12);
        assert_eq!(mesh.n_faces(), 11);
        assert_eq!(mesh.n_internal_faces(), 1);
        for cell in CellId::range(2) {
            assert_eq!(mesh.cell_faces(cell).len(), 6);
            assert_eq!(mesh.cell_points(cell).len(), 8);
            assert_eq!(mesh.cell_edges(cell).len(), 12);
        }
        let total: usize = (0..mesh.patches().len())
            .map(|p| mesh.patch_range(PatchId::from_index(p)).len())
            .sum();
        assert_eq!(total, 10);
        assert_eq!(mesh.boundary_faces().count(), 10);
    }

    #[test]
    fn move_points_rejects_wrong_count() {
        let mut mesh = hex_block(1, 1, 1, [1.0, 1.0, 1.0]).unwrap();
        let err = mesh.move_points(vec![[0.0; 3]; 3]).unwrap_err();
        assert_eq!(
            err,
            MeshError::PointCountMismatch {
                expected: 8,
                found: 3
            }
        );
    }
}
